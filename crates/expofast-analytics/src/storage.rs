// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Key-value storage used to persist the client identity.
//!
//! Host platforms plug in their own secure store by implementing
//! [`KeyValueStore`]. [`FileStore`] and [`MemoryStore`] cover desktop hosts and
//! tests.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use tracing::debug;

use crate::error::StorageError;

/// Asynchronous string key-value storage.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
	/// Returns the stored value, or `None` if the key was never written.
	async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;

	async fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;
}

/// Process-local storage. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
	items: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
	pub fn new() -> Self {
		Self::default()
	}

	/// Creates a store pre-populated with one entry.
	pub fn with_item(key: impl Into<String>, value: impl Into<String>) -> Self {
		let store = Self::new();
		store
			.items
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.insert(key.into(), value.into());
		store
	}
}

#[async_trait]
impl KeyValueStore for MemoryStore {
	async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
		let items = self.items.lock().unwrap_or_else(PoisonError::into_inner);
		Ok(items.get(key).cloned())
	}

	async fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
		let mut items = self.items.lock().unwrap_or_else(PoisonError::into_inner);
		items.insert(key.to_string(), value.to_string());
		Ok(())
	}
}

/// Storage backed by a single JSON object file.
///
/// Writes go to a sibling temp file that is renamed into place, so a crash
/// mid-write leaves the previous contents intact.
#[derive(Debug)]
pub struct FileStore {
	path: PathBuf,
	write_lock: tokio::sync::Mutex<()>,
}

impl FileStore {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self {
			path: path.into(),
			write_lock: tokio::sync::Mutex::new(()),
		}
	}

	/// `<data dir>/expofast-analytics/storage.json`, if the platform has a
	/// data directory.
	pub fn default_location() -> Option<Self> {
		dirs::data_dir().map(|dir| Self::new(dir.join("expofast-analytics").join("storage.json")))
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	async fn read_all(&self) -> Result<HashMap<String, String>, StorageError> {
		match tokio::fs::read(&self.path).await {
			Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
			Err(e) => Err(e.into()),
		}
	}
}

#[async_trait]
impl KeyValueStore for FileStore {
	async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
		let mut items = self.read_all().await?;
		Ok(items.remove(key))
	}

	async fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
		let _guard = self.write_lock.lock().await;

		let mut items = self.read_all().await?;
		items.insert(key.to_string(), value.to_string());

		if let Some(parent) = self.path.parent() {
			tokio::fs::create_dir_all(parent).await?;
		}

		let tmp_path = self.path.with_extension("json.tmp");
		tokio::fs::write(&tmp_path, serde_json::to_vec_pretty(&items)?).await?;
		tokio::fs::rename(&tmp_path, &self.path).await?;

		debug!(path = %self.path.display(), key = %key, "persisted storage item");
		Ok(())
	}
}
