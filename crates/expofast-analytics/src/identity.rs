// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Client and user identity of a session.
//!
//! The client identity (`identifyId`) is generated once per installation and
//! persisted through a [`KeyValueStore`]. The user identity (`userId`) is set
//! by `identify` calls and lives only in memory.

use std::sync::{PoisonError, RwLock};

use tokio::sync::OnceCell;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::storage::KeyValueStore;

/// Storage key holding the persisted client identity.
pub const IDENTIFY_ID_KEY: &str = "expofast-analytics_identify-id";

/// Generates a new time-ordered client identity (UUIDv7).
pub fn generate_identify_id() -> String {
	Uuid::now_v7().to_string()
}

/// Identity state of one client.
#[derive(Debug, Default)]
pub struct Identity {
	identify_id: OnceCell<String>,
	user_id: RwLock<Option<String>>,
}

impl Identity {
	pub fn new() -> Self {
		Self::default()
	}

	/// Loads the persisted client identity or creates and persists a new one.
	///
	/// Concurrent and repeated calls resolve to the same value; the storage
	/// is consulted at most once per client. Storage failures are logged and
	/// the session continues with an in-memory identity.
	pub async fn establish(&self, store: &dyn KeyValueStore) -> &str {
		self
			.identify_id
			.get_or_init(|| load_or_create(store))
			.await
			.as_str()
	}

	/// The client identity, or `None` while it is still loading.
	pub fn identify_id(&self) -> Option<&str> {
		self.identify_id.get().map(String::as_str)
	}

	pub fn is_established(&self) -> bool {
		self.identify_id.initialized()
	}

	pub fn user_id(&self) -> Option<String> {
		self
			.user_id
			.read()
			.unwrap_or_else(PoisonError::into_inner)
			.clone()
	}

	pub fn set_user_id(&self, user_id: impl Into<String>) {
		*self.user_id.write().unwrap_or_else(PoisonError::into_inner) = Some(user_id.into());
	}
}

async fn load_or_create(store: &dyn KeyValueStore) -> String {
	match store.get_item(IDENTIFY_ID_KEY).await {
		Ok(Some(existing)) if !existing.trim().is_empty() => {
			debug!(identify_id = %existing, "loaded persisted identify id");
			return existing;
		}
		Ok(_) => {}
		Err(e) => {
			warn!(error = %e, "failed to read persisted identify id, generating a new one");
		}
	}

	let identify_id = generate_identify_id();
	if let Err(e) = store.set_item(IDENTIFY_ID_KEY, &identify_id).await {
		warn!(error = %e, "failed to persist identify id, using it for this session only");
	} else {
		debug!(identify_id = %identify_id, "generated and persisted identify id");
	}
	identify_id
}
