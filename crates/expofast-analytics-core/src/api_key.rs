// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Project API key.
//!
//! The key is sent in every push body. Its `Debug` output is redacted so the
//! key never ends up in logs when payloads or configs are traced. Every copy
//! wipes its memory when dropped.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use zeroize::{Zeroize, ZeroizeOnDrop};

const REDACTED: &str = "[REDACTED]";

/// A non-blank project API key.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct ApiKey(String);

impl ApiKey {
	/// Returns `None` when the key is empty or whitespace only.
	pub fn parse(key: impl Into<String>) -> Option<Self> {
		let key = key.into();
		if key.trim().is_empty() {
			None
		} else {
			Some(Self(key))
		}
	}

	/// Returns the raw key. Only call this when building a request.
	pub fn expose(&self) -> &str {
		&self.0
	}
}

impl fmt::Debug for ApiKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_tuple("ApiKey").field(&REDACTED).finish()
	}
}

impl Serialize for ApiKey {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.serialize_str(&self.0)
	}
}

impl<'de> Deserialize<'de> for ApiKey {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		let raw = String::deserialize(deserializer)?;
		ApiKey::parse(raw).ok_or_else(|| serde::de::Error::custom("API key must not be blank"))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn blank_keys_are_rejected() {
		assert!(ApiKey::parse("").is_none());
		assert!(ApiKey::parse("   ").is_none());
		assert!(ApiKey::parse("pk_live_123").is_some());
	}

	#[test]
	fn zeroize_wipes_the_key() {
		let mut key = ApiKey::parse("pk_live_secret").unwrap();
		key.zeroize();
		assert!(key.expose().is_empty());
	}

	#[test]
	fn debug_is_redacted() {
		let key = ApiKey::parse("pk_live_secret").unwrap();
		let debug = format!("{key:?}");
		assert!(!debug.contains("pk_live_secret"));
		assert!(debug.contains(REDACTED));
	}

	#[test]
	fn serializes_as_raw_string() {
		let key = ApiKey::parse("pk_live_123").unwrap();
		assert_eq!(serde_json::to_string(&key).unwrap(), "\"pk_live_123\"");
	}

	#[test]
	fn deserialize_rejects_blank() {
		assert!(serde_json::from_str::<ApiKey>("\"\"").is_err());
		let key: ApiKey = serde_json::from_str("\"pk\"").unwrap();
		assert_eq!(key.expose(), "pk");
	}
}
