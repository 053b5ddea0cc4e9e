// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Free-form event properties.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A string-keyed map of arbitrary JSON values attached to an event.
///
/// Serializes as a plain JSON object.
///
/// # Example
///
/// ```
/// use expofast_analytics_core::Properties;
///
/// let props = Properties::new()
///     .insert("plan", "pro")
///     .insert("seats", 3)
///     .insert("trial", false);
/// assert_eq!(props.len(), 3);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Properties {
	inner: Map<String, Value>,
}

impl Properties {
	pub fn new() -> Self {
		Self { inner: Map::new() }
	}

	/// Inserts a key-value pair, returning the updated properties.
	pub fn insert<K, V>(mut self, key: K, value: V) -> Self
	where
		K: Into<String>,
		V: Into<Value>,
	{
		self.inner.insert(key.into(), value.into());
		self
	}

	/// Shallow merge. Keys present in `other` overwrite keys in `self`.
	pub fn merge(mut self, other: Properties) -> Self {
		self.inner.extend(other.inner);
		self
	}

	pub fn is_empty(&self) -> bool {
		self.inner.is_empty()
	}

	pub fn len(&self) -> usize {
		self.inner.len()
	}

	pub fn get(&self, key: &str) -> Option<&Value> {
		self.inner.get(key)
	}

	pub fn contains_key(&self, key: &str) -> bool {
		self.inner.contains_key(key)
	}

	pub fn keys(&self) -> impl Iterator<Item = &String> {
		self.inner.keys()
	}

	pub fn into_value(self) -> Value {
		Value::Object(self.inner)
	}
}

impl From<Properties> for Value {
	fn from(props: Properties) -> Self {
		props.into_value()
	}
}

/// Non-object values carry no keys and convert to empty properties.
impl From<Value> for Properties {
	fn from(value: Value) -> Self {
		match value {
			Value::Object(map) => Self { inner: map },
			_ => Self::new(),
		}
	}
}

impl From<Map<String, Value>> for Properties {
	fn from(map: Map<String, Value>) -> Self {
		Self { inner: map }
	}
}

impl<K, V> FromIterator<(K, V)> for Properties
where
	K: Into<String>,
	V: Into<Value>,
{
	fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
		Self {
			inner: iter
				.into_iter()
				.map(|(k, v)| (k.into(), v.into()))
				.collect(),
		}
	}
}
