// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The analytics event taxonomy.
//!
//! Every event carries a `type` discriminator and a `date` capture timestamp
//! (ISO-8601, UTC, millisecond precision). The five variants are fixed; there
//! is no schema validation beyond the shape of this enum.

use std::fmt;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::properties::Properties;

/// Error messages longer than this many characters are cut for display.
pub const MAX_ERROR_MESSAGE_CHARS: usize = 150;

/// Returns the current time formatted the way the collection endpoint expects,
/// e.g. `2025-01-31T12:00:00.000Z`.
pub fn capture_timestamp() -> String {
	Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Cuts `message` to at most [`MAX_ERROR_MESSAGE_CHARS`] characters.
///
/// Counts `char`s rather than bytes so multi-byte text is never split.
pub fn truncate_message(message: &str) -> String {
	match message.char_indices().nth(MAX_ERROR_MESSAGE_CHARS) {
		Some((idx, _)) => message[..idx].to_string(),
		None => message.to_string(),
	}
}

/// A single analytics event as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Event {
	/// The user moved to a new screen.
	Navigation {
		path: String,
		date: String,
		#[serde(default, skip_serializing_if = "Option::is_none")]
		properties: Option<Properties>,
	},
	/// An application-defined action.
	Action {
		name: String,
		date: String,
		#[serde(default, skip_serializing_if = "Option::is_none")]
		properties: Option<Properties>,
	},
	/// Associates the session with an application user id.
	Identify {
		id: String,
		date: String,
		#[serde(default, skip_serializing_if = "Option::is_none")]
		properties: Option<Properties>,
	},
	/// The app moved to the foreground (`active = true`) or away from it.
	State { active: bool, date: String },
	/// A reported error. `message` is truncated; the full text lives in
	/// `properties.message`.
	Error {
		message: String,
		date: String,
		properties: Properties,
	},
}

/// The discriminator of an [`Event`], without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
	Navigation,
	Action,
	Identify,
	State,
	Error,
}

impl EventKind {
	pub fn as_str(&self) -> &'static str {
		match self {
			EventKind::Navigation => "navigation",
			EventKind::Action => "action",
			EventKind::Identify => "identify",
			EventKind::State => "state",
			EventKind::Error => "error",
		}
	}
}

impl fmt::Display for EventKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl Event {
	pub fn navigation(path: impl Into<String>, properties: Option<Properties>) -> Self {
		Event::Navigation {
			path: path.into(),
			date: capture_timestamp(),
			properties,
		}
	}

	pub fn action(name: impl Into<String>, properties: Option<Properties>) -> Self {
		Event::Action {
			name: name.into(),
			date: capture_timestamp(),
			properties,
		}
	}

	pub fn identify(id: impl Into<String>, traits: Option<IdentifyTraits>) -> Self {
		Event::Identify {
			id: id.into(),
			date: capture_timestamp(),
			properties: traits.map(Properties::from),
		}
	}

	pub fn state(active: bool) -> Self {
		Event::State {
			active,
			date: capture_timestamp(),
		}
	}

	/// Builds an error event from anything printable.
	///
	/// Extra properties are applied after the full message, so an explicit
	/// `message` property overrides it.
	pub fn error(message: impl fmt::Display, properties: Option<Properties>) -> Self {
		let full = message.to_string();
		let mut props = Properties::new().insert("message", full.clone());
		if let Some(extra) = properties {
			props = props.merge(extra);
		}
		Event::Error {
			message: truncate_message(&full),
			date: capture_timestamp(),
			properties: props,
		}
	}

	pub fn kind(&self) -> EventKind {
		match self {
			Event::Navigation { .. } => EventKind::Navigation,
			Event::Action { .. } => EventKind::Action,
			Event::Identify { .. } => EventKind::Identify,
			Event::State { .. } => EventKind::State,
			Event::Error { .. } => EventKind::Error,
		}
	}

	pub fn date(&self) -> &str {
		match self {
			Event::Navigation { date, .. }
			| Event::Action { date, .. }
			| Event::Identify { date, .. }
			| Event::State { date, .. }
			| Event::Error { date, .. } => date,
		}
	}

	pub fn properties(&self) -> Option<&Properties> {
		match self {
			Event::Navigation { properties, .. }
			| Event::Action { properties, .. }
			| Event::Identify { properties, .. } => properties.as_ref(),
			Event::Error { properties, .. } => Some(properties),
			Event::State { .. } => None,
		}
	}
}

/// Well-known user traits sent with an identify event.
///
/// Unknown keys go in `extra` and are flattened next to the named fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentifyTraits {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub email: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub first_name: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub last_name: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub avatar_url: Option<String>,
	#[serde(flatten)]
	pub extra: Properties,
}

impl IdentifyTraits {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_email(mut self, email: impl Into<String>) -> Self {
		self.email = Some(email.into());
		self
	}

	pub fn with_first_name(mut self, first_name: impl Into<String>) -> Self {
		self.first_name = Some(first_name.into());
		self
	}

	pub fn with_last_name(mut self, last_name: impl Into<String>) -> Self {
		self.last_name = Some(last_name.into());
		self
	}

	pub fn with_avatar_url(mut self, avatar_url: impl Into<String>) -> Self {
		self.avatar_url = Some(avatar_url.into());
		self
	}

	pub fn with_property(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
		self.extra = self.extra.insert(key, value);
		self
	}
}

/// Named traits win over extra keys with the same wire name.
impl From<IdentifyTraits> for Properties {
	fn from(traits: IdentifyTraits) -> Self {
		let named = [
			("email", traits.email),
			("firstName", traits.first_name),
			("lastName", traits.last_name),
			("avatarUrl", traits.avatar_url),
		]
		.into_iter()
		.filter_map(|(key, value)| value.map(|v| (key, v)));

		traits.extra.merge(Properties::from_iter(named))
	}
}

impl From<Properties> for IdentifyTraits {
	fn from(extra: Properties) -> Self {
		Self {
			extra,
			..Self::default()
		}
	}
}
