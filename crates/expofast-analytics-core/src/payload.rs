// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The request body of a push to the collection endpoint.

use serde::{Deserialize, Serialize};

use crate::api_key::ApiKey;
use crate::device::DeviceInfo;
use crate::event::Event;

/// One batch of events plus the session and device metadata they belong to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushPayload {
	pub api_key: ApiKey,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub app_version: Option<String>,
	/// Per-installation client identity.
	pub identify_id: String,
	/// Application user id from the most recent identify call.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub user_id: Option<String>,
	pub info: DeviceInfo,
	/// Events in capture order.
	pub events: Vec<Event>,
}
