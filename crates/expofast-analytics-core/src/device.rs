// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Device descriptor attached to every push.

use serde::{Deserialize, Serialize};

/// Platform and hardware details of the device running the application.
///
/// Fields the platform cannot determine are sent as `null`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
	/// OS family, e.g. `ios`, `android`, `linux`.
	pub platform: String,
	pub os_version: Option<String>,
	pub brand: Option<String>,
	pub model_name: Option<String>,
	pub is_simulator: bool,
	pub android_platform_api_level: Option<u32>,
}

impl DeviceInfo {
	pub fn new(platform: impl Into<String>) -> Self {
		Self {
			platform: platform.into(),
			os_version: None,
			brand: None,
			model_name: None,
			is_simulator: false,
			android_platform_api_level: None,
		}
	}

	pub fn with_os_version(mut self, os_version: impl Into<String>) -> Self {
		self.os_version = Some(os_version.into());
		self
	}

	pub fn with_brand(mut self, brand: impl Into<String>) -> Self {
		self.brand = Some(brand.into());
		self
	}

	pub fn with_model_name(mut self, model_name: impl Into<String>) -> Self {
		self.model_name = Some(model_name.into());
		self
	}

	pub fn with_simulator(mut self, is_simulator: bool) -> Self {
		self.is_simulator = is_simulator;
		self
	}

	pub fn with_android_platform_api_level(mut self, level: u32) -> Self {
		self.android_platform_api_level = Some(level);
		self
	}
}
