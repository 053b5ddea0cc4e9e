// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Client configuration.
//!
//! An [`AnalyticsConfig`] is produced by
//! [`AnalyticsClientBuilder`](crate::AnalyticsClientBuilder) and never changes
//! afterwards.

use std::time::Duration;

use expofast_analytics_core::ApiKey;
use reqwest::Url;

use crate::error::{AnalyticsError, Result};

/// Collection endpoint used when no URL is configured.
pub const DEFAULT_API_URL: &str = "https://expofast.app/api/analytics/push";

/// Period of the flush scheduler.
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_millis(3500);

/// Minimum spacing between two state events in the same direction.
pub const DEFAULT_STATE_DEBOUNCE: Duration = Duration::from_millis(1500);

/// Consecutive failed pushes that arm the backoff window.
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 5;

/// How long delivery stays suppressed once backoff is armed.
pub const DEFAULT_BACKOFF_WINDOW: Duration = Duration::from_secs(60);

/// Timeout for a single push request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Environment variables read by
/// [`AnalyticsClientBuilder::from_env`](crate::AnalyticsClientBuilder::from_env).
pub mod env {
	pub const API_KEY: &str = "EXPOFAST_ANALYTICS_API_KEY";
	pub const URL: &str = "EXPOFAST_ANALYTICS_URL";
	pub const APP_VERSION: &str = "EXPOFAST_ANALYTICS_APP_VERSION";
	pub const DEBUG: &str = "EXPOFAST_ANALYTICS_DEBUG";
}

/// Toggles for the automatically produced events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventsConfig {
	/// Drop navigation events.
	pub disable_navigation_events: bool,
	/// Make the lifecycle observer inert.
	pub disable_state_events: bool,
}

/// Timing and retry tunables of the delivery pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryConfig {
	pub flush_interval: Duration,
	pub request_timeout: Duration,
	pub failure_threshold: u32,
	pub backoff_window: Duration,
	pub state_debounce: Duration,
}

impl Default for DeliveryConfig {
	fn default() -> Self {
		Self {
			flush_interval: DEFAULT_FLUSH_INTERVAL,
			request_timeout: DEFAULT_REQUEST_TIMEOUT,
			failure_threshold: DEFAULT_FAILURE_THRESHOLD,
			backoff_window: DEFAULT_BACKOFF_WINDOW,
			state_debounce: DEFAULT_STATE_DEBOUNCE,
		}
	}
}

impl DeliveryConfig {
	/// Rejects tunables the scheduler or the backoff logic cannot run with.
	pub fn validate(&self) -> Result<()> {
		if self.flush_interval.is_zero() {
			return Err(AnalyticsError::InvalidConfig(
				"flush_interval must be greater than zero".to_string(),
			));
		}
		if self.failure_threshold == 0 {
			return Err(AnalyticsError::InvalidConfig(
				"failure_threshold must be at least 1".to_string(),
			));
		}
		Ok(())
	}
}

/// Validated, immutable client configuration.
#[derive(Debug, Clone)]
pub struct AnalyticsConfig {
	pub(crate) api_key: ApiKey,
	pub(crate) url: Url,
	pub(crate) app_version: Option<String>,
	pub(crate) debug: bool,
	pub(crate) events: EventsConfig,
	pub(crate) delivery: DeliveryConfig,
}

impl AnalyticsConfig {
	pub(crate) fn new(api_key: ApiKey, url: Url) -> Self {
		Self {
			api_key,
			url,
			app_version: None,
			debug: false,
			events: EventsConfig::default(),
			delivery: DeliveryConfig::default(),
		}
	}

	pub fn api_key(&self) -> &ApiKey {
		&self.api_key
	}

	pub fn url(&self) -> &Url {
		&self.url
	}

	pub fn app_version(&self) -> Option<&str> {
		self.app_version.as_deref()
	}

	/// Whether developer diagnostics are emitted.
	pub fn debug(&self) -> bool {
		self.debug
	}

	pub fn events(&self) -> EventsConfig {
		self.events
	}

	pub fn delivery(&self) -> &DeliveryConfig {
		&self.delivery
	}
}

/// Parses a boolean flag the way shell users write them.
pub(crate) fn parse_flag(value: &str) -> bool {
	matches!(
		value.trim().to_ascii_lowercase().as_str(),
		"1" | "true" | "yes" | "on"
	)
}
