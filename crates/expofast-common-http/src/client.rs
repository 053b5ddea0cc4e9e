// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Shared HTTP client with consistent User-Agent header.

use reqwest::{Client, ClientBuilder};

/// SDK name reported in the User-Agent.
pub const SDK_NAME: &str = "expofast-analytics";
/// SDK version reported in the User-Agent.
pub const SDK_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Creates a new HTTP client builder with the standard SDK User-Agent header.
///
/// # Example
/// ```ignore
/// let client = expofast_common_http::builder()
///     .timeout(Duration::from_secs(10))
///     .build()?;
/// ```
pub fn builder() -> ClientBuilder {
	Client::builder().user_agent(user_agent())
}

/// Returns the standard SDK User-Agent string.
///
/// Format: `expofast-analytics/{version} ({os}-{arch})`
pub fn user_agent() -> String {
	format!(
		"{SDK_NAME}/{SDK_VERSION} ({}-{})",
		std::env::consts::OS,
		std::env::consts::ARCH
	)
}
