// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for the analytics SDK.

use expofast_common_http::{is_retryable_status, RetryableError};
use thiserror::Error;

/// Analytics SDK errors.
///
/// Only configuration errors ever reach application code (from
/// [`AnalyticsClientBuilder::build`](crate::AnalyticsClientBuilder::build)).
/// Everything else is absorbed by the delivery engine and retried on a later
/// tick.
#[derive(Debug, Error)]
pub enum AnalyticsError {
	/// API key is missing or blank.
	#[error("analytics configuration apiKey is missing")]
	MissingApiKey,

	/// Collection endpoint URL could not be parsed.
	#[error("invalid collection URL: {0}")]
	InvalidUrl(String),

	/// A delivery tunable is out of range.
	#[error("invalid analytics configuration: {0}")]
	InvalidConfig(String),

	/// HTTP request failed.
	#[error("HTTP request failed: {0}")]
	RequestFailed(#[from] reqwest::Error),

	/// Server returned a non-success status.
	#[error("could not push events, API status {status}: {message}")]
	ServerError { status: u16, message: String },

	/// Rate limited by the server.
	#[error("rate limited, retry after {retry_after_secs:?} seconds")]
	RateLimited { retry_after_secs: Option<u64> },

	/// Key-value storage failed.
	#[error("storage error: {0}")]
	Storage(#[from] StorageError),
}

impl RetryableError for AnalyticsError {
	fn is_retryable(&self) -> bool {
		match self {
			AnalyticsError::RequestFailed(e) => e.is_retryable(),
			AnalyticsError::ServerError { status, .. } => is_retryable_status(*status),
			AnalyticsError::RateLimited { .. } => true,
			_ => false,
		}
	}
}

/// Errors raised by a [`KeyValueStore`](crate::KeyValueStore).
#[derive(Debug, Error)]
pub enum StorageError {
	#[error("storage I/O failed: {0}")]
	Io(#[from] std::io::Error),

	#[error("storage file is corrupt: {0}")]
	Corrupt(#[from] serde_json::Error),

	#[error("storage unavailable: {0}")]
	Unavailable(String),
}

/// Result type alias for analytics operations.
pub type Result<T> = std::result::Result<T, AnalyticsError>;

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn server_error_retryable_statuses() {
		for status in [429, 408, 500, 502, 503, 504] {
			let err = AnalyticsError::ServerError {
				status,
				message: "test".to_string(),
			};
			assert!(err.is_retryable(), "status {status} should be retryable");
		}
	}

	#[test]
	fn server_error_non_retryable_statuses() {
		for status in [400, 401, 403, 404, 422] {
			let err = AnalyticsError::ServerError {
				status,
				message: "test".to_string(),
			};
			assert!(!err.is_retryable(), "status {status} should not be retryable");
		}
	}

	#[test]
	fn rate_limited_is_retryable() {
		let err = AnalyticsError::RateLimited {
			retry_after_secs: Some(30),
		};
		assert!(err.is_retryable());
	}

	#[test]
	fn configuration_errors_are_not_retryable() {
		assert!(!AnalyticsError::MissingApiKey.is_retryable());
		assert!(!AnalyticsError::InvalidUrl("::".to_string()).is_retryable());
		assert!(!AnalyticsError::InvalidConfig("flush_interval".to_string()).is_retryable());
	}

	#[test]
	fn storage_error_converts() {
		let err: AnalyticsError = StorageError::Unavailable("keychain locked".to_string()).into();
		assert!(matches!(err, AnalyticsError::Storage(_)));
		assert!(!err.is_retryable());
	}
}
