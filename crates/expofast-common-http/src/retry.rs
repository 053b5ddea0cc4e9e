// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Classification of transient HTTP failures.
//!
//! The SDKs never retry inline; a retryable error only tells the caller that
//! the next scheduled attempt has a reasonable chance of succeeding.

/// Errors that can report whether a later attempt may succeed.
pub trait RetryableError {
	fn is_retryable(&self) -> bool;
}

/// Returns true for HTTP statuses that indicate a transient server condition.
pub fn is_retryable_status(status: u16) -> bool {
	matches!(status, 408 | 429 | 500 | 502 | 503 | 504)
}

impl RetryableError for reqwest::Error {
	fn is_retryable(&self) -> bool {
		if self.is_timeout() || self.is_connect() || self.is_request() {
			return true;
		}
		self.status()
			.map(|status| is_retryable_status(status.as_u16()))
			.unwrap_or(false)
	}
}
