// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Shared HTTP utilities for the ExpoFast SDKs.
//!
//! This crate provides:
//! - A pre-configured HTTP client with consistent User-Agent header
//! - Classification of transient failures via [`RetryableError`]

mod client;
mod retry;

pub use client::{builder, user_agent, SDK_NAME, SDK_VERSION};
pub use retry::{is_retryable_status, RetryableError};
