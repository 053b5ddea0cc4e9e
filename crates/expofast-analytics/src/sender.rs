// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Transport for pushing a batch to the collection endpoint.

use std::time::Duration;

use async_trait::async_trait;
use expofast_analytics_core::PushPayload;
use reqwest::{Client, StatusCode, Url};
use tracing::debug;

use crate::error::{AnalyticsError, Result};

/// Sends one push payload. Implementations must not retry; the delivery
/// engine owns the retry policy.
#[async_trait]
pub trait BatchSender: Send + Sync {
	async fn send_batch(&self, payload: &PushPayload) -> Result<()>;
}

/// Production sender: a single JSON `POST` per batch.
#[derive(Debug, Clone)]
pub struct HttpBatchSender {
	client: Client,
	url: Url,
}

impl HttpBatchSender {
	pub fn new(url: Url, timeout: Duration) -> Result<Self> {
		let client = expofast_common_http::builder()
			.timeout(timeout)
			.build()
			.map_err(AnalyticsError::RequestFailed)?;
		Ok(Self { client, url })
	}

	/// Uses a caller-provided client, e.g. one sharing a connection pool with
	/// the host application.
	pub fn with_client(client: Client, url: Url) -> Self {
		Self { client, url }
	}

	pub fn url(&self) -> &Url {
		&self.url
	}
}

#[async_trait]
impl BatchSender for HttpBatchSender {
	async fn send_batch(&self, payload: &PushPayload) -> Result<()> {
		debug!(url = %self.url, count = payload.events.len(), "pushing analytics events");

		let response = self
			.client
			.post(self.url.clone())
			.json(payload)
			.send()
			.await?;

		let status = response.status();
		if status == StatusCode::TOO_MANY_REQUESTS {
			let retry_after = response
				.headers()
				.get(reqwest::header::RETRY_AFTER)
				.and_then(|v| v.to_str().ok())
				.and_then(|s| s.parse().ok());
			return Err(AnalyticsError::RateLimited {
				retry_after_secs: retry_after,
			});
		}

		if !status.is_success() {
			let message = response.text().await.unwrap_or_default();
			return Err(AnalyticsError::ServerError {
				status: status.as_u16(),
				message,
			});
		}

		Ok(())
	}
}
