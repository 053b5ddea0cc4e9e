// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Records a short session and pushes it.
//!
//! ```text
//! EXPOFAST_ANALYTICS_API_KEY=pk_xxx EXPOFAST_ANALYTICS_DEBUG=1 \
//!     cargo run -p expofast-analytics --example track
//! ```

use std::time::Duration;

use expofast_analytics::{AnalyticsClientBuilder, AppState, IdentifyTraits, Properties};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	tracing_subscriber::registry()
		.with(
			tracing_subscriber::EnvFilter::try_from_default_env()
				.unwrap_or_else(|_| "info,expofast_analytics=debug".into()),
		)
		.with(tracing_subscriber::fmt::layer())
		.init();

	let client = AnalyticsClientBuilder::from_env()
		.app_version(env!("CARGO_PKG_VERSION"))
		.build()?;
	let scheduler = client.start();
	let lifecycle = client.lifecycle_observer();

	lifecycle.on_app_state_change(AppState::Active);
	client.navigation("/onboarding", None);
	client.identify(
		"demo-user",
		Some(IdentifyTraits::new().with_first_name("Ada").with_email("ada@example.com")),
	);
	client.action("onboarding_completed", Some(Properties::new().insert("step", 3)));

	tokio::time::sleep(Duration::from_secs(5)).await;

	lifecycle.on_app_state_change(AppState::Inactive);
	let outcome = scheduler.shutdown().await;
	tracing::info!(
		?outcome,
		identify_id = ?client.identify_id(),
		pending = client.queue_len(),
		"example finished"
	);

	Ok(())
}
