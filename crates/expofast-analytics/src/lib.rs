// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! ExpoFast analytics SDK.
//!
//! Application code records navigation, action, identify, state and error
//! events through an [`AnalyticsClient`]. Recording never blocks and never
//! fails. Events wait in memory and a background [`FlushScheduler`] pushes
//! them in batches, tagged with a persistent installation id.
//!
//! ```ignore
//! use expofast_analytics::{AnalyticsClient, AppState, Properties};
//!
//! let client = AnalyticsClient::builder()
//!     .api_key("pk_live_xxx")
//!     .build()?;
//! let scheduler = client.start();
//! let lifecycle = client.lifecycle_observer();
//!
//! lifecycle.on_app_state_change(AppState::Active);
//! client.navigation("/settings", None);
//! client.action("theme_changed", Some(Properties::new().insert("theme", "dark")));
//!
//! scheduler.shutdown().await;
//! ```

mod client;
mod config;
mod delivery;
mod device;
mod error;
mod identity;
mod lifecycle;
mod queue;
mod scheduler;
mod sender;
mod storage;

pub use client::{AnalyticsClient, AnalyticsClientBuilder};
pub use config::{
	env, AnalyticsConfig, DeliveryConfig, EventsConfig, DEFAULT_API_URL, DEFAULT_BACKOFF_WINDOW,
	DEFAULT_FAILURE_THRESHOLD, DEFAULT_FLUSH_INTERVAL, DEFAULT_REQUEST_TIMEOUT,
	DEFAULT_STATE_DEBOUNCE,
};
pub use delivery::{DeliveryEngine, DeliveryOutcome, SkipReason};
pub use device::{DeviceInfoProvider, HostDeviceInfo, StaticDeviceInfo};
pub use error::{AnalyticsError, Result, StorageError};
pub use identity::{generate_identify_id, Identity, IDENTIFY_ID_KEY};
pub use lifecycle::{AppState, LifecycleObserver};
pub use queue::{Batch, EventQueue, PushOutcome};
pub use scheduler::FlushScheduler;
pub use sender::{BatchSender, HttpBatchSender};
pub use storage::{FileStore, KeyValueStore, MemoryStore};

pub use expofast_analytics_core::{
	ApiKey, DeviceInfo, Event, EventKind, IdentifyTraits, Properties, PushPayload,
};
pub use expofast_common_http::RetryableError;
