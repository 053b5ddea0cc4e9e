// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Analytics client: the facade application code talks to.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use expofast_analytics_core::{ApiKey, Event, IdentifyTraits, Properties};
use reqwest::Url;
use tracing::{debug, info, trace};

use crate::config::{env, parse_flag, AnalyticsConfig, DeliveryConfig, EventsConfig, DEFAULT_API_URL};
use crate::delivery::{DeliveryEngine, DeliveryOutcome};
use crate::device::{DeviceInfoProvider, HostDeviceInfo};
use crate::error::{AnalyticsError, Result};
use crate::identity::Identity;
use crate::lifecycle::LifecycleObserver;
use crate::queue::EventQueue;
use crate::scheduler::FlushScheduler;
use crate::sender::{BatchSender, HttpBatchSender};
use crate::storage::{FileStore, KeyValueStore, MemoryStore};

/// Builder for constructing an [`AnalyticsClient`].
pub struct AnalyticsClientBuilder {
	api_key: Option<String>,
	url: Option<String>,
	app_version: Option<String>,
	debug: bool,
	events: EventsConfig,
	delivery: DeliveryConfig,
	storage: Option<Arc<dyn KeyValueStore>>,
	device_info: Option<Arc<dyn DeviceInfoProvider>>,
	sender: Option<Arc<dyn BatchSender>>,
}

impl AnalyticsClientBuilder {
	/// Creates a new builder with default settings.
	pub fn new() -> Self {
		Self {
			api_key: None,
			url: None,
			app_version: None,
			debug: false,
			events: EventsConfig::default(),
			delivery: DeliveryConfig::default(),
			storage: None,
			device_info: None,
			sender: None,
		}
	}

	/// Creates a builder seeded from `EXPOFAST_ANALYTICS_*` environment
	/// variables. Later setter calls override what was read.
	pub fn from_env() -> Self {
		Self::from_lookup(|name| std::env::var(name).ok())
	}

	fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
		let mut builder = Self::new();
		builder.api_key = lookup(env::API_KEY);
		builder.url = lookup(env::URL);
		builder.app_version = lookup(env::APP_VERSION);
		builder.debug = lookup(env::DEBUG).is_some_and(|flag| parse_flag(&flag));
		builder
	}

	/// Sets the project API key. Required.
	pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
		self.api_key = Some(api_key.into());
		self
	}

	/// Overrides the collection endpoint.
	///
	/// Defaults to `https://expofast.app/api/analytics/push`.
	pub fn url(mut self, url: impl Into<String>) -> Self {
		self.url = Some(url.into());
		self
	}

	/// Sets the application version reported with every push.
	pub fn app_version(mut self, version: impl Into<String>) -> Self {
		self.app_version = Some(version.into());
		self
	}

	/// Enables developer diagnostics: recorded events and push failures are
	/// logged.
	pub fn debug(mut self, debug: bool) -> Self {
		self.debug = debug;
		self
	}

	pub fn events(mut self, events: EventsConfig) -> Self {
		self.events = events;
		self
	}

	pub fn delivery(mut self, delivery: DeliveryConfig) -> Self {
		self.delivery = delivery;
		self
	}

	/// Sets the store holding the persisted identify id.
	///
	/// Defaults to a JSON file in the platform data directory, or to memory
	/// when there is none.
	pub fn storage(mut self, storage: Arc<dyn KeyValueStore>) -> Self {
		self.storage = Some(storage);
		self
	}

	pub fn device_info(mut self, provider: Arc<dyn DeviceInfoProvider>) -> Self {
		self.device_info = Some(provider);
		self
	}

	/// Replaces the HTTP transport.
	pub fn sender(mut self, sender: Arc<dyn BatchSender>) -> Self {
		self.sender = Some(sender);
		self
	}

	/// Builds the client.
	///
	/// Fails if the API key is missing or blank, if the URL is not an
	/// absolute `http`/`https` URL, or if a delivery tunable is out of range.
	///
	/// Identity loading starts right away when called inside a Tokio runtime,
	/// otherwise on the first delivery attempt.
	pub fn build(self) -> Result<AnalyticsClient> {
		let api_key = self
			.api_key
			.and_then(ApiKey::parse)
			.ok_or(AnalyticsError::MissingApiKey)?;

		let raw_url = self.url.unwrap_or_else(|| DEFAULT_API_URL.to_string());
		let url = Url::parse(&raw_url).map_err(|e| AnalyticsError::InvalidUrl(format!("{raw_url}: {e}")))?;
		if !matches!(url.scheme(), "http" | "https") {
			return Err(AnalyticsError::InvalidUrl(format!(
				"{raw_url}: unsupported scheme {}",
				url.scheme()
			)));
		}

		self.delivery.validate()?;

		let mut config = AnalyticsConfig::new(api_key, url);
		config.app_version = self.app_version;
		config.debug = self.debug;
		config.events = self.events;
		config.delivery = self.delivery;

		let sender: Arc<dyn BatchSender> = match self.sender {
			Some(sender) => sender,
			None => Arc::new(HttpBatchSender::new(
				config.url.clone(),
				config.delivery.request_timeout,
			)?),
		};
		let storage = self.storage.unwrap_or_else(default_storage);
		let device_info: Arc<dyn DeviceInfoProvider> = match self.device_info {
			Some(provider) => provider,
			None => Arc::new(HostDeviceInfo),
		};

		let delivery = DeliveryEngine::new(&config, sender, device_info);

		info!(url = %config.url, debug = config.debug, "Analytics client initialized");

		let client = AnalyticsClient {
			inner: Arc::new(ClientInner {
				config,
				queue: EventQueue::new(),
				identity: Identity::new(),
				identity_requested: AtomicBool::new(false),
				delivery,
				storage,
			}),
		};
		client.request_identity();
		Ok(client)
	}
}

impl Default for AnalyticsClientBuilder {
	fn default() -> Self {
		Self::new()
	}
}

fn default_storage() -> Arc<dyn KeyValueStore> {
	match FileStore::default_location() {
		Some(store) => Arc::new(store),
		None => {
			debug!("no platform data directory, identify id will not persist");
			Arc::new(MemoryStore::new())
		}
	}
}

struct ClientInner {
	config: AnalyticsConfig,
	queue: EventQueue,
	identity: Identity,
	/// Set once a bootstrap task has been spawned.
	identity_requested: AtomicBool,
	delivery: DeliveryEngine,
	storage: Arc<dyn KeyValueStore>,
}

/// Records analytics events and delivers them in batches.
///
/// Cloning is cheap; clones share one queue and one delivery engine.
///
/// # Example
///
/// ```ignore
/// let client = AnalyticsClient::builder()
///     .api_key("pk_live_xxx")
///     .app_version("1.4.0")
///     .build()?;
/// let scheduler = client.start();
///
/// client.navigation("/home", None);
/// client.identify("user-42", Some(IdentifyTraits::new().with_email("a@b.c")));
/// client.action("signed_up", None);
///
/// scheduler.shutdown().await;
/// ```
#[derive(Clone)]
pub struct AnalyticsClient {
	inner: Arc<ClientInner>,
}

impl fmt::Debug for AnalyticsClient {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("AnalyticsClient")
			.field("url", &self.inner.config.url.as_str())
			.field("queued", &self.inner.queue.len())
			.field("identify_id", &self.inner.identity.identify_id())
			.finish_non_exhaustive()
	}
}

impl AnalyticsClient {
	pub fn builder() -> AnalyticsClientBuilder {
		AnalyticsClientBuilder::new()
	}

	pub fn config(&self) -> &AnalyticsConfig {
		&self.inner.config
	}

	/// Loads or creates the identify id. Resolves immediately once done.
	pub async fn establish_identity(&self) -> String {
		self
			.inner
			.identity
			.establish(self.inner.storage.as_ref())
			.await
			.to_string()
	}

	/// Spawns identity loading in the background unless it already ran or is
	/// running. Returns false when there is no runtime to spawn on.
	fn request_identity(&self) -> bool {
		if self.inner.identity.is_established()
			|| self.inner.identity_requested.swap(true, Ordering::AcqRel)
		{
			return true;
		}
		match tokio::runtime::Handle::try_current() {
			Ok(handle) => {
				let client = self.clone();
				handle.spawn(async move {
					let identify_id = client.establish_identity().await;
					debug!(%identify_id, "analytics identity ready");
				});
				true
			}
			Err(_) => {
				self.inner.identity_requested.store(false, Ordering::Release);
				trace!("no runtime, identity loading deferred to the first delivery attempt");
				false
			}
		}
	}

	/// Starts the periodic flush, and identity loading if it has not started.
	///
	/// Must be called from within a Tokio runtime.
	pub fn start(&self) -> FlushScheduler {
		self.request_identity();
		FlushScheduler::start(self.clone(), self.inner.config.delivery.flush_interval)
	}

	pub fn lifecycle_observer(&self) -> LifecycleObserver {
		LifecycleObserver::new(self.clone())
	}

	/// Records an identify event and remembers `id` as the current user.
	pub fn identify(&self, id: impl Into<String>, traits: Option<IdentifyTraits>) {
		let id = id.into();
		self.inner.identity.set_user_id(id.clone());
		self.record(Event::identify(id, traits));
	}

	pub fn action(&self, name: impl Into<String>, properties: Option<Properties>) {
		self.record(Event::action(name, properties));
	}

	/// Records an error event. The displayed message is truncated, the full
	/// text is kept in the `message` property.
	pub fn error(&self, message: impl fmt::Display, properties: Option<Properties>) {
		self.record(Event::error(message, properties));
	}

	/// Records `error` together with its chain of sources.
	pub fn capture_error(&self, error: &(dyn std::error::Error + 'static), properties: Option<Properties>) {
		let mut message = error.to_string();
		let mut source = error.source();
		while let Some(cause) = source {
			message.push_str(": ");
			message.push_str(&cause.to_string());
			source = cause.source();
		}
		self.error(message, properties);
	}

	/// Records a screen view. Dropped when navigation events are disabled.
	pub fn navigation(&self, path: impl Into<String>, properties: Option<Properties>) {
		if self.inner.config.events.disable_navigation_events {
			trace!("navigation events disabled");
			return;
		}
		self.record(Event::navigation(path, properties));
	}

	pub fn state(&self, active: bool) {
		self.record(Event::state(active));
	}

	fn record(&self, event: Event) {
		if self.inner.config.debug {
			info!(kind = %event.kind(), event = ?event, "analytics event recorded");
		}
		self.inner.queue.push(event);
	}

	/// Makes one guarded delivery attempt and waits for it.
	pub async fn flush(&self) -> DeliveryOutcome {
		self.request_identity();
		self
			.inner
			.delivery
			.attempt(&self.inner.queue, &self.inner.identity)
			.await
	}

	/// Starts a delivery attempt in the background. Returns false when there
	/// is no runtime to run it on; the next tick picks the events up.
	pub fn trigger_delivery(&self) -> bool {
		match tokio::runtime::Handle::try_current() {
			Ok(handle) => {
				let client = self.clone();
				handle.spawn(async move {
					let outcome = client.flush().await;
					trace!(?outcome, "triggered delivery attempt finished");
				});
				true
			}
			Err(_) => {
				trace!("no runtime, delivery deferred to the next tick");
				false
			}
		}
	}

	pub fn queue_len(&self) -> usize {
		self.inner.queue.len()
	}

	/// Copy of the events awaiting delivery, oldest first.
	pub fn queued_events(&self) -> Vec<Event> {
		self.inner.queue.events()
	}

	pub fn consecutive_failures(&self) -> u32 {
		self.inner.delivery.consecutive_failures()
	}

	pub fn is_backing_off(&self) -> bool {
		self.inner.delivery.is_backing_off()
	}

	pub fn is_in_flight(&self) -> bool {
		self.inner.delivery.is_in_flight()
	}

	/// The installation identifier, once established.
	pub fn identify_id(&self) -> Option<String> {
		self.inner.identity.identify_id().map(str::to_string)
	}

	/// The id passed to the most recent [`identify`](Self::identify).
	pub fn user_id(&self) -> Option<String> {
		self.inner.identity.user_id()
	}
}
