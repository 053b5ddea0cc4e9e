// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Delivery engine: turns the queue into one push and tracks failures.
//!
//! Only one attempt runs at a time; a trigger that arrives while another
//! attempt is in flight is a no-op. Failed attempts are never retried inline.
//! After `failure_threshold` consecutive failures, delivery is suppressed for
//! `backoff_window`. Arming the window does not reset the failure counter:
//! once the window expires a single further failure arms it again, and only
//! a successful push brings the counter back to zero.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use expofast_analytics_core::{ApiKey, PushPayload};
use expofast_common_http::RetryableError;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

use crate::config::AnalyticsConfig;
use crate::device::DeviceInfoProvider;
use crate::error::AnalyticsError;
use crate::identity::Identity;
use crate::queue::EventQueue;
use crate::sender::BatchSender;

/// Result of a delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
	/// The batch was accepted; `count` events left the queue.
	Delivered { count: usize },
	/// The push failed; the queue is unchanged.
	Failed,
	/// No push was made.
	Skipped(SkipReason),
}

/// Why an attempt did not push anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
	InFlight,
	EmptyQueue,
	IdentityPending,
	BackingOff,
}

#[derive(Debug, Default)]
struct FailureState {
	consecutive_failures: u32,
	backoff_until: Option<Instant>,
}

/// Clears the in-flight flag when the attempt ends, however it ends.
struct InFlightGuard<'a>(&'a AtomicBool);

impl<'a> InFlightGuard<'a> {
	fn acquire(flag: &'a AtomicBool) -> Option<Self> {
		flag
			.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
			.ok()
			.map(|_| Self(flag))
	}
}

impl Drop for InFlightGuard<'_> {
	fn drop(&mut self) {
		self.0.store(false, Ordering::Release);
	}
}

/// Owns the sender and the retry/backoff state machine.
pub struct DeliveryEngine {
	api_key: ApiKey,
	app_version: Option<String>,
	debug: bool,
	failure_threshold: u32,
	backoff_window: Duration,
	sender: Arc<dyn BatchSender>,
	device_info: Arc<dyn DeviceInfoProvider>,
	in_flight: AtomicBool,
	failures: Mutex<FailureState>,
}

impl DeliveryEngine {
	pub fn new(
		config: &AnalyticsConfig,
		sender: Arc<dyn BatchSender>,
		device_info: Arc<dyn DeviceInfoProvider>,
	) -> Self {
		Self {
			api_key: config.api_key.clone(),
			app_version: config.app_version.clone(),
			debug: config.debug,
			failure_threshold: config.delivery.failure_threshold,
			backoff_window: config.delivery.backoff_window,
			sender,
			device_info,
			in_flight: AtomicBool::new(false),
			failures: Mutex::new(FailureState::default()),
		}
	}

	fn failures(&self) -> MutexGuard<'_, FailureState> {
		self.failures.lock().unwrap_or_else(PoisonError::into_inner)
	}

	/// Pushes the queued events if every precondition holds.
	///
	/// The checks are O(1), so calling this on every tick is cheap.
	pub async fn attempt(&self, queue: &EventQueue, identity: &Identity) -> DeliveryOutcome {
		let Some(_guard) = InFlightGuard::acquire(&self.in_flight) else {
			trace!("delivery already in flight");
			return DeliveryOutcome::Skipped(SkipReason::InFlight);
		};

		if queue.is_empty() {
			return DeliveryOutcome::Skipped(SkipReason::EmptyQueue);
		}

		let Some(identify_id) = identity.identify_id() else {
			trace!(queued = queue.len(), "identify id not loaded yet");
			return DeliveryOutcome::Skipped(SkipReason::IdentityPending);
		};

		if self.is_backing_off() {
			trace!("delivery suppressed by backoff window");
			return DeliveryOutcome::Skipped(SkipReason::BackingOff);
		}

		let Some((batch, events)) = queue.snapshot() else {
			return DeliveryOutcome::Skipped(SkipReason::EmptyQueue);
		};

		let payload = PushPayload {
			api_key: self.api_key.clone(),
			app_version: self.app_version.clone(),
			identify_id: identify_id.to_string(),
			user_id: identity.user_id(),
			info: self.device_info.device_info(),
			events,
		};

		match self.sender.send_batch(&payload).await {
			Ok(()) => {
				self.failures().consecutive_failures = 0;
				let count = batch.len();
				if !queue.drain_if_matches(&batch) {
					warn!(count, "delivered batch no longer matches the queue, leaving it untouched");
				}
				debug!(count, "pushed analytics events");
				DeliveryOutcome::Delivered { count }
			}
			Err(e) => {
				queue.release(&batch);
				self.record_failure(&e);
				DeliveryOutcome::Failed
			}
		}
	}

	fn record_failure(&self, error: &AnalyticsError) {
		let mut failures = self.failures();
		failures.consecutive_failures = failures.consecutive_failures.saturating_add(1);

		if self.debug {
			warn!(
				error = %error,
				retryable = error.is_retryable(),
				consecutive_failures = failures.consecutive_failures,
				"failed to push analytics events"
			);
		}

		if failures.consecutive_failures >= self.failure_threshold {
			failures.backoff_until = Some(deadline_after(self.backoff_window));
			if self.debug {
				warn!(
					backoff_secs = self.backoff_window.as_secs(),
					"too many consecutive failures, pausing analytics delivery"
				);
			}
		}
	}

	pub fn is_in_flight(&self) -> bool {
		self.in_flight.load(Ordering::Acquire)
	}

	pub fn consecutive_failures(&self) -> u32 {
		self.failures().consecutive_failures
	}

	pub fn is_backing_off(&self) -> bool {
		self
			.failures()
			.backoff_until
			.is_some_and(|until| Instant::now() < until)
	}
}

/// Roughly 30 years; stands in for windows too large to represent.
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// `now + window`, saturating instead of overflowing the clock.
fn deadline_after(window: Duration) -> Instant {
	let now = Instant::now();
	now.checked_add(window)
		.or_else(|| now.checked_add(FAR_FUTURE))
		.unwrap_or(now)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::error::Result;
	use crate::identity::IDENTIFY_ID_KEY;
	use crate::storage::MemoryStore;
	use async_trait::async_trait;
	use expofast_analytics_core::{DeviceInfo, Event};
	use reqwest::Url;
	use std::sync::atomic::AtomicUsize;
	use tokio::sync::Notify;

	struct MockSender {
		calls: AtomicUsize,
		sent: Mutex<Vec<PushPayload>>,
		should_fail: AtomicBool,
		gate: Option<Arc<Notify>>,
	}

	impl MockSender {
		fn new() -> Self {
			Self {
				calls: AtomicUsize::new(0),
				sent: Mutex::new(Vec::new()),
				should_fail: AtomicBool::new(false),
				gate: None,
			}
		}

		fn gated(gate: Arc<Notify>) -> Self {
			Self {
				gate: Some(gate),
				..Self::new()
			}
		}

		fn set_should_fail(&self, fail: bool) {
			self.should_fail.store(fail, Ordering::SeqCst);
		}

		fn calls(&self) -> usize {
			self.calls.load(Ordering::SeqCst)
		}

		fn sent(&self) -> Vec<PushPayload> {
			self.sent.lock().unwrap().clone()
		}
	}

	#[async_trait]
	impl BatchSender for MockSender {
		async fn send_batch(&self, payload: &PushPayload) -> Result<()> {
			self.calls.fetch_add(1, Ordering::SeqCst);
			if let Some(gate) = &self.gate {
				gate.notified().await;
			}
			if self.should_fail.load(Ordering::SeqCst) {
				return Err(AnalyticsError::ServerError {
					status: 500,
					message: "mock failure".to_string(),
				});
			}
			self.sent.lock().unwrap().push(payload.clone());
			Ok(())
		}
	}

	fn test_config() -> AnalyticsConfig {
		let mut config = AnalyticsConfig::new(
			ApiKey::parse("pk_test").unwrap(),
			Url::parse("https://collector.test/push").unwrap(),
		);
		config.app_version = Some("1.2.3".to_string());
		config
	}

	fn engine(sender: Arc<MockSender>) -> DeliveryEngine {
		let device = || DeviceInfo::new("ios").with_os_version("17.4");
		DeliveryEngine::new(&test_config(), sender, Arc::new(device))
	}

	async fn ready_identity() -> Identity {
		let identity = Identity::new();
		identity
			.establish(&MemoryStore::with_item(IDENTIFY_ID_KEY, "client-1"))
			.await;
		identity
	}

	#[tokio::test]
	async fn success_sends_payload_and_clears_queue() {
		let sender = Arc::new(MockSender::new());
		let engine = engine(sender.clone());
		let queue = EventQueue::new();
		let identity = ready_identity().await;
		identity.set_user_id("user-9");

		queue.push(Event::navigation("/home", None));
		queue.push(Event::state(true));

		let outcome = engine.attempt(&queue, &identity).await;

		assert_eq!(outcome, DeliveryOutcome::Delivered { count: 2 });
		assert!(queue.is_empty());
		let sent = sender.sent();
		assert_eq!(sent.len(), 1);
		assert_eq!(sent[0].identify_id, "client-1");
		assert_eq!(sent[0].user_id.as_deref(), Some("user-9"));
		assert_eq!(sent[0].app_version.as_deref(), Some("1.2.3"));
		assert_eq!(sent[0].api_key.expose(), "pk_test");
		assert_eq!(sent[0].info.platform, "ios");
		assert_eq!(sent[0].events.len(), 2);
	}

	#[tokio::test]
	async fn empty_queue_is_skipped_without_network() {
		let sender = Arc::new(MockSender::new());
		let engine = engine(sender.clone());
		let identity = ready_identity().await;

		let outcome = engine.attempt(&EventQueue::new(), &identity).await;

		assert_eq!(outcome, DeliveryOutcome::Skipped(SkipReason::EmptyQueue));
		assert_eq!(sender.calls(), 0);
	}

	#[tokio::test]
	async fn no_delivery_before_identity_resolves() {
		let sender = Arc::new(MockSender::new());
		let engine = engine(sender.clone());
		let queue = EventQueue::new();
		let identity = Identity::new();

		for i in 0..50 {
			queue.push(Event::action(format!("tap-{i}"), None));
			let outcome = engine.attempt(&queue, &identity).await;
			assert_eq!(outcome, DeliveryOutcome::Skipped(SkipReason::IdentityPending));
		}

		assert_eq!(sender.calls(), 0);
		assert_eq!(queue.len(), 50);
		assert!(!engine.is_in_flight());
	}

	#[tokio::test]
	async fn failure_keeps_queue_and_counts() {
		let sender = Arc::new(MockSender::new());
		sender.set_should_fail(true);
		let engine = engine(sender.clone());
		let queue = EventQueue::new();
		let identity = ready_identity().await;
		queue.push(Event::state(true));

		assert_eq!(engine.attempt(&queue, &identity).await, DeliveryOutcome::Failed);
		assert_eq!(engine.consecutive_failures(), 1);
		assert_eq!(queue.len(), 1);
		assert!(!engine.is_backing_off());

		sender.set_should_fail(false);
		assert_eq!(
			engine.attempt(&queue, &identity).await,
			DeliveryOutcome::Delivered { count: 1 }
		);
		assert_eq!(engine.consecutive_failures(), 0);
	}

	#[tokio::test(start_paused = true)]
	async fn five_failures_arm_backoff_window() {
		let sender = Arc::new(MockSender::new());
		sender.set_should_fail(true);
		let engine = engine(sender.clone());
		let queue = EventQueue::new();
		let identity = ready_identity().await;
		queue.push(Event::action("buy", None));

		for _ in 0..5 {
			assert_eq!(engine.attempt(&queue, &identity).await, DeliveryOutcome::Failed);
		}
		assert!(engine.is_backing_off());
		assert_eq!(sender.calls(), 5);

		tokio::time::advance(Duration::from_secs(30)).await;
		assert_eq!(
			engine.attempt(&queue, &identity).await,
			DeliveryOutcome::Skipped(SkipReason::BackingOff)
		);
		assert_eq!(sender.calls(), 5);
		assert_eq!(queue.len(), 1);

		tokio::time::advance(Duration::from_secs(31)).await;
		assert!(!engine.is_backing_off());
		sender.set_should_fail(false);
		assert_eq!(
			engine.attempt(&queue, &identity).await,
			DeliveryOutcome::Delivered { count: 1 }
		);
		assert_eq!(sender.calls(), 6);
		assert_eq!(engine.consecutive_failures(), 0);
	}

	#[tokio::test(start_paused = true)]
	async fn single_failure_after_window_rearms_backoff() {
		let sender = Arc::new(MockSender::new());
		sender.set_should_fail(true);
		let engine = engine(sender.clone());
		let queue = EventQueue::new();
		let identity = ready_identity().await;
		queue.push(Event::action("buy", None));

		for _ in 0..5 {
			engine.attempt(&queue, &identity).await;
		}
		tokio::time::advance(Duration::from_secs(61)).await;

		assert_eq!(engine.attempt(&queue, &identity).await, DeliveryOutcome::Failed);
		assert_eq!(engine.consecutive_failures(), 6);
		assert!(engine.is_backing_off());
	}

	#[tokio::test(start_paused = true)]
	async fn oversized_backoff_window_saturates() {
		let sender = Arc::new(MockSender::new());
		sender.set_should_fail(true);
		let mut config = test_config();
		config.delivery.failure_threshold = 1;
		config.delivery.backoff_window = Duration::MAX;
		let device = || DeviceInfo::new("ios");
		let engine = DeliveryEngine::new(&config, sender.clone(), Arc::new(device));
		let queue = EventQueue::new();
		let identity = ready_identity().await;
		queue.push(Event::action("buy", None));

		assert_eq!(engine.attempt(&queue, &identity).await, DeliveryOutcome::Failed);
		assert!(engine.is_backing_off());

		tokio::time::advance(Duration::from_secs(86400)).await;
		assert_eq!(
			engine.attempt(&queue, &identity).await,
			DeliveryOutcome::Skipped(SkipReason::BackingOff)
		);
		assert_eq!(sender.calls(), 1);
	}

	#[tokio::test]
	async fn concurrent_trigger_is_noop_and_in_flight_events_survive() {
		let gate = Arc::new(Notify::new());
		let sender = Arc::new(MockSender::gated(gate.clone()));
		let engine = Arc::new(engine(sender.clone()));
		let queue = Arc::new(EventQueue::new());
		let identity = Arc::new(ready_identity().await);

		queue.push(Event::navigation("/a", None));

		let first = {
			let (engine, queue, identity) = (engine.clone(), queue.clone(), identity.clone());
			tokio::spawn(async move { engine.attempt(&queue, &identity).await })
		};

		while sender.calls() == 0 {
			tokio::task::yield_now().await;
		}
		assert!(engine.is_in_flight());

		queue.push(Event::navigation("/b", None));
		assert_eq!(
			engine.attempt(&queue, &identity).await,
			DeliveryOutcome::Skipped(SkipReason::InFlight)
		);

		gate.notify_one();
		assert_eq!(first.await.unwrap(), DeliveryOutcome::Delivered { count: 1 });
		assert!(!engine.is_in_flight());

		let remaining = queue.events();
		assert_eq!(remaining.len(), 1);
		assert!(matches!(&remaining[0], Event::Navigation { path, .. } if path == "/b"));

		gate.notify_one();
		assert_eq!(
			engine.attempt(&queue, &identity).await,
			DeliveryOutcome::Delivered { count: 1 }
		);
		let sent = sender.sent();
		assert_eq!(sent.len(), 2);
		assert!(matches!(&sent[1].events[0], Event::Navigation { path, .. } if path == "/b"));
	}

	#[tokio::test]
	async fn coalesced_events_are_delivered_merged() {
		let sender = Arc::new(MockSender::new());
		let engine = engine(sender.clone());
		let queue = EventQueue::new();
		let identity = ready_identity().await;

		queue.push(Event::identify(
			"u1",
			Some(expofast_analytics_core::Properties::new().insert("a", 1).into()),
		));
		queue.push(Event::action(
			"signup",
			Some(expofast_analytics_core::Properties::new().insert("b", 2)),
		));
		engine.attempt(&queue, &identity).await;

		let body = serde_json::to_value(&sender.sent()[0]).unwrap();
		assert_eq!(body["events"].as_array().unwrap().len(), 1);
		assert_eq!(body["events"][0]["type"], "action");
		assert_eq!(body["events"][0]["name"], "signup");
		assert_eq!(body["events"][0]["properties"], serde_json::json!({"a": 1, "b": 2}));
	}
}
