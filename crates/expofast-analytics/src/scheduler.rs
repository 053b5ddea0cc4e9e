// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Periodic flush scheduler.
//!
//! Fires at a fixed period and hands each tick to the client's guarded
//! delivery entry point. Ticks missed while the process was suspended are
//! skipped, not replayed. Each attempt runs as its own task, so stopping the
//! scheduler never cancels a push that is already on the wire.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::client::AnalyticsClient;
use crate::delivery::DeliveryOutcome;

/// Handle to the background flush loop.
///
/// Dropping the handle stops the loop.
#[derive(Debug)]
pub struct FlushScheduler {
	client: AnalyticsClient,
	period: Duration,
	task_handle: Option<JoinHandle<()>>,
	shutdown_tx: Option<mpsc::Sender<()>>,
}

impl FlushScheduler {
	pub(crate) fn start(client: AnalyticsClient, period: Duration) -> Self {
		let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);
		let handle = tokio::spawn(run_flush_loop(client.clone(), period, shutdown_rx));

		Self {
			client,
			period,
			task_handle: Some(handle),
			shutdown_tx: Some(shutdown_tx),
		}
	}

	pub fn period(&self) -> Duration {
		self.period
	}

	pub fn is_running(&self) -> bool {
		self.task_handle
			.as_ref()
			.is_some_and(|handle| !handle.is_finished())
	}

	/// Stops the loop. In-flight deliveries keep running to completion.
	pub async fn stop(&mut self) {
		if let Some(tx) = self.shutdown_tx.take() {
			let _ = tx.send(()).await;
		}
		if let Some(handle) = self.task_handle.take() {
			let _ = handle.await;
		}
	}

	/// Stops the loop and makes one last delivery attempt.
	pub async fn shutdown(mut self) -> DeliveryOutcome {
		self.stop().await;
		self.client.flush().await
	}
}

impl Drop for FlushScheduler {
	fn drop(&mut self) {
		if let Some(handle) = self.task_handle.take() {
			handle.abort();
		}
	}
}

async fn run_flush_loop(client: AnalyticsClient, period: Duration, mut shutdown_rx: mpsc::Receiver<()>) {
	info!(flush_interval_ms = period.as_millis() as u64, "starting analytics flush scheduler");

	let mut ticker = interval_at(Instant::now() + period, period);
	ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

	loop {
		tokio::select! {
			biased;

			_ = shutdown_rx.recv() => {
				break;
			}

			_ = ticker.tick() => {
				let client = client.clone();
				tokio::spawn(async move {
					let outcome = client.flush().await;
					debug!(?outcome, "scheduled delivery attempt finished");
				});
			}
		}
	}

	info!("analytics flush scheduler stopped");
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::error::Result;
	use crate::identity::IDENTIFY_ID_KEY;
	use crate::sender::BatchSender;
	use crate::storage::MemoryStore;
	use async_trait::async_trait;
	use expofast_analytics_core::PushPayload;
	use std::sync::atomic::{AtomicUsize, Ordering};
	use std::sync::Arc;

	#[derive(Default)]
	struct CountingSender {
		batches: AtomicUsize,
	}

	#[async_trait]
	impl BatchSender for CountingSender {
		async fn send_batch(&self, _payload: &PushPayload) -> Result<()> {
			self.batches.fetch_add(1, Ordering::SeqCst);
			Ok(())
		}
	}

	async fn client_with(sender: Arc<CountingSender>) -> AnalyticsClient {
		let client = AnalyticsClient::builder()
			.api_key("pk_test")
			.storage(Arc::new(MemoryStore::with_item(IDENTIFY_ID_KEY, "client-1")))
			.sender(sender)
			.build()
			.unwrap();
		client.establish_identity().await;
		client
	}

	/// Lets spawned delivery tasks run to completion under paused time.
	async fn settle() {
		for _ in 0..10 {
			tokio::task::yield_now().await;
		}
	}

	#[tokio::test(start_paused = true)]
	async fn first_tick_fires_after_one_period() {
		let sender = Arc::new(CountingSender::default());
		let client = client_with(sender.clone()).await;
		client.action("opened", None);

		let _scheduler = client.start();
		settle().await;
		assert_eq!(sender.batches.load(Ordering::SeqCst), 0);

		tokio::time::advance(Duration::from_millis(3500)).await;
		settle().await;
		assert_eq!(sender.batches.load(Ordering::SeqCst), 1);
		assert_eq!(client.queue_len(), 0);
	}

	#[tokio::test(start_paused = true)]
	async fn idle_ticks_do_not_push() {
		let sender = Arc::new(CountingSender::default());
		let client = client_with(sender.clone()).await;

		let _scheduler = client.start();
		for _ in 0..5 {
			tokio::time::advance(Duration::from_millis(3500)).await;
			settle().await;
		}
		assert_eq!(sender.batches.load(Ordering::SeqCst), 0);
	}

	#[tokio::test(start_paused = true)]
	async fn missed_ticks_are_not_replayed() {
		let sender = Arc::new(CountingSender::default());
		let client = client_with(sender.clone()).await;

		let _scheduler = client.start();
		settle().await;

		client.action("a", None);
		tokio::time::advance(Duration::from_millis(3500 * 10)).await;
		settle().await;
		assert_eq!(sender.batches.load(Ordering::SeqCst), 1);

		client.action("b", None);
		tokio::time::advance(Duration::from_millis(3500)).await;
		settle().await;
		assert_eq!(sender.batches.load(Ordering::SeqCst), 2);
	}

	#[tokio::test(start_paused = true)]
	async fn stopped_scheduler_no_longer_flushes() {
		let sender = Arc::new(CountingSender::default());
		let client = client_with(sender.clone()).await;

		let mut scheduler = client.start();
		assert!(scheduler.is_running());
		scheduler.stop().await;
		assert!(!scheduler.is_running());

		client.action("late", None);
		tokio::time::advance(Duration::from_secs(60)).await;
		settle().await;
		assert_eq!(sender.batches.load(Ordering::SeqCst), 0);
		assert_eq!(client.queue_len(), 1);
	}

	#[tokio::test(start_paused = true)]
	async fn shutdown_makes_final_attempt() {
		let sender = Arc::new(CountingSender::default());
		let client = client_with(sender.clone()).await;
		let scheduler = client.start();

		client.action("bye", None);
		let outcome = scheduler.shutdown().await;

		assert_eq!(outcome, DeliveryOutcome::Delivered { count: 1 });
		assert_eq!(sender.batches.load(Ordering::SeqCst), 1);
	}
}
