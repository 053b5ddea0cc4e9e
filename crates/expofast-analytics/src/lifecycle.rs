// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Application lifecycle observer.
//!
//! Host bindings forward foreground/background transitions here. Each
//! transition records at most one state event, subject to a per-direction
//! debounce, and then nudges the delivery engine so a backgrounding app gets
//! a chance to push before it is suspended.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::time::Instant;
use tracing::trace;

use crate::client::AnalyticsClient;

/// Application state as reported by the host platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AppState {
	Active,
	Inactive,
	/// Fully backgrounded. Produces no state event.
	Background,
}

impl AppState {
	/// The `active` flag of the state event this transition records, if any.
	pub fn as_state_event(self) -> Option<bool> {
		match self {
			Self::Active => Some(true),
			Self::Inactive => Some(false),
			Self::Background => None,
		}
	}
}

/// Turns lifecycle transitions into debounced state events.
#[derive(Debug)]
pub struct LifecycleObserver {
	client: AnalyticsClient,
	debounce: Duration,
	last_active: Mutex<Option<Instant>>,
	last_inactive: Mutex<Option<Instant>>,
}

impl LifecycleObserver {
	pub(crate) fn new(client: AnalyticsClient) -> Self {
		let debounce = client.config().delivery().state_debounce;
		Self {
			client,
			debounce,
			last_active: Mutex::new(None),
			last_inactive: Mutex::new(None),
		}
	}

	/// Handles one transition. Returns the `active` flag of the recorded
	/// state event, or `None` if nothing was recorded.
	///
	/// Does nothing at all when state events are disabled.
	pub fn on_app_state_change(&self, next: AppState) -> Option<bool> {
		if self.client.config().events().disable_state_events {
			return None;
		}

		let recorded = next.as_state_event().filter(|&active| {
			let slot = if active { &self.last_active } else { &self.last_inactive };
			self.debounce_passed(slot)
		});

		match recorded {
			Some(active) => self.client.state(active),
			None => trace!(state = ?next, "lifecycle transition did not record a state event"),
		}

		self.client.trigger_delivery();
		recorded
	}

	/// Strictly more than the debounce window must have elapsed since the
	/// last recorded event in the same direction.
	fn debounce_passed(&self, slot: &Mutex<Option<Instant>>) -> bool {
		let now = Instant::now();
		let mut last = slot.lock().unwrap_or_else(PoisonError::into_inner);
		let passed = last.map_or(true, |at| {
			at.checked_add(self.debounce).is_some_and(|end| end < now)
		});
		if passed {
			*last = Some(now);
		}
		passed
	}
}
