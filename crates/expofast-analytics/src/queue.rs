// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! In-memory event queue.
//!
//! Events are kept in capture order, which is also the wire order. The only
//! mutation of an already queued event is identify/action coalescing: an
//! action pushed directly after an identify replaces it with one merged
//! action.
//!
//! Delivery works on a [`Batch`]: [`EventQueue::snapshot`] copies the current
//! contents and seals them. A sealed event is never coalesced into, so what
//! was sent is exactly what [`EventQueue::drain_if_matches`] later removes.
//! Events pushed while a batch is in flight stay behind for the next one.

use std::sync::{Mutex, MutexGuard, PoisonError};

use expofast_analytics_core::{Event, Properties};

/// Result of a [`EventQueue::push`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
	Appended,
	/// The action replaced the identify event at the tail.
	Coalesced,
}

/// Handle to a sealed prefix of the queue that is being delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
	generation: u64,
	len: usize,
}

impl Batch {
	pub fn len(&self) -> usize {
		self.len
	}

	pub fn is_empty(&self) -> bool {
		self.len == 0
	}
}

#[derive(Debug, Default)]
struct QueueState {
	events: Vec<Event>,
	/// Length of the prefix belonging to the in-flight batch.
	sealed: usize,
	/// Bumped every time a batch is drained.
	generation: u64,
}

/// Ordered buffer of events awaiting delivery.
#[derive(Debug, Default)]
pub struct EventQueue {
	state: Mutex<QueueState>,
}

impl EventQueue {
	pub fn new() -> Self {
		Self::default()
	}

	fn lock(&self) -> MutexGuard<'_, QueueState> {
		self.state.lock().unwrap_or_else(PoisonError::into_inner)
	}

	/// Appends `event`, coalescing an action into an unsealed identify tail.
	pub fn push(&self, event: Event) -> PushOutcome {
		let mut state = self.lock();
		let tail = state
			.events
			.len()
			.checked_sub(1)
			.filter(|&idx| idx >= state.sealed);

		let coalesce_at = match (tail, &event) {
			(Some(idx), Event::Action { .. })
				if matches!(state.events[idx], Event::Identify { .. }) =>
			{
				Some(idx)
			}
			_ => None,
		};

		if let Some(idx) = coalesce_at {
			let identify = std::mem::replace(&mut state.events[idx], event);
			coalesce(&mut state.events[idx], identify);
			return PushOutcome::Coalesced;
		}

		state.events.push(event);
		PushOutcome::Appended
	}

	/// Copies and seals the current contents. Returns `None` if the queue is
	/// empty.
	pub fn snapshot(&self) -> Option<(Batch, Vec<Event>)> {
		let mut state = self.lock();
		if state.events.is_empty() {
			return None;
		}
		state.sealed = state.events.len();
		let batch = Batch {
			generation: state.generation,
			len: state.sealed,
		};
		Some((batch, state.events.clone()))
	}

	/// Removes the delivered batch, keeping anything pushed after the
	/// snapshot. Returns false and leaves the queue untouched if the batch is
	/// no longer the sealed prefix.
	pub fn drain_if_matches(&self, batch: &Batch) -> bool {
		let mut state = self.lock();
		if state.generation != batch.generation || state.sealed != batch.len {
			return false;
		}
		state.events.drain(..batch.len);
		state.sealed = 0;
		state.generation = state.generation.wrapping_add(1);
		true
	}

	/// Unseals a batch whose delivery failed. Contents are not modified.
	pub fn release(&self, batch: &Batch) {
		let mut state = self.lock();
		if state.generation == batch.generation {
			state.sealed = 0;
		}
	}

	pub fn is_empty(&self) -> bool {
		self.lock().events.is_empty()
	}

	pub fn len(&self) -> usize {
		self.lock().events.len()
	}

	/// Copy of the queued events, oldest first.
	pub fn events(&self) -> Vec<Event> {
		self.lock().events.clone()
	}
}

/// Folds the identify properties underneath the action that replaced it.
fn coalesce(action: &mut Event, identify: Event) {
	let (Event::Action { properties, .. }, Event::Identify { properties: base, .. }) = (action, identify) else {
		return;
	};
	let merged = base
		.unwrap_or_default()
		.merge(properties.take().unwrap_or_default());
	*properties = Some(merged);
}
