// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core types for ExpoFast product analytics.
//!
//! These types define the wire format shared by the SDK and the collection
//! endpoint: the event taxonomy, free-form properties, the device descriptor
//! and the push payload that carries a batch of events.

pub mod api_key;
pub mod device;
pub mod event;
pub mod payload;
pub mod properties;

pub use api_key::ApiKey;
pub use device::DeviceInfo;
pub use event::{
	capture_timestamp, truncate_message, Event, EventKind, IdentifyTraits,
	MAX_ERROR_MESSAGE_CHARS,
};
pub use payload::PushPayload;
pub use properties::Properties;
