// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Device descriptor providers.
//!
//! The delivery engine asks its provider for a fresh [`DeviceInfo`] on every
//! push; providers should be cheap and must not block.

use expofast_analytics_core::DeviceInfo;

/// Supplies the device descriptor sent with each push.
pub trait DeviceInfoProvider: Send + Sync {
	fn device_info(&self) -> DeviceInfo;
}

/// Describes the host from compile-time target information only.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostDeviceInfo;

impl DeviceInfoProvider for HostDeviceInfo {
	fn device_info(&self) -> DeviceInfo {
		DeviceInfo::new(std::env::consts::OS)
	}
}

/// Returns the same descriptor every time. Mobile bindings collect the
/// details once at startup and hand them over through this type.
#[derive(Debug, Clone)]
pub struct StaticDeviceInfo(pub DeviceInfo);

impl DeviceInfoProvider for StaticDeviceInfo {
	fn device_info(&self) -> DeviceInfo {
		self.0.clone()
	}
}

impl<F> DeviceInfoProvider for F
where
	F: Fn() -> DeviceInfo + Send + Sync,
{
	fn device_info(&self) -> DeviceInfo {
		self()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn host_info_reports_target_os() {
		let info = HostDeviceInfo.device_info();
		assert_eq!(info.platform, std::env::consts::OS);
		assert!(!info.is_simulator);
	}

	#[test]
	fn static_info_is_returned_verbatim() {
		let info = DeviceInfo::new("ios").with_model_name("iPhone 15");
		let provider = StaticDeviceInfo(info.clone());
		assert_eq!(provider.device_info(), info);
	}

	#[test]
	fn closures_are_providers() {
		let provider = || DeviceInfo::new("android").with_android_platform_api_level(34);
		assert_eq!(provider.device_info().android_platform_api_level, Some(34));
	}
}
