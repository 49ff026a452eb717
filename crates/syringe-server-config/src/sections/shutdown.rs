// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::time::Duration;

use serde::Deserialize;

#[derive(Debug, Clone)]
pub struct ShutdownConfig {
	/// How long in-flight sessions may keep running after a shutdown signal.
	pub grace_period_secs: u64,
}

impl ShutdownConfig {
	pub fn grace_period(&self) -> Duration {
		Duration::from_secs(self.grace_period_secs)
	}
}

impl Default for ShutdownConfig {
	fn default() -> Self {
		Self {
			grace_period_secs: 30,
		}
	}
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ShutdownConfigLayer {
	#[serde(default)]
	pub grace_period_secs: Option<u64>,
}

impl ShutdownConfigLayer {
	pub fn merge(&mut self, other: ShutdownConfigLayer) {
		if other.grace_period_secs.is_some() {
			self.grace_period_secs = other.grace_period_secs;
		}
	}

	pub fn finalize(self) -> ShutdownConfig {
		ShutdownConfig {
			grace_period_secs: self
				.grace_period_secs
				.unwrap_or(ShutdownConfig::default().grace_period_secs),
		}
	}
}
