// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! SSH listener configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

#[derive(Debug, Clone)]
pub struct SshConfig {
	pub host: String,
	pub port: u16,
	/// OpenSSH private key presented as the gateway's host identity.
	pub host_key_path: PathBuf,
	pub inactivity_timeout_secs: u64,
	pub auth_rejection_delay_ms: u64,
}

impl SshConfig {
	pub fn inactivity_timeout(&self) -> Duration {
		Duration::from_secs(self.inactivity_timeout_secs)
	}

	pub fn auth_rejection_delay(&self) -> Duration {
		Duration::from_millis(self.auth_rejection_delay_ms)
	}
}

impl Default for SshConfig {
	fn default() -> Self {
		SshConfigLayer::default().finalize()
	}
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SshConfigLayer {
	#[serde(default)]
	pub host: Option<String>,
	#[serde(default)]
	pub port: Option<u16>,
	#[serde(default)]
	pub host_key_path: Option<PathBuf>,
	#[serde(default)]
	pub inactivity_timeout_secs: Option<u64>,
	#[serde(default)]
	pub auth_rejection_delay_ms: Option<u64>,
}

impl SshConfigLayer {
	pub fn merge(&mut self, other: SshConfigLayer) {
		if other.host.is_some() {
			self.host = other.host;
		}
		if other.port.is_some() {
			self.port = other.port;
		}
		if other.host_key_path.is_some() {
			self.host_key_path = other.host_key_path;
		}
		if other.inactivity_timeout_secs.is_some() {
			self.inactivity_timeout_secs = other.inactivity_timeout_secs;
		}
		if other.auth_rejection_delay_ms.is_some() {
			self.auth_rejection_delay_ms = other.auth_rejection_delay_ms;
		}
	}

	pub fn finalize(self) -> SshConfig {
		SshConfig {
			host: self.host.unwrap_or_else(|| "0.0.0.0".to_string()),
			port: self.port.unwrap_or(23234),
			host_key_path: self
				.host_key_path
				.unwrap_or_else(|| PathBuf::from(".ssh/id_ed25519")),
			inactivity_timeout_secs: self.inactivity_timeout_secs.unwrap_or(300),
			auth_rejection_delay_ms: self.auth_rejection_delay_ms.unwrap_or(250),
		}
	}
}
