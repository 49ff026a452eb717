// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Tenant database platform configuration.
//!
//! `local` keeps one SQLite file per tenant under `data_dir` and signs its own
//! scoped tokens. `http` talks to a hosted database platform that mints the
//! tokens and creates the databases.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use syringe_common_secret::SecretString;

use crate::error::ConfigError;

const DEFAULT_API_URL: &str = "https://api.turso.tech";
const DEFAULT_GROUP: &str = "default";
const DEFAULT_TENANT_URL_TEMPLATE: &str = "sqlite://{data_dir}/{tenant}.db";
const MIN_SIGNING_KEY_LEN: usize = 32;
const MAX_TOKEN_TTL_SECS: u64 = 3600;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlatformKind {
	#[default]
	Local,
	Http,
}

impl fmt::Display for PlatformKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			PlatformKind::Local => f.write_str("local"),
			PlatformKind::Http => f.write_str("http"),
		}
	}
}

#[derive(Debug, Clone)]
pub struct PlatformConfig {
	pub kind: PlatformKind,
	pub api_url: String,
	pub organization: String,
	pub group: String,
	pub api_token: Option<SecretString>,
	pub token_ttl_secs: u64,
	/// Address of a tenant store; `{tenant}`, `{org}` and `{data_dir}` are substituted.
	pub tenant_url_template: String,
	pub data_dir: PathBuf,
	pub signing_key: Option<SecretString>,
	pub request_timeout_secs: u64,
	pub max_retries: u32,
}

impl PlatformConfig {
	pub fn token_ttl(&self) -> Duration {
		Duration::from_secs(self.token_ttl_secs)
	}

	pub fn request_timeout(&self) -> Duration {
		Duration::from_secs(self.request_timeout_secs)
	}
}

/// Secret fields are never read from TOML; they come from the environment.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlatformConfigLayer {
	#[serde(default)]
	pub kind: Option<PlatformKind>,
	#[serde(default)]
	pub api_url: Option<String>,
	#[serde(default)]
	pub organization: Option<String>,
	#[serde(default)]
	pub group: Option<String>,
	#[serde(skip)]
	pub api_token: Option<SecretString>,
	#[serde(default)]
	pub token_ttl_secs: Option<u64>,
	#[serde(default)]
	pub tenant_url_template: Option<String>,
	#[serde(default)]
	pub data_dir: Option<PathBuf>,
	#[serde(skip)]
	pub signing_key: Option<SecretString>,
	#[serde(default)]
	pub request_timeout_secs: Option<u64>,
	#[serde(default)]
	pub max_retries: Option<u32>,
}

impl PlatformConfigLayer {
	pub fn merge(&mut self, other: PlatformConfigLayer) {
		if other.kind.is_some() {
			self.kind = other.kind;
		}
		if other.api_url.is_some() {
			self.api_url = other.api_url;
		}
		if other.organization.is_some() {
			self.organization = other.organization;
		}
		if other.group.is_some() {
			self.group = other.group;
		}
		if other.api_token.is_some() {
			self.api_token = other.api_token;
		}
		if other.token_ttl_secs.is_some() {
			self.token_ttl_secs = other.token_ttl_secs;
		}
		if other.tenant_url_template.is_some() {
			self.tenant_url_template = other.tenant_url_template;
		}
		if other.data_dir.is_some() {
			self.data_dir = other.data_dir;
		}
		if other.signing_key.is_some() {
			self.signing_key = other.signing_key;
		}
		if other.request_timeout_secs.is_some() {
			self.request_timeout_secs = other.request_timeout_secs;
		}
		if other.max_retries.is_some() {
			self.max_retries = other.max_retries;
		}
	}

	pub fn finalize(self) -> Result<PlatformConfig, ConfigError> {
		let config = PlatformConfig {
			kind: self.kind.unwrap_or_default(),
			api_url: self
				.api_url
				.unwrap_or_else(|| DEFAULT_API_URL.to_string())
				.trim_end_matches('/')
				.to_string(),
			organization: self.organization.unwrap_or_default(),
			group: self.group.unwrap_or_else(|| DEFAULT_GROUP.to_string()),
			api_token: self.api_token,
			token_ttl_secs: self.token_ttl_secs.unwrap_or(30),
			tenant_url_template: self
				.tenant_url_template
				.unwrap_or_else(|| DEFAULT_TENANT_URL_TEMPLATE.to_string()),
			data_dir: self.data_dir.unwrap_or_else(|| PathBuf::from("./tenants")),
			signing_key: self.signing_key,
			request_timeout_secs: self.request_timeout_secs.unwrap_or(10),
			max_retries: self.max_retries.unwrap_or(3),
		};
		validate(&config)?;
		Ok(config)
	}
}

fn validate(config: &PlatformConfig) -> Result<(), ConfigError> {
	if config.token_ttl_secs == 0 || config.token_ttl_secs > MAX_TOKEN_TTL_SECS {
		return Err(ConfigError::InvalidValue {
			key: "platform.token_ttl_secs".to_string(),
			message: format!(
				"must be between 1 and {MAX_TOKEN_TTL_SECS}, got {}",
				config.token_ttl_secs
			),
		});
	}
	if !config.tenant_url_template.contains("{tenant}") {
		return Err(ConfigError::InvalidValue {
			key: "platform.tenant_url_template".to_string(),
			message: "must contain the {tenant} placeholder".to_string(),
		});
	}

	match config.kind {
		PlatformKind::Http => {
			if config.organization.is_empty() {
				return Err(ConfigError::Validation(
					"platform.kind = \"http\" requires platform.organization \
					 (SYRINGE_SERVER_PLATFORM_ORGANIZATION)"
						.to_string(),
				));
			}
			if config.api_token.as_ref().map_or(true, |t| t.is_empty()) {
				return Err(ConfigError::Validation(
					"platform.kind = \"http\" requires SYRINGE_SERVER_PLATFORM_API_TOKEN \
					 or SYRINGE_SERVER_PLATFORM_API_TOKEN_FILE"
						.to_string(),
				));
			}
			// Hosted databases are never local files.
			if config.tenant_url_template.starts_with("sqlite:") {
				return Err(ConfigError::InvalidValue {
					key: "platform.tenant_url_template".to_string(),
					message: "platform.kind = \"http\" needs a hosted tenant address such as \
					          libsql://{tenant}-{org}.turso.io; sqlite addresses require kind = \"local\""
						.to_string(),
				});
			}
		}
		PlatformKind::Local => {
			let key_len = config.signing_key.as_ref().map_or(0, |k| k.len());
			if key_len < MIN_SIGNING_KEY_LEN {
				return Err(ConfigError::Validation(format!(
					"platform.kind = \"local\" requires SYRINGE_SERVER_PLATFORM_SIGNING_KEY \
					 of at least {MIN_SIGNING_KEY_LEN} bytes"
				)));
			}
		}
	}

	Ok(())
}
