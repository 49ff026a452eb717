// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sources: built-in defaults, a TOML file, and the environment.

use std::path::PathBuf;

use syringe_common_secret::load_secret_env;
use tracing::{debug, trace};

use crate::error::ConfigError;
use crate::layer::ServerConfigLayer;
use crate::sections::{
	DatabaseConfigLayer, LogFormat, LoggingConfigLayer, PlatformConfigLayer, PlatformKind,
	ShutdownConfigLayer, SshConfigLayer,
};

/// Source precedence levels (higher = overrides lower).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
	Defaults = 10,
	ConfigFile = 20,
	Environment = 50,
}

pub trait ConfigSource: Send + Sync {
	fn name(&self) -> &'static str;
	fn precedence(&self) -> Precedence;
	fn load(&self) -> Result<ServerConfigLayer, ConfigError>;
}

pub struct DefaultsSource;

impl ConfigSource for DefaultsSource {
	fn name(&self) -> &'static str {
		"defaults"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Defaults
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		Ok(ServerConfigLayer::default())
	}
}

pub struct TomlSource {
	path: PathBuf,
}

impl TomlSource {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	pub fn system() -> Self {
		Self::new("/etc/syringe/server.toml")
	}
}

impl ConfigSource for TomlSource {
	fn name(&self) -> &'static str {
		"toml-config"
	}

	fn precedence(&self) -> Precedence {
		Precedence::ConfigFile
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		if !self.path.exists() {
			debug!(path = %self.path.display(), "config file not found, skipping");
			return Ok(ServerConfigLayer::default());
		}

		let content = std::fs::read_to_string(&self.path).map_err(|e| ConfigError::FileRead {
			path: self.path.clone(),
			source: e,
		})?;

		let layer: ServerConfigLayer =
			toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
				path: self.path.clone(),
				source: e,
			})?;

		trace!(path = %self.path.display(), "parsed config layer from TOML");
		Ok(layer)
	}
}

/// Environment variable source.
///
/// Convention: SYRINGE_SERVER_<SECTION>_<FIELD>
pub struct EnvSource;

impl ConfigSource for EnvSource {
	fn name(&self) -> &'static str {
		"environment"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Environment
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		Ok(ServerConfigLayer {
			ssh: Some(load_ssh_from_env()?),
			database: Some(DatabaseConfigLayer {
				url: env_var("SYRINGE_SERVER_DATABASE_URL"),
			}),
			platform: Some(load_platform_from_env()?),
			logging: Some(load_logging_from_env()?),
			shutdown: Some(ShutdownConfigLayer {
				grace_period_secs: env_parse("SYRINGE_SERVER_SHUTDOWN_GRACE_PERIOD_SECS")?,
			}),
		})
	}
}

fn env_var(name: &str) -> Option<String> {
	std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn env_parse<T>(name: &str) -> Result<Option<T>, ConfigError>
where
	T: std::str::FromStr,
{
	match env_var(name) {
		Some(v) => v.parse().map(Some).map_err(|_| ConfigError::InvalidValue {
			key: name.to_string(),
			message: format!("cannot parse '{v}' as {}", std::any::type_name::<T>()),
		}),
		None => Ok(None),
	}
}

fn load_ssh_from_env() -> Result<SshConfigLayer, ConfigError> {
	Ok(SshConfigLayer {
		host: env_var("SYRINGE_SERVER_SSH_HOST"),
		port: env_parse("SYRINGE_SERVER_SSH_PORT")?,
		host_key_path: env_var("SYRINGE_SERVER_SSH_HOST_KEY_PATH").map(PathBuf::from),
		inactivity_timeout_secs: env_parse("SYRINGE_SERVER_SSH_INACTIVITY_TIMEOUT_SECS")?,
		auth_rejection_delay_ms: env_parse("SYRINGE_SERVER_SSH_AUTH_REJECTION_DELAY_MS")?,
	})
}

fn load_platform_from_env() -> Result<PlatformConfigLayer, ConfigError> {
	let kind = match env_var("SYRINGE_SERVER_PLATFORM_KIND") {
		Some(v) => Some(match v.to_ascii_lowercase().as_str() {
			"local" => PlatformKind::Local,
			"http" => PlatformKind::Http,
			other => {
				return Err(ConfigError::InvalidValue {
					key: "SYRINGE_SERVER_PLATFORM_KIND".to_string(),
					message: format!("expected 'local' or 'http', got '{other}'"),
				})
			}
		}),
		None => None,
	};

	Ok(PlatformConfigLayer {
		kind,
		api_url: env_var("SYRINGE_SERVER_PLATFORM_API_URL"),
		organization: env_var("SYRINGE_SERVER_PLATFORM_ORGANIZATION"),
		group: env_var("SYRINGE_SERVER_PLATFORM_GROUP"),
		api_token: load_secret_env("SYRINGE_SERVER_PLATFORM_API_TOKEN")?,
		token_ttl_secs: env_parse("SYRINGE_SERVER_PLATFORM_TOKEN_TTL_SECS")?,
		tenant_url_template: env_var("SYRINGE_SERVER_PLATFORM_TENANT_URL_TEMPLATE"),
		data_dir: env_var("SYRINGE_SERVER_PLATFORM_DATA_DIR").map(PathBuf::from),
		signing_key: load_secret_env("SYRINGE_SERVER_PLATFORM_SIGNING_KEY")?,
		request_timeout_secs: env_parse("SYRINGE_SERVER_PLATFORM_REQUEST_TIMEOUT_SECS")?,
		max_retries: env_parse("SYRINGE_SERVER_PLATFORM_MAX_RETRIES")?,
	})
}

fn load_logging_from_env() -> Result<LoggingConfigLayer, ConfigError> {
	let format = match env_var("SYRINGE_SERVER_LOG_FORMAT") {
		Some(v) if v.eq_ignore_ascii_case("json") => Some(LogFormat::Json),
		Some(v) if v.eq_ignore_ascii_case("pretty") => Some(LogFormat::Pretty),
		Some(v) => {
			return Err(ConfigError::InvalidValue {
				key: "SYRINGE_SERVER_LOG_FORMAT".to_string(),
				message: format!("expected 'pretty' or 'json', got '{v}'"),
			})
		}
		None => None,
	};

	Ok(LoggingConfigLayer {
		level: env_var("SYRINGE_SERVER_LOG_LEVEL"),
		format,
	})
}
