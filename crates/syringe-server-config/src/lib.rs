// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration for the syringe SSH gateway.
//!
//! Sources are layered, lowest precedence first:
//! - built-in defaults
//! - TOML file (`/etc/syringe/server.toml` or `--config`)
//! - environment (`SYRINGE_SERVER_*`, secrets also via `*_FILE`)

pub mod error;
pub mod layer;
pub mod sections;
pub mod sources;

pub use error::ConfigError;
pub use layer::ServerConfigLayer;
pub use sections::*;
pub use sources::{ConfigSource, DefaultsSource, EnvSource, Precedence, TomlSource};

use std::path::PathBuf;

use tracing::{debug, info};

/// Fully resolved server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
	pub ssh: SshConfig,
	pub database: DatabaseConfig,
	pub platform: PlatformConfig,
	pub logging: LoggingConfig,
	pub shutdown: ShutdownConfig,
}

impl ServerConfig {
	/// Get the socket address string for binding.
	pub fn socket_addr(&self) -> String {
		format!("{}:{}", self.ssh.host, self.ssh.port)
	}
}

/// Load configuration from defaults, the system config file and the environment.
pub fn load_config() -> Result<ServerConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::system()),
		Box::new(EnvSource),
	])
}

/// Load configuration with a custom config file path.
pub fn load_config_with_file(config_path: impl Into<PathBuf>) -> Result<ServerConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::new(config_path)),
		Box::new(EnvSource),
	])
}

pub fn load_from_sources(
	mut sources: Vec<Box<dyn ConfigSource>>,
) -> Result<ServerConfig, ConfigError> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = ServerConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		merged.merge(source.load()?);
	}

	finalize(merged)
}

fn finalize(layer: ServerConfigLayer) -> Result<ServerConfig, ConfigError> {
	let ssh = layer.ssh.unwrap_or_default().finalize();
	let database = layer.database.unwrap_or_default().finalize();
	let platform = layer.platform.unwrap_or_default().finalize()?;
	let logging = layer.logging.unwrap_or_default().finalize();
	let shutdown = layer.shutdown.unwrap_or_default().finalize();

	info!(
		host = %ssh.host,
		port = ssh.port,
		database = %database.url,
		platform = %platform.kind,
		token_ttl_secs = platform.token_ttl_secs,
		grace_period_secs = shutdown.grace_period_secs,
		"Server configuration loaded"
	);

	Ok(ServerConfig {
		ssh,
		database,
		platform,
		logging,
		shutdown,
	})
}
