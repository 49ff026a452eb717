// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Database platforms that host tenant stores.

mod http;
mod local;
pub mod retry;

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use syringe_common_secret::SecretString;

use crate::error::PlatformError;
use crate::tenant::TenantId;

pub use http::HttpPlatform;
pub use local::LocalPlatform;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DatabaseInfo {
	#[serde(rename = "Name")]
	pub name: String,
	#[serde(rename = "Hostname", default)]
	pub hostname: Option<String>,
}

/// Creates tenant databases and mints tokens scoped to a single one.
#[async_trait]
pub trait DatabasePlatform: Send + Sync {
	async fn list_databases(&self) -> Result<Vec<DatabaseInfo>, PlatformError>;

	/// Fails with [`PlatformError::AlreadyExists`] when the database is present.
	async fn create_database(&self, tenant: &TenantId) -> Result<DatabaseInfo, PlatformError>;

	async fn create_token(
		&self,
		tenant: &TenantId,
		ttl: Duration,
	) -> Result<SecretString, PlatformError>;
}
