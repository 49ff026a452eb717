// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use syringe_common_secret::SecretString;
use syringe_server_db::open_tenant_pool;
use tracing::instrument;

use super::{DatabaseInfo, DatabasePlatform};
use crate::error::PlatformError;
use crate::tenant::{TenantAddressing, TenantId};
use crate::token::TokenSigner;

const DB_EXTENSION: &str = "db";

/// One SQLite file per tenant, with locally signed tokens.
#[derive(Debug, Clone)]
pub struct LocalPlatform {
	data_dir: PathBuf,
	addressing: TenantAddressing,
	signer: TokenSigner,
	open_timeout: Duration,
}

impl LocalPlatform {
	pub fn new(
		data_dir: PathBuf,
		addressing: TenantAddressing,
		signer: TokenSigner,
		open_timeout: Duration,
	) -> Self {
		Self {
			data_dir,
			addressing,
			signer,
			open_timeout,
		}
	}
}

#[async_trait]
impl DatabasePlatform for LocalPlatform {
	#[instrument(skip(self), fields(data_dir = %self.data_dir.display()))]
	async fn list_databases(&self) -> Result<Vec<DatabaseInfo>, PlatformError> {
		let mut entries = match tokio::fs::read_dir(&self.data_dir).await {
			Ok(entries) => entries,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
			Err(e) => return Err(PlatformError::Storage(e.to_string())),
		};

		let mut databases = Vec::new();
		while let Some(entry) = entries
			.next_entry()
			.await
			.map_err(|e| PlatformError::Storage(e.to_string()))?
		{
			let path = entry.path();
			if path.extension().and_then(|e| e.to_str()) != Some(DB_EXTENSION) {
				continue;
			}
			if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
				databases.push(DatabaseInfo {
					name: stem.to_string(),
					hostname: None,
				});
			}
		}
		databases.sort_by(|a, b| a.name.cmp(&b.name));
		Ok(databases)
	}

	#[instrument(skip(self), fields(tenant = %tenant))]
	async fn create_database(&self, tenant: &TenantId) -> Result<DatabaseInfo, PlatformError> {
		let address = self.addressing.address_for(tenant);

		if let Ok(existing) = open_tenant_pool(&address.url, false, self.open_timeout).await {
			existing.close().await;
			return Err(PlatformError::AlreadyExists(tenant.to_string()));
		}

		tokio::fs::create_dir_all(&self.data_dir)
			.await
			.map_err(|e| PlatformError::Storage(e.to_string()))?;

		let pool = open_tenant_pool(&address.url, true, self.open_timeout)
			.await
			.map_err(|e| PlatformError::Storage(e.to_string()))?;
		pool.close().await;

		tracing::info!(tenant = %tenant, "tenant database created");
		Ok(DatabaseInfo {
			name: tenant.to_string(),
			hostname: None,
		})
	}

	async fn create_token(
		&self,
		tenant: &TenantId,
		ttl: Duration,
	) -> Result<SecretString, PlatformError> {
		let ttl = chrono::Duration::from_std(ttl)
			.map_err(|e| PlatformError::Signing(e.to_string()))?;
		self.signer.mint(tenant, Utc::now() + ttl)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use syringe_server_auth::testing::ed25519_key;

	fn platform(dir: &std::path::Path) -> LocalPlatform {
		LocalPlatform::new(
			dir.to_path_buf(),
			TenantAddressing::new("sqlite://{data_dir}/{tenant}.db", "", dir),
			TokenSigner::new(&SecretString::new(
				"0123456789abcdef0123456789abcdef".to_string(),
			)),
			Duration::from_secs(1),
		)
	}

	#[tokio::test]
	async fn missing_data_dir_lists_nothing() {
		let dir = tempfile::tempdir().unwrap();
		let platform = platform(&dir.path().join("absent"));
		assert!(platform.list_databases().await.unwrap().is_empty());
	}

	#[tokio::test]
	async fn create_then_list() {
		let dir = tempfile::tempdir().unwrap();
		let platform = platform(dir.path());
		let tenant = TenantId::derive(&ed25519_key(5));

		platform.create_database(&tenant).await.unwrap();

		let names: Vec<String> = platform
			.list_databases()
			.await
			.unwrap()
			.into_iter()
			.map(|d| d.name)
			.collect();
		assert_eq!(names, vec![tenant.to_string()]);
	}

	#[tokio::test]
	async fn second_create_reports_existing() {
		let dir = tempfile::tempdir().unwrap();
		let platform = platform(dir.path());
		let tenant = TenantId::derive(&ed25519_key(5));

		platform.create_database(&tenant).await.unwrap();
		let err = platform.create_database(&tenant).await.unwrap_err();
		assert!(matches!(err, PlatformError::AlreadyExists(_)));
	}

	#[tokio::test]
	async fn tokens_are_scoped_to_the_tenant() {
		let dir = tempfile::tempdir().unwrap();
		let platform = platform(dir.path());
		let tenant = TenantId::derive(&ed25519_key(6));

		let token = platform
			.create_token(&tenant, Duration::from_secs(30))
			.await
			.unwrap();
		let claims = platform.signer.verify(token.expose()).unwrap();
		assert_eq!(claims.tenant, tenant.as_str());
		assert!(claims.expires_at > Utc::now());
	}
}
