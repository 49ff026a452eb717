// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use syringe_server_auth::PublicKey;
use syringe_server_config::{PlatformConfig, PlatformKind};
use tracing::instrument;

use crate::connector::{SqliteConnector, TenantConnection, TenantConnector};
use crate::credential::ScopedCredential;
use crate::error::{ConnectionError, PlatformError, ProvisioningError, Result};
use crate::platform::{DatabasePlatform, HttpPlatform, LocalPlatform};
use crate::tenant::{TenantAddress, TenantAddressing, TenantId};
use crate::token::TokenSigner;

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionOutcome {
	Created,
	AlreadyPresent,
}

/// Resolves keys to tenant connections and creates tenant stores.
#[derive(Clone)]
pub struct TenantProvisioner {
	platform: Arc<dyn DatabasePlatform>,
	connector: Arc<dyn TenantConnector>,
	addressing: TenantAddressing,
	token_ttl: Duration,
	probe_timeout: Duration,
}

impl TenantProvisioner {
	pub fn new(
		platform: Arc<dyn DatabasePlatform>,
		connector: Arc<dyn TenantConnector>,
		addressing: TenantAddressing,
		token_ttl: Duration,
	) -> Self {
		Self {
			platform,
			connector,
			addressing,
			token_ttl,
			probe_timeout: PROBE_TIMEOUT,
		}
	}

	/// Build from configuration. Local stores are opened by a [`SqliteConnector`]
	/// that verifies the signed token. No connector for hosted tenant addresses
	/// ships with the gateway, so `kind = "http"` goes through
	/// [`TenantProvisioner::with_connector`] instead.
	pub fn from_config(config: &PlatformConfig) -> Result<Self> {
		match config.kind {
			PlatformKind::Local => {
				let connector =
					SqliteConnector::new(Some(local_signer(config)?), config.request_timeout());
				Self::with_connector(config, Arc::new(connector))
			}
			PlatformKind::Http => Err(ProvisioningError::Platform(PlatformError::Misconfigured(
				format!(
					"no tenant connector is available for {}; platform.kind = \"http\" needs one \
					 supplied through TenantProvisioner::with_connector",
					config.tenant_url_template
				),
			))),
		}
	}

	/// Build the configured platform around a caller-supplied connector.
	pub fn with_connector(
		config: &PlatformConfig,
		connector: Arc<dyn TenantConnector>,
	) -> Result<Self> {
		let addressing = TenantAddressing::new(
			config.tenant_url_template.clone(),
			config.organization.clone(),
			&config.data_dir,
		);

		let platform: Arc<dyn DatabasePlatform> = match config.kind {
			PlatformKind::Local => Arc::new(LocalPlatform::new(
				config.data_dir.clone(),
				addressing.clone(),
				local_signer(config)?,
				config.request_timeout(),
			)),
			PlatformKind::Http => {
				Arc::new(HttpPlatform::from_config(config).map_err(ProvisioningError::Platform)?)
			}
		};

		tracing::info!(
			platform = %config.kind,
			template = %config.tenant_url_template,
			"tenant provisioner ready"
		);

		Ok(Self::new(platform, connector, addressing, config.token_ttl()))
	}

	pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
		self.probe_timeout = timeout;
		self
	}

	pub fn address_for(&self, key: &PublicKey) -> TenantAddress {
		self.addressing.address_for(&TenantId::derive(key))
	}

	/// Open a probed connection to the tenant store owned by `key`.
	///
	/// A fresh credential is minted on every call.
	#[instrument(skip(self, key), fields(fingerprint = %key.fingerprint()))]
	pub async fn resolve(&self, key: &PublicKey) -> Result<TenantConnection> {
		let tenant = TenantId::derive(key);
		let address = self.addressing.address_for(&tenant);

		let ttl = chrono::Duration::from_std(self.token_ttl)
			.map_err(|e| ProvisioningError::TokenIssuance {
				tenant: tenant.clone(),
				source: PlatformError::Signing(e.to_string()),
			})?;
		let expires_at = Utc::now() + ttl;
		let token = self
			.platform
			.create_token(&tenant, self.token_ttl)
			.await
			.map_err(|source| ProvisioningError::TokenIssuance {
				tenant: tenant.clone(),
				source,
			})?;
		let credential = ScopedCredential::new(tenant.clone(), token, expires_at);

		let connection = self.connector.connect(&address, &credential).await?;

		let probe = tokio::time::timeout(
			self.probe_timeout,
			sqlx::query("SELECT 1").execute(connection.pool()),
		)
		.await;
		match probe {
			Ok(Ok(_)) => {
				tracing::debug!(tenant = %tenant, "tenant store resolved");
				Ok(connection)
			}
			Ok(Err(e)) => {
				connection.close().await;
				Err(ConnectionError::Probe(e.to_string()).into())
			}
			Err(_) => {
				connection.close().await;
				Err(ConnectionError::Probe("timed out".into()).into())
			}
		}
	}

	/// Make sure a tenant store exists for `key`. Safe to repeat.
	#[instrument(skip(self, key), fields(fingerprint = %key.fingerprint()))]
	pub async fn provision(&self, key: &PublicKey) -> Result<(TenantId, ProvisionOutcome)> {
		let tenant = TenantId::derive(key);

		let existing = self
			.platform
			.list_databases()
			.await
			.map_err(ProvisioningError::Platform)?;
		if existing.iter().any(|db| db.name == tenant.as_str()) {
			return Ok((tenant, ProvisionOutcome::AlreadyPresent));
		}

		match self.platform.create_database(&tenant).await {
			Ok(_) => {
				tracing::info!(tenant = %tenant, "tenant store provisioned");
				Ok((tenant, ProvisionOutcome::Created))
			}
			Err(PlatformError::AlreadyExists(_)) => Ok((tenant, ProvisionOutcome::AlreadyPresent)),
			Err(e) => Err(ProvisioningError::Platform(e)),
		}
	}
}

fn local_signer(config: &PlatformConfig) -> Result<TokenSigner> {
	config.signing_key.as_ref().map(TokenSigner::new).ok_or_else(|| {
		ProvisioningError::Platform(PlatformError::Misconfigured(
			"local platform requires a signing key".into(),
		))
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::path::{Path, PathBuf};
	use std::sync::Mutex;

	use async_trait::async_trait;
	use serde_json::json;
	use syringe_common_secret::SecretString;
	use syringe_server_auth::testing::ed25519_key;
	use syringe_server_db::testing::create_tenant_test_pool;
	use wiremock::matchers::{header, method, path};
	use wiremock::{Mock, MockServer, ResponseTemplate};

	fn config(dir: &Path) -> PlatformConfig {
		PlatformConfig {
			kind: PlatformKind::Local,
			api_url: "https://api.turso.tech".to_string(),
			organization: String::new(),
			group: "default".to_string(),
			api_token: None,
			token_ttl_secs: 30,
			tenant_url_template: "sqlite://{data_dir}/{tenant}.db".to_string(),
			data_dir: dir.to_path_buf(),
			signing_key: Some(SecretString::new(
				"0123456789abcdef0123456789abcdef".to_string(),
			)),
			request_timeout_secs: 2,
			max_retries: 1,
		}
	}

	#[tokio::test]
	async fn provision_is_idempotent() {
		let dir = tempfile::tempdir().unwrap();
		let provisioner = TenantProvisioner::from_config(&config(dir.path())).unwrap();
		let key = ed25519_key(1);

		let (tenant, first) = provisioner.provision(&key).await.unwrap();
		let (again, second) = provisioner.provision(&key).await.unwrap();

		assert_eq!(first, ProvisionOutcome::Created);
		assert_eq!(second, ProvisionOutcome::AlreadyPresent);
		assert_eq!(tenant, again);
	}

	#[tokio::test]
	async fn resolve_requires_a_provisioned_store() {
		let dir = tempfile::tempdir().unwrap();
		let provisioner = TenantProvisioner::from_config(&config(dir.path())).unwrap();

		let err = provisioner.resolve(&ed25519_key(2)).await.unwrap_err();
		assert!(matches!(
			err,
			ProvisioningError::Connection(ConnectionError::Open(_))
		));
	}

	#[tokio::test]
	async fn resolve_reaches_the_same_store_each_time() {
		let dir = tempfile::tempdir().unwrap();
		let provisioner = TenantProvisioner::from_config(&config(dir.path())).unwrap();
		let key = ed25519_key(3);
		provisioner.provision(&key).await.unwrap();

		let first = provisioner.resolve(&key).await.unwrap();
		sqlx::query("CREATE TABLE marker (id INTEGER)")
			.execute(first.pool())
			.await
			.unwrap();
		let first_address = first.address().clone();
		first.close().await;

		let second = provisioner.resolve(&key).await.unwrap();
		assert_eq!(second.address(), &first_address);
		let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM marker")
			.fetch_one(second.pool())
			.await
			.unwrap();
		assert_eq!(count, 0);
		second.close().await;
	}

	#[tokio::test]
	async fn keys_resolve_to_distinct_stores() {
		let dir = tempfile::tempdir().unwrap();
		let provisioner = TenantProvisioner::from_config(&config(dir.path())).unwrap();

		let a = provisioner.address_for(&ed25519_key(4));
		let b = provisioner.address_for(&ed25519_key(5));
		assert_ne!(a.url, b.url);
		assert_ne!(a.tenant, b.tenant);
	}

	#[test]
	fn local_without_signing_key_is_refused() {
		let dir = tempfile::tempdir().unwrap();
		let mut config = config(dir.path());
		config.signing_key = None;
		assert!(matches!(
			TenantProvisioner::from_config(&config),
			Err(ProvisioningError::Platform(PlatformError::Misconfigured(_)))
		));
	}

	fn hosted_config(api_url: String) -> PlatformConfig {
		PlatformConfig {
			kind: PlatformKind::Http,
			api_url,
			organization: "acme".to_string(),
			group: "default".to_string(),
			api_token: Some(SecretString::new("platform-token".to_string())),
			token_ttl_secs: 30,
			tenant_url_template: "libsql://{tenant}-{org}.turso.io".to_string(),
			data_dir: PathBuf::from("./tenants"),
			signing_key: None,
			request_timeout_secs: 5,
			max_retries: 1,
		}
	}

	/// Accepts one token value and hands out in-memory stores.
	struct TokenCheckingConnector {
		expected: &'static str,
		presented: Mutex<Vec<String>>,
	}

	#[async_trait]
	impl TenantConnector for TokenCheckingConnector {
		async fn connect(
			&self,
			address: &TenantAddress,
			credential: &ScopedCredential,
		) -> std::result::Result<TenantConnection, ConnectionError> {
			let token = credential.token().expose().to_string();
			self.presented.lock().unwrap().push(token.clone());
			if token != self.expected || credential.tenant() != &address.tenant {
				return Err(ConnectionError::Rejected("unexpected credential".into()));
			}
			Ok(TenantConnection::new(
				address.clone(),
				create_tenant_test_pool().await,
				credential.expires_at(),
			))
		}
	}

	#[test]
	fn hosted_platform_needs_a_supplied_connector() {
		let config = hosted_config("https://api.example.test".to_string());
		assert!(matches!(
			TenantProvisioner::from_config(&config),
			Err(ProvisioningError::Platform(PlatformError::Misconfigured(_)))
		));
	}

	#[tokio::test]
	async fn hosted_tenants_are_opened_with_the_minted_token() {
		let server = MockServer::start().await;
		let key = ed25519_key(6);
		let tenant = TenantId::derive(&key);

		Mock::given(method("GET"))
			.and(path("/v1/organizations/acme/databases"))
			.and(header("authorization", "Bearer platform-token"))
			.respond_with(ResponseTemplate::new(200).set_body_json(json!({ "databases": [] })))
			.expect(1)
			.mount(&server)
			.await;
		Mock::given(method("POST"))
			.and(path("/v1/organizations/acme/databases"))
			.respond_with(ResponseTemplate::new(200).set_body_json(json!({
				"database": { "Name": tenant.as_str(), "Hostname": "h" }
			})))
			.expect(1)
			.mount(&server)
			.await;
		Mock::given(method("POST"))
			.and(path(format!(
				"/v1/organizations/acme/databases/{tenant}/auth/tokens"
			)))
			.respond_with(ResponseTemplate::new(200).set_body_json(json!({ "jwt": "vendor-jwt" })))
			.expect(1)
			.mount(&server)
			.await;

		let connector = Arc::new(TokenCheckingConnector {
			expected: "vendor-jwt",
			presented: Mutex::new(Vec::new()),
		});
		let provisioner =
			TenantProvisioner::with_connector(&hosted_config(server.uri()), connector.clone())
				.unwrap();

		let (provisioned, outcome) = provisioner.provision(&key).await.unwrap();
		assert_eq!(outcome, ProvisionOutcome::Created);
		assert_eq!(provisioned, tenant);

		let connection = provisioner.resolve(&key).await.unwrap();
		assert_eq!(
			connection.address().url,
			format!("libsql://{tenant}-acme.turso.io")
		);
		assert_eq!(*connector.presented.lock().unwrap(), vec!["vendor-jwt".to_string()]);
		connection.close().await;
	}
}
