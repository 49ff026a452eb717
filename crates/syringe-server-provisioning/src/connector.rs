// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePool;
use syringe_server_db::open_tenant_pool;
use tracing::instrument;

use crate::credential::ScopedCredential;
use crate::error::ConnectionError;
use crate::tenant::{TenantAddress, TenantId};
use crate::token::TokenSigner;

/// A live, session-scoped handle on one tenant store.
#[derive(Debug)]
pub struct TenantConnection {
	tenant: TenantId,
	address: TenantAddress,
	pool: SqlitePool,
	expires_at: DateTime<Utc>,
}

impl TenantConnection {
	pub fn new(address: TenantAddress, pool: SqlitePool, expires_at: DateTime<Utc>) -> Self {
		Self {
			tenant: address.tenant.clone(),
			address,
			pool,
			expires_at,
		}
	}

	pub fn tenant(&self) -> &TenantId {
		&self.tenant
	}

	pub fn address(&self) -> &TenantAddress {
		&self.address
	}

	pub fn pool(&self) -> &SqlitePool {
		&self.pool
	}

	pub fn expires_at(&self) -> DateTime<Utc> {
		self.expires_at
	}

	pub async fn close(self) {
		self.pool.close().await;
	}
}

/// Turns an address plus a scoped credential into a connection.
#[async_trait]
pub trait TenantConnector: Send + Sync {
	async fn connect(
		&self,
		address: &TenantAddress,
		credential: &ScopedCredential,
	) -> Result<TenantConnection, ConnectionError>;
}

/// Opens `sqlite:` addresses. When a signer is present the token itself must
/// verify and name the same tenant.
#[derive(Debug, Clone)]
pub struct SqliteConnector {
	signer: Option<TokenSigner>,
	acquire_timeout: Duration,
}

impl SqliteConnector {
	pub fn new(signer: Option<TokenSigner>, acquire_timeout: Duration) -> Self {
		Self {
			signer,
			acquire_timeout,
		}
	}

	fn check_credential(
		&self,
		address: &TenantAddress,
		credential: &ScopedCredential,
	) -> Result<(), ConnectionError> {
		let now = Utc::now();
		if credential.tenant() != &address.tenant {
			return Err(ConnectionError::Rejected(
				"credential is scoped to a different tenant".into(),
			));
		}
		if credential.is_expired_at(now) {
			return Err(ConnectionError::Rejected("credential has expired".into()));
		}

		if let Some(signer) = &self.signer {
			let claims = signer
				.verify(credential.token().expose())
				.ok_or_else(|| ConnectionError::Rejected("token signature is invalid".into()))?;
			if claims.tenant != address.tenant.as_str() {
				return Err(ConnectionError::Rejected(
					"token is scoped to a different tenant".into(),
				));
			}
			if claims.expires_at <= now {
				return Err(ConnectionError::Rejected("token has expired".into()));
			}
		}
		Ok(())
	}
}

#[async_trait]
impl TenantConnector for SqliteConnector {
	#[instrument(skip(self, credential), fields(tenant = %address.tenant))]
	async fn connect(
		&self,
		address: &TenantAddress,
		credential: &ScopedCredential,
	) -> Result<TenantConnection, ConnectionError> {
		self.check_credential(address, credential)?;

		if !address.url.starts_with("sqlite:") {
			return Err(ConnectionError::UnsupportedAddress(address.url.clone()));
		}

		let pool = open_tenant_pool(&address.url, false, self.acquire_timeout)
			.await
			.map_err(ConnectionError::Open)?;

		Ok(TenantConnection::new(
			address.clone(),
			pool,
			credential.expires_at(),
		))
	}
}
