// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Identity registration, authentication and key management.

use std::sync::Arc;

use syringe_server_auth::{AuthError, AuthorizedKey, Identity, PublicKey};
use syringe_server_db::{run_tenant_migrations, DbError, IdentityStore};
use syringe_server_provisioning::{TenantConnection, TenantId, TenantProvisioner};
use tracing::instrument;

use crate::error::AccessError;
use crate::validation::{Validate, ValidationError, Validator};

#[derive(Debug, Clone)]
pub struct RegisterRequest {
	pub username: String,
	pub email: String,
}

impl Validate for RegisterRequest {
	fn validate(&self, validator: &Validator) -> Result<(), ValidationError> {
		validator
			.check()
			.username("username", &self.username)
			.email("email", &self.email)
			.finish()
	}
}

pub struct AccessService {
	identities: Arc<dyn IdentityStore>,
	provisioner: TenantProvisioner,
	validator: Validator,
}

impl AccessService {
	pub fn new(
		identities: Arc<dyn IdentityStore>,
		provisioner: TenantProvisioner,
		validator: Validator,
	) -> Self {
		Self {
			identities,
			provisioner,
			validator,
		}
	}

	pub fn validator(&self) -> Validator {
		self.validator
	}

	/// Register a first-time identity and create its tenant store.
	///
	/// If the tenant cannot be prepared the identity is deleted again so the
	/// caller can retry from scratch.
	#[instrument(skip(self, request, key), fields(username = %request.username, fingerprint = %key.fingerprint()))]
	pub async fn register(
		&self,
		request: RegisterRequest,
		key: &PublicKey,
	) -> Result<Identity, AccessError> {
		request.validate(&self.validator)?;

		let (identity, _) = self
			.identities
			.create_identity(&request.username, &request.email, key)
			.await?;

		if let Err(err) = self.prepare_tenant(key).await {
			tracing::warn!(error = %err, "tenant preparation failed, rolling back registration");
			if let Err(cleanup) = self.identities.delete_identity(&identity.id).await {
				tracing::error!(error = %cleanup, "failed to roll back identity");
			}
			return Err(err);
		}

		tracing::info!(identity_id = %identity.id, "identity registered");
		Ok(identity)
	}

	async fn prepare_tenant(&self, key: &PublicKey) -> Result<(), AccessError> {
		let (tenant, outcome) = self.provisioner.provision(key).await?;
		tracing::debug!(tenant = %tenant, ?outcome, "tenant store provisioned");

		let connection = self.provisioner.resolve(key).await?;
		let migrated = run_tenant_migrations(connection.pool()).await;
		connection.close().await;
		migrated?;
		Ok(())
	}

	/// True iff `key` is one of the stored keys of an active `username`.
	///
	/// An unknown username is `NotFound`; callers must treat it as a denial.
	#[instrument(skip(self, key), fields(username = %username, fingerprint = %key.fingerprint()))]
	pub async fn authenticate(&self, username: &str, key: &PublicKey) -> Result<bool, AccessError> {
		let identity = self.identity(username).await?;
		if !identity.status.can_authenticate() {
			tracing::debug!(status = %identity.status, "identity cannot authenticate");
			return Ok(false);
		}

		let keys = self.identities.list_keys_for_username(username).await?;
		Ok(keys.iter().any(|stored| stored.public_key == *key))
	}

	pub async fn identity(&self, username: &str) -> Result<Identity, AccessError> {
		self.identities
			.get_identity_by_username(username)
			.await?
			.ok_or_else(|| AccessError::Store(DbError::NotFound(format!("user '{username}'"))))
	}

	/// The key that addresses the identity's tenant: always the first registered.
	pub async fn tenant_key(&self, identity: &Identity) -> Result<PublicKey, AccessError> {
		let key = self
			.identities
			.get_registration_key(&identity.id)
			.await?
			.ok_or_else(|| {
				AccessError::Store(DbError::NotFound(format!(
					"registration key for '{}'",
					identity.username
				)))
			})?;
		Ok(key.public_key)
	}

	pub async fn tenant_id(&self, identity: &Identity) -> Result<TenantId, AccessError> {
		Ok(TenantId::derive(&self.tenant_key(identity).await?))
	}

	/// Mint a fresh credential and open this identity's tenant store.
	#[instrument(skip(self, identity), fields(username = %identity.username))]
	pub async fn open_tenant(&self, identity: &Identity) -> Result<TenantConnection, AccessError> {
		let key = self.tenant_key(identity).await?;
		Ok(self.provisioner.resolve(&key).await?)
	}

	#[instrument(skip(self, identity, key_text), fields(username = %identity.username))]
	pub async fn add_key(
		&self,
		identity: &Identity,
		key_text: &str,
	) -> Result<AuthorizedKey, AccessError> {
		let key = PublicKey::parse(key_text)?;
		// The listener only completes ed25519 handshakes.
		if !key.is_ed25519() {
			return Err(AuthError::InvalidPublicKey(format!(
				"{} keys cannot sign in, use ssh-ed25519",
				key.algorithm()
			))
			.into());
		}
		let added = self.identities.add_key(&identity.id, &key).await?;
		tracing::info!(fingerprint = %added.fingerprint(), "authorized key added");
		Ok(added)
	}

	pub async fn list_keys(&self, identity: &Identity) -> Result<Vec<AuthorizedKey>, AccessError> {
		Ok(self
			.identities
			.list_keys_for_username(&identity.username)
			.await?)
	}

	#[instrument(skip(self, identity), fields(username = %identity.username))]
	pub async fn remove_key(&self, identity: &Identity, fingerprint: &str) -> Result<(), AccessError> {
		if self.tenant_key(identity).await?.fingerprint() == fingerprint {
			return Err(AccessError::RegistrationKey);
		}
		if !self.identities.remove_key(&identity.id, fingerprint).await? {
			return Err(AccessError::Store(DbError::NotFound(format!(
				"key '{fingerprint}'"
			))));
		}
		tracing::info!(fingerprint, "authorized key removed");
		Ok(())
	}
}
