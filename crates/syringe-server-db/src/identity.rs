// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Control-plane repository for identities and their authorized keys.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{sqlite::SqlitePool, Row};
use syringe_server_auth::{
	AuthorizedKey, AuthorizedKeyId, Identity, IdentityId, IdentityStatus, PublicKey,
};

use crate::error::{conflict_on_unique, DbError};
use crate::row::{parse_timestamp, parse_uuid};

#[async_trait]
pub trait IdentityStore: Send + Sync {
	async fn create_identity(
		&self,
		username: &str,
		email: &str,
		key: &PublicKey,
	) -> Result<(Identity, AuthorizedKey), DbError>;
	async fn get_identity_by_username(&self, username: &str) -> Result<Option<Identity>, DbError>;
	async fn list_keys_for_username(&self, username: &str) -> Result<Vec<AuthorizedKey>, DbError>;
	async fn get_registration_key(
		&self,
		identity_id: &IdentityId,
	) -> Result<Option<AuthorizedKey>, DbError>;
	async fn add_key(
		&self,
		identity_id: &IdentityId,
		key: &PublicKey,
	) -> Result<AuthorizedKey, DbError>;
	async fn remove_key(&self, identity_id: &IdentityId, fingerprint: &str) -> Result<bool, DbError>;
	async fn set_status(&self, identity_id: &IdentityId, status: IdentityStatus) -> Result<bool, DbError>;
	async fn delete_identity(&self, identity_id: &IdentityId) -> Result<bool, DbError>;
}

#[async_trait]
impl IdentityStore for IdentityRepository {
	async fn create_identity(
		&self,
		username: &str,
		email: &str,
		key: &PublicKey,
	) -> Result<(Identity, AuthorizedKey), DbError> {
		self.create_identity(username, email, key).await
	}

	async fn get_identity_by_username(&self, username: &str) -> Result<Option<Identity>, DbError> {
		self.get_identity_by_username(username).await
	}

	async fn list_keys_for_username(&self, username: &str) -> Result<Vec<AuthorizedKey>, DbError> {
		self.list_keys_for_username(username).await
	}

	async fn get_registration_key(
		&self,
		identity_id: &IdentityId,
	) -> Result<Option<AuthorizedKey>, DbError> {
		self.get_registration_key(identity_id).await
	}

	async fn add_key(
		&self,
		identity_id: &IdentityId,
		key: &PublicKey,
	) -> Result<AuthorizedKey, DbError> {
		self.add_key(identity_id, key).await
	}

	async fn remove_key(&self, identity_id: &IdentityId, fingerprint: &str) -> Result<bool, DbError> {
		self.remove_key(identity_id, fingerprint).await
	}

	async fn set_status(&self, identity_id: &IdentityId, status: IdentityStatus) -> Result<bool, DbError> {
		self.set_status(identity_id, status).await
	}

	async fn delete_identity(&self, identity_id: &IdentityId) -> Result<bool, DbError> {
		self.delete_identity(identity_id).await
	}
}

/// Repository over the `identities` and `authorized_keys` tables.
#[derive(Clone)]
pub struct IdentityRepository {
	pool: SqlitePool,
}

impl IdentityRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	/// Insert an active identity together with its first key, atomically.
	///
	/// # Errors
	/// `DbError::Conflict` when the username or the key is already registered;
	/// nothing is written in that case.
	#[tracing::instrument(skip(self, email, key), fields(username = %username))]
	pub async fn create_identity(
		&self,
		username: &str,
		email: &str,
		key: &PublicKey,
	) -> Result<(Identity, AuthorizedKey), DbError> {
		let now = Utc::now();
		let identity = Identity {
			id: IdentityId::generate(),
			username: username.to_string(),
			email: email.to_string(),
			status: IdentityStatus::Active,
			created_at: now,
			updated_at: now,
		};
		let authorized = AuthorizedKey {
			id: AuthorizedKeyId::generate(),
			identity_id: identity.id,
			public_key: key.clone(),
			created_at: now,
		};

		let mut tx = self.pool.begin().await?;

		sqlx::query(
			r#"
			INSERT INTO identities (id, username, email, status, created_at, updated_at)
			VALUES (?, ?, ?, ?, ?, ?)
			"#,
		)
		.bind(identity.id.to_string())
		.bind(&identity.username)
		.bind(&identity.email)
		.bind(identity.status.as_str())
		.bind(now.to_rfc3339())
		.bind(now.to_rfc3339())
		.execute(&mut *tx)
		.await
		.map_err(|e| conflict_on_unique(e, || format!("username '{username}' is already registered")))?;

		insert_key(&mut tx, &authorized).await?;

		tx.commit().await?;

		tracing::info!(identity_id = %identity.id, fingerprint = %key.fingerprint(), "identity created");
		Ok((identity, authorized))
	}

	#[tracing::instrument(skip(self), fields(username = %username))]
	pub async fn get_identity_by_username(&self, username: &str) -> Result<Option<Identity>, DbError> {
		let row = sqlx::query(
			r#"
			SELECT id, username, email, status, created_at, updated_at
			FROM identities
			WHERE username = ?
			"#,
		)
		.bind(username)
		.fetch_optional(&self.pool)
		.await?;

		row.as_ref().map(parse_identity_row).transpose()
	}

	/// All keys for a username, oldest first. Empty when the username is unknown.
	#[tracing::instrument(skip(self), fields(username = %username))]
	pub async fn list_keys_for_username(&self, username: &str) -> Result<Vec<AuthorizedKey>, DbError> {
		let rows = sqlx::query(
			r#"
			SELECT k.id, k.identity_id, k.key_material, k.created_at
			FROM authorized_keys k
			JOIN identities i ON i.id = k.identity_id
			WHERE i.username = ?
			ORDER BY k.rowid
			"#,
		)
		.bind(username)
		.fetch_all(&self.pool)
		.await?;

		let keys = rows
			.iter()
			.map(parse_key_row)
			.collect::<Result<Vec<_>, _>>()?;
		tracing::debug!(count = keys.len(), "listed authorized keys");
		Ok(keys)
	}

	/// The first key ever registered for the identity; it addresses the tenant store.
	#[tracing::instrument(skip(self), fields(identity_id = %identity_id))]
	pub async fn get_registration_key(
		&self,
		identity_id: &IdentityId,
	) -> Result<Option<AuthorizedKey>, DbError> {
		let row = sqlx::query(
			r#"
			SELECT id, identity_id, key_material, created_at
			FROM authorized_keys
			WHERE identity_id = ?
			ORDER BY rowid
			LIMIT 1
			"#,
		)
		.bind(identity_id.to_string())
		.fetch_optional(&self.pool)
		.await?;

		row.as_ref().map(parse_key_row).transpose()
	}

	#[tracing::instrument(skip(self, key), fields(identity_id = %identity_id))]
	pub async fn add_key(
		&self,
		identity_id: &IdentityId,
		key: &PublicKey,
	) -> Result<AuthorizedKey, DbError> {
		let authorized = AuthorizedKey {
			id: AuthorizedKeyId::generate(),
			identity_id: *identity_id,
			public_key: key.clone(),
			created_at: Utc::now(),
		};

		let mut tx = self.pool.begin().await?;
		insert_key(&mut tx, &authorized).await?;
		tx.commit().await?;

		tracing::info!(key_id = %authorized.id, fingerprint = %key.fingerprint(), "authorized key added");
		Ok(authorized)
	}

	#[tracing::instrument(skip(self), fields(identity_id = %identity_id))]
	pub async fn remove_key(&self, identity_id: &IdentityId, fingerprint: &str) -> Result<bool, DbError> {
		let result = sqlx::query(
			r#"
			DELETE FROM authorized_keys
			WHERE identity_id = ? AND fingerprint = ?
			"#,
		)
		.bind(identity_id.to_string())
		.bind(fingerprint)
		.execute(&self.pool)
		.await?;

		let removed = result.rows_affected() > 0;
		if removed {
			tracing::info!(fingerprint = %fingerprint, "authorized key removed");
		}
		Ok(removed)
	}

	#[tracing::instrument(skip(self), fields(identity_id = %identity_id, status = %status))]
	pub async fn set_status(&self, identity_id: &IdentityId, status: IdentityStatus) -> Result<bool, DbError> {
		let result = sqlx::query("UPDATE identities SET status = ?, updated_at = ? WHERE id = ?")
			.bind(status.as_str())
			.bind(Utc::now().to_rfc3339())
			.bind(identity_id.to_string())
			.execute(&self.pool)
			.await?;
		Ok(result.rows_affected() > 0)
	}

	/// Delete an identity; its keys go with it through the foreign key cascade.
	#[tracing::instrument(skip(self), fields(identity_id = %identity_id))]
	pub async fn delete_identity(&self, identity_id: &IdentityId) -> Result<bool, DbError> {
		let result = sqlx::query("DELETE FROM identities WHERE id = ?")
			.bind(identity_id.to_string())
			.execute(&self.pool)
			.await?;

		let deleted = result.rows_affected() > 0;
		if deleted {
			tracing::info!("identity deleted");
		}
		Ok(deleted)
	}
}

async fn insert_key(
	tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
	key: &AuthorizedKey,
) -> Result<(), DbError> {
	sqlx::query(
		r#"
		INSERT INTO authorized_keys (id, identity_id, key_material, fingerprint, created_at)
		VALUES (?, ?, ?, ?, ?)
		"#,
	)
	.bind(key.id.to_string())
	.bind(key.identity_id.to_string())
	.bind(key.public_key.canonical())
	.bind(key.fingerprint())
	.bind(key.created_at.to_rfc3339())
	.execute(&mut **tx)
	.await
	.map_err(|e| conflict_on_unique(e, || "public key is already registered".to_string()))?;
	Ok(())
}

fn parse_identity_row(row: &sqlx::sqlite::SqliteRow) -> Result<Identity, DbError> {
	let id: String = row.get("id");
	let status: String = row.get("status");
	let created_at: String = row.get("created_at");
	let updated_at: String = row.get("updated_at");

	Ok(Identity {
		id: IdentityId::new(parse_uuid(&id, "identity id")?),
		username: row.get("username"),
		email: row.get("email"),
		status: status
			.parse()
			.map_err(|e: syringe_server_auth::AuthError| DbError::Internal(e.to_string()))?,
		created_at: parse_timestamp(&created_at, "created_at")?,
		updated_at: parse_timestamp(&updated_at, "updated_at")?,
	})
}

fn parse_key_row(row: &sqlx::sqlite::SqliteRow) -> Result<AuthorizedKey, DbError> {
	let id: String = row.get("id");
	let identity_id: String = row.get("identity_id");
	let key_material: String = row.get("key_material");
	let created_at: String = row.get("created_at");

	Ok(AuthorizedKey {
		id: AuthorizedKeyId::new(parse_uuid(&id, "authorized key id")?),
		identity_id: IdentityId::new(parse_uuid(&identity_id, "identity_id")?),
		public_key: PublicKey::parse(&key_material)
			.map_err(|e| DbError::Internal(format!("Stored key is unreadable: {e}")))?,
		created_at: parse_timestamp(&created_at, "created_at")?,
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::create_control_test_pool;
	use syringe_server_auth::testing::ed25519_key;

	async fn make_repo() -> IdentityRepository {
		IdentityRepository::new(create_control_test_pool().await)
	}

	#[tokio::test]
	async fn create_then_lookup() {
		let repo = make_repo().await;
		let (identity, key) = repo
			.create_identity("alice", "alice@example.com", &ed25519_key(1))
			.await
			.unwrap();

		assert_eq!(identity.status, IdentityStatus::Active);
		assert_eq!(key.identity_id, identity.id);

		let found = repo.get_identity_by_username("alice").await.unwrap().unwrap();
		assert_eq!(found.id, identity.id);
		assert_eq!(found.email, "alice@example.com");
		assert!(repo.get_identity_by_username("bob").await.unwrap().is_none());
	}

	#[tokio::test]
	async fn duplicate_username_conflicts_and_writes_nothing() {
		let repo = make_repo().await;
		repo.create_identity("alice", "alice@example.com", &ed25519_key(1))
			.await
			.unwrap();

		let err = repo
			.create_identity("alice", "other@example.com", &ed25519_key(2))
			.await
			.unwrap_err();
		assert!(matches!(err, DbError::Conflict(_)));

		let keys = repo.list_keys_for_username("alice").await.unwrap();
		assert_eq!(keys.len(), 1);
		assert_eq!(keys[0].public_key, ed25519_key(1));
	}

	#[tokio::test]
	async fn key_can_belong_to_one_identity_only() {
		let repo = make_repo().await;
		repo.create_identity("alice", "alice@example.com", &ed25519_key(1))
			.await
			.unwrap();

		let err = repo
			.create_identity("mallory", "m@example.com", &ed25519_key(1))
			.await
			.unwrap_err();
		assert!(matches!(err, DbError::Conflict(_)));
		// The identity insert was rolled back with the key insert.
		assert!(repo.get_identity_by_username("mallory").await.unwrap().is_none());
	}

	#[tokio::test]
	async fn registration_key_stays_first() {
		let repo = make_repo().await;
		let (identity, _) = repo
			.create_identity("alice", "alice@example.com", &ed25519_key(1))
			.await
			.unwrap();
		repo.add_key(&identity.id, &ed25519_key(2)).await.unwrap();
		repo.add_key(&identity.id, &ed25519_key(3)).await.unwrap();

		let first = repo.get_registration_key(&identity.id).await.unwrap().unwrap();
		assert_eq!(first.public_key, ed25519_key(1));

		let keys = repo.list_keys_for_username("alice").await.unwrap();
		let material: Vec<_> = keys.iter().map(|k| k.public_key.clone()).collect();
		assert_eq!(material, vec![ed25519_key(1), ed25519_key(2), ed25519_key(3)]);
	}

	#[tokio::test]
	async fn remove_key_by_fingerprint() {
		let repo = make_repo().await;
		let (identity, _) = repo
			.create_identity("alice", "alice@example.com", &ed25519_key(1))
			.await
			.unwrap();
		let extra = repo.add_key(&identity.id, &ed25519_key(2)).await.unwrap();

		assert!(repo.remove_key(&identity.id, &extra.fingerprint()).await.unwrap());
		assert!(!repo.remove_key(&identity.id, &extra.fingerprint()).await.unwrap());
		assert_eq!(repo.list_keys_for_username("alice").await.unwrap().len(), 1);
	}

	#[tokio::test]
	async fn delete_identity_cascades_to_keys() {
		let repo = make_repo().await;
		let (identity, _) = repo
			.create_identity("alice", "alice@example.com", &ed25519_key(1))
			.await
			.unwrap();

		assert!(repo.delete_identity(&identity.id).await.unwrap());
		assert!(repo.get_registration_key(&identity.id).await.unwrap().is_none());

		// The key is free to be registered again.
		repo.create_identity("alice", "alice@example.com", &ed25519_key(1))
			.await
			.unwrap();
	}

	#[tokio::test]
	async fn suspend_identity() {
		let repo = make_repo().await;
		let (identity, _) = repo
			.create_identity("alice", "alice@example.com", &ed25519_key(1))
			.await
			.unwrap();

		assert!(repo.set_status(&identity.id, IdentityStatus::Suspended).await.unwrap());
		let found = repo.get_identity_by_username("alice").await.unwrap().unwrap();
		assert_eq!(found.status, IdentityStatus::Suspended);
	}
}
