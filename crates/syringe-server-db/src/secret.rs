// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Tenant-store repository for secrets, scoped by project and environment.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqlitePool, Row};
use syringe_common_secret::SecretString;
use uuid::Uuid;

use crate::environment::require_environment_id;
use crate::error::{conflict_on_unique, DbError};
use crate::row::{parse_timestamp, parse_uuid};

#[derive(Debug, Clone, PartialEq)]
pub struct SecretEntry {
	pub id: Uuid,
	pub environment_id: Uuid,
	pub key: String,
	pub value: SecretString,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

#[async_trait]
pub trait SecretStore: Send + Sync {
	async fn set_secret(
		&self,
		project: &str,
		environment: &str,
		key: &str,
		value: &SecretString,
	) -> Result<SecretEntry, DbError>;
	async fn get_secret(
		&self,
		project: &str,
		environment: &str,
		key: &str,
	) -> Result<SecretEntry, DbError>;
	async fn list_secrets(&self, project: &str, environment: &str) -> Result<Vec<SecretEntry>, DbError>;
	async fn rename_secret(
		&self,
		project: &str,
		environment: &str,
		key: &str,
		new_key: &str,
	) -> Result<SecretEntry, DbError>;
	async fn delete_secret(&self, project: &str, environment: &str, key: &str) -> Result<(), DbError>;
}

#[async_trait]
impl SecretStore for SecretRepository {
	async fn set_secret(
		&self,
		project: &str,
		environment: &str,
		key: &str,
		value: &SecretString,
	) -> Result<SecretEntry, DbError> {
		self.set_secret(project, environment, key, value).await
	}

	async fn get_secret(
		&self,
		project: &str,
		environment: &str,
		key: &str,
	) -> Result<SecretEntry, DbError> {
		self.get_secret(project, environment, key).await
	}

	async fn list_secrets(&self, project: &str, environment: &str) -> Result<Vec<SecretEntry>, DbError> {
		self.list_secrets(project, environment).await
	}

	async fn rename_secret(
		&self,
		project: &str,
		environment: &str,
		key: &str,
		new_key: &str,
	) -> Result<SecretEntry, DbError> {
		self.rename_secret(project, environment, key, new_key).await
	}

	async fn delete_secret(&self, project: &str, environment: &str, key: &str) -> Result<(), DbError> {
		self.delete_secret(project, environment, key).await
	}
}

/// Values are stored as given; they are only wrapped in [`SecretString`] in
/// memory so they stay out of logs.
#[derive(Clone)]
pub struct SecretRepository {
	pool: SqlitePool,
}

impl SecretRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	/// Insert or overwrite `key` in the environment.
	#[tracing::instrument(skip(self, value), fields(project = %project, environment = %environment, key = %key))]
	pub async fn set_secret(
		&self,
		project: &str,
		environment: &str,
		key: &str,
		value: &SecretString,
	) -> Result<SecretEntry, DbError> {
		let environment_id = require_environment_id(&self.pool, project, environment).await?;
		let now = Utc::now().to_rfc3339();

		let row = sqlx::query(
			r#"
			INSERT INTO secrets (id, environment_id, key, value, created_at, updated_at)
			VALUES (?, ?, ?, ?, ?, ?)
			ON CONFLICT (environment_id, key)
			DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
			RETURNING id, environment_id, key, value, created_at, updated_at
			"#,
		)
		.bind(Uuid::new_v4().to_string())
		.bind(&environment_id)
		.bind(key)
		.bind(value.expose())
		.bind(&now)
		.bind(&now)
		.fetch_one(&self.pool)
		.await?;

		parse_secret_row(&row)
	}

	#[tracing::instrument(skip(self), fields(project = %project, environment = %environment, key = %key))]
	pub async fn get_secret(
		&self,
		project: &str,
		environment: &str,
		key: &str,
	) -> Result<SecretEntry, DbError> {
		let environment_id = require_environment_id(&self.pool, project, environment).await?;

		let row = sqlx::query(
			r#"
			SELECT id, environment_id, key, value, created_at, updated_at
			FROM secrets
			WHERE environment_id = ? AND key = ?
			"#,
		)
		.bind(&environment_id)
		.bind(key)
		.fetch_optional(&self.pool)
		.await?;

		match row {
			Some(row) => parse_secret_row(&row),
			None => Err(not_found(key, environment)),
		}
	}

	/// Secrets of an environment in insertion order.
	#[tracing::instrument(skip(self), fields(project = %project, environment = %environment))]
	pub async fn list_secrets(&self, project: &str, environment: &str) -> Result<Vec<SecretEntry>, DbError> {
		let environment_id = require_environment_id(&self.pool, project, environment).await?;

		let rows = sqlx::query(
			r#"
			SELECT id, environment_id, key, value, created_at, updated_at
			FROM secrets
			WHERE environment_id = ?
			ORDER BY rowid
			"#,
		)
		.bind(&environment_id)
		.fetch_all(&self.pool)
		.await?;

		rows.iter().map(parse_secret_row).collect()
	}

	#[tracing::instrument(skip(self), fields(project = %project, environment = %environment, key = %key, new_key = %new_key))]
	pub async fn rename_secret(
		&self,
		project: &str,
		environment: &str,
		key: &str,
		new_key: &str,
	) -> Result<SecretEntry, DbError> {
		let environment_id = require_environment_id(&self.pool, project, environment).await?;

		let row = sqlx::query(
			r#"
			UPDATE secrets
			SET key = ?, updated_at = ?
			WHERE environment_id = ? AND key = ?
			RETURNING id, environment_id, key, value, created_at, updated_at
			"#,
		)
		.bind(new_key)
		.bind(Utc::now().to_rfc3339())
		.bind(&environment_id)
		.bind(key)
		.fetch_optional(&self.pool)
		.await
		.map_err(|e| {
			conflict_on_unique(e, || {
				format!("secret '{new_key}' already exists in environment '{environment}'")
			})
		})?;

		match row {
			Some(row) => parse_secret_row(&row),
			None => Err(not_found(key, environment)),
		}
	}

	#[tracing::instrument(skip(self), fields(project = %project, environment = %environment, key = %key))]
	pub async fn delete_secret(&self, project: &str, environment: &str, key: &str) -> Result<(), DbError> {
		let environment_id = require_environment_id(&self.pool, project, environment).await?;

		let result = sqlx::query("DELETE FROM secrets WHERE environment_id = ? AND key = ?")
			.bind(&environment_id)
			.bind(key)
			.execute(&self.pool)
			.await?;

		if result.rows_affected() == 0 {
			return Err(not_found(key, environment));
		}
		Ok(())
	}
}

fn not_found(key: &str, environment: &str) -> DbError {
	DbError::NotFound(format!("secret '{key}' in environment '{environment}'"))
}

fn parse_secret_row(row: &sqlx::sqlite::SqliteRow) -> Result<SecretEntry, DbError> {
	let id: String = row.get("id");
	let environment_id: String = row.get("environment_id");
	let created_at: String = row.get("created_at");
	let updated_at: String = row.get("updated_at");

	Ok(SecretEntry {
		id: parse_uuid(&id, "secret id")?,
		environment_id: parse_uuid(&environment_id, "environment_id")?,
		key: row.get("key"),
		value: SecretString::new(row.get("value")),
		created_at: parse_timestamp(&created_at, "created_at")?,
		updated_at: parse_timestamp(&updated_at, "updated_at")?,
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::environment::EnvironmentRepository;
	use crate::project::ProjectRepository;
	use crate::testing::create_tenant_test_pool;

	fn value(v: &str) -> SecretString {
		SecretString::new(v.to_string())
	}

	async fn make_repo() -> (ProjectRepository, SecretRepository) {
		let pool = create_tenant_test_pool().await;
		let projects = ProjectRepository::new(pool.clone());
		projects.create_project("api").await.unwrap();
		EnvironmentRepository::new(pool.clone())
			.create_environment("api", "dev")
			.await
			.unwrap();
		(projects, SecretRepository::new(pool))
	}

	#[tokio::test]
	async fn set_is_an_upsert() {
		let (_, repo) = make_repo().await;
		let first = repo
			.set_secret("api", "dev", "DATABASE_URL", &value("postgres://a"))
			.await
			.unwrap();
		let second = repo
			.set_secret("api", "dev", "DATABASE_URL", &value("postgres://b"))
			.await
			.unwrap();

		assert_eq!(first.id, second.id);
		let fetched = repo.get_secret("api", "dev", "DATABASE_URL").await.unwrap();
		assert_eq!(fetched.value.expose(), "postgres://b");
	}

	#[tokio::test]
	async fn scope_must_exist() {
		let (_, repo) = make_repo().await;
		assert!(matches!(
			repo.set_secret("api", "prod", "K", &value("v")).await,
			Err(DbError::NotFound(ref m)) if m == "environment 'prod' in project 'api'"
		));
		assert!(matches!(
			repo.list_secrets("web", "dev").await,
			Err(DbError::NotFound(ref m)) if m == "project 'web'"
		));
	}

	#[tokio::test]
	async fn list_rename_delete() {
		let (_, repo) = make_repo().await;
		repo.set_secret("api", "dev", "B", &value("2")).await.unwrap();
		repo.set_secret("api", "dev", "A", &value("1")).await.unwrap();

		let keys: Vec<_> = repo
			.list_secrets("api", "dev")
			.await
			.unwrap()
			.into_iter()
			.map(|s| s.key)
			.collect();
		assert_eq!(keys, vec!["B", "A"]);

		assert!(matches!(
			repo.rename_secret("api", "dev", "B", "A").await,
			Err(DbError::Conflict(_))
		));
		let renamed = repo.rename_secret("api", "dev", "B", "C").await.unwrap();
		assert_eq!(renamed.value.expose(), "2");

		repo.delete_secret("api", "dev", "C").await.unwrap();
		assert!(matches!(
			repo.get_secret("api", "dev", "C").await,
			Err(DbError::NotFound(_))
		));
		assert!(matches!(
			repo.delete_secret("api", "dev", "C").await,
			Err(DbError::NotFound(_))
		));
	}

	#[tokio::test]
	async fn project_delete_cascades_to_secrets() {
		let (projects, repo) = make_repo().await;
		repo.set_secret("api", "dev", "K", &value("v")).await.unwrap();

		projects.delete_project("api").await.unwrap();
		let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM secrets")
			.fetch_one(&repo.pool)
			.await
			.unwrap();
		assert_eq!(remaining, 0);
	}
}
