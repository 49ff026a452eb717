// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Tenant-store repository for environments. Every operation is scoped by
//! project name; an environment never exists without its project.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqlitePool, Row};
use uuid::Uuid;

use crate::error::{conflict_on_unique, DbError};
use crate::project::require_project_id;
use crate::row::{parse_timestamp, parse_uuid};

#[derive(Debug, Clone, PartialEq)]
pub struct Environment {
	pub id: Uuid,
	pub project_id: Uuid,
	pub name: String,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

#[async_trait]
pub trait EnvironmentStore: Send + Sync {
	async fn create_environment(&self, project: &str, name: &str) -> Result<Environment, DbError>;
	async fn list_environments(&self, project: &str) -> Result<Vec<Environment>, DbError>;
	async fn rename_environment(
		&self,
		project: &str,
		name: &str,
		new_name: &str,
	) -> Result<Environment, DbError>;
	async fn delete_environment(&self, project: &str, name: &str) -> Result<(), DbError>;
}

#[async_trait]
impl EnvironmentStore for EnvironmentRepository {
	async fn create_environment(&self, project: &str, name: &str) -> Result<Environment, DbError> {
		self.create_environment(project, name).await
	}

	async fn list_environments(&self, project: &str) -> Result<Vec<Environment>, DbError> {
		self.list_environments(project).await
	}

	async fn rename_environment(
		&self,
		project: &str,
		name: &str,
		new_name: &str,
	) -> Result<Environment, DbError> {
		self.rename_environment(project, name, new_name).await
	}

	async fn delete_environment(&self, project: &str, name: &str) -> Result<(), DbError> {
		self.delete_environment(project, name).await
	}
}

#[derive(Clone)]
pub struct EnvironmentRepository {
	pool: SqlitePool,
}

impl EnvironmentRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	/// Insert under the named project in a single statement, so a missing
	/// project can never leave an orphan behind.
	///
	/// # Errors
	/// - `DbError::NotFound` if the project does not exist
	/// - `DbError::Conflict` if the project already has an environment with this name
	#[tracing::instrument(skip(self), fields(project = %project, environment = %name))]
	pub async fn create_environment(&self, project: &str, name: &str) -> Result<Environment, DbError> {
		let id = Uuid::new_v4();
		let now = Utc::now();

		let row = sqlx::query(
			r#"
			INSERT INTO environments (id, project_id, name, created_at, updated_at)
			SELECT ?, p.id, ?, ?, ?
			FROM projects p
			WHERE p.name = ?
			RETURNING id, project_id, name, created_at, updated_at
			"#,
		)
		.bind(id.to_string())
		.bind(name)
		.bind(now.to_rfc3339())
		.bind(now.to_rfc3339())
		.bind(project)
		.fetch_optional(&self.pool)
		.await
		.map_err(|e| {
			conflict_on_unique(e, || {
				format!("environment '{name}' already exists in project '{project}'")
			})
		})?;

		match row {
			Some(row) => {
				let environment = parse_environment_row(&row)?;
				tracing::debug!(environment_id = %environment.id, "environment created");
				Ok(environment)
			}
			None => Err(DbError::NotFound(format!("project '{project}'"))),
		}
	}

	/// Environments of a project in creation order.
	#[tracing::instrument(skip(self), fields(project = %project))]
	pub async fn list_environments(&self, project: &str) -> Result<Vec<Environment>, DbError> {
		let project_id = require_project_id(&self.pool, project).await?;

		let rows = sqlx::query(
			r#"
			SELECT id, project_id, name, created_at, updated_at
			FROM environments
			WHERE project_id = ?
			ORDER BY rowid
			"#,
		)
		.bind(&project_id)
		.fetch_all(&self.pool)
		.await?;

		rows.iter().map(parse_environment_row).collect()
	}

	#[tracing::instrument(skip(self), fields(project = %project, environment = %name, new_name = %new_name))]
	pub async fn rename_environment(
		&self,
		project: &str,
		name: &str,
		new_name: &str,
	) -> Result<Environment, DbError> {
		let project_id = require_project_id(&self.pool, project).await?;

		let row = sqlx::query(
			r#"
			UPDATE environments
			SET name = ?, updated_at = ?
			WHERE project_id = ? AND name = ?
			RETURNING id, project_id, name, created_at, updated_at
			"#,
		)
		.bind(new_name)
		.bind(Utc::now().to_rfc3339())
		.bind(&project_id)
		.bind(name)
		.fetch_optional(&self.pool)
		.await
		.map_err(|e| {
			conflict_on_unique(e, || {
				format!("environment '{new_name}' already exists in project '{project}'")
			})
		})?;

		match row {
			Some(row) => parse_environment_row(&row),
			None => Err(DbError::NotFound(format!(
				"environment '{name}' in project '{project}'"
			))),
		}
	}

	#[tracing::instrument(skip(self), fields(project = %project, environment = %name))]
	pub async fn delete_environment(&self, project: &str, name: &str) -> Result<(), DbError> {
		let project_id = require_project_id(&self.pool, project).await?;

		let result = sqlx::query("DELETE FROM environments WHERE project_id = ? AND name = ?")
			.bind(&project_id)
			.bind(name)
			.execute(&self.pool)
			.await?;

		if result.rows_affected() == 0 {
			return Err(DbError::NotFound(format!(
				"environment '{name}' in project '{project}'"
			)));
		}
		Ok(())
	}
}

pub(crate) async fn require_environment_id(
	pool: &SqlitePool,
	project: &str,
	name: &str,
) -> Result<String, DbError> {
	let project_id = require_project_id(pool, project).await?;
	sqlx::query_scalar::<_, String>("SELECT id FROM environments WHERE project_id = ? AND name = ?")
		.bind(&project_id)
		.bind(name)
		.fetch_optional(pool)
		.await?
		.ok_or_else(|| DbError::NotFound(format!("environment '{name}' in project '{project}'")))
}

fn parse_environment_row(row: &sqlx::sqlite::SqliteRow) -> Result<Environment, DbError> {
	let id: String = row.get("id");
	let project_id: String = row.get("project_id");
	let created_at: String = row.get("created_at");
	let updated_at: String = row.get("updated_at");

	Ok(Environment {
		id: parse_uuid(&id, "environment id")?,
		project_id: parse_uuid(&project_id, "project_id")?,
		name: row.get("name"),
		created_at: parse_timestamp(&created_at, "created_at")?,
		updated_at: parse_timestamp(&updated_at, "updated_at")?,
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::project::ProjectRepository;
	use crate::testing::create_tenant_test_pool;

	async fn make_repos() -> (ProjectRepository, EnvironmentRepository) {
		let pool = create_tenant_test_pool().await;
		(
			ProjectRepository::new(pool.clone()),
			EnvironmentRepository::new(pool),
		)
	}

	async fn count_environments(repo: &EnvironmentRepository) -> i64 {
		sqlx::query_scalar("SELECT COUNT(*) FROM environments")
			.fetch_one(&repo.pool)
			.await
			.unwrap()
	}

	#[tokio::test]
	async fn add_to_missing_project_creates_nothing() {
		let (_, envs) = make_repos().await;
		let err = envs.create_environment("ghost", "prod").await.unwrap_err();
		assert!(matches!(err, DbError::NotFound(ref m) if m == "project 'ghost'"));
		assert_eq!(count_environments(&envs).await, 0);
	}

	#[tokio::test]
	async fn names_are_unique_per_project_only() {
		let (projects, envs) = make_repos().await;
		projects.create_project("api").await.unwrap();
		projects.create_project("web").await.unwrap();

		envs.create_environment("api", "prod").await.unwrap();
		envs.create_environment("web", "prod").await.unwrap();
		assert!(matches!(
			envs.create_environment("api", "prod").await,
			Err(DbError::Conflict(_))
		));
	}

	#[tokio::test]
	async fn project_rename_keeps_children() {
		let (projects, envs) = make_repos().await;
		let project = projects.create_project("payments").await.unwrap();
		envs.create_environment("payments", "dev").await.unwrap();

		projects.rename_project("payments", "billing").await.unwrap();
		let prod = envs.create_environment("billing", "prod").await.unwrap();
		assert_eq!(prod.project_id, project.id);

		let names: Vec<_> = envs
			.list_environments("billing")
			.await
			.unwrap()
			.into_iter()
			.map(|e| e.name)
			.collect();
		assert_eq!(names, vec!["dev", "prod"]);

		assert!(matches!(
			envs.list_environments("payments").await,
			Err(DbError::NotFound(_))
		));
	}

	#[tokio::test]
	async fn project_delete_cascades() {
		let (projects, envs) = make_repos().await;
		projects.create_project("api").await.unwrap();
		envs.create_environment("api", "dev").await.unwrap();
		envs.create_environment("api", "prod").await.unwrap();

		projects.delete_project("api").await.unwrap();
		assert_eq!(count_environments(&envs).await, 0);
	}

	#[tokio::test]
	async fn rename_and_delete() {
		let (projects, envs) = make_repos().await;
		projects.create_project("api").await.unwrap();
		let dev = envs.create_environment("api", "dev").await.unwrap();
		envs.create_environment("api", "prod").await.unwrap();

		assert!(matches!(
			envs.rename_environment("api", "dev", "prod").await,
			Err(DbError::Conflict(_))
		));
		let renamed = envs.rename_environment("api", "dev", "staging").await.unwrap();
		assert_eq!(renamed.id, dev.id);

		assert!(matches!(
			envs.rename_environment("api", "dev", "x").await,
			Err(DbError::NotFound(_))
		));

		envs.delete_environment("api", "staging").await.unwrap();
		assert!(matches!(
			envs.delete_environment("api", "staging").await,
			Err(DbError::NotFound(_))
		));
		assert!(matches!(
			envs.delete_environment("ghost", "prod").await,
			Err(DbError::NotFound(ref m)) if m == "project 'ghost'"
		));
	}
}
