// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Tenant-store repository for projects.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqlitePool, Row};
use uuid::Uuid;

use crate::error::{conflict_on_unique, DbError};
use crate::row::{parse_timestamp, parse_uuid};

#[derive(Debug, Clone, PartialEq)]
pub struct Project {
	pub id: Uuid,
	pub name: String,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

#[async_trait]
pub trait ProjectStore: Send + Sync {
	async fn create_project(&self, name: &str) -> Result<Project, DbError>;
	async fn get_project_by_name(&self, name: &str) -> Result<Option<Project>, DbError>;
	async fn list_projects(&self) -> Result<Vec<Project>, DbError>;
	async fn rename_project(&self, name: &str, new_name: &str) -> Result<Project, DbError>;
	async fn delete_project(&self, name: &str) -> Result<(), DbError>;
}

#[async_trait]
impl ProjectStore for ProjectRepository {
	async fn create_project(&self, name: &str) -> Result<Project, DbError> {
		self.create_project(name).await
	}

	async fn get_project_by_name(&self, name: &str) -> Result<Option<Project>, DbError> {
		self.get_project_by_name(name).await
	}

	async fn list_projects(&self) -> Result<Vec<Project>, DbError> {
		self.list_projects().await
	}

	async fn rename_project(&self, name: &str, new_name: &str) -> Result<Project, DbError> {
		self.rename_project(name, new_name).await
	}

	async fn delete_project(&self, name: &str) -> Result<(), DbError> {
		self.delete_project(name).await
	}
}

#[derive(Clone)]
pub struct ProjectRepository {
	pool: SqlitePool,
}

impl ProjectRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	/// # Errors
	/// `DbError::Conflict` if a project with this name exists.
	#[tracing::instrument(skip(self), fields(project = %name))]
	pub async fn create_project(&self, name: &str) -> Result<Project, DbError> {
		let now = Utc::now();
		let project = Project {
			id: Uuid::new_v4(),
			name: name.to_string(),
			created_at: now,
			updated_at: now,
		};

		sqlx::query(
			r#"
			INSERT INTO projects (id, name, created_at, updated_at)
			VALUES (?, ?, ?, ?)
			"#,
		)
		.bind(project.id.to_string())
		.bind(&project.name)
		.bind(now.to_rfc3339())
		.bind(now.to_rfc3339())
		.execute(&self.pool)
		.await
		.map_err(|e| conflict_on_unique(e, || format!("project '{name}' already exists")))?;

		tracing::debug!(project_id = %project.id, "project created");
		Ok(project)
	}

	#[tracing::instrument(skip(self), fields(project = %name))]
	pub async fn get_project_by_name(&self, name: &str) -> Result<Option<Project>, DbError> {
		let row = sqlx::query(
			r#"
			SELECT id, name, created_at, updated_at
			FROM projects
			WHERE name = ?
			"#,
		)
		.bind(name)
		.fetch_optional(&self.pool)
		.await?;

		row.as_ref().map(parse_project_row).transpose()
	}

	/// Projects in creation order.
	#[tracing::instrument(skip(self))]
	pub async fn list_projects(&self) -> Result<Vec<Project>, DbError> {
		let rows = sqlx::query(
			r#"
			SELECT id, name, created_at, updated_at
			FROM projects
			ORDER BY rowid
			"#,
		)
		.fetch_all(&self.pool)
		.await?;

		rows.iter().map(parse_project_row).collect()
	}

	/// Rename in place; the id and every child environment are untouched.
	#[tracing::instrument(skip(self), fields(project = %name, new_name = %new_name))]
	pub async fn rename_project(&self, name: &str, new_name: &str) -> Result<Project, DbError> {
		let row = sqlx::query(
			r#"
			UPDATE projects
			SET name = ?, updated_at = ?
			WHERE name = ?
			RETURNING id, name, created_at, updated_at
			"#,
		)
		.bind(new_name)
		.bind(Utc::now().to_rfc3339())
		.bind(name)
		.fetch_optional(&self.pool)
		.await
		.map_err(|e| conflict_on_unique(e, || format!("project '{new_name}' already exists")))?;

		match row {
			Some(row) => parse_project_row(&row),
			None => Err(DbError::NotFound(format!("project '{name}'"))),
		}
	}

	/// Environments and secrets below the project are removed by cascade.
	#[tracing::instrument(skip(self), fields(project = %name))]
	pub async fn delete_project(&self, name: &str) -> Result<(), DbError> {
		let result = sqlx::query("DELETE FROM projects WHERE name = ?")
			.bind(name)
			.execute(&self.pool)
			.await?;

		if result.rows_affected() == 0 {
			return Err(DbError::NotFound(format!("project '{name}'")));
		}
		tracing::debug!("project deleted");
		Ok(())
	}
}

pub(crate) async fn require_project_id(pool: &SqlitePool, name: &str) -> Result<String, DbError> {
	sqlx::query_scalar::<_, String>("SELECT id FROM projects WHERE name = ?")
		.bind(name)
		.fetch_optional(pool)
		.await?
		.ok_or_else(|| DbError::NotFound(format!("project '{name}'")))
}

fn parse_project_row(row: &sqlx::sqlite::SqliteRow) -> Result<Project, DbError> {
	let id: String = row.get("id");
	let created_at: String = row.get("created_at");
	let updated_at: String = row.get("updated_at");

	Ok(Project {
		id: parse_uuid(&id, "project id")?,
		name: row.get("name"),
		created_at: parse_timestamp(&created_at, "created_at")?,
		updated_at: parse_timestamp(&updated_at, "updated_at")?,
	})
}
