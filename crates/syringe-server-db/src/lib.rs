// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Persistence for the syringe gateway.
//!
//! Two kinds of database live behind this crate, and no query ever touches both:
//!
//! - the **control plane**: one shared store of identities and authorized keys
//!   ([`IdentityRepository`])
//! - a **tenant store** per identity: projects, environments and secrets
//!   ([`ProjectRepository`], [`EnvironmentRepository`], [`SecretRepository`])
//!
//! Each repository is a thin struct over a `SqlitePool` implementing a
//! `*Store` trait, so services can be tested against substitutes:
//!
//! ```ignore
//! let projects = ProjectRepository::new(tenant_pool);
//! let project = projects.create_project("payments").await?;
//! ```
//!
//! Uniqueness violations surface as [`DbError::Conflict`]; rows addressed by
//! name that do not exist surface as [`DbError::NotFound`].

pub mod environment;
pub mod error;
pub mod identity;
pub mod pool;
pub mod project;
mod row;
pub mod secret;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use environment::{Environment, EnvironmentRepository, EnvironmentStore};
pub use error::{DbError, Result};
pub use identity::{IdentityRepository, IdentityStore};
pub use pool::{create_pool, open_tenant_pool};
pub use project::{Project, ProjectRepository, ProjectStore};
pub use secret::{SecretEntry, SecretRepository, SecretStore};

use sqlx::migrate::Migrator;
use sqlx::sqlite::SqlitePool;

static CONTROL_MIGRATOR: Migrator = sqlx::migrate!("./migrations/control");
static TENANT_MIGRATOR: Migrator = sqlx::migrate!("./migrations/tenant");

/// Bring the control-plane schema up to date.
#[tracing::instrument(skip(pool))]
pub async fn run_control_migrations(pool: &SqlitePool) -> Result<()> {
	CONTROL_MIGRATOR.run(pool).await?;
	tracing::debug!("control-plane migrations applied");
	Ok(())
}

/// Bring a tenant store's schema up to date. Safe to repeat.
#[tracing::instrument(skip(pool))]
pub async fn run_tenant_migrations(pool: &SqlitePool) -> Result<()> {
	TENANT_MIGRATOR.run(pool).await?;
	tracing::debug!("tenant migrations applied");
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::create_tenant_test_pool;

	#[tokio::test]
	async fn tenant_migrations_are_idempotent() {
		let pool = create_tenant_test_pool().await;
		run_tenant_migrations(&pool).await.unwrap();

		let tables: Vec<String> = sqlx::query_scalar(
			"SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE '\\_%' ESCAPE '\\' ORDER BY name",
		)
		.fetch_all(&pool)
		.await
		.unwrap();
		assert_eq!(tables, vec!["environments", "projects", "secrets"]);
	}

	#[tokio::test]
	async fn control_schema_has_no_tenant_tables() {
		let pool = crate::testing::create_control_test_pool().await;
		let count: i64 = sqlx::query_scalar(
			"SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN ('projects', 'environments', 'secrets')",
		)
		.fetch_one(&pool)
		.await
		.unwrap();
		assert_eq!(count, 0);
	}
}
