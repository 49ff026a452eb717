// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{
	SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};

use crate::error::DbError;

/// Open the shared control-plane pool (WAL, created on first use).
///
/// The pool is shared by every session: reads on authentication, writes on
/// registration and key management.
#[tracing::instrument(skip(database_url))]
pub async fn create_pool(database_url: &str) -> Result<SqlitePool, DbError> {
	let options = SqliteConnectOptions::from_str(database_url)
		.map_err(|e| DbError::Internal(format!("Invalid database URL: {e}")))?
		.journal_mode(SqliteJournalMode::Wal)
		.synchronous(SqliteSynchronous::Normal)
		.foreign_keys(true)
		.create_if_missing(true);

	let pool = SqlitePool::connect_with(options).await?;

	tracing::debug!("control-plane pool created");
	Ok(pool)
}

/// Open a small pool for one session's tenant store.
///
/// `create` is only set while provisioning; resolving an existing tenant must
/// never conjure an empty database.
#[tracing::instrument(skip(tenant_url))]
pub async fn open_tenant_pool(
	tenant_url: &str,
	create: bool,
	acquire_timeout: Duration,
) -> Result<SqlitePool, DbError> {
	let options = SqliteConnectOptions::from_str(tenant_url)
		.map_err(|e| DbError::Internal(format!("Invalid tenant URL: {e}")))?
		.journal_mode(SqliteJournalMode::Wal)
		.synchronous(SqliteSynchronous::Normal)
		.foreign_keys(true)
		.busy_timeout(acquire_timeout)
		.create_if_missing(create);

	let pool = SqlitePoolOptions::new()
		.max_connections(2)
		.acquire_timeout(acquire_timeout)
		.connect_with(options)
		.await?;

	Ok(pool)
}
