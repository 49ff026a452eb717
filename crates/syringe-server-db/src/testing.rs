// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! In-memory pools with the real migrations applied.

use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

use crate::{run_control_migrations, run_tenant_migrations};

async fn memory_pool() -> SqlitePool {
	let options = SqliteConnectOptions::from_str(":memory:")
		.unwrap()
		.foreign_keys(true);

	SqlitePoolOptions::new()
		.max_connections(1)
		.connect_with(options)
		.await
		.expect("Failed to create test pool")
}

pub async fn create_control_test_pool() -> SqlitePool {
	let pool = memory_pool().await;
	run_control_migrations(&pool).await.unwrap();
	pool
}

pub async fn create_tenant_test_pool() -> SqlitePool {
	let pool = memory_pool().await;
	run_tenant_migrations(&pool).await.unwrap();
	pool
}
