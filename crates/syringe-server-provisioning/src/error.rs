// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use syringe_server_db::DbError;

use crate::tenant::TenantId;

/// Failures talking to the database platform.
#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
	#[error("platform request failed: {0}")]
	Http(#[from] reqwest::Error),

	#[error("platform returned {status}: {message}")]
	Status { status: u16, message: String },

	#[error("database '{0}' already exists")]
	AlreadyExists(String),

	#[error("unexpected platform response: {0}")]
	Decode(String),

	#[error("tenant storage error: {0}")]
	Storage(String),

	#[error("platform misconfigured: {0}")]
	Misconfigured(String),

	#[error("token signing failed: {0}")]
	Signing(String),
}

/// Failures opening or probing a tenant store.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
	#[error("credential rejected: {0}")]
	Rejected(String),

	#[error("unsupported tenant address '{0}'")]
	UnsupportedAddress(String),

	#[error("failed to open tenant store: {0}")]
	Open(#[source] DbError),

	#[error("tenant store failed liveness probe: {0}")]
	Probe(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ProvisioningError {
	#[error("failed to issue credential for tenant {tenant}: {source}")]
	TokenIssuance {
		tenant: TenantId,
		#[source]
		source: PlatformError,
	},

	#[error("failed to provision tenant store: {0}")]
	Platform(#[source] PlatformError),

	#[error(transparent)]
	Connection(#[from] ConnectionError),
}

pub type Result<T> = std::result::Result<T, ProvisioningError>;
