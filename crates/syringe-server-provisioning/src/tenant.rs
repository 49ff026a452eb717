// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Tenant identifiers and addresses.
//!
//! A tenant id is a pure function of canonical key material. It never looks at
//! usernames or emails, so nothing about an identity row can move a tenant.

use std::fmt;
use std::path::Path;

use sha2::{Digest, Sha256};
use syringe_server_auth::PublicKey;

/// Hex characters kept from the SHA-256 digest (160 bits). Short enough that
/// `<tenant>-<org>` still fits a single DNS label.
pub const TENANT_ID_LEN: usize = 40;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TenantId(String);

impl TenantId {
	pub fn derive(key: &PublicKey) -> Self {
		let digest = Sha256::digest(key.canonical().as_bytes());
		let mut id = hex::encode(digest);
		id.truncate(TENANT_ID_LEN);
		Self(id)
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for TenantId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

/// Where a tenant store lives. Carries no credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantAddress {
	pub tenant: TenantId,
	pub url: String,
}

/// Renders tenant addresses from the configured URL template.
#[derive(Debug, Clone)]
pub struct TenantAddressing {
	template: String,
	organization: String,
	data_dir: String,
}

impl TenantAddressing {
	pub fn new(template: impl Into<String>, organization: impl Into<String>, data_dir: &Path) -> Self {
		Self {
			template: template.into(),
			organization: organization.into(),
			data_dir: data_dir.display().to_string().trim_end_matches('/').to_string(),
		}
	}

	pub fn address_for(&self, tenant: &TenantId) -> TenantAddress {
		let url = self
			.template
			.replace("{tenant}", tenant.as_str())
			.replace("{org}", &self.organization)
			.replace("{data_dir}", &self.data_dir);
		TenantAddress {
			tenant: tenant.clone(),
			url,
		}
	}
}
