// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use chrono::{DateTime, Utc};
use syringe_common_secret::SecretString;

use crate::tenant::TenantId;

/// A short-lived token for exactly one tenant store. Minted per session and
/// dropped with it; never persisted.
#[derive(Debug, Clone)]
pub struct ScopedCredential {
	tenant: TenantId,
	token: SecretString,
	expires_at: DateTime<Utc>,
}

impl ScopedCredential {
	pub fn new(tenant: TenantId, token: SecretString, expires_at: DateTime<Utc>) -> Self {
		Self {
			tenant,
			token,
			expires_at,
		}
	}

	pub fn tenant(&self) -> &TenantId {
		&self.tenant
	}

	pub fn token(&self) -> &SecretString {
		&self.token
	}

	pub fn expires_at(&self) -> DateTime<Utc> {
		self.expires_at
	}

	pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
		now >= self.expires_at
	}
}
