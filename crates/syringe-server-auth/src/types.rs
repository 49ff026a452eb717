// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Control-plane records: identities and their authorized keys.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::AuthError;
use crate::key::PublicKey;

macro_rules! define_id_type {
	($name:ident, $doc:expr) => {
		#[doc = $doc]
		#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
		#[serde(transparent)]
		pub struct $name(Uuid);

		impl $name {
			pub fn new(id: Uuid) -> Self {
				Self(id)
			}

			pub fn generate() -> Self {
				Self(Uuid::new_v4())
			}

			pub fn as_uuid(&self) -> &Uuid {
				&self.0
			}
		}

		impl fmt::Display for $name {
			fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
				write!(f, "{}", self.0)
			}
		}

		impl From<Uuid> for $name {
			fn from(id: Uuid) -> Self {
				Self(id)
			}
		}
	};
}

define_id_type!(IdentityId, "Unique identifier for a registered identity.");
define_id_type!(AuthorizedKeyId, "Unique identifier for an authorized public key.");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentityStatus {
	Active,
	Suspended,
}

impl IdentityStatus {
	pub fn as_str(&self) -> &'static str {
		match self {
			IdentityStatus::Active => "active",
			IdentityStatus::Suspended => "suspended",
		}
	}

	pub fn can_authenticate(&self) -> bool {
		matches!(self, IdentityStatus::Active)
	}
}

impl fmt::Display for IdentityStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for IdentityStatus {
	type Err = AuthError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"active" => Ok(IdentityStatus::Active),
			"suspended" => Ok(IdentityStatus::Suspended),
			other => Err(AuthError::UnknownStatus(other.to_string())),
		}
	}
}

/// A registered user. `username` is the SSH login name and never changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
	pub id: IdentityId,
	pub username: String,
	pub email: String,
	pub status: IdentityStatus,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AuthorizedKey {
	pub id: AuthorizedKeyId,
	pub identity_id: IdentityId,
	pub public_key: PublicKey,
	pub created_at: DateTime<Utc>,
}

impl AuthorizedKey {
	pub fn fingerprint(&self) -> String {
		self.public_key.fingerprint()
	}
}
