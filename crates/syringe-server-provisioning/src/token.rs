// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! HMAC-signed tenant tokens for the local platform.
//!
//! Format: `<tenant>.<expires_unix>.<nonce_hex>.<signature_hex>`, where the
//! signature is HMAC-SHA256 over the first three segments.

use chrono::{DateTime, TimeZone, Utc};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
use syringe_common_secret::{SecretBytes, SecretString};

use crate::error::PlatformError;
use crate::tenant::TenantId;

type HmacSha256 = Hmac<Sha256>;

const NONCE_BYTES: usize = 16;

/// Claims recovered from a verified token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenClaims {
	pub tenant: String,
	pub expires_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct TokenSigner {
	key: SecretBytes,
}

impl std::fmt::Debug for TokenSigner {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("TokenSigner").finish_non_exhaustive()
	}
}

impl TokenSigner {
	pub fn new(key: &SecretString) -> Self {
		Self {
			key: key.to_bytes(),
		}
	}

	fn mac(&self) -> Result<HmacSha256, PlatformError> {
		HmacSha256::new_from_slice(self.key.expose())
			.map_err(|e| PlatformError::Signing(e.to_string()))
	}

	pub fn mint(
		&self,
		tenant: &TenantId,
		expires_at: DateTime<Utc>,
	) -> Result<SecretString, PlatformError> {
		let mut nonce = [0u8; NONCE_BYTES];
		rand::thread_rng().fill_bytes(&mut nonce);
		let payload = format!(
			"{}.{}.{}",
			tenant.as_str(),
			expires_at.timestamp(),
			hex::encode(nonce)
		);

		let mut mac = self.mac()?;
		mac.update(payload.as_bytes());
		let signature = hex::encode(mac.finalize().into_bytes());

		Ok(SecretString::new(format!("{payload}.{signature}")))
	}

	/// Check the signature and decode the claims. Expiry is left to the caller.
	pub fn verify(&self, token: &str) -> Option<TokenClaims> {
		let (payload, signature) = token.rsplit_once('.')?;
		let signature = hex::decode(signature).ok()?;

		let mut mac = self.mac().ok()?;
		mac.update(payload.as_bytes());
		mac.verify_slice(&signature).ok()?;

		let mut parts = payload.splitn(3, '.');
		let tenant = parts.next()?.to_string();
		let expires: i64 = parts.next()?.parse().ok()?;
		parts.next()?;
		let expires_at = Utc.timestamp_opt(expires, 0).single()?;

		Some(TokenClaims { tenant, expires_at })
	}
}
