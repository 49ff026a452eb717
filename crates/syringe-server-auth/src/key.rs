// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Canonical SSH public keys.
//!
//! Keys arrive as OpenSSH authorized-keys text (`ssh-ed25519 AAAA... comment`),
//! either typed by a user or rendered from the transport handshake. The
//! canonical form drops the comment and any surrounding whitespace, so two
//! renderings of the same key material compare and hash identically.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use ssh_key::public::KeyData;
use ssh_key::HashAlg;

use crate::error::{AuthError, Result};

#[derive(Clone)]
pub struct PublicKey {
	inner: ssh_key::PublicKey,
	canonical: String,
}

impl PublicKey {
	/// Parse OpenSSH public key text. The comment, if any, is discarded.
	pub fn parse(text: &str) -> Result<Self> {
		let text = text.trim();
		if text.is_empty() {
			return Err(AuthError::InvalidPublicKey("key is empty".to_string()));
		}
		let parsed = ssh_key::PublicKey::from_openssh(text)
			.map_err(|e| AuthError::InvalidPublicKey(e.to_string()))?;
		Self::from_key_data(parsed.key_data().clone())
	}

	pub fn from_key_data(key_data: KeyData) -> Result<Self> {
		let inner = ssh_key::PublicKey::new(key_data, "");
		let canonical = inner
			.to_openssh()
			.map_err(|e| AuthError::InvalidPublicKey(e.to_string()))?
			.trim_end()
			.to_string();
		Ok(Self { inner, canonical })
	}

	/// `<algorithm> <base64>`; the input to tenant derivation and the stored form.
	pub fn canonical(&self) -> &str {
		&self.canonical
	}

	pub fn algorithm(&self) -> String {
		self.inner.algorithm().as_str().to_string()
	}

	pub fn is_ed25519(&self) -> bool {
		matches!(self.inner.key_data(), KeyData::Ed25519(_))
	}

	/// OpenSSH style `SHA256:...` fingerprint.
	pub fn fingerprint(&self) -> String {
		self.inner.fingerprint(HashAlg::Sha256).to_string()
	}
}

impl PartialEq for PublicKey {
	fn eq(&self, other: &Self) -> bool {
		self.inner.key_data() == other.inner.key_data()
	}
}

impl Eq for PublicKey {}

impl Hash for PublicKey {
	fn hash<H: Hasher>(&self, state: &mut H) {
		self.canonical.hash(state);
	}
}

impl FromStr for PublicKey {
	type Err = AuthError;

	fn from_str(s: &str) -> Result<Self> {
		Self::parse(s)
	}
}

impl fmt::Display for PublicKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.canonical)
	}
}

impl fmt::Debug for PublicKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_tuple("PublicKey").field(&self.fingerprint()).finish()
	}
}
