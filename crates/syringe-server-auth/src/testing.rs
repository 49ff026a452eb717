// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Deterministic key fixtures for tests across the workspace.

use ssh_key::public::{Ed25519PublicKey, KeyData};

use crate::key::PublicKey;

/// An ed25519 public key whose 32 bytes are all `seed`.
pub fn ed25519_key(seed: u8) -> PublicKey {
	PublicKey::from_key_data(KeyData::Ed25519(Ed25519PublicKey([seed; 32])))
		.expect("fixed ed25519 key data encodes")
}

/// OpenSSH text for [`ed25519_key`], with an optional comment.
pub fn ed25519_openssh(seed: u8, comment: &str) -> String {
	let key = ed25519_key(seed);
	if comment.is_empty() {
		key.canonical().to_string()
	} else {
		format!("{} {comment}", key.canonical())
	}
}
