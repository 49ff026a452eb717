// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
	#[error("invalid public key: {0}")]
	InvalidPublicKey(String),

	#[error("unknown identity status: {0}")]
	UnknownStatus(String),
}

pub type Result<T> = std::result::Result<T, AuthError>;
