// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Identity primitives for the syringe gateway.
//!
//! An [`Identity`] is a registered username. It owns one or more
//! [`AuthorizedKey`]s, and every key is held in [`PublicKey`] form: parsed
//! OpenSSH key material with a canonical text rendering (algorithm and base64
//! body, no comment). Equality and tenant addressing are both defined on that
//! canonical form.

pub mod error;
pub mod key;
pub mod types;
pub mod user;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use error::{AuthError, Result};
pub use key::PublicKey;
pub use types::{AuthorizedKey, AuthorizedKeyId, Identity, IdentityId, IdentityStatus};
pub use user::{validate_email, validate_username};
