// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Structural rules for registration fields.

use regex::Regex;
use std::sync::LazyLock;

pub const USERNAME_MIN_LEN: usize = 3;
pub const USERNAME_MAX_LEN: usize = 30;
pub const EMAIL_MAX_LEN: usize = 256;

static EMAIL_REGEX: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@.]+(\.[^\s@.]+)+$").unwrap());

/// Usernames are SSH login names: 3-30 ASCII letters, digits, `_` or `-`,
/// starting with a letter or digit and not purely numeric.
pub fn validate_username(username: &str) -> Result<(), &'static str> {
	if username.is_empty() {
		return Err("is required");
	}
	if username.len() < USERNAME_MIN_LEN {
		return Err("must be at least 3 characters");
	}
	if username.len() > USERNAME_MAX_LEN {
		return Err("must be at most 30 characters");
	}
	if !username
		.chars()
		.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
	{
		return Err("can only contain letters, numbers, underscores and hyphens");
	}
	if !username.starts_with(|c: char| c.is_ascii_alphanumeric()) {
		return Err("must start with a letter or number");
	}
	if username.chars().all(|c| c.is_ascii_digit()) {
		return Err("cannot be all numbers");
	}
	Ok(())
}

pub fn validate_email(email: &str) -> Result<(), &'static str> {
	if email.is_empty() {
		return Err("is required");
	}
	if email.len() > EMAIL_MAX_LEN {
		return Err("must be at most 256 characters");
	}
	if !EMAIL_REGEX.is_match(email) {
		return Err("must be a valid email address");
	}
	Ok(())
}
