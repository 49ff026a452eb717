// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Structural request validation.
//!
//! Requests implement [`Validate`]; a [`Validator`] carries the limits and
//! collects every violation before reporting, so a caller sees all bad fields
//! at once.

use std::fmt;

use syringe_server_auth::{validate_email, validate_username};

pub const MAX_NAME_LEN: usize = 256;
pub const MAX_SECRET_KEY_LEN: usize = 256;
pub const MAX_SECRET_VALUE_LEN: usize = 8192;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldViolation {
	pub field: &'static str,
	pub message: String,
}

impl fmt::Display for FieldViolation {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}: {}", self.field, self.message)
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
	pub violations: Vec<FieldViolation>,
}

impl ValidationError {
	pub fn field(&self, field: &str) -> Option<&FieldViolation> {
		self.violations.iter().find(|v| v.field == field)
	}
}

impl fmt::Display for ValidationError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		for (i, violation) in self.violations.iter().enumerate() {
			if i > 0 {
				f.write_str("; ")?;
			}
			write!(f, "{violation}")?;
		}
		Ok(())
	}
}

impl std::error::Error for ValidationError {}

pub trait Validate {
	fn validate(&self, validator: &Validator) -> Result<(), ValidationError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Validator {
	pub max_name_len: usize,
	pub max_secret_key_len: usize,
	pub max_secret_value_len: usize,
}

impl Default for Validator {
	fn default() -> Self {
		Self {
			max_name_len: MAX_NAME_LEN,
			max_secret_key_len: MAX_SECRET_KEY_LEN,
			max_secret_value_len: MAX_SECRET_VALUE_LEN,
		}
	}
}

impl Validator {
	pub fn check(&self) -> Checks<'_> {
		Checks {
			validator: self,
			violations: Vec::new(),
		}
	}
}

/// Accumulates violations for one request.
pub struct Checks<'a> {
	validator: &'a Validator,
	violations: Vec<FieldViolation>,
}

impl Checks<'_> {
	fn push(&mut self, field: &'static str, message: impl Into<String>) {
		self.violations.push(FieldViolation {
			field,
			message: message.into(),
		});
	}

	fn bounded(mut self, field: &'static str, value: &str, max: usize) -> Self {
		let len = value.chars().count();
		if value.trim().is_empty() {
			self.push(field, "is required");
		} else if len > max {
			self.push(field, format!("must be at most {max} characters"));
		}
		self
	}

	pub fn name(self, field: &'static str, value: &str) -> Self {
		let max = self.validator.max_name_len;
		self.bounded(field, value, max)
	}

	pub fn secret_key(self, field: &'static str, value: &str) -> Self {
		let max = self.validator.max_secret_key_len;
		self.bounded(field, value, max)
	}

	pub fn secret_value(mut self, field: &'static str, value: &str) -> Self {
		let max = self.validator.max_secret_value_len;
		if value.is_empty() {
			self.push(field, "is required");
		} else if value.chars().count() > max {
			self.push(field, format!("must be at most {max} characters"));
		}
		self
	}

	pub fn username(mut self, field: &'static str, value: &str) -> Self {
		if let Err(message) = validate_username(value) {
			self.push(field, message);
		}
		self
	}

	pub fn email(mut self, field: &'static str, value: &str) -> Self {
		if let Err(message) = validate_email(value) {
			self.push(field, message);
		}
		self
	}

	pub fn finish(self) -> Result<(), ValidationError> {
		if self.violations.is_empty() {
			Ok(())
		} else {
			Err(ValidationError {
				violations: self.violations,
			})
		}
	}
}
