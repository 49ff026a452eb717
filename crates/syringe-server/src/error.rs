// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use syringe_server_auth::AuthError;
use syringe_server_db::DbError;
use syringe_server_provisioning::ProvisioningError;

use crate::validation::ValidationError;

/// Domain service failures. Store errors pass through untouched.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
	#[error(transparent)]
	Validation(#[from] ValidationError),

	#[error(transparent)]
	Store(#[from] DbError),
}

#[derive(Debug, thiserror::Error)]
pub enum AccessError {
	#[error(transparent)]
	Validation(#[from] ValidationError),

	#[error(transparent)]
	Store(#[from] DbError),

	#[error(transparent)]
	Provisioning(#[from] ProvisioningError),

	#[error(transparent)]
	InvalidKey(#[from] AuthError),

	#[error("the registration key addresses your tenant and cannot be removed")]
	RegistrationKey,
}

/// Everything that can end a command invocation.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
	#[error("unknown command \"{0}\" for \"syringe\"")]
	UnknownCommand(String),

	/// Rendered exactly like [`CommandError::UnknownCommand`].
	#[error("unknown command \"{0}\" for \"syringe\"")]
	Unauthorized(String),

	#[error("registration requires an ed25519 public key on this session")]
	MissingKey,

	#[error(transparent)]
	Service(#[from] ServiceError),

	#[error(transparent)]
	Access(#[from] AccessError),

	#[error(transparent)]
	Provisioning(#[from] ProvisioningError),
}

impl CommandError {
	pub fn is_denial(&self) -> bool {
		matches!(
			self,
			CommandError::UnknownCommand(_) | CommandError::Unauthorized(_)
		)
	}

	/// Message written to the session's error stream.
	pub fn user_message(&self) -> String {
		match self {
			CommandError::UnknownCommand(_) | CommandError::Unauthorized(_) => {
				format!("{self}\nRun 'syringe --help' for usage.")
			}
			CommandError::Service(ServiceError::Store(err))
			| CommandError::Access(AccessError::Store(err)) => store_message(err),
			CommandError::Provisioning(_) | CommandError::Access(AccessError::Provisioning(_)) => {
				"your secrets store is unavailable right now, try again shortly".to_string()
			}
			other => other.to_string(),
		}
	}
}

fn store_message(err: &DbError) -> String {
	match err {
		DbError::NotFound(what) => format!("{what} not found"),
		DbError::Conflict(message) => message.clone(),
		_ => "internal error, try again shortly".to_string(),
	}
}
