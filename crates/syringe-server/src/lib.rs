// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The syringe gateway: identity and access, session pipeline, command
//! dispatch and the tenant-scoped domain services behind it.

pub mod access;
pub mod cli;
pub mod dispatch;
pub mod error;
pub mod gateway;
pub mod services;
pub mod ssh;
pub mod validation;

pub use access::{AccessService, RegisterRequest};
pub use dispatch::{Dispatcher, InvocationContext, Output, SessionState};
pub use error::{AccessError, CommandError, ServiceError};
pub use gateway::{
	parse_command_bytes, parse_command_line, CommandLineError, Gateway, SessionOutcome,
	SessionRequest,
};
pub use validation::{Validate, ValidationError, Validator};
