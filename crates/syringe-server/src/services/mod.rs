// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Tenant-scoped domain services.
//!
//! Every operation validates its request, then makes exactly one store call
//! and hands back whatever the store returned.

pub mod environment;
pub mod project;
pub mod secret;

pub use environment::{
	AddEnvironmentRequest, EnvironmentService, ListEnvironmentsRequest, RemoveEnvironmentRequest,
	RenameEnvironmentRequest,
};
pub use project::{AddProjectRequest, ProjectService, RemoveProjectRequest, RenameProjectRequest};
pub use secret::{
	GetSecretRequest, ListSecretsRequest, RemoveSecretRequest, RenameSecretRequest, SecretService,
	SetSecretRequest,
};
