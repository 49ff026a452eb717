// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use syringe_server_db::{Environment, EnvironmentStore};
use tracing::instrument;

use crate::error::ServiceError;
use crate::validation::{Validate, ValidationError, Validator};

#[derive(Debug, Clone)]
pub struct AddEnvironmentRequest {
	pub project: String,
	pub name: String,
}

#[derive(Debug, Clone)]
pub struct RemoveEnvironmentRequest {
	pub project: String,
	pub name: String,
}

#[derive(Debug, Clone)]
pub struct RenameEnvironmentRequest {
	pub project: String,
	pub name: String,
	pub new_name: String,
}

#[derive(Debug, Clone)]
pub struct ListEnvironmentsRequest {
	pub project: String,
}

impl Validate for AddEnvironmentRequest {
	fn validate(&self, validator: &Validator) -> Result<(), ValidationError> {
		validator
			.check()
			.name("environment name", &self.name)
			.name("project name", &self.project)
			.finish()
	}
}

impl Validate for RemoveEnvironmentRequest {
	fn validate(&self, validator: &Validator) -> Result<(), ValidationError> {
		validator
			.check()
			.name("environment name", &self.name)
			.name("project name", &self.project)
			.finish()
	}
}

impl Validate for RenameEnvironmentRequest {
	fn validate(&self, validator: &Validator) -> Result<(), ValidationError> {
		validator
			.check()
			.name("environment name", &self.name)
			.name("new environment name", &self.new_name)
			.name("project name", &self.project)
			.finish()
	}
}

impl Validate for ListEnvironmentsRequest {
	fn validate(&self, validator: &Validator) -> Result<(), ValidationError> {
		validator.check().name("project name", &self.project).finish()
	}
}

pub struct EnvironmentService<S> {
	store: S,
	validator: Validator,
}

impl<S: EnvironmentStore> EnvironmentService<S> {
	pub fn new(store: S, validator: Validator) -> Self {
		Self { store, validator }
	}

	#[instrument(skip(self, request), fields(project = %request.project, environment = %request.name))]
	pub async fn add(&self, request: AddEnvironmentRequest) -> Result<Environment, ServiceError> {
		request.validate(&self.validator)?;
		Ok(self
			.store
			.create_environment(&request.project, &request.name)
			.await?)
	}

	#[instrument(skip(self, request), fields(project = %request.project, environment = %request.name))]
	pub async fn remove(&self, request: RemoveEnvironmentRequest) -> Result<(), ServiceError> {
		request.validate(&self.validator)?;
		Ok(self
			.store
			.delete_environment(&request.project, &request.name)
			.await?)
	}

	#[instrument(skip(self, request), fields(project = %request.project, environment = %request.name))]
	pub async fn rename(
		&self,
		request: RenameEnvironmentRequest,
	) -> Result<Environment, ServiceError> {
		request.validate(&self.validator)?;
		Ok(self
			.store
			.rename_environment(&request.project, &request.name, &request.new_name)
			.await?)
	}

	#[instrument(skip(self, request), fields(project = %request.project))]
	pub async fn list(
		&self,
		request: ListEnvironmentsRequest,
	) -> Result<Vec<Environment>, ServiceError> {
		request.validate(&self.validator)?;
		Ok(self.store.list_environments(&request.project).await?)
	}
}
