// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use syringe_common_secret::SecretString;
use syringe_server_db::{SecretEntry, SecretStore};
use tracing::instrument;

use crate::error::ServiceError;
use crate::validation::{Checks, Validate, ValidationError, Validator};

#[derive(Debug, Clone)]
pub struct SetSecretRequest {
	pub project: String,
	pub environment: String,
	pub key: String,
	pub value: SecretString,
}

#[derive(Debug, Clone)]
pub struct GetSecretRequest {
	pub project: String,
	pub environment: String,
	pub key: String,
}

#[derive(Debug, Clone)]
pub struct RemoveSecretRequest {
	pub project: String,
	pub environment: String,
	pub key: String,
}

#[derive(Debug, Clone)]
pub struct RenameSecretRequest {
	pub project: String,
	pub environment: String,
	pub key: String,
	pub new_key: String,
}

#[derive(Debug, Clone)]
pub struct ListSecretsRequest {
	pub project: String,
	pub environment: String,
}

fn scope<'a>(validator: &'a Validator, project: &str, environment: &str) -> Checks<'a> {
	validator
		.check()
		.name("project name", project)
		.name("environment name", environment)
}

impl Validate for SetSecretRequest {
	fn validate(&self, validator: &Validator) -> Result<(), ValidationError> {
		scope(validator, &self.project, &self.environment)
			.secret_key("secret key", &self.key)
			.secret_value("secret value", self.value.expose())
			.finish()
	}
}

impl Validate for GetSecretRequest {
	fn validate(&self, validator: &Validator) -> Result<(), ValidationError> {
		scope(validator, &self.project, &self.environment)
			.secret_key("secret key", &self.key)
			.finish()
	}
}

impl Validate for RemoveSecretRequest {
	fn validate(&self, validator: &Validator) -> Result<(), ValidationError> {
		scope(validator, &self.project, &self.environment)
			.secret_key("secret key", &self.key)
			.finish()
	}
}

impl Validate for RenameSecretRequest {
	fn validate(&self, validator: &Validator) -> Result<(), ValidationError> {
		scope(validator, &self.project, &self.environment)
			.secret_key("secret key", &self.key)
			.secret_key("new secret key", &self.new_key)
			.finish()
	}
}

impl Validate for ListSecretsRequest {
	fn validate(&self, validator: &Validator) -> Result<(), ValidationError> {
		scope(validator, &self.project, &self.environment).finish()
	}
}

pub struct SecretService<S> {
	store: S,
	validator: Validator,
}

impl<S: SecretStore> SecretService<S> {
	pub fn new(store: S, validator: Validator) -> Self {
		Self { store, validator }
	}

	#[instrument(skip(self, request), fields(project = %request.project, environment = %request.environment, key = %request.key))]
	pub async fn set(&self, request: SetSecretRequest) -> Result<SecretEntry, ServiceError> {
		request.validate(&self.validator)?;
		Ok(self
			.store
			.set_secret(
				&request.project,
				&request.environment,
				&request.key,
				&request.value,
			)
			.await?)
	}

	#[instrument(skip(self, request), fields(project = %request.project, environment = %request.environment, key = %request.key))]
	pub async fn get(&self, request: GetSecretRequest) -> Result<SecretEntry, ServiceError> {
		request.validate(&self.validator)?;
		Ok(self
			.store
			.get_secret(&request.project, &request.environment, &request.key)
			.await?)
	}

	#[instrument(skip(self, request), fields(project = %request.project, environment = %request.environment, key = %request.key))]
	pub async fn remove(&self, request: RemoveSecretRequest) -> Result<(), ServiceError> {
		request.validate(&self.validator)?;
		Ok(self
			.store
			.delete_secret(&request.project, &request.environment, &request.key)
			.await?)
	}

	#[instrument(skip(self, request), fields(project = %request.project, environment = %request.environment, key = %request.key))]
	pub async fn rename(&self, request: RenameSecretRequest) -> Result<SecretEntry, ServiceError> {
		request.validate(&self.validator)?;
		Ok(self
			.store
			.rename_secret(
				&request.project,
				&request.environment,
				&request.key,
				&request.new_key,
			)
			.await?)
	}

	#[instrument(skip(self, request), fields(project = %request.project, environment = %request.environment))]
	pub async fn list(&self, request: ListSecretsRequest) -> Result<Vec<SecretEntry>, ServiceError> {
		request.validate(&self.validator)?;
		Ok(self
			.store
			.list_secrets(&request.project, &request.environment)
			.await?)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use syringe_server_db::testing::create_tenant_test_pool;
	use syringe_server_db::{DbError, EnvironmentRepository, ProjectRepository, SecretRepository};

	async fn service() -> SecretService<SecretRepository> {
		let pool = create_tenant_test_pool().await;
		ProjectRepository::new(pool.clone())
			.create_project("api")
			.await
			.unwrap();
		EnvironmentRepository::new(pool.clone())
			.create_environment("api", "dev")
			.await
			.unwrap();
		SecretService::new(SecretRepository::new(pool), Validator::default())
	}

	fn set(key: &str, value: &str) -> SetSecretRequest {
		SetSecretRequest {
			project: "api".to_string(),
			environment: "dev".to_string(),
			key: key.to_string(),
			value: SecretString::new(value.to_string()),
		}
	}

	fn list() -> ListSecretsRequest {
		ListSecretsRequest {
			project: "api".to_string(),
			environment: "dev".to_string(),
		}
	}

	#[tokio::test]
	async fn set_then_get() {
		let service = service().await;
		service.set(set("DATABASE_URL", "postgres://x")).await.unwrap();
		service.set(set("DATABASE_URL", "postgres://y")).await.unwrap();

		let entry = service
			.get(GetSecretRequest {
				project: "api".to_string(),
				environment: "dev".to_string(),
				key: "DATABASE_URL".to_string(),
			})
			.await
			.unwrap();
		assert_eq!(entry.value.expose(), "postgres://y");
		assert_eq!(service.list(list()).await.unwrap().len(), 1);
	}

	#[tokio::test]
	async fn empty_value_is_rejected() {
		let service = service().await;
		let err = service.set(set("KEY", "")).await.unwrap_err();
		match err {
			ServiceError::Validation(v) => assert!(v.field("secret value").is_some()),
			other => panic!("unexpected error: {other:?}"),
		}
	}

	#[tokio::test]
	async fn rename_onto_existing_key_conflicts() {
		let service = service().await;
		service.set(set("A", "1")).await.unwrap();
		service.set(set("B", "2")).await.unwrap();

		let err = service
			.rename(RenameSecretRequest {
				project: "api".to_string(),
				environment: "dev".to_string(),
				key: "A".to_string(),
				new_key: "B".to_string(),
			})
			.await
			.unwrap_err();
		assert!(matches!(err, ServiceError::Store(DbError::Conflict(_))));
	}

	#[tokio::test]
	async fn remove_then_list_empty() {
		let service = service().await;
		service.set(set("A", "1")).await.unwrap();
		service
			.remove(RemoveSecretRequest {
				project: "api".to_string(),
				environment: "dev".to_string(),
				key: "A".to_string(),
			})
			.await
			.unwrap();
		assert!(service.list(list()).await.unwrap().is_empty());
	}
}
