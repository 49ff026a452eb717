// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use syringe_server_db::{Project, ProjectStore};
use tracing::instrument;

use crate::error::ServiceError;
use crate::validation::{Validate, ValidationError, Validator};

#[derive(Debug, Clone)]
pub struct AddProjectRequest {
	pub name: String,
}

#[derive(Debug, Clone)]
pub struct RemoveProjectRequest {
	pub name: String,
}

#[derive(Debug, Clone)]
pub struct RenameProjectRequest {
	pub name: String,
	pub new_name: String,
}

impl Validate for AddProjectRequest {
	fn validate(&self, validator: &Validator) -> Result<(), ValidationError> {
		validator.check().name("project name", &self.name).finish()
	}
}

impl Validate for RemoveProjectRequest {
	fn validate(&self, validator: &Validator) -> Result<(), ValidationError> {
		validator.check().name("project name", &self.name).finish()
	}
}

impl Validate for RenameProjectRequest {
	fn validate(&self, validator: &Validator) -> Result<(), ValidationError> {
		validator
			.check()
			.name("project name", &self.name)
			.name("new project name", &self.new_name)
			.finish()
	}
}

pub struct ProjectService<S> {
	store: S,
	validator: Validator,
}

impl<S: ProjectStore> ProjectService<S> {
	pub fn new(store: S, validator: Validator) -> Self {
		Self { store, validator }
	}

	#[instrument(skip(self, request), fields(project = %request.name))]
	pub async fn add(&self, request: AddProjectRequest) -> Result<Project, ServiceError> {
		request.validate(&self.validator)?;
		Ok(self.store.create_project(&request.name).await?)
	}

	#[instrument(skip(self, request), fields(project = %request.name))]
	pub async fn remove(&self, request: RemoveProjectRequest) -> Result<(), ServiceError> {
		request.validate(&self.validator)?;
		Ok(self.store.delete_project(&request.name).await?)
	}

	#[instrument(skip(self, request), fields(project = %request.name, new_name = %request.new_name))]
	pub async fn rename(&self, request: RenameProjectRequest) -> Result<Project, ServiceError> {
		request.validate(&self.validator)?;
		Ok(self
			.store
			.rename_project(&request.name, &request.new_name)
			.await?)
	}

	#[instrument(skip(self))]
	pub async fn list(&self) -> Result<Vec<Project>, ServiceError> {
		Ok(self.store.list_projects().await?)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use async_trait::async_trait;
	use std::sync::atomic::{AtomicUsize, Ordering};
	use syringe_server_db::testing::create_tenant_test_pool;
	use syringe_server_db::{DbError, ProjectRepository};

	async fn service() -> ProjectService<ProjectRepository> {
		let pool = create_tenant_test_pool().await;
		ProjectService::new(ProjectRepository::new(pool), Validator::default())
	}

	fn add(name: &str) -> AddProjectRequest {
		AddProjectRequest {
			name: name.to_string(),
		}
	}

	fn rename(name: &str, new_name: &str) -> RenameProjectRequest {
		RenameProjectRequest {
			name: name.to_string(),
			new_name: new_name.to_string(),
		}
	}

	/// Counts store calls so validation failures can be shown to skip the store.
	#[derive(Default)]
	struct CountingStore {
		calls: AtomicUsize,
	}

	#[async_trait]
	impl ProjectStore for CountingStore {
		async fn create_project(&self, _name: &str) -> Result<Project, DbError> {
			self.calls.fetch_add(1, Ordering::SeqCst);
			Err(DbError::Internal("unused".into()))
		}
		async fn get_project_by_name(&self, _name: &str) -> Result<Option<Project>, DbError> {
			self.calls.fetch_add(1, Ordering::SeqCst);
			Ok(None)
		}
		async fn list_projects(&self) -> Result<Vec<Project>, DbError> {
			self.calls.fetch_add(1, Ordering::SeqCst);
			Ok(Vec::new())
		}
		async fn rename_project(&self, _name: &str, _new_name: &str) -> Result<Project, DbError> {
			self.calls.fetch_add(1, Ordering::SeqCst);
			Err(DbError::Internal("unused".into()))
		}
		async fn delete_project(&self, _name: &str) -> Result<(), DbError> {
			self.calls.fetch_add(1, Ordering::SeqCst);
			Ok(())
		}
	}

	#[tokio::test]
	async fn invalid_request_never_reaches_the_store() {
		let service = ProjectService::new(CountingStore::default(), Validator::default());

		let err = service.add(add("")).await.unwrap_err();
		assert!(matches!(err, ServiceError::Validation(_)));
		let err = service.rename(rename("a", "")).await.unwrap_err();
		assert!(matches!(err, ServiceError::Validation(_)));

		assert_eq!(service.store.calls.load(Ordering::SeqCst), 0);
	}

	#[tokio::test]
	async fn duplicate_add_is_a_conflict() {
		let service = service().await;
		service.add(add("payments")).await.unwrap();

		let err = service.add(add("payments")).await.unwrap_err();
		assert!(matches!(err, ServiceError::Store(DbError::Conflict(_))));

		let names: Vec<String> = service
			.list()
			.await
			.unwrap()
			.into_iter()
			.map(|p| p.name)
			.collect();
		assert_eq!(names, vec!["payments"]);
	}

	#[tokio::test]
	async fn rename_round_trip_is_lossless() {
		let service = service().await;
		service.add(add("a")).await.unwrap();
		service.add(add("other")).await.unwrap();
		let before = service.list().await.unwrap();

		service.rename(rename("a", "b")).await.unwrap();
		service.rename(rename("b", "a")).await.unwrap();

		let after = service.list().await.unwrap();
		assert_eq!(
			before.iter().map(|p| (p.id, &p.name)).collect::<Vec<_>>(),
			after.iter().map(|p| (p.id, &p.name)).collect::<Vec<_>>()
		);
	}

	#[tokio::test]
	async fn rename_onto_existing_name_conflicts() {
		let service = service().await;
		service.add(add("a")).await.unwrap();
		service.add(add("b")).await.unwrap();

		let err = service.rename(rename("a", "b")).await.unwrap_err();
		assert!(matches!(err, ServiceError::Store(DbError::Conflict(_))));
	}

	#[tokio::test]
	async fn remove_missing_is_not_found() {
		let service = service().await;
		let err = service
			.remove(RemoveProjectRequest {
				name: "ghost".to_string(),
			})
			.await
			.unwrap_err();
		assert!(matches!(err, ServiceError::Store(DbError::NotFound(_))));
	}
}
