// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use syringe_common_secret::SecretString;
use syringe_server_config::PlatformConfig;
use tracing::instrument;

use super::retry::{retry, RetryConfig};
use super::{DatabaseInfo, DatabasePlatform};
use crate::error::PlatformError;
use crate::tenant::TenantId;

const USER_AGENT: &str = concat!("syringe/", env!("CARGO_PKG_VERSION"));

#[derive(Deserialize)]
struct ListResponse {
	databases: Vec<DatabaseInfo>,
}

#[derive(Deserialize)]
struct CreateResponse {
	database: DatabaseInfo,
}

#[derive(Deserialize)]
struct TokenResponse {
	jwt: String,
}

/// Hosted platform reached over its REST API.
pub struct HttpPlatform {
	client: Client,
	api_url: String,
	organization: String,
	group: String,
	api_token: SecretString,
	retry: RetryConfig,
}

impl std::fmt::Debug for HttpPlatform {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("HttpPlatform")
			.field("api_url", &self.api_url)
			.field("organization", &self.organization)
			.field("group", &self.group)
			.finish_non_exhaustive()
	}
}

impl HttpPlatform {
	pub fn from_config(config: &PlatformConfig) -> Result<Self, PlatformError> {
		let api_token = config
			.api_token
			.clone()
			.ok_or_else(|| PlatformError::Misconfigured("platform api token is not set".into()))?;

		let client = Client::builder()
			.user_agent(USER_AGENT)
			.timeout(config.request_timeout())
			.build()?;

		Ok(Self {
			client,
			api_url: config.api_url.clone(),
			organization: config.organization.clone(),
			group: config.group.clone(),
			api_token,
			retry: RetryConfig {
				max_attempts: config.max_retries.max(1),
				..RetryConfig::default()
			},
		})
	}

	pub fn with_retry(mut self, retry: RetryConfig) -> Self {
		self.retry = retry;
		self
	}

	fn databases_url(&self) -> String {
		format!(
			"{}/v1/organizations/{}/databases",
			self.api_url, self.organization
		)
	}
}

async fn check(response: Response) -> Result<Response, PlatformError> {
	let status = response.status();
	if status.is_success() {
		return Ok(response);
	}
	let message = response.text().await.unwrap_or_default();
	Err(PlatformError::Status {
		status: status.as_u16(),
		message,
	})
}

#[async_trait]
impl DatabasePlatform for HttpPlatform {
	#[instrument(skip(self), fields(organization = %self.organization))]
	async fn list_databases(&self) -> Result<Vec<DatabaseInfo>, PlatformError> {
		let url = self.databases_url();
		let (client, url, bearer) = (&self.client, url.as_str(), self.api_token.expose());
		let body: ListResponse = retry(&self.retry, || async move {
			let response = client
				.get(url)
				.bearer_auth(bearer)
				.send()
				.await?;
			let response = check(response).await?;
			response
				.json::<ListResponse>()
				.await
				.map_err(|e| PlatformError::Decode(e.to_string()))
		})
		.await?;
		Ok(body.databases)
	}

	/// Attempted once. Only reads go through [`retry`].
	#[instrument(skip(self), fields(tenant = %tenant))]
	async fn create_database(&self, tenant: &TenantId) -> Result<DatabaseInfo, PlatformError> {
		let response = self
			.client
			.post(self.databases_url())
			.bearer_auth(self.api_token.expose())
			.json(&json!({ "name": tenant.as_str(), "group": self.group }))
			.send()
			.await?;
		if response.status() == StatusCode::CONFLICT {
			return Err(PlatformError::AlreadyExists(tenant.to_string()));
		}
		let created = check(response)
			.await?
			.json::<CreateResponse>()
			.await
			.map_err(|e| PlatformError::Decode(e.to_string()))?;

		tracing::info!(tenant = %tenant, "tenant database created");
		Ok(created.database)
	}

	#[instrument(skip(self), fields(tenant = %tenant, ttl_secs = ttl.as_secs()))]
	async fn create_token(
		&self,
		tenant: &TenantId,
		ttl: Duration,
	) -> Result<SecretString, PlatformError> {
		let url = format!(
			"{}/{}/auth/tokens?expiration={}s&authorization=full-access",
			self.databases_url(),
			tenant,
			ttl.as_secs()
		);

		let response = self
			.client
			.post(url)
			.bearer_auth(self.api_token.expose())
			.send()
			.await?;
		let token = check(response)
			.await?
			.json::<TokenResponse>()
			.await
			.map_err(|e| PlatformError::Decode(e.to_string()))?;

		if token.jwt.is_empty() {
			return Err(PlatformError::Decode("empty token".into()));
		}
		Ok(SecretString::new(token.jwt))
	}
}
