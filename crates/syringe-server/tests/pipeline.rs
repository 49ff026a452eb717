// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! End-to-end session tests: gateway, dispatch and services over a local
//! tenant platform rooted in a temp dir.

use std::path::Path;
use std::sync::Arc;

use syringe_common_secret::SecretString;
use syringe_server::{AccessService, Gateway, SessionOutcome, SessionRequest, Validator};
use syringe_server_auth::testing::{ed25519_key, ed25519_openssh};
use syringe_server_auth::PublicKey;
use syringe_server_config::{PlatformConfig, PlatformKind};
use syringe_server_db::testing::create_control_test_pool;
use syringe_server_db::IdentityRepository;
use syringe_server_provisioning::TenantProvisioner;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

struct Harness {
	gateway: Gateway,
	_dir: TempDir,
}

impl Harness {
	async fn new() -> Self {
		let dir = tempfile::tempdir().unwrap();
		let pool = create_control_test_pool().await;
		let provisioner = TenantProvisioner::from_config(&local_platform(dir.path())).unwrap();
		let access = AccessService::new(
			Arc::new(IdentityRepository::new(pool)),
			provisioner,
			Validator::default(),
		);
		Self {
			gateway: Gateway::new(Arc::new(access)),
			_dir: dir,
		}
	}

	async fn run(&self, username: &str, key: Option<PublicKey>, line: &str) -> SessionOutcome {
		let request = SessionRequest {
			username: username.to_string(),
			public_key: key,
			command: syringe_server::parse_command_line(line).unwrap(),
			peer: None,
		};
		self.gateway.run(request, CancellationToken::new()).await
	}

	async fn register(&self, username: &str, seed: u8) {
		let outcome = self
			.run(
				username,
				Some(ed25519_key(seed)),
				&format!("user register --email {username}@example.org"),
			)
			.await;
		assert_eq!(outcome.exit_status, 0, "{}", outcome.stderr_text());
	}
}

fn local_platform(dir: &Path) -> PlatformConfig {
	PlatformConfig {
		kind: PlatformKind::Local,
		api_url: "https://api.turso.tech".to_string(),
		organization: String::new(),
		group: "default".to_string(),
		api_token: None,
		token_ttl_secs: 60,
		tenant_url_template: "sqlite://{data_dir}/{tenant}.db".to_string(),
		data_dir: dir.to_path_buf(),
		signing_key: Some(SecretString::new("s".repeat(32))),
		request_timeout_secs: 2,
		max_retries: 1,
	}
}

fn denial(name: &str) -> String {
	format!("Error: unknown command \"{name}\" for \"syringe\"\nRun 'syringe --help' for usage.\n")
}

#[tokio::test]
async fn registration_creates_identity_and_authenticates_only_its_key() {
	let harness = Harness::new().await;
	let alice = Some(ed25519_key(1));

	let outcome = harness
		.run("alice", alice.clone(), "user register --email alice@example.org")
		.await;
	assert_eq!(outcome.exit_status, 0);
	assert_eq!(outcome.stdout_text(), "User 'alice' registered\n");

	let session = harness.gateway.authenticate("alice", alice.clone()).await;
	assert!(session.authenticated);
	let session = harness.gateway.authenticate("alice", Some(ed25519_key(2))).await;
	assert!(!session.authenticated);

	let outcome = harness.run("alice", alice, "user whoami").await;
	assert_eq!(outcome.exit_status, 0);
	assert!(outcome.stdout_text().contains("username: alice"));
	assert!(outcome.stdout_text().contains("email:    alice@example.org"));
}

#[tokio::test]
async fn a_taken_username_cannot_be_registered_again() {
	let harness = Harness::new().await;
	harness.register("alice", 1).await;

	let outcome = harness
		.run("alice", Some(ed25519_key(2)), "user register --email other@example.org")
		.await;
	assert_eq!(outcome.exit_status, 1);
	assert!(outcome.stderr_text().starts_with("Error: "));

	let session = harness.gateway.authenticate("alice", Some(ed25519_key(2))).await;
	assert!(!session.authenticated);
}

#[tokio::test]
async fn duplicate_project_is_a_conflict() {
	let harness = Harness::new().await;
	harness.register("alice", 1).await;
	let key = Some(ed25519_key(1));

	let outcome = harness.run("alice", key.clone(), "project add payments").await;
	assert_eq!(outcome.stdout_text(), "Project 'payments' added\n");

	let outcome = harness.run("alice", key.clone(), "project add payments").await;
	assert_eq!(outcome.exit_status, 1);
	assert!(outcome.stderr_text().starts_with("Error: "));
	assert!(outcome.stderr_text().contains("payments"));

	let outcome = harness.run("alice", key, "project list").await;
	assert_eq!(outcome.exit_status, 0);
	assert_eq!(outcome.stdout_text(), "payments\n");
}

#[tokio::test]
async fn renamed_project_no_longer_resolves_by_old_name() {
	let harness = Harness::new().await;
	harness.register("alice", 1).await;
	let key = Some(ed25519_key(1));

	harness.run("alice", key.clone(), "project add payments").await;
	let outcome = harness
		.run("alice", key.clone(), "project rename payments billing")
		.await;
	assert_eq!(outcome.stdout_text(), "Project 'payments' renamed to 'billing'\n");

	let outcome = harness.run("alice", key.clone(), "env add -p billing prod").await;
	assert_eq!(outcome.exit_status, 0);
	assert_eq!(
		outcome.stdout_text(),
		"Environment 'prod' added to project 'billing'\n"
	);

	let outcome = harness.run("alice", key, "environment list -p payments").await;
	assert_eq!(outcome.exit_status, 1);
	assert!(outcome.stderr_text().contains("not found"));
}

#[tokio::test]
async fn unauthenticated_commands_look_like_unknown_commands() {
	let harness = Harness::new().await;
	harness.register("alice", 1).await;

	let stranger = harness.run("alice", Some(ed25519_key(9)), "project list").await;
	assert_eq!(stranger.exit_status, 1);
	assert_eq!(stranger.stdout_text(), "");
	assert_eq!(stranger.stderr_text(), denial("project"));

	let nobody = harness.run("mallory", None, "project list").await;
	assert_eq!(nobody, stranger);

	let bogus = harness.run("alice", Some(ed25519_key(1)), "bogus").await;
	assert_eq!(bogus.exit_status, stranger.exit_status);
	assert_eq!(bogus.stderr_text(), denial("bogus"));
}

#[tokio::test]
async fn tenants_are_isolated() {
	let harness = Harness::new().await;
	harness.register("alice", 1).await;
	harness.register("bob", 2).await;

	harness
		.run("alice", Some(ed25519_key(1)), "project add payments")
		.await;

	let outcome = harness.run("bob", Some(ed25519_key(2)), "project list").await;
	assert_eq!(outcome.exit_status, 0);
	assert!(outcome.stdout_text().starts_with("No projects found\n"));

	// alice's key does not open bob's account
	let outcome = harness.run("bob", Some(ed25519_key(1)), "project list").await;
	assert_eq!(outcome.stderr_text(), denial("project"));
}

#[tokio::test]
async fn secrets_round_trip_through_the_session() {
	let harness = Harness::new().await;
	harness.register("alice", 1).await;
	let key = Some(ed25519_key(1));

	harness.run("alice", key.clone(), "project add api").await;
	harness.run("alice", key.clone(), "env add -p api prod").await;

	let outcome = harness
		.run(
			"alice",
			key.clone(),
			"secret set -p api -e prod DATABASE_URL 'postgres://db/app?x=1'",
		)
		.await;
	assert_eq!(outcome.stdout_text(), "Secret 'DATABASE_URL' set\n");

	let outcome = harness
		.run("alice", key.clone(), "s get -p api -e prod DATABASE_URL")
		.await;
	assert_eq!(outcome.stdout_text(), "postgres://db/app?x=1\n");

	let outcome = harness
		.run("alice", key.clone(), "secret rename -p api -e prod DATABASE_URL DB_URL")
		.await;
	assert_eq!(outcome.exit_status, 0);

	let outcome = harness.run("alice", key.clone(), "secret list -p api -e prod").await;
	assert_eq!(outcome.stdout_text(), "DB_URL=postgres://db/app?x=1\n");

	let outcome = harness
		.run("alice", key, "secret get -p api -e prod DATABASE_URL")
		.await;
	assert_eq!(outcome.exit_status, 1);
	assert!(outcome.stderr_text().contains("not found"));
}

#[tokio::test]
async fn added_keys_reach_the_registration_tenant() {
	let harness = Harness::new().await;
	harness.register("alice", 1).await;

	harness
		.run("alice", Some(ed25519_key(1)), "project add payments")
		.await;
	let outcome = harness
		.run(
			"alice",
			Some(ed25519_key(1)),
			&format!("user key add {}", ed25519_openssh(2, "desktop")),
		)
		.await;
	assert_eq!(outcome.exit_status, 0, "{}", outcome.stderr_text());

	let outcome = harness.run("alice", Some(ed25519_key(2)), "project list").await;
	assert_eq!(outcome.stdout_text(), "payments\n");

	let outcome = harness.run("alice", Some(ed25519_key(2)), "user key list").await;
	let lines: Vec<_> = outcome.stdout_text().lines().map(str::to_string).collect();
	assert_eq!(lines.len(), 2);
	assert!(lines[0].ends_with("(registration)"));
}

#[tokio::test]
async fn help_and_version_go_to_stdout() {
	let harness = Harness::new().await;

	let outcome = harness.run("alice", None, "").await;
	assert_eq!(outcome.exit_status, 0);
	assert!(outcome.stdout_text().contains("Usage"));

	let outcome = harness.run("alice", None, "--help").await;
	assert_eq!(outcome.exit_status, 0);
	assert!(outcome.stdout_text().contains("user"));
	assert_eq!(outcome.stderr_text(), "");

	let outcome = harness.run("alice", None, "--version").await;
	assert_eq!(outcome.exit_status, 0);
	assert!(outcome.stdout_text().contains(env!("CARGO_PKG_VERSION")));
}

#[tokio::test]
async fn malformed_arguments_are_usage_errors() {
	let harness = Harness::new().await;
	harness.register("alice", 1).await;

	let outcome = harness
		.run("alice", Some(ed25519_key(1)), "secret get -p api")
		.await;
	assert_eq!(outcome.exit_status, 2);
	assert_eq!(outcome.stdout_text(), "");
	assert!(!outcome.stderr_text().is_empty());
}

#[tokio::test]
async fn cancelled_sessions_fail() {
	let harness = Harness::new().await;
	let cancel = CancellationToken::new();
	cancel.cancel();

	let outcome = harness
		.gateway
		.run(
			SessionRequest {
				username: "alice".to_string(),
				public_key: Some(ed25519_key(1)),
				command: vec!["project".to_string(), "list".to_string()],
				peer: None,
			},
			cancel,
		)
		.await;
	assert_eq!(outcome.exit_status, 1);
	assert_eq!(outcome.stderr_text(), "Error: session cancelled\n");
}
