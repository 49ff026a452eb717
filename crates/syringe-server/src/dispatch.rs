// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Parses a session's argument vector and routes it to a service.

use std::fmt::{self, Write as _};

use clap::error::{ContextKind, ContextValue, ErrorKind};
use clap::{CommandFactory, Parser};
use syringe_common_secret::SecretString;
use syringe_server_auth::{Identity, PublicKey};
use syringe_server_db::{EnvironmentRepository, ProjectRepository, SecretRepository};
use syringe_server_provisioning::TenantConnection;

use crate::access::{AccessService, RegisterRequest};
use crate::cli::{
	Cli, EnvironmentCommand, KeyCommand, Noun, ProjectCommand, PublicCli, PublicNoun,
	PublicUserCommand, SecretCommand, UserCommand,
};
use crate::error::CommandError;
use crate::services::{
	AddEnvironmentRequest, AddProjectRequest, EnvironmentService, GetSecretRequest,
	ListEnvironmentsRequest, ListSecretsRequest, ProjectService, RemoveEnvironmentRequest,
	RemoveProjectRequest, RemoveSecretRequest, RenameEnvironmentRequest, RenameProjectRequest,
	RenameSecretRequest, SecretService, SetSecretRequest,
};
use crate::validation::Validator;

pub const EXIT_SUCCESS: u32 = 0;
pub const EXIT_FAILURE: u32 = 1;
pub const EXIT_USAGE: u32 = 2;

/// Per-connection authentication result. Lives only as long as the session.
#[derive(Debug, Clone)]
pub struct SessionState {
	pub username: String,
	pub public_key: Option<PublicKey>,
	pub authenticated: bool,
}

/// Buffered stdout and stderr for one invocation.
#[derive(Debug, Default)]
pub struct Output {
	stdout: String,
	stderr: String,
}

impl Output {
	pub fn line(&mut self, text: impl fmt::Display) {
		let _ = writeln!(self.stdout, "{text}");
	}

	pub fn error_line(&mut self, text: impl fmt::Display) {
		let _ = writeln!(self.stderr, "{text}");
	}

	fn raw(&mut self, text: &str, to_stderr: bool) {
		let target = if to_stderr {
			&mut self.stderr
		} else {
			&mut self.stdout
		};
		target.push_str(text);
		if !text.ends_with('\n') {
			target.push('\n');
		}
	}

	pub fn stdout(&self) -> &str {
		&self.stdout
	}

	pub fn stderr(&self) -> &str {
		&self.stderr
	}

	pub fn into_parts(self) -> (String, String) {
		(self.stdout, self.stderr)
	}
}

/// Everything a tenant-scoped command may touch, built fresh per invocation
/// and handed to the service by value.
pub struct InvocationContext {
	pub identity: Identity,
	pub tenant: TenantConnection,
	pub validator: Validator,
}

impl InvocationContext {
	fn projects(&self) -> ProjectService<ProjectRepository> {
		ProjectService::new(
			ProjectRepository::new(self.tenant.pool().clone()),
			self.validator,
		)
	}

	fn environments(&self) -> EnvironmentService<EnvironmentRepository> {
		EnvironmentService::new(
			EnvironmentRepository::new(self.tenant.pool().clone()),
			self.validator,
		)
	}

	fn secrets(&self) -> SecretService<SecretRepository> {
		SecretService::new(
			SecretRepository::new(self.tenant.pool().clone()),
			self.validator,
		)
	}

	pub async fn close(self) {
		self.tenant.close().await;
	}
}

pub struct Dispatcher<'a> {
	access: &'a AccessService,
}

impl<'a> Dispatcher<'a> {
	pub fn new(access: &'a AccessService) -> Self {
		Self { access }
	}

	/// Run one invocation and return its exit status.
	pub async fn dispatch(&self, session: &SessionState, args: &[String], out: &mut Output) -> u32 {
		if args.is_empty() {
			let help = if session.authenticated {
				Cli::command().render_help()
			} else {
				PublicCli::command().render_help()
			};
			out.raw(&help.to_string(), false);
			return EXIT_SUCCESS;
		}

		let result = if session.authenticated {
			match Cli::try_parse_from(args) {
				Ok(cli) => self.run(session, cli.command, out).await,
				Err(err) => return parse_failure(err, session, out),
			}
		} else {
			match PublicCli::try_parse_from(args) {
				Ok(cli) => self.run_public(session, cli.command, out).await,
				Err(err) => return parse_failure(err, session, out),
			}
		};

		match result {
			Ok(()) => EXIT_SUCCESS,
			Err(err) => {
				if err.is_denial() {
					tracing::debug!(error = %err, "command denied");
				} else {
					tracing::warn!(error = %err, "command failed");
				}
				out.error_line(format_args!("Error: {}", err.user_message()));
				EXIT_FAILURE
			}
		}
	}

	async fn run_public(
		&self,
		session: &SessionState,
		noun: PublicNoun,
		out: &mut Output,
	) -> Result<(), CommandError> {
		match noun {
			PublicNoun::User {
				command: PublicUserCommand::Register(args),
			} => self.register(session, args.email, out).await,
		}
	}

	async fn run(
		&self,
		session: &SessionState,
		noun: Noun,
		out: &mut Output,
	) -> Result<(), CommandError> {
		if !session.authenticated {
			return Err(CommandError::Unauthorized(noun_name(&noun).to_string()));
		}
		let identity = self.access.identity(&session.username).await?;

		match noun {
			Noun::User { command } => self.user(session, identity, command, out).await,
			Noun::Project { command } => {
				let context = self.invocation(identity).await?;
				let result = project(&context, command, out).await;
				context.close().await;
				result
			}
			Noun::Environment { command } => {
				let context = self.invocation(identity).await?;
				let result = environment(&context, command, out).await;
				context.close().await;
				result
			}
			Noun::Secret { command } => {
				let context = self.invocation(identity).await?;
				let result = secret(&context, command, out).await;
				context.close().await;
				result
			}
		}
	}

	async fn invocation(&self, identity: Identity) -> Result<InvocationContext, CommandError> {
		let tenant = self.access.open_tenant(&identity).await?;
		Ok(InvocationContext {
			identity,
			tenant,
			validator: self.access.validator(),
		})
	}

	async fn register(
		&self,
		session: &SessionState,
		email: String,
		out: &mut Output,
	) -> Result<(), CommandError> {
		let key = session.public_key.as_ref().ok_or(CommandError::MissingKey)?;
		let identity = self
			.access
			.register(
				RegisterRequest {
					username: session.username.clone(),
					email,
				},
				key,
			)
			.await?;
		out.line(format_args!("User '{}' registered", identity.username));
		Ok(())
	}

	async fn user(
		&self,
		session: &SessionState,
		identity: Identity,
		command: UserCommand,
		out: &mut Output,
	) -> Result<(), CommandError> {
		match command {
			UserCommand::Register(args) => self.register(session, args.email, out).await,
			UserCommand::Whoami => {
				let tenant = self.access.tenant_id(&identity).await?;
				out.line(format_args!("username: {}", identity.username));
				out.line(format_args!("email:    {}", identity.email));
				out.line(format_args!("status:   {}", identity.status));
				out.line(format_args!("tenant:   {tenant}"));
				Ok(())
			}
			UserCommand::Key { command } => match command {
				KeyCommand::Add { key } => {
					let added = self.access.add_key(&identity, &key.join(" ")).await?;
					out.line(format_args!("Key '{}' added", added.fingerprint()));
					Ok(())
				}
				KeyCommand::Remove { fingerprint } => {
					self.access.remove_key(&identity, &fingerprint).await?;
					out.line(format_args!("Key '{fingerprint}' removed"));
					Ok(())
				}
				KeyCommand::List => {
					let keys = self.access.list_keys(&identity).await?;
					for (i, key) in keys.iter().enumerate() {
						let marker = if i == 0 { " (registration)" } else { "" };
						out.line(format_args!(
							"{} {}{marker}",
							key.fingerprint(),
							key.public_key.algorithm()
						));
					}
					Ok(())
				}
			},
		}
	}
}

async fn project(
	context: &InvocationContext,
	command: ProjectCommand,
	out: &mut Output,
) -> Result<(), CommandError> {
	let service = context.projects();
	match command {
		ProjectCommand::Add { name } => {
			let project = service.add(AddProjectRequest { name }).await?;
			out.line(format_args!("Project '{}' added", project.name));
		}
		ProjectCommand::Remove { name } => {
			service.remove(RemoveProjectRequest { name: name.clone() }).await?;
			out.line(format_args!("Project '{name}' removed"));
		}
		ProjectCommand::Rename { name, new_name } => {
			let project = service
				.rename(RenameProjectRequest {
					name: name.clone(),
					new_name,
				})
				.await?;
			out.line(format_args!("Project '{name}' renamed to '{}'", project.name));
		}
		ProjectCommand::List => {
			let projects = service.list().await?;
			if projects.is_empty() {
				out.line("No projects found");
				out.line("Try adding one with `syringe project add PROJECT_NAME`");
			}
			for project in projects {
				out.line(project.name);
			}
		}
	}
	Ok(())
}

async fn environment(
	context: &InvocationContext,
	command: EnvironmentCommand,
	out: &mut Output,
) -> Result<(), CommandError> {
	let service = context.environments();
	match command {
		EnvironmentCommand::Add { scope, name } => {
			let environment = service
				.add(AddEnvironmentRequest {
					project: scope.project.clone(),
					name,
				})
				.await?;
			out.line(format_args!(
				"Environment '{}' added to project '{}'",
				environment.name, scope.project
			));
		}
		EnvironmentCommand::Remove { scope, name } => {
			service
				.remove(RemoveEnvironmentRequest {
					project: scope.project.clone(),
					name: name.clone(),
				})
				.await?;
			out.line(format_args!(
				"Environment '{name}' removed from project '{}'",
				scope.project
			));
		}
		EnvironmentCommand::Rename {
			scope,
			name,
			new_name,
		} => {
			let environment = service
				.rename(RenameEnvironmentRequest {
					project: scope.project.clone(),
					name: name.clone(),
					new_name,
				})
				.await?;
			out.line(format_args!(
				"Environment '{name}' renamed to '{}' in project '{}'",
				environment.name, scope.project
			));
		}
		EnvironmentCommand::List { scope } => {
			let environments = service
				.list(ListEnvironmentsRequest {
					project: scope.project.clone(),
				})
				.await?;
			if environments.is_empty() {
				out.line(format_args!(
					"No environments found in project '{}'",
					scope.project
				));
				out.line(format_args!(
					"Try adding one with `syringe environment add -p {} ENVIRONMENT_NAME`",
					scope.project
				));
			}
			for environment in environments {
				out.line(environment.name);
			}
		}
	}
	Ok(())
}

async fn secret(
	context: &InvocationContext,
	command: SecretCommand,
	out: &mut Output,
) -> Result<(), CommandError> {
	let service = context.secrets();
	match command {
		SecretCommand::Set { scope, key, value } => {
			let entry = service
				.set(SetSecretRequest {
					project: scope.project,
					environment: scope.environment,
					key,
					value: SecretString::new(value),
				})
				.await?;
			out.line(format_args!("Secret '{}' set", entry.key));
		}
		SecretCommand::Get { scope, key } => {
			let entry = service
				.get(GetSecretRequest {
					project: scope.project,
					environment: scope.environment,
					key,
				})
				.await?;
			out.line(entry.value.expose());
		}
		SecretCommand::Remove { scope, key } => {
			service
				.remove(RemoveSecretRequest {
					project: scope.project,
					environment: scope.environment,
					key: key.clone(),
				})
				.await?;
			out.line(format_args!("Secret '{key}' removed"));
		}
		SecretCommand::Rename {
			scope,
			key,
			new_key,
		} => {
			let entry = service
				.rename(RenameSecretRequest {
					project: scope.project,
					environment: scope.environment,
					key: key.clone(),
					new_key,
				})
				.await?;
			out.line(format_args!("Secret '{key}' renamed to '{}'", entry.key));
		}
		SecretCommand::List { scope } => {
			let entries = service
				.list(ListSecretsRequest {
					project: scope.project,
					environment: scope.environment,
				})
				.await?;
			if entries.is_empty() {
				out.line("No secrets found");
			}
			for entry in entries {
				out.line(format_args!("{}={}", entry.key, entry.value.expose()));
			}
		}
	}
	Ok(())
}

fn noun_name(noun: &Noun) -> &'static str {
	match noun {
		Noun::User { .. } => "user",
		Noun::Project { .. } => "project",
		Noun::Environment { .. } => "environment",
		Noun::Secret { .. } => "secret",
	}
}

fn parse_failure(err: clap::Error, session: &SessionState, out: &mut Output) -> u32 {
	match err.kind() {
		ErrorKind::InvalidSubcommand => {
			let name = match err.get(ContextKind::InvalidSubcommand) {
				Some(ContextValue::String(name)) => name.clone(),
				_ => String::new(),
			};
			let denial = if session.authenticated {
				CommandError::UnknownCommand(name)
			} else {
				CommandError::Unauthorized(name)
			};
			out.error_line(format_args!("Error: {}", denial.user_message()));
			EXIT_FAILURE
		}
		_ if !err.use_stderr() => {
			out.raw(&err.render().to_string(), false);
			EXIT_SUCCESS
		}
		_ => {
			out.raw(&err.render().to_string(), true);
			EXIT_USAGE
		}
	}
}
