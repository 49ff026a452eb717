// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Command grammar exposed on a session.
//!
//! Two trees exist: [`Cli`] for authenticated sessions and [`PublicCli`] for
//! everyone else. The public tree only knows `user register`, so a protected
//! noun fails to parse exactly like a noun that does not exist.

use clap::{Args, Parser, Subcommand};

const ABOUT: &str = "Database-per-user secrets management over SSH.";

const AFTER_HELP: &str = "Some commands are only available (and listed) once registered and \
authenticated. Using one of them otherwise results in an 'unknown command' error.";

#[derive(Parser, Debug)]
#[command(
	name = "syringe",
	version,
	about = ABOUT,
	after_help = AFTER_HELP,
	no_binary_name = true,
	disable_help_subcommand = true,
	subcommand_required = true,
	arg_required_else_help = true
)]
pub struct Cli {
	#[command(subcommand)]
	pub command: Noun,
}

#[derive(Parser, Debug)]
#[command(
	name = "syringe",
	version,
	about = ABOUT,
	after_help = AFTER_HELP,
	no_binary_name = true,
	disable_help_subcommand = true,
	subcommand_required = true,
	arg_required_else_help = true
)]
pub struct PublicCli {
	#[command(subcommand)]
	pub command: PublicNoun,
}

#[derive(Subcommand, Debug)]
pub enum PublicNoun {
	/// Manage your account
	#[command(alias = "u", subcommand_required = true, arg_required_else_help = true)]
	User {
		#[command(subcommand)]
		command: PublicUserCommand,
	},
}

#[derive(Subcommand, Debug)]
pub enum PublicUserCommand {
	/// Register the key on this session under your SSH username
	#[command(alias = "r")]
	Register(RegisterArgs),
}

#[derive(Subcommand, Debug)]
pub enum Noun {
	/// Manage your account and keys
	#[command(alias = "u", subcommand_required = true, arg_required_else_help = true)]
	User {
		#[command(subcommand)]
		command: UserCommand,
	},

	/// Manage projects
	#[command(alias = "p", subcommand_required = true, arg_required_else_help = true)]
	Project {
		#[command(subcommand)]
		command: ProjectCommand,
	},

	/// Manage environments within a project
	#[command(
		aliases = ["e", "env"],
		subcommand_required = true,
		arg_required_else_help = true
	)]
	Environment {
		#[command(subcommand)]
		command: EnvironmentCommand,
	},

	/// Manage secrets within an environment
	#[command(alias = "s", subcommand_required = true, arg_required_else_help = true)]
	Secret {
		#[command(subcommand)]
		command: SecretCommand,
	},
}

#[derive(Args, Debug)]
pub struct RegisterArgs {
	/// Contact email for the account
	#[arg(long)]
	pub email: String,
}

#[derive(Subcommand, Debug)]
pub enum UserCommand {
	/// Register the key on this session under your SSH username
	#[command(alias = "r")]
	Register(RegisterArgs),

	/// Show the account behind this session
	Whoami,

	/// Manage authorized keys
	#[command(subcommand_required = true, arg_required_else_help = true)]
	Key {
		#[command(subcommand)]
		command: KeyCommand,
	},
}

#[derive(Subcommand, Debug)]
pub enum KeyCommand {
	/// Authorize another public key (OpenSSH format)
	#[command(alias = "a")]
	Add {
		#[arg(required = true, num_args = 1.., value_name = "PUBLIC_KEY")]
		key: Vec<String>,
	},

	/// Revoke a key by its SHA256 fingerprint
	#[command(alias = "r")]
	Remove { fingerprint: String },

	/// List authorized keys
	#[command(alias = "l")]
	List,
}

#[derive(Subcommand, Debug)]
pub enum ProjectCommand {
	/// Add a project
	#[command(alias = "a")]
	Add {
		#[arg(value_name = "PROJECT_NAME")]
		name: String,
	},

	/// Remove a project and everything in it
	#[command(alias = "r")]
	Remove {
		#[arg(value_name = "PROJECT_NAME")]
		name: String,
	},

	/// Rename a project
	#[command(alias = "mv")]
	Rename {
		#[arg(value_name = "CURRENT_PROJECT_NAME")]
		name: String,
		#[arg(value_name = "NEW_PROJECT_NAME")]
		new_name: String,
	},

	/// List projects
	#[command(alias = "l")]
	List,
}

#[derive(Args, Debug, Clone)]
pub struct ProjectScope {
	/// Project the environment belongs to
	#[arg(short = 'p', long = "project", value_name = "PROJECT_NAME")]
	pub project: String,
}

#[derive(Subcommand, Debug)]
pub enum EnvironmentCommand {
	/// Add an environment to a project
	#[command(alias = "a")]
	Add {
		#[command(flatten)]
		scope: ProjectScope,
		#[arg(value_name = "ENVIRONMENT_NAME")]
		name: String,
	},

	/// Remove an environment and its secrets
	#[command(alias = "r")]
	Remove {
		#[command(flatten)]
		scope: ProjectScope,
		#[arg(value_name = "ENVIRONMENT_NAME")]
		name: String,
	},

	/// Rename an environment
	#[command(alias = "mv")]
	Rename {
		#[command(flatten)]
		scope: ProjectScope,
		#[arg(value_name = "CURRENT_ENVIRONMENT_NAME")]
		name: String,
		#[arg(value_name = "NEW_ENVIRONMENT_NAME")]
		new_name: String,
	},

	/// List environments in a project
	#[command(alias = "l")]
	List {
		#[command(flatten)]
		scope: ProjectScope,
	},
}

#[derive(Args, Debug, Clone)]
pub struct EnvironmentScope {
	#[arg(short = 'p', long = "project", value_name = "PROJECT_NAME")]
	pub project: String,

	#[arg(short = 'e', long = "environment", value_name = "ENVIRONMENT_NAME")]
	pub environment: String,
}

#[derive(Subcommand, Debug)]
pub enum SecretCommand {
	/// Create or overwrite a secret
	#[command(alias = "s")]
	Set {
		#[command(flatten)]
		scope: EnvironmentScope,
		#[arg(value_name = "SECRET_KEY")]
		key: String,
		#[arg(value_name = "SECRET_VALUE", allow_hyphen_values = true)]
		value: String,
	},

	/// Print a secret value
	#[command(alias = "g")]
	Get {
		#[command(flatten)]
		scope: EnvironmentScope,
		#[arg(value_name = "SECRET_KEY")]
		key: String,
	},

	/// Remove a secret
	#[command(alias = "r")]
	Remove {
		#[command(flatten)]
		scope: EnvironmentScope,
		#[arg(value_name = "SECRET_KEY")]
		key: String,
	},

	/// Rename a secret
	#[command(alias = "mv")]
	Rename {
		#[command(flatten)]
		scope: EnvironmentScope,
		#[arg(value_name = "SECRET_KEY")]
		key: String,
		#[arg(value_name = "NEW_SECRET_KEY")]
		new_key: String,
	},

	/// List secrets as KEY=VALUE
	#[command(alias = "l")]
	List {
		#[command(flatten)]
		scope: EnvironmentScope,
	},
}
