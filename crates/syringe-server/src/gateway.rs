// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Transport-agnostic session pipeline.
//!
//! Each session runs three stages: authentication records a per-session
//! boolean, dispatch always runs (protected commands reject on their own),
//! and an observability span wraps both. Nothing here is shared between
//! sessions except the [`AccessService`].

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use syringe_server_auth::PublicKey;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::access::AccessService;
use crate::dispatch::{Dispatcher, Output, SessionState, EXIT_FAILURE, EXIT_USAGE};

/// What the transport hands over for one session.
#[derive(Debug, Clone)]
pub struct SessionRequest {
	pub username: String,
	pub public_key: Option<PublicKey>,
	pub command: Vec<String>,
	pub peer: Option<SocketAddr>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOutcome {
	pub stdout: Vec<u8>,
	pub stderr: Vec<u8>,
	pub exit_status: u32,
}

impl SessionOutcome {
	pub fn failure(exit_status: u32, message: impl std::fmt::Display) -> Self {
		Self {
			stdout: Vec::new(),
			stderr: format!("Error: {message}\n").into_bytes(),
			exit_status,
		}
	}

	pub fn stdout_text(&self) -> String {
		String::from_utf8_lossy(&self.stdout).into_owned()
	}

	pub fn stderr_text(&self) -> String {
		String::from_utf8_lossy(&self.stderr).into_owned()
	}
}

pub struct Gateway {
	access: Arc<AccessService>,
}

impl Gateway {
	pub fn new(access: Arc<AccessService>) -> Self {
		Self { access }
	}

	/// Run one session to completion, or until `cancel` fires.
	pub async fn run(&self, request: SessionRequest, cancel: CancellationToken) -> SessionOutcome {
		let span = tracing::info_span!(
			"session",
			peer = %request.peer.map(|p| p.to_string()).unwrap_or_default(),
			username = %request.username,
			command = request.command.first().map(String::as_str).unwrap_or(""),
		);

		async move {
			let started = Instant::now();
			tracing::info!("session started");

			let outcome = tokio::select! {
				biased;
				_ = cancel.cancelled() => SessionOutcome::failure(EXIT_FAILURE, "session cancelled"),
				outcome = self.handle(request) => outcome,
			};

			tracing::info!(
				exit_status = outcome.exit_status,
				elapsed_ms = started.elapsed().as_millis() as u64,
				"session finished"
			);
			outcome
		}
		.instrument(span)
		.await
	}

	async fn handle(&self, request: SessionRequest) -> SessionOutcome {
		let session = self
			.authenticate(&request.username, request.public_key.clone())
			.await;

		let mut out = Output::default();
		let exit_status = Dispatcher::new(&self.access)
			.dispatch(&session, &request.command, &mut out)
			.await;

		let (stdout, stderr) = out.into_parts();
		SessionOutcome {
			stdout: stdout.into_bytes(),
			stderr: stderr.into_bytes(),
			exit_status,
		}
	}

	/// Authentication stage. Unknown users and lookup failures are plain denials.
	pub async fn authenticate(&self, username: &str, public_key: Option<PublicKey>) -> SessionState {
		let authenticated = match &public_key {
			Some(key) => match self.access.authenticate(username, key).await {
				Ok(result) => result,
				Err(err) => {
					tracing::debug!(error = %err, "authentication denied");
					false
				}
			},
			None => false,
		};

		tracing::debug!(authenticated, "session authenticated");
		SessionState {
			username: username.to_string(),
			public_key,
			authenticated,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandLineError {
	#[error("unterminated {0} quote in command")]
	UnterminatedQuote(&'static str),

	#[error("command line is not valid UTF-8")]
	InvalidUtf8,
}

impl CommandLineError {
	pub fn exit_status(&self) -> u32 {
		EXIT_USAGE
	}
}

/// Split raw exec request bytes. Bytes that are not UTF-8 are refused rather
/// than replaced.
pub fn parse_command_bytes(data: &[u8]) -> Result<Vec<String>, CommandLineError> {
	let line = std::str::from_utf8(data).map_err(|_| CommandLineError::InvalidUtf8)?;
	parse_command_line(line)
}

/// Split an exec request into arguments. Single quotes are literal, double
/// quotes allow backslash escapes, and a bare backslash escapes one character.
pub fn parse_command_line(line: &str) -> Result<Vec<String>, CommandLineError> {
	let mut args = Vec::new();
	let mut current = String::new();
	let mut in_word = false;
	let mut chars = line.chars();

	while let Some(c) = chars.next() {
		match c {
			'\'' => {
				in_word = true;
				loop {
					match chars.next() {
						Some('\'') => break,
						Some(ch) => current.push(ch),
						None => return Err(CommandLineError::UnterminatedQuote("single")),
					}
				}
			}
			'"' => {
				in_word = true;
				loop {
					match chars.next() {
						Some('"') => break,
						Some('\\') => match chars.next() {
							Some(ch @ ('"' | '\\' | '$' | '`')) => current.push(ch),
							Some(ch) => {
								current.push('\\');
								current.push(ch);
							}
							None => return Err(CommandLineError::UnterminatedQuote("double")),
						},
						Some(ch) => current.push(ch),
						None => return Err(CommandLineError::UnterminatedQuote("double")),
					}
				}
			}
			'\\' => {
				in_word = true;
				if let Some(ch) = chars.next() {
					current.push(ch);
				}
			}
			c if c.is_whitespace() => {
				if in_word {
					args.push(std::mem::take(&mut current));
					in_word = false;
				}
			}
			c => {
				in_word = true;
				current.push(c);
			}
		}
	}

	if in_word {
		args.push(current);
	}
	Ok(args)
}
