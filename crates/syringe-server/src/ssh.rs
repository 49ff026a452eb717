// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! SSH transport for the session gateway.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use russh::server::{Auth, Config, Handle, Handler, Msg, Session};
use russh::{Channel, ChannelId, CryptoVec, MethodSet};
use russh_keys::key::{KeyPair, PublicKey as SshPublicKey};
use russh_keys::PublicKeyBase64;
use syringe_server_auth::PublicKey;
use syringe_server_config::SshConfig;
use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::gateway::{parse_command_bytes, Gateway, SessionOutcome, SessionRequest};

/// Load the gateway's host key. A missing key is a startup error.
pub fn load_host_key(path: &Path) -> anyhow::Result<KeyPair> {
	russh_keys::load_secret_key(path, None).with_context(|| {
		format!(
			"failed to load SSH host key from {} (create one with `ssh-keygen -t ed25519 -N '' -f {}`)",
			path.display(),
			path.display()
		)
	})
}

pub fn server_config(ssh: &SshConfig, host_key: KeyPair) -> Arc<Config> {
	Arc::new(Config {
		inactivity_timeout: Some(ssh.inactivity_timeout()),
		auth_rejection_time: ssh.auth_rejection_delay(),
		auth_rejection_time_initial: Some(Duration::ZERO),
		methods: MethodSet::PUBLICKEY,
		keys: vec![host_key],
		..Default::default()
	})
}

/// Convert a key offered on the wire into canonical form. Only ed25519 is accepted.
fn canonical_key(key: &SshPublicKey) -> Option<PublicKey> {
	if !matches!(key, SshPublicKey::Ed25519(_)) {
		return None;
	}
	PublicKey::parse(&format!("{} {}", key.name(), key.public_key_base64())).ok()
}

/// Per-connection handler. Dropping it cancels anything the connection started.
pub struct SshSession {
	gateway: Arc<Gateway>,
	peer: SocketAddr,
	username: String,
	public_key: Option<PublicKey>,
	cancel: CancellationToken,
}

impl SshSession {
	pub fn new(gateway: Arc<Gateway>, peer: SocketAddr, cancel: CancellationToken) -> Self {
		Self {
			gateway,
			peer,
			username: String::new(),
			public_key: None,
			cancel,
		}
	}

	fn start(&self, channel: ChannelId, command: Vec<String>, handle: Handle) {
		let request = SessionRequest {
			username: self.username.clone(),
			public_key: self.public_key.clone(),
			command,
			peer: Some(self.peer),
		};
		let gateway = Arc::clone(&self.gateway);
		let cancel = self.cancel.child_token();

		tokio::spawn(async move {
			let outcome = gateway.run(request, cancel).await;
			finish(&handle, channel, outcome).await;
		});
	}
}

impl Drop for SshSession {
	fn drop(&mut self) {
		self.cancel.cancel();
	}
}

async fn finish(handle: &Handle, channel: ChannelId, outcome: SessionOutcome) {
	if !outcome.stdout.is_empty() {
		let _ = handle
			.data(channel, CryptoVec::from_slice(&outcome.stdout))
			.await;
	}
	if !outcome.stderr.is_empty() {
		let _ = handle
			.extended_data(channel, 1, CryptoVec::from_slice(&outcome.stderr))
			.await;
	}
	let _ = handle
		.exit_status_request(channel, outcome.exit_status)
		.await;
	let _ = handle.eof(channel).await;
	let _ = handle.close(channel).await;
}

#[async_trait]
impl Handler for SshSession {
	type Error = russh::Error;

	async fn auth_publickey(
		&mut self,
		user: &str,
		public_key: &SshPublicKey,
	) -> Result<Auth, Self::Error> {
		match canonical_key(public_key) {
			Some(key) => {
				// Unregistered keys get through so `user register` can run; the
				// gateway decides what the session may do.
				self.username = user.to_string();
				self.public_key = Some(key);
				Ok(Auth::Accept)
			}
			None => {
				debug!(peer = %self.peer, algorithm = public_key.name(), "rejected key algorithm");
				Ok(Auth::Reject {
					proceed_with_methods: None,
				})
			}
		}
	}

	async fn channel_open_session(
		&mut self,
		_channel: Channel<Msg>,
		_session: &mut Session,
	) -> Result<bool, Self::Error> {
		Ok(true)
	}

	async fn exec_request(
		&mut self,
		channel: ChannelId,
		data: &[u8],
		session: &mut Session,
	) -> Result<(), Self::Error> {
		let _ = session.channel_success(channel);
		match parse_command_bytes(data) {
			Ok(command) => self.start(channel, command, session.handle()),
			Err(err) => {
				let handle = session.handle();
				let status = err.exit_status();
				tokio::spawn(async move {
					finish(&handle, channel, SessionOutcome::failure(status, err)).await;
				});
			}
		}
		Ok(())
	}

	async fn shell_request(
		&mut self,
		channel: ChannelId,
		session: &mut Session,
	) -> Result<(), Self::Error> {
		let _ = session.channel_success(channel);
		self.start(channel, Vec::new(), session.handle());
		Ok(())
	}
}

/// Accept connections until `shutdown` fires, then give in-flight sessions
/// `grace` to finish before cancelling and aborting them.
pub async fn serve(
	listener: TcpListener,
	config: Arc<Config>,
	gateway: Arc<Gateway>,
	shutdown: CancellationToken,
	grace: Duration,
) {
	let sessions_cancel = CancellationToken::new();
	let mut sessions = JoinSet::new();

	loop {
		tokio::select! {
			_ = shutdown.cancelled() => break,
			accepted = listener.accept() => {
				let (stream, peer) = match accepted {
					Ok(accepted) => accepted,
					Err(e) => {
						warn!(error = %e, "failed to accept connection");
						continue;
					}
				};
				let _ = stream.set_nodelay(true);

				let handler = SshSession::new(Arc::clone(&gateway), peer, sessions_cancel.child_token());
				let config = Arc::clone(&config);
				sessions.spawn(async move {
					match russh::server::run_stream(config, stream, handler).await {
						Ok(running) => {
							if let Err(e) = running.await {
								debug!(peer = %peer, error = %e, "connection ended with error");
							}
						}
						Err(e) => debug!(peer = %peer, error = %e, "handshake failed"),
					}
				});
			}
			Some(joined) = sessions.join_next(), if !sessions.is_empty() => {
				if let Err(e) = joined {
					if e.is_panic() {
						error!(error = %e, "session task panicked");
					}
				}
			}
		}
	}

	drop(listener);
	info!(in_flight = sessions.len(), "stopped accepting connections");

	let drained = tokio::time::timeout(grace, async {
		while sessions.join_next().await.is_some() {}
	})
	.await;

	if drained.is_err() {
		warn!(
			remaining = sessions.len(),
			grace_secs = grace.as_secs(),
			"grace period elapsed, closing remaining sessions"
		);
		sessions_cancel.cancel();
		sessions.abort_all();
		while sessions.join_next().await.is_some() {}
	}
}
