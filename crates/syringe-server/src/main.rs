// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! syringe gateway binary.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use syringe_server::{ssh, AccessService, Gateway, Validator};
use syringe_server_config::{LogFormat, LoggingConfig};
use syringe_server_db::{create_pool, run_control_migrations, IdentityRepository};
use syringe_server_provisioning::TenantProvisioner;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// syringe - secrets management over SSH.
#[derive(Parser, Debug)]
#[command(name = "syringe-server", about = "syringe SSH secrets gateway", version)]
struct Args {
	/// Path to a TOML config file (defaults to /etc/syringe/server.toml)
	#[arg(long, value_name = "PATH")]
	config: Option<PathBuf>,

	#[command(subcommand)]
	command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Show version information
	Version,
}

fn init_tracing(logging: &LoggingConfig) {
	let filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
	let registry = tracing_subscriber::registry().with(filter);

	match logging.format {
		LogFormat::Json => registry
			.with(tracing_subscriber::fmt::layer().json())
			.init(),
		LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
	}
}

fn shutdown_signal(token: CancellationToken) {
	tokio::spawn(async move {
		let ctrl_c = async {
			if let Err(e) = tokio::signal::ctrl_c().await {
				tracing::error!(error = %e, "failed to listen for ctrl-c");
				std::future::pending::<()>().await;
			}
		};

		#[cfg(unix)]
		let terminate = async {
			match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
				Ok(mut signal) => {
					signal.recv().await;
				}
				Err(e) => {
					tracing::error!(error = %e, "failed to listen for SIGTERM");
					std::future::pending::<()>().await;
				}
			}
		};

		#[cfg(not(unix))]
		let terminate = std::future::pending::<()>();

		tokio::select! {
			_ = ctrl_c => {}
			_ = terminate => {}
		}

		tracing::info!("received shutdown signal");
		token.cancel();
	});
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let args = Args::parse();

	if let Some(Command::Version) = args.command {
		println!("syringe-server {}", env!("CARGO_PKG_VERSION"));
		return Ok(());
	}

	dotenvy::dotenv().ok();

	let config = match &args.config {
		Some(path) => syringe_server_config::load_config_with_file(path)?,
		None => syringe_server_config::load_config()?,
	};

	init_tracing(&config.logging);

	tracing::info!(
		addr = %config.socket_addr(),
		database = %config.database.url,
		platform = %config.platform.kind,
		"starting syringe-server"
	);

	let pool = create_pool(&config.database.url).await?;
	run_control_migrations(&pool).await?;

	let provisioner = TenantProvisioner::from_config(&config.platform)?;
	let access = AccessService::new(
		Arc::new(IdentityRepository::new(pool.clone())),
		provisioner,
		Validator::default(),
	);
	let gateway = Arc::new(Gateway::new(Arc::new(access)));

	let host_key = ssh::load_host_key(&config.ssh.host_key_path)?;
	let ssh_config = ssh::server_config(&config.ssh, host_key);

	let addr = config.socket_addr();
	let listener = tokio::net::TcpListener::bind(&addr)
		.await
		.with_context(|| format!("failed to bind {addr}"))?;
	tracing::info!("listening on {}", addr);

	let shutdown = CancellationToken::new();
	shutdown_signal(shutdown.clone());

	ssh::serve(
		listener,
		ssh_config,
		gateway,
		shutdown,
		config.shutdown.grace_period(),
	)
	.await;

	pool.close().await;
	tracing::info!("server shutdown complete");
	Ok(())
}
