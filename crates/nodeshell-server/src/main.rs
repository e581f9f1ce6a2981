// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Node shell server binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use nodeshell_server_config::{ArgsSource, LoggingConfig};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod version;

/// Node shell server - interactive root shells on cluster nodes over WebSocket.
#[derive(Parser, Debug)]
#[command(name = "nodeshell-server", about = "Node shell server", version)]
struct Args {
	/// Config file (default: /etc/nodeshell/server.toml when present)
	#[arg(long, env = "NODE_SHELL_CONFIG")]
	config: Option<PathBuf>,

	/// Kubeconfig file (default: in-cluster, then KUBECONFIG, then ~/.kube/config)
	#[arg(long)]
	kubeconfig: Option<PathBuf>,

	/// Address to listen on, as host:port
	#[arg(long)]
	listen: Option<String>,

	#[command(subcommand)]
	command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Show version and build information
	Version,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	if let Some(Command::Version) = args.command {
		println!("{}", version::format_version_info());
		return Ok(());
	}

	dotenvy::dotenv().ok();

	let overrides = ArgsSource {
		listen: args.listen,
		kubeconfig: args.kubeconfig,
	};
	let config = match args.config {
		Some(path) => nodeshell_server_config::load_config_with_file(path, overrides)?,
		None => nodeshell_server_config::load_config(overrides)?,
	};

	init_tracing(&config.logging);

	tracing::info!(
		host = %config.http.host,
		port = config.http.port,
		namespace = %config.shell.namespace,
		"starting nodeshell-server"
	);

	let shutdown = CancellationToken::new();
	tokio::spawn(watch_signals(shutdown.clone()));

	nodeshell_server::startup::run(config, shutdown).await?;

	tracing::info!("Server shutdown complete");
	Ok(())
}

fn init_tracing(logging: &LoggingConfig) {
	let filter = tracing_subscriber::EnvFilter::try_from_default_env()
		.unwrap_or_else(|_| logging.level.clone().into());
	let registry = tracing_subscriber::registry().with(filter);

	if logging.json {
		registry
			.with(tracing_subscriber::fmt::layer().json())
			.init();
	} else {
		registry.with(tracing_subscriber::fmt::layer()).init();
	}
}

async fn watch_signals(shutdown: CancellationToken) {
	let ctrl_c = tokio::signal::ctrl_c();

	#[cfg(unix)]
	let terminate = async {
		match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
			Ok(mut signal) => {
				signal.recv().await;
			}
			Err(e) => {
				tracing::warn!(error = %e, "Failed to install SIGTERM handler");
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
	tracing::info!("Received shutdown signal");
	shutdown.cancel();
}
