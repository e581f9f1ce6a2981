// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Node shell server.
//!
//! Serves `GET /api/v1/node/{node_name}/shell`, which upgrades to a
//! WebSocket carrying an interactive root shell on the named node, and
//! `GET /health`.

pub mod error;
pub mod health;
pub mod routes;
pub mod startup;

use std::sync::Arc;
use std::time::Duration;

use axum::{routing::get, Router};
use nodeshell_server_k8s::NodeLookup;
use nodeshell_server_shell::NodeShell;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::{
	cors::{Any, CorsLayer},
	trace::TraceLayer,
};

pub use error::ServerError;
pub use nodeshell_server_config::ServerConfig;

const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
	pub shell: Arc<NodeShell>,
	pub nodes: Arc<dyn NodeLookup>,
}

pub fn create_router(state: AppState) -> Router {
	Router::new()
		.route("/health", get(health::health_check))
		.route(
			"/api/v1/node/{node_name}/shell",
			get(routes::shell::node_shell),
		)
		.with_state(state)
}

/// Serve on `listener` until `shutdown` fires, then wait up to
/// `drain_timeout` for open sessions to delete their pods.
pub async fn serve(
	listener: TcpListener,
	state: AppState,
	shutdown: CancellationToken,
	drain_timeout: Duration,
) -> Result<(), ServerError> {
	let shell = Arc::clone(&state.shell);
	let app = create_router(state)
		.layer(TraceLayer::new_for_http())
		.layer(
			CorsLayer::new()
				.allow_origin(Any)
				.allow_methods(Any)
				.allow_headers(Any),
		);

	let signal = shutdown.clone();
	axum::serve(listener, app)
		.with_graceful_shutdown(async move { signal.cancelled().await })
		.await
		.map_err(ServerError::Serve)?;

	drain_sessions(&shell, drain_timeout).await;
	Ok(())
}

async fn drain_sessions(shell: &NodeShell, timeout: Duration) {
	let deadline = tokio::time::Instant::now() + timeout;
	loop {
		let active = shell.active_sessions();
		if active == 0 {
			return;
		}
		if tokio::time::Instant::now() >= deadline {
			tracing::warn!(active, "Shutdown drain timed out with sessions still open");
			return;
		}
		tracing::debug!(active, "Waiting for node shell sessions to finish");
		tokio::time::sleep(DRAIN_POLL_INTERVAL).await;
	}
}
