// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Wiring from resolved configuration to a running server.

use std::sync::Arc;
use std::time::Duration;

use nodeshell_server_config::ServerConfig;
use nodeshell_server_k8s::{K8sClient, KubeClient, NodeCache};
use nodeshell_server_shell::{start_reaper_task, NodeShell, ShellConfig};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::{serve, AppState, ServerError};

const NODE_CACHE_SYNC_TIMEOUT: Duration = Duration::from_secs(60);

/// Connect to the cluster, start background tasks and serve until
/// `shutdown` fires.
pub async fn run(config: ServerConfig, shutdown: CancellationToken) -> Result<(), ServerError> {
	let kube = KubeClient::new(config.kube.kubeconfig.as_deref())
		.await
		.map_err(ServerError::Kube)?;
	let client: Arc<dyn K8sClient> = Arc::new(kube.clone());
	let shell_config = ShellConfig::from(&config.shell);

	let nodes = NodeCache::start(kube.kube(), NODE_CACHE_SYNC_TIMEOUT, shutdown.child_token())
		.await
		.map_err(ServerError::NodeCache)?;
	tracing::info!(nodes = nodes.len(), "Node cache synced");
	let nodes = Arc::new(nodes);

	let shell = Arc::new(NodeShell::new(
		Arc::clone(&client),
		nodes.clone(),
		shell_config.clone(),
		shutdown.clone(),
	));
	shell
		.validate_namespace()
		.await
		.map_err(|source| ServerError::Namespace {
			namespace: shell_config.namespace.clone(),
			source,
		})?;

	let reaper = start_reaper_task(Arc::clone(&client), &shell_config, shutdown.child_token());

	let addr = config.socket_addr();
	let listener = TcpListener::bind(&addr)
		.await
		.map_err(|source| ServerError::Bind {
			addr: addr.clone(),
			source,
		})?;
	tracing::info!("listening on {}", addr);

	let drain_timeout = shell_config.api_timeout() + Duration::from_secs(5);
	let state = AppState { shell, nodes };
	let result = serve(listener, state, shutdown.clone(), drain_timeout).await;

	shutdown.cancel();
	if let Some(reaper) = reaper {
		if let Err(e) = reaper.await {
			tracing::warn!(error = %e, "Pod reaper task failed");
		}
	}
	result
}
