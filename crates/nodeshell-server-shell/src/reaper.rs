// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Background removal of node shell pods left behind by crashed sessions.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use nodeshell_server_k8s::{K8sClient, K8sError, Pod};
use tokio_util::sync::CancellationToken;

use crate::config::ShellConfig;
use crate::lifecycle::PodLifecycle;
use crate::pod_spec::{PodRef, MANAGED_LABEL};

/// Pods removed by one reaper pass.
#[derive(Debug, Default)]
pub struct ReapResult {
	pub deleted: Vec<PodRef>,
	pub count: usize,
}

/// Deletes managed pods that have finished or outlived any session.
#[derive(Clone)]
pub struct PodReaper {
	client: Arc<dyn K8sClient>,
	lifecycle: PodLifecycle,
	namespace: String,
	max_age: chrono::Duration,
	interval: Duration,
}

impl PodReaper {
	pub fn new(client: Arc<dyn K8sClient>, config: &ShellConfig) -> Self {
		let max_age_secs = config
			.pod_lifetime_secs
			.saturating_add(config.ready_timeout_secs)
			.min(i64::MAX as u64) as i64;
		Self {
			lifecycle: PodLifecycle::new(Arc::clone(&client), config),
			client,
			namespace: config.namespace.clone(),
			max_age: chrono::Duration::seconds(max_age_secs),
			interval: Duration::from_secs(config.reaper_interval_secs),
		}
	}

	/// Delete every orphaned pod visible right now.
	pub async fn reap_once(&self, now: DateTime<Utc>) -> Result<ReapResult, K8sError> {
		let selector = format!("{MANAGED_LABEL}=true");
		let pods = self.client.list_pods(&self.namespace, &selector).await?;

		let mut result = ReapResult::default();
		for pod in pods.iter().filter(|p| is_orphaned(p, self.max_age, now)) {
			let Some(name) = pod.metadata.name.clone() else {
				continue;
			};
			let pod_ref = PodRef {
				namespace: self.namespace.clone(),
				name,
			};
			match self.lifecycle.try_delete(&pod_ref).await {
				Err(e) if !e.is_not_found() => {
					tracing::warn!(pod = %pod_ref, error = %e, "Failed to reap node shell pod");
				}
				_ => {
					tracing::info!(pod = %pod_ref, "Reaped orphaned node shell pod");
					result.deleted.push(pod_ref);
				}
			}
		}
		result.count = result.deleted.len();
		Ok(result)
	}

	/// Reap immediately, then every interval until `shutdown` fires.
	pub async fn run(self, shutdown: CancellationToken) {
		tracing::info!(interval_secs = self.interval.as_secs(), "Starting pod reaper");
		self.run_pass().await;

		loop {
			tokio::select! {
				_ = shutdown.cancelled() => {
					tracing::info!("Pod reaper stopped");
					return;
				}
				_ = tokio::time::sleep(self.interval) => self.run_pass().await,
			}
		}
	}

	async fn run_pass(&self) {
		tracing::debug!("Running orphaned pod reaper");
		match self.reap_once(Utc::now()).await {
			Ok(result) if result.count > 0 => {
				tracing::info!(count = result.count, "Reaper deleted orphaned pods");
			}
			Ok(_) => tracing::debug!("Reaper found no orphaned pods"),
			Err(e) => tracing::error!(error = %e, "Reaper pass failed"),
		}
	}
}

/// Spawn the reaper unless its interval is zero.
pub fn start_reaper_task(
	client: Arc<dyn K8sClient>,
	config: &ShellConfig,
	shutdown: CancellationToken,
) -> Option<tokio::task::JoinHandle<()>> {
	if config.reaper_interval_secs == 0 {
		tracing::info!("Pod reaper disabled");
		return None;
	}
	let reaper = PodReaper::new(client, config);
	Some(tokio::spawn(reaper.run(shutdown)))
}

/// A pod is orphaned once its phase is final or it is older than `max_age`.
pub fn is_orphaned(pod: &Pod, max_age: chrono::Duration, now: DateTime<Utc>) -> bool {
	let finished = pod
		.status
		.as_ref()
		.and_then(|s| s.phase.as_deref())
		.is_some_and(|phase| phase == "Succeeded" || phase == "Failed");
	if finished {
		return true;
	}

	pod.metadata
		.creation_timestamp
		.as_ref()
		.is_some_and(|created| now - created.0 > max_age)
}
