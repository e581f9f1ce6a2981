// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Pod create/delete against the cluster API.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use nodeshell_server_k8s::{K8sClient, K8sError, Pod};

use crate::config::ShellConfig;
use crate::pod_spec::PodRef;

/// Creates and deletes ephemeral pods. Stateless aside from the API handle.
#[derive(Clone)]
pub struct PodLifecycle {
	client: Arc<dyn K8sClient>,
	api_timeout: Duration,
	grace_period_secs: u32,
}

impl PodLifecycle {
	pub fn new(client: Arc<dyn K8sClient>, config: &ShellConfig) -> Self {
		Self {
			client,
			api_timeout: config.api_timeout(),
			grace_period_secs: config.delete_grace_period_secs,
		}
	}

	/// Submit the pod. Returns once the API server accepts it.
	pub async fn create(&self, pod_ref: &PodRef, pod: Pod) -> Result<(), K8sError> {
		with_timeout(
			self.api_timeout,
			self.client.create_pod(&pod_ref.namespace, pod),
		)
		.await?;
		Ok(())
	}

	/// Delete the pod, propagating the API outcome.
	pub async fn try_delete(&self, pod_ref: &PodRef) -> Result<(), K8sError> {
		with_timeout(
			self.api_timeout,
			self
				.client
				.delete_pod(&pod_ref.name, &pod_ref.namespace, self.grace_period_secs),
		)
		.await
	}

	/// Best-effort deletion. Failures are logged and never escalated.
	pub async fn delete(&self, pod_ref: &PodRef) {
		match self.try_delete(pod_ref).await {
			Ok(()) => tracing::info!(pod = %pod_ref, "Deleted node shell pod"),
			Err(e) if e.is_not_found() => {
				tracing::debug!(pod = %pod_ref, "Node shell pod already deleted");
			}
			Err(e) => tracing::error!(pod = %pod_ref, error = %e, "Failed to delete node shell pod"),
		}
	}
}

async fn with_timeout<T>(
	timeout: Duration,
	call: impl Future<Output = Result<T, K8sError>>,
) -> Result<T, K8sError> {
	match tokio::time::timeout(timeout, call).await {
		Ok(result) => result,
		Err(_) => Err(K8sError::Timeout),
	}
}
