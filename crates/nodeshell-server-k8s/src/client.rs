// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use async_trait::async_trait;

use crate::error::K8sError;
use crate::types::{ExecProcess, Namespace, Pod, PodEventStream};

/// Trait for K8s client operations.
///
/// This abstraction allows for easy mocking in tests while providing
/// a clean interface for the K8s operations a node shell session needs.
#[async_trait]
pub trait K8sClient: Send + Sync {
	/// Create a new pod in the specified namespace.
	///
	/// Returns once the API server has accepted the pod; it does not wait
	/// for scheduling.
	async fn create_pod(&self, namespace: &str, pod: Pod) -> Result<Pod, K8sError>;

	/// Delete a pod by name from the specified namespace.
	async fn delete_pod(
		&self,
		name: &str,
		namespace: &str,
		grace_period_seconds: u32,
	) -> Result<(), K8sError>;

	/// List pods in a namespace matching the given label selector.
	async fn list_pods(&self, namespace: &str, label_selector: &str) -> Result<Vec<Pod>, K8sError>;

	/// Get a namespace by name.
	async fn get_namespace(&self, name: &str) -> Result<Namespace, K8sError>;

	/// Watch a single pod, selected by name, starting after `resource_version`.
	///
	/// Passing `"0"` starts from the API server's current state and delivers
	/// an `Added` event for the pod if it exists. The returned stream ends
	/// when the server closes the watch.
	async fn watch_pod(
		&self,
		name: &str,
		namespace: &str,
		resource_version: &str,
	) -> Result<PodEventStream, K8sError>;

	/// Run `command` in a container with stdin, stdout and a pseudo-terminal.
	async fn exec(
		&self,
		name: &str,
		namespace: &str,
		container: &str,
		command: &[String],
	) -> Result<ExecProcess, K8sError>;
}
