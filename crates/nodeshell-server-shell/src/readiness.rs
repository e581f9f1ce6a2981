// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Watch a single pod until its shell container is usable.
//!
//! Each watch event is classified by [`evaluate`], a pure function, and the
//! surrounding loop only handles reconnects, the deadline and cancellation.
//! Reconnects resume from the last resource version seen so a dropped watch
//! never misses the transition it is waiting for.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use nodeshell_server_k8s::{ContainerStatus, K8sClient, K8sError, Pod, PodEvent};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::pod_spec::PodRef;

/// Resource version that starts a watch from the current state.
const INITIAL_RESOURCE_VERSION: &str = "0";
/// Status code the API server uses for an expired resource version.
const GONE: u16 = 410;
const RECONNECT_DELAY: Duration = Duration::from_millis(200);

/// Outcomes of a readiness wait other than success.
#[derive(Debug, thiserror::Error)]
pub enum WaitError {
	#[error("pod {name} was deleted")]
	PodDeleted { name: String },

	#[error("deadline exceeded")]
	DeadlineExceeded,

	#[error("malformed event: {message}")]
	MalformedEvent { message: String },

	#[error(transparent)]
	Api(#[from] K8sError),

	#[error("wait cancelled")]
	Cancelled,
}

/// What a single watch event means for the wait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
	/// Keep watching.
	Pending,
	/// The container is running or has terminated.
	Ready,
	/// The pod was deleted.
	Deleted,
	/// The resource version expired; restart from the current state.
	Resync,
	/// The event did not carry a pod.
	Malformed(String),
}

/// Find a container's status across init, regular and ephemeral containers.
pub fn find_container_status<'a>(pod: &'a Pod, container: &str) -> Option<&'a ContainerStatus> {
	let status = pod.status.as_ref()?;
	[
		status.init_container_statuses.as_deref(),
		status.container_statuses.as_deref(),
		status.ephemeral_container_statuses.as_deref(),
	]
	.into_iter()
	.flatten()
	.flatten()
	.find(|s| s.name == container)
}

/// Classify a watch event for `container`.
pub fn evaluate(event: &PodEvent, container: &str) -> Step {
	match event {
		PodEvent::Deleted(_) => Step::Deleted,
		PodEvent::Error { code, .. } if *code == GONE => Step::Resync,
		PodEvent::Error { code, message } => Step::Malformed(format!("{code}: {message}")),
		PodEvent::Bookmark { .. } => Step::Pending,
		PodEvent::Added(pod) | PodEvent::Modified(pod) => {
			let Some(status) = find_container_status(pod, container) else {
				return Step::Pending;
			};
			match status.state.as_ref() {
				Some(state) if state.running.is_some() || state.terminated.is_some() => Step::Ready,
				_ => Step::Pending,
			}
		}
	}
}

/// Waits for a pod's container to reach running or terminated state.
#[derive(Clone)]
pub struct ReadinessWatcher {
	client: Arc<dyn K8sClient>,
}

impl ReadinessWatcher {
	pub fn new(client: Arc<dyn K8sClient>) -> Self {
		Self { client }
	}

	/// Wait until `container` in `pod` is running or terminated.
	///
	/// Returns [`WaitError::PodDeleted`] as soon as a deletion event
	/// arrives, [`WaitError::DeadlineExceeded`] once `deadline` passes and
	/// [`WaitError::Cancelled`] when `cancel` fires.
	pub async fn wait_ready(
		&self,
		pod: &PodRef,
		container: &str,
		deadline: Instant,
		cancel: &CancellationToken,
	) -> Result<(), WaitError> {
		let watch = self.watch_until_ready(pod, container, deadline);
		tokio::select! {
			biased;
			_ = cancel.cancelled() => Err(WaitError::Cancelled),
			result = tokio::time::timeout_at(deadline, watch) => match result {
				Ok(outcome) => outcome,
				Err(_) => Err(WaitError::DeadlineExceeded),
			},
		}
	}

	async fn watch_until_ready(
		&self,
		pod: &PodRef,
		container: &str,
		deadline: Instant,
	) -> Result<(), WaitError> {
		let mut resource_version = INITIAL_RESOURCE_VERSION.to_string();

		loop {
			let mut events = match self
				.client
				.watch_pod(&pod.name, &pod.namespace, &resource_version)
				.await
			{
				Ok(events) => events,
				Err(e) if e.is_not_found() => {
					return Err(WaitError::PodDeleted {
						name: pod.name.clone(),
					});
				}
				Err(e) => {
					warn!(pod = %pod, error = %e, "Pod watch could not be established, retrying");
					tokio::time::sleep(RECONNECT_DELAY).await;
					continue;
				}
			};

			while let Some(item) = events.next().await {
				let event = match item {
					Ok(event) => event,
					Err(K8sError::MalformedEvent { message }) => {
						return Err(WaitError::MalformedEvent { message });
					}
					Err(e) => {
						warn!(pod = %pod, error = %e, "Pod watch interrupted");
						break;
					}
				};

				if let Some(version) = event.resource_version() {
					resource_version = version.to_string();
				}

				match evaluate(&event, container) {
					Step::Pending => {}
					Step::Ready => {
						if Instant::now() >= deadline {
							return Err(WaitError::DeadlineExceeded);
						}
						return Ok(());
					}
					Step::Deleted => {
						return Err(WaitError::PodDeleted {
							name: pod.name.clone(),
						});
					}
					Step::Resync => {
						debug!(pod = %pod, "Resource version expired, resyncing watch");
						resource_version = INITIAL_RESOURCE_VERSION.to_string();
						break;
					}
					Step::Malformed(message) => return Err(WaitError::MalformedEvent { message }),
				}
			}

			debug!(pod = %pod, resource_version = %resource_version, "Resuming pod watch");
			tokio::time::sleep(RECONNECT_DELAY).await;
		}
	}
}
