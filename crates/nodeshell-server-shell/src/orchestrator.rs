// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Drives one node shell session from node check to pod deletion.

use std::sync::Arc;

use nodeshell_server_k8s::{K8sClient, K8sError, NodeLookup, NodeLookupError};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, warn, Instrument};

use crate::config::ShellConfig;
use crate::error::SessionError;
use crate::exec::{self, StreamEnd};
use crate::lifecycle::PodLifecycle;
use crate::pod_spec::{build_pod_spec, generate_pod_name, PodRef};
use crate::readiness::{ReadinessWatcher, WaitError};
use crate::session::{PodGuard, Session, SessionPhase};
use crate::terminal::{Notifier, TerminalStream};

/// Summary of a finished session.
#[derive(Debug)]
pub struct SessionReport {
	pub trace_id: String,
	pub node: String,
	pub pod: Option<PodRef>,
	pub phase: SessionPhase,
	pub end: Option<StreamEnd>,
	pub error: Option<SessionError>,
}

impl SessionReport {
	pub fn is_success(&self) -> bool {
		self.phase == SessionPhase::Closed
	}
}

/// Resources a session holds until its teardown finishes.
#[derive(Default)]
struct Held {
	slot: Option<OwnedSemaphorePermit>,
	pod: Option<PodGuard>,
}

/// Entry point for node shell sessions.
///
/// Shared across all connections; each call to [`NodeShell::run_session`]
/// owns its own [`Session`] and at most one pod.
pub struct NodeShell {
	client: Arc<dyn K8sClient>,
	nodes: Arc<dyn NodeLookup>,
	lifecycle: PodLifecycle,
	readiness: ReadinessWatcher,
	config: ShellConfig,
	sessions: Arc<Semaphore>,
	shutdown: CancellationToken,
}

impl NodeShell {
	pub fn new(
		client: Arc<dyn K8sClient>,
		nodes: Arc<dyn NodeLookup>,
		config: ShellConfig,
		shutdown: CancellationToken,
	) -> Self {
		let lifecycle = PodLifecycle::new(Arc::clone(&client), &config);
		let readiness = ReadinessWatcher::new(Arc::clone(&client));
		let sessions = Arc::new(Semaphore::new(config.max_sessions as usize));
		Self {
			client,
			nodes,
			lifecycle,
			readiness,
			config,
			sessions,
			shutdown,
		}
	}

	pub fn config(&self) -> &ShellConfig {
		&self.config
	}

	/// Number of sessions currently holding a slot.
	pub fn active_sessions(&self) -> usize {
		(self.config.max_sessions as usize).saturating_sub(self.sessions.available_permits())
	}

	/// Check that the configured pod namespace exists.
	pub async fn validate_namespace(&self) -> Result<(), K8sError> {
		self.client.get_namespace(&self.config.namespace).await?;
		info!(namespace = %self.config.namespace, "Node shell namespace validated");
		Ok(())
	}

	/// Run a full session for `node` over `conn`.
	///
	/// Every pod this creates is deleted exactly once before returning,
	/// whatever the outcome. Failures are sent to the client as a notice
	/// and returned in the report.
	pub async fn run_session<C>(&self, node: &str, conn: &C) -> SessionReport
	where
		C: TerminalStream + Notifier + ?Sized,
	{
		let mut session = Session::new(node);
		let span = info_span!("node_shell", trace_id = %session.trace_id(), node = %node);

		async {
			let mut held = Held::default();
			let result = self.drive(&mut session, conn, &mut held).await;

			let (end, error) = match result {
				Ok(end) => {
					session.advance(SessionPhase::Closed);
					info!(end = ?end, "Node shell session closed");
					(Some(end), None)
				}
				Err(e) => {
					session.advance(SessionPhase::Aborted);
					warn!(error = %e, kind = ?e.kind(), phase = "aborted", "Node shell session failed");
					if let Err(notify_err) = conn.notify(&e.to_string()).await {
						tracing::debug!(error = %notify_err, "Could not deliver failure notice");
					}
					(None, Some(e))
				}
			};

			if let Some(guard) = held.pod.take() {
				guard.release().await;
			}
			drop(held.slot);

			SessionReport {
				trace_id: session.trace_id().to_string(),
				node: session.node().to_string(),
				pod: session.pod().cloned(),
				phase: session.phase(),
				end,
				error,
			}
		}
		.instrument(span)
		.await
	}

	async fn drive<C>(
		&self,
		session: &mut Session,
		conn: &C,
		held: &mut Held,
	) -> Result<StreamEnd, SessionError>
	where
		C: TerminalStream + Notifier + ?Sized,
	{
		held.slot = Some(self.acquire_slot()?);
		let node = session.node().to_string();

		self.nodes.lookup(&node).map_err(|e| match e {
			NodeLookupError::NotFound { .. } => SessionError::NodeNotFound { node: node.clone() },
			NodeLookupError::Unavailable { message } => SessionError::NodeLookup {
				node: node.clone(),
				message,
			},
		})?;
		session.advance(SessionPhase::NodeChecked);

		let pod_ref = PodRef {
			namespace: self.config.namespace.clone(),
			name: generate_pod_name(),
		};
		let pod = build_pod_spec(&pod_ref, &node, session.trace_id(), &self.config);
		notice(conn, &format!("start create pod {pod_ref}...")).await;
		info!(pod = %pod_ref, "Creating node shell pod");

		if let Err(source) = self.lifecycle.create(&pod_ref, pod).await {
			// A timed out create may still land; make sure it is removed.
			if matches!(source, K8sError::Timeout) {
				held.pod = Some(PodGuard::new(self.lifecycle.clone(), pod_ref.clone()));
			}
			return Err(SessionError::CreatePod {
				pod: pod_ref,
				source,
			});
		}
		held.pod = Some(PodGuard::new(self.lifecycle.clone(), pod_ref.clone()));
		session.set_pod(pod_ref.clone());
		session.advance(SessionPhase::PodCreated);
		notice(conn, "create pod success and wait for pod running...").await;

		self.wait_ready(&pod_ref).await?;
		session.advance(SessionPhase::ContainerReady);
		notice(conn, "node shell pod running success").await;
		info!(pod = %pod_ref, "Node shell pod running");

		let process = tokio::time::timeout(
			self.config.api_timeout(),
			self
				.client
				.exec(&pod_ref.name, &pod_ref.namespace, &self.config.container_name, &self.config.command),
		)
		.await
		.unwrap_or(Err(K8sError::Timeout))
		.map_err(|source| SessionError::Exec {
			pod: pod_ref.clone(),
			source,
		})?;
		session.advance(SessionPhase::Streaming);
		info!(pod = %pod_ref, "Node shell stream started");

		tokio::select! {
			result = exec::run(process, conn) => result,
			_ = self.shutdown.cancelled() => Err(SessionError::Cancelled),
		}
	}

	fn acquire_slot(&self) -> Result<OwnedSemaphorePermit, SessionError> {
		Arc::clone(&self.sessions)
			.try_acquire_owned()
			.map_err(|_| SessionError::TooManySessions {
				max: self.config.max_sessions,
			})
	}

	async fn wait_ready(&self, pod: &PodRef) -> Result<(), SessionError> {
		let deadline = Instant::now() + self.config.ready_timeout();
		let cancel = self.shutdown.child_token();
		self
			.readiness
			.wait_ready(pod, &self.config.container_name, deadline, &cancel)
			.await
			.map_err(|e| match e {
				WaitError::PodDeleted { .. } => SessionError::PodNotFound { pod: pod.clone() },
				WaitError::DeadlineExceeded => SessionError::ReadyTimeout {
					pod: pod.clone(),
					timeout_secs: self.config.ready_timeout_secs,
				},
				WaitError::Cancelled => SessionError::Cancelled,
				WaitError::MalformedEvent { message } => SessionError::WaitForContainer {
					pod: pod.clone(),
					message,
				},
				WaitError::Api(e) => SessionError::WaitForContainer {
					pod: pod.clone(),
					message: e.to_string(),
				},
			})
	}
}

async fn notice<N: Notifier + ?Sized>(conn: &N, message: &str) {
	if let Err(e) = conn.notify(message).await {
		tracing::debug!(error = %e, "Could not deliver progress notice");
	}
}
