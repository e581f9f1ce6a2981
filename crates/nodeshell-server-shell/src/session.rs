// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Session state and scoped pod ownership.

use std::fmt;

use crate::lifecycle::PodLifecycle;
use crate::pod_spec::PodRef;

/// Lifecycle phase of a node shell session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionPhase {
	Created,
	NodeChecked,
	PodCreated,
	ContainerReady,
	Streaming,
	Closed,
	Aborted,
}

impl SessionPhase {
	pub fn is_terminal(self) -> bool {
		matches!(self, SessionPhase::Closed | SessionPhase::Aborted)
	}

	/// Whether `next` is a legal successor of this phase.
	pub fn can_advance_to(self, next: SessionPhase) -> bool {
		use SessionPhase::*;
		match (self, next) {
			(Created, NodeChecked)
			| (NodeChecked, PodCreated)
			| (PodCreated, ContainerReady)
			| (ContainerReady, Streaming)
			| (Streaming, Closed) => true,
			(from, Aborted) => !from.is_terminal(),
			_ => false,
		}
	}

	pub fn as_str(self) -> &'static str {
		match self {
			SessionPhase::Created => "created",
			SessionPhase::NodeChecked => "node_checked",
			SessionPhase::PodCreated => "pod_created",
			SessionPhase::ContainerReady => "container_ready",
			SessionPhase::Streaming => "streaming",
			SessionPhase::Closed => "closed",
			SessionPhase::Aborted => "aborted",
		}
	}
}

impl fmt::Display for SessionPhase {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// One client connection's shell session.
#[derive(Debug)]
pub struct Session {
	trace_id: String,
	node: String,
	pod: Option<PodRef>,
	phase: SessionPhase,
}

impl Session {
	pub fn new(node: impl Into<String>) -> Self {
		Self {
			trace_id: uuid::Uuid::new_v4().to_string(),
			node: node.into(),
			pod: None,
			phase: SessionPhase::Created,
		}
	}

	pub fn trace_id(&self) -> &str {
		&self.trace_id
	}

	pub fn node(&self) -> &str {
		&self.node
	}

	pub fn pod(&self) -> Option<&PodRef> {
		self.pod.as_ref()
	}

	pub fn phase(&self) -> SessionPhase {
		self.phase
	}

	pub(crate) fn set_pod(&mut self, pod: PodRef) {
		self.pod = Some(pod);
	}

	/// Move to `next`. Illegal transitions are logged and ignored.
	pub(crate) fn advance(&mut self, next: SessionPhase) {
		if !self.phase.can_advance_to(next) {
			tracing::warn!(from = %self.phase, to = %next, "Ignoring illegal session transition");
			return;
		}
		tracing::debug!(from = %self.phase, to = %next, "Session transition");
		self.phase = next;
	}
}

/// Owns a created pod until it is released.
///
/// [`PodGuard::release`] deletes the pod in place. A guard dropped without
/// release (early return, panic, cancelled future) schedules the deletion
/// on the current runtime instead.
pub struct PodGuard {
	lifecycle: PodLifecycle,
	pod: PodRef,
	armed: bool,
}

impl PodGuard {
	pub fn new(lifecycle: PodLifecycle, pod: PodRef) -> Self {
		Self {
			lifecycle,
			pod,
			armed: true,
		}
	}

	pub fn pod(&self) -> &PodRef {
		&self.pod
	}

	/// Delete the pod now. Failures are logged only.
	pub async fn release(mut self) {
		self.lifecycle.delete(&self.pod).await;
		self.armed = false;
	}
}

impl Drop for PodGuard {
	fn drop(&mut self) {
		if !self.armed {
			return;
		}
		let lifecycle = self.lifecycle.clone();
		let pod = self.pod.clone();
		match tokio::runtime::Handle::try_current() {
			Ok(handle) => {
				tracing::warn!(pod = %pod, "Pod guard dropped, deleting pod in background");
				handle.spawn(async move { lifecycle.delete(&pod).await });
			}
			Err(_) => {
				tracing::error!(pod = %pod, "No runtime available, node shell pod left behind");
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use SessionPhase::*;

	#[test]
	fn forward_transitions_follow_the_happy_path() {
		let path = [Created, NodeChecked, PodCreated, ContainerReady, Streaming, Closed];
		for pair in path.windows(2) {
			assert!(pair[0].can_advance_to(pair[1]), "{} -> {}", pair[0], pair[1]);
		}
	}

	#[test]
	fn every_non_terminal_phase_can_abort() {
		for phase in [Created, NodeChecked, PodCreated, ContainerReady, Streaming] {
			assert!(phase.can_advance_to(Aborted));
		}
		assert!(!Closed.can_advance_to(Aborted));
		assert!(!Aborted.can_advance_to(Aborted));
	}

	#[test]
	fn phases_cannot_be_skipped() {
		assert!(!Created.can_advance_to(PodCreated));
		assert!(!NodeChecked.can_advance_to(Streaming));
		assert!(!ContainerReady.can_advance_to(Closed));
	}

	#[test]
	fn illegal_advance_is_ignored() {
		let mut session = Session::new("worker-1");
		session.advance(Streaming);
		assert_eq!(session.phase(), Created);
		session.advance(NodeChecked);
		assert_eq!(session.phase(), NodeChecked);
	}

	#[test]
	fn sessions_get_distinct_trace_ids() {
		let a = Session::new("worker-1");
		let b = Session::new("worker-1");
		assert_ne!(a.trace_id(), b.trace_id());
		assert_eq!(a.node(), "worker-1");
		assert!(a.pod().is_none());
	}
}
