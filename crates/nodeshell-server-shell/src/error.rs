// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Session error types.
//!
//! The `Display` of every [`SessionError`] is the notice sent to the client
//! before the connection is torn down.

use nodeshell_server_k8s::K8sError;

use crate::pod_spec::PodRef;

/// Failure categories reported for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
	/// The requested node or the session's pod does not exist.
	NotFound,
	/// The readiness wait ran out of time.
	DeadlineExceeded,
	/// A cluster API call failed for another reason.
	TransientInfra,
	/// Reading, writing or the exec channel failed while streaming.
	StreamFault,
	/// The session limit was reached.
	Capacity,
	/// The server is shutting down.
	Cancelled,
}

/// Errors that terminate a node shell session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
	#[error("too many active node shell sessions (max {max})")]
	TooManySessions { max: u32 },

	#[error("node {node} not found")]
	NodeNotFound { node: String },

	#[error("get node {node} failed: {message}")]
	NodeLookup { node: String, message: String },

	#[error("create pod {pod} failed: {source}")]
	CreatePod {
		pod: PodRef,
		#[source]
		source: K8sError,
	},

	#[error("pod {pod} not found")]
	PodNotFound { pod: PodRef },

	#[error("wait for pod {pod} running timed out after {timeout_secs}s")]
	ReadyTimeout { pod: PodRef, timeout_secs: u64 },

	#[error("wait for pod {pod} running failed: {message}")]
	WaitForContainer { pod: PodRef, message: String },

	#[error("exec into pod {pod} failed: {source}")]
	Exec {
		pod: PodRef,
		#[source]
		source: K8sError,
	},

	#[error("shell stream failed: {message}")]
	Stream { message: String },

	#[error("node shell session cancelled")]
	Cancelled,
}

impl SessionError {
	pub fn kind(&self) -> ErrorKind {
		match self {
			SessionError::TooManySessions { .. } => ErrorKind::Capacity,
			SessionError::NodeNotFound { .. } | SessionError::PodNotFound { .. } => {
				ErrorKind::NotFound
			}
			SessionError::ReadyTimeout { .. } => ErrorKind::DeadlineExceeded,
			SessionError::NodeLookup { .. }
			| SessionError::CreatePod { .. }
			| SessionError::WaitForContainer { .. }
			| SessionError::Exec { .. } => ErrorKind::TransientInfra,
			SessionError::Stream { .. } => ErrorKind::StreamFault,
			SessionError::Cancelled => ErrorKind::Cancelled,
		}
	}
}
