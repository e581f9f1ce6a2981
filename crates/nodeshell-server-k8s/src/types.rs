// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use std::future::Future;
use std::pin::Pin;

use futures::{Sink, Stream};
use kube::core::WatchEvent;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::K8sError;

pub use k8s_openapi::api::core::v1::{
	Container, ContainerState, ContainerStateRunning, ContainerStateTerminated,
	ContainerStateWaiting, ContainerStatus, Namespace, Node, Pod, PodSpec, PodStatus,
	SecurityContext,
};

/// Size of the remote pseudo-terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TerminalSize {
	pub rows: u16,
	pub cols: u16,
}

/// A single change notification from a pod watch.
#[derive(Debug, Clone)]
pub enum PodEvent {
	Added(Pod),
	Modified(Pod),
	Deleted(Pod),
	/// Progress marker carrying only a resource version.
	Bookmark { resource_version: String },
	/// The API server sent a status object instead of a pod.
	Error { code: u16, message: String },
}

impl PodEvent {
	/// Resource version carried by this event, if any.
	pub fn resource_version(&self) -> Option<&str> {
		match self {
			PodEvent::Added(pod) | PodEvent::Modified(pod) | PodEvent::Deleted(pod) => {
				pod.metadata.resource_version.as_deref()
			}
			PodEvent::Bookmark { resource_version } => Some(resource_version),
			PodEvent::Error { .. } => None,
		}
	}
}

impl From<WatchEvent<Pod>> for PodEvent {
	fn from(event: WatchEvent<Pod>) -> Self {
		match event {
			WatchEvent::Added(pod) => PodEvent::Added(pod),
			WatchEvent::Modified(pod) => PodEvent::Modified(pod),
			WatchEvent::Deleted(pod) => PodEvent::Deleted(pod),
			WatchEvent::Bookmark(bookmark) => PodEvent::Bookmark {
				resource_version: bookmark.metadata.resource_version,
			},
			WatchEvent::Error(err) => PodEvent::Error {
				code: err.code,
				message: err.message,
			},
		}
	}
}

/// A pinned stream of events from a single-pod watch.
pub type PodEventStream = Pin<Box<dyn Stream<Item = Result<PodEvent, K8sError>> + Send>>;

/// Sink forwarding terminal resizes to the remote pseudo-terminal.
pub type ResizeSink = Pin<Box<dyn Sink<TerminalSize, Error = K8sError> + Send>>;

/// Resolves once the exec channel has shut down.
pub type ExecCompletion = Pin<Box<dyn Future<Output = Result<(), K8sError>> + Send>>;

/// Interactive exec channel attached to a running container.
///
/// The remote side runs with a pseudo-terminal, so standard error is merged
/// into `stdout`.
pub struct ExecProcess {
	pub stdin: Pin<Box<dyn AsyncWrite + Send>>,
	pub stdout: Pin<Box<dyn AsyncRead + Send>>,
	pub resize: Option<ResizeSink>,
	pub completion: ExecCompletion,
}
