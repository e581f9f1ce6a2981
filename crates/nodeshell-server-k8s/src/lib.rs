// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! K8s client abstraction for node shell sessions.
//!
//! This crate provides:
//! - A trait-based K8s client abstraction for testability
//! - Production implementation using the kube crate
//! - A reflector-backed node cache answering synchronous existence checks
//! - Common types for pod watches and exec channels

mod client;
mod error;
mod kube_client;
mod node_cache;
mod types;

pub use client::K8sClient;
pub use error::K8sError;
pub use kube_client::KubeClient;
pub use node_cache::{NodeCache, NodeLookup, NodeLookupError};
pub use types::{
	Container, ContainerState, ContainerStateRunning, ContainerStateTerminated,
	ContainerStateWaiting, ContainerStatus, ExecCompletion, ExecProcess, Namespace, Node, Pod,
	PodEvent, PodEventStream, PodSpec, PodStatus, ResizeSink, SecurityContext, TerminalSize,
};
