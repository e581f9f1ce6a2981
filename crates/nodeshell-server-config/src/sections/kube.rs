// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Cluster connection configuration.

use std::path::PathBuf;

use serde::Deserialize;

/// Kubernetes connection settings (runtime).
///
/// Without an explicit kubeconfig the client falls back to in-cluster
/// credentials, then `KUBECONFIG`, then `~/.kube/config`.
#[derive(Debug, Clone, Default)]
pub struct KubeConfig {
	pub kubeconfig: Option<PathBuf>,
}

/// Kubernetes connection layer (partial, for merging).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KubeConfigLayer {
	#[serde(default)]
	pub kubeconfig: Option<PathBuf>,
}

impl KubeConfigLayer {
	pub fn merge(&mut self, other: KubeConfigLayer) {
		if other.kubeconfig.is_some() {
			self.kubeconfig = other.kubeconfig;
		}
	}

	pub fn finalize(self) -> KubeConfig {
		KubeConfig {
			kubeconfig: self.kubeconfig,
		}
	}
}
