// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Server startup errors.

use nodeshell_server_config::ConfigError;
use nodeshell_server_k8s::K8sError;

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
	#[error(transparent)]
	Config(#[from] ConfigError),

	#[error("failed to connect to the cluster: {0}")]
	Kube(#[source] K8sError),

	#[error("node shell namespace {namespace} is not usable: {source}")]
	Namespace {
		namespace: String,
		#[source]
		source: K8sError,
	},

	#[error("node cache failed to start: {0}")]
	NodeCache(#[source] K8sError),

	#[error("failed to bind {addr}: {source}")]
	Bind {
		addr: String,
		#[source]
		source: std::io::Error,
	},

	#[error("server error: {0}")]
	Serve(#[source] std::io::Error),
}
