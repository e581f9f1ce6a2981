// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Process-wide node cache.
//!
//! Node existence checks are answered from a reflector store that a single
//! background task keeps in sync with the API server. Sessions only read
//! from it, so a lookup never costs a network round trip.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use kube::runtime::reflector::{self, ObjectRef, Store};
use kube::runtime::{watcher, WatchStreamExt};
use kube::{Api, Client};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::K8sError;
use crate::types::Node;

/// Errors returned by a node lookup.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NodeLookupError {
	/// The node is not known to the cluster.
	#[error("node {name} not found")]
	NotFound { name: String },

	/// The cache cannot currently answer authoritatively.
	#[error("node cache unavailable: {message}")]
	Unavailable { message: String },
}

/// Synchronous node existence check.
pub trait NodeLookup: Send + Sync {
	fn lookup(&self, name: &str) -> Result<Arc<Node>, NodeLookupError>;

	/// Whether lookups currently reflect the cluster.
	fn is_synced(&self) -> bool {
		true
	}
}

/// Reflector-backed [`NodeLookup`].
#[derive(Clone)]
pub struct NodeCache {
	store: Store<Node>,
	healthy: Arc<AtomicBool>,
}

impl NodeCache {
	/// Start the node reflector and wait for its initial sync.
	///
	/// The background task stops when `shutdown` is cancelled.
	pub async fn start(
		client: Client,
		sync_timeout: Duration,
		shutdown: CancellationToken,
	) -> Result<Self, K8sError> {
		let nodes: Api<Node> = Api::all(client);
		let (store, writer) = reflector::store();
		let healthy = Arc::new(AtomicBool::new(true));

		let stream = watcher(nodes, watcher::Config::default())
			.default_backoff()
			.reflect(writer)
			.touched_objects();

		let task_healthy = Arc::clone(&healthy);
		tokio::spawn(async move {
			let mut stream = std::pin::pin!(stream);
			loop {
				tokio::select! {
					_ = shutdown.cancelled() => break,
					event = stream.next() => match event {
						Some(Ok(_)) => {
							if !task_healthy.swap(true, Ordering::Relaxed) {
								info!("Node cache watch recovered");
							}
						}
						Some(Err(e)) => {
							if task_healthy.swap(false, Ordering::Relaxed) {
								warn!(error = %e, "Node cache watch failing");
							}
						}
						None => break,
					}
				}
			}
			info!("Node cache task stopped");
		});

		match tokio::time::timeout(sync_timeout, store.wait_until_ready()).await {
			Ok(Ok(())) => {}
			Ok(Err(e)) => {
				return Err(K8sError::WatchError {
					message: e.to_string(),
				})
			}
			Err(_) => return Err(K8sError::Timeout),
		}

		info!(nodes = store.state().len(), "Node cache synced");
		Ok(Self { store, healthy })
	}

	/// Wrap an existing store, e.g. one fed by a test writer.
	pub fn from_store(store: Store<Node>) -> Self {
		Self {
			store,
			healthy: Arc::new(AtomicBool::new(true)),
		}
	}

	/// Whether the reflector's last watch interaction succeeded.
	pub fn is_healthy(&self) -> bool {
		self.healthy.load(Ordering::Relaxed)
	}

	/// Number of cached nodes.
	pub fn len(&self) -> usize {
		self.store.state().len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	#[cfg(test)]
	fn mark_unhealthy(&self) {
		self.healthy.store(false, Ordering::Relaxed);
	}
}

impl NodeLookup for NodeCache {
	fn lookup(&self, name: &str) -> Result<Arc<Node>, NodeLookupError> {
		match self.store.get(&ObjectRef::new(name)) {
			Some(node) => Ok(node),
			None if !self.is_healthy() => Err(NodeLookupError::Unavailable {
				message: "node watch is not in sync with the API server".to_string(),
			}),
			None => Err(NodeLookupError::NotFound {
				name: name.to_string(),
			}),
		}
	}

	fn is_synced(&self) -> bool {
		self.is_healthy()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

	fn node(name: &str) -> Node {
		Node {
			metadata: ObjectMeta {
				name: Some(name.to_string()),
				..Default::default()
			},
			..Default::default()
		}
	}

	fn cache_with(names: &[&str]) -> NodeCache {
		let (store, mut writer) = reflector::store::<Node>();
		for name in names {
			writer.apply_watcher_event(&watcher::Event::Apply(node(name)));
		}
		NodeCache::from_store(store)
	}

	#[test]
	fn lookup_finds_cached_node() {
		let cache = cache_with(&["worker-1", "worker-2"]);
		let found = cache.lookup("worker-1").unwrap();
		assert_eq!(found.metadata.name.as_deref(), Some("worker-1"));
		assert_eq!(cache.len(), 2);
	}

	#[test]
	fn lookup_missing_node_is_not_found() {
		let cache = cache_with(&["worker-1"]);
		assert_eq!(
			cache.lookup("worker-9").unwrap_err(),
			NodeLookupError::NotFound {
				name: "worker-9".to_string()
			}
		);
	}

	#[test]
	fn lookup_missing_node_while_unhealthy_is_unavailable() {
		let cache = cache_with(&["worker-1"]);
		cache.mark_unhealthy();
		assert!(matches!(
			cache.lookup("worker-9"),
			Err(NodeLookupError::Unavailable { .. })
		));
		assert!(cache.lookup("worker-1").is_ok());
	}

	#[test]
	fn not_found_message_matches_client_notice() {
		let err = NodeLookupError::NotFound {
			name: "worker-1".to_string(),
		};
		assert_eq!(err.to_string(), "node worker-1 not found");
	}
}
