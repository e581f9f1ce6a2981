// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

#![allow(dead_code)]

use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::stream;
use futures::StreamExt;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use nodeshell_server::AppState;
use nodeshell_server_k8s::{
	ContainerState, ContainerStateRunning, ContainerStatus, ExecProcess, K8sClient, K8sError,
	Namespace, Node, NodeLookup, NodeLookupError, Pod, PodEvent, PodEventStream, PodStatus,
};
use nodeshell_server_shell::{NodeShell, ShellConfig};
use tokio::io::{duplex, DuplexStream};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

/// Cluster double whose pods start running immediately.
#[derive(Default)]
pub struct MockK8sClient {
	created: Mutex<Vec<String>>,
	deleted: Mutex<Vec<String>>,
	exec_process: Mutex<Option<ExecProcess>>,
}

impl MockK8sClient {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn set_exec(&self, process: ExecProcess) {
		*self.exec_process.lock().unwrap() = Some(process);
	}

	pub fn created(&self) -> Vec<String> {
		self.created.lock().unwrap().clone()
	}

	pub fn deleted(&self) -> Vec<String> {
		self.deleted.lock().unwrap().clone()
	}

	/// Poll until `n` pods were deleted or a second passes.
	pub async fn wait_for_deletes(&self, n: usize) -> Vec<String> {
		for _ in 0..100 {
			let deleted = self.deleted();
			if deleted.len() >= n {
				return deleted;
			}
			tokio::time::sleep(Duration::from_millis(10)).await;
		}
		self.deleted()
	}
}

#[async_trait]
impl K8sClient for MockK8sClient {
	async fn create_pod(&self, _namespace: &str, pod: Pod) -> Result<Pod, K8sError> {
		let name = pod.metadata.name.clone().unwrap_or_default();
		self.created.lock().unwrap().push(name);
		Ok(pod)
	}

	async fn delete_pod(
		&self,
		name: &str,
		_namespace: &str,
		_grace_period_seconds: u32,
	) -> Result<(), K8sError> {
		self.deleted.lock().unwrap().push(name.to_string());
		Ok(())
	}

	async fn list_pods(&self, _namespace: &str, _label_selector: &str) -> Result<Vec<Pod>, K8sError> {
		Ok(Vec::new())
	}

	async fn get_namespace(&self, name: &str) -> Result<Namespace, K8sError> {
		Ok(Namespace {
			metadata: ObjectMeta {
				name: Some(name.to_string()),
				..Default::default()
			},
			..Default::default()
		})
	}

	async fn watch_pod(
		&self,
		name: &str,
		_namespace: &str,
		_resource_version: &str,
	) -> Result<PodEventStream, K8sError> {
		let pod = Pod {
			metadata: ObjectMeta {
				name: Some(name.to_string()),
				resource_version: Some("1".to_string()),
				..Default::default()
			},
			spec: None,
			status: Some(PodStatus {
				container_statuses: Some(vec![ContainerStatus {
					name: "node-shell".to_string(),
					state: Some(ContainerState {
						running: Some(ContainerStateRunning::default()),
						..Default::default()
					}),
					..Default::default()
				}]),
				..Default::default()
			}),
		};
		Ok(Box::pin(
			stream::iter(vec![Ok::<_, K8sError>(PodEvent::Added(pod))]).chain(stream::pending()),
		))
	}

	async fn exec(
		&self,
		_name: &str,
		_namespace: &str,
		_container: &str,
		_command: &[String],
	) -> Result<ExecProcess, K8sError> {
		self
			.exec_process
			.lock()
			.unwrap()
			.take()
			.ok_or_else(|| K8sError::ExecError {
				message: "container not found".to_string(),
			})
	}
}

/// Fixed node set with a switchable sync state.
pub struct StaticNodes {
	names: HashSet<String>,
	synced: AtomicBool,
}

impl StaticNodes {
	pub fn new(names: &[&str]) -> Self {
		Self {
			names: names.iter().map(|n| n.to_string()).collect(),
			synced: AtomicBool::new(true),
		}
	}

	pub fn set_synced(&self, synced: bool) {
		self.synced.store(synced, Ordering::Relaxed);
	}
}

impl NodeLookup for StaticNodes {
	fn lookup(&self, name: &str) -> Result<Arc<Node>, NodeLookupError> {
		if !self.names.contains(name) {
			return Err(NodeLookupError::NotFound {
				name: name.to_string(),
			});
		}
		Ok(Arc::new(Node {
			metadata: ObjectMeta {
				name: Some(name.to_string()),
				..Default::default()
			},
			..Default::default()
		}))
	}

	fn is_synced(&self) -> bool {
		self.synced.load(Ordering::Relaxed)
	}
}

pub struct TestApp {
	pub client: Arc<MockK8sClient>,
	pub nodes: Arc<StaticNodes>,
	pub state: AppState,
	pub shutdown: CancellationToken,
}

pub fn test_app(nodes: &[&str]) -> TestApp {
	let client = Arc::new(MockK8sClient::new());
	let nodes = Arc::new(StaticNodes::new(nodes));
	let shutdown = CancellationToken::new();
	let config = ShellConfig {
		reaper_interval_secs: 0,
		..ShellConfig::default()
	};
	let shell = Arc::new(NodeShell::new(
		client.clone(),
		nodes.clone(),
		config,
		shutdown.clone(),
	));
	TestApp {
		client,
		nodes: nodes.clone(),
		state: AppState { shell, nodes },
		shutdown,
	}
}

/// Serve the app on an ephemeral local port.
pub async fn spawn_server(app: &TestApp) -> SocketAddr {
	let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
	let addr = listener.local_addr().unwrap();
	tokio::spawn(nodeshell_server::serve(
		listener,
		app.state.clone(),
		app.shutdown.clone(),
		Duration::from_secs(1),
	));
	addr
}

pub struct RemoteShell {
	pub stdin: DuplexStream,
	pub stdout: DuplexStream,
}

pub fn exec_pair() -> (ExecProcess, RemoteShell) {
	let (stdin_local, stdin_remote) = duplex(4096);
	let (stdout_local, stdout_remote) = duplex(4096);
	let process = ExecProcess {
		stdin: Box::pin(stdin_local),
		stdout: Box::pin(stdout_local),
		resize: None,
		completion: Box::pin(async { Ok(()) }),
	};
	(
		process,
		RemoteShell {
			stdin: stdin_remote,
			stdout: stdout_remote,
		},
	)
}
