// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

#![allow(dead_code)]

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::channel::mpsc;
use futures::{stream, Sink, SinkExt, StreamExt};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use nodeshell_server_k8s::{
	ContainerState, ContainerStateRunning, ContainerStateWaiting, ContainerStatus, ExecProcess,
	K8sClient, K8sError, Namespace, Node, NodeLookup, NodeLookupError, Pod, PodEvent,
	PodEventStream, PodStatus, TerminalSize,
};
use nodeshell_server_shell::{ClientFrame, ServerFrame, ShellConfig, TerminalBridge, TerminalError};
use tokio::io::{duplex, DuplexStream};

pub const CONTAINER: &str = "node-shell";

/// A scripted watch response.
pub enum ScriptedWatch {
	/// Deliver the events, then end the stream.
	Closes(Vec<Result<PodEvent, K8sError>>),
	/// Deliver the events, then stay open without further events.
	StaysOpen(Vec<Result<PodEvent, K8sError>>),
	/// Fail to establish the watch.
	Fails(K8sError),
}

/// In-memory [`K8sClient`] recording every mutating call.
#[derive(Default)]
pub struct MockK8sClient {
	created: Mutex<Vec<Pod>>,
	deleted: Mutex<Vec<String>>,
	watch_versions: Mutex<Vec<String>>,
	watches: Mutex<VecDeque<ScriptedWatch>>,
	create_error: Mutex<Option<K8sError>>,
	exec_process: Mutex<Option<ExecProcess>>,
	exec_commands: Mutex<Vec<Vec<String>>>,
	listed: Mutex<Vec<Pod>>,
}

impl MockK8sClient {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn script_watch(&self, watch: ScriptedWatch) {
		self.watches.lock().unwrap().push_back(watch);
	}

	pub fn fail_create(&self, error: K8sError) {
		*self.create_error.lock().unwrap() = Some(error);
	}

	pub fn set_exec(&self, process: ExecProcess) {
		*self.exec_process.lock().unwrap() = Some(process);
	}

	pub fn set_listed(&self, pods: Vec<Pod>) {
		*self.listed.lock().unwrap() = pods;
	}

	pub fn created(&self) -> Vec<Pod> {
		self.created.lock().unwrap().clone()
	}

	pub fn created_names(&self) -> Vec<String> {
		self
			.created()
			.iter()
			.filter_map(|p| p.metadata.name.clone())
			.collect()
	}

	pub fn deleted(&self) -> Vec<String> {
		self.deleted.lock().unwrap().clone()
	}

	pub fn watch_versions(&self) -> Vec<String> {
		self.watch_versions.lock().unwrap().clone()
	}

	pub fn exec_commands(&self) -> Vec<Vec<String>> {
		self.exec_commands.lock().unwrap().clone()
	}
}

#[async_trait]
impl K8sClient for MockK8sClient {
	async fn create_pod(&self, _namespace: &str, pod: Pod) -> Result<Pod, K8sError> {
		if let Some(error) = self.create_error.lock().unwrap().take() {
			return Err(error);
		}
		self.created.lock().unwrap().push(pod.clone());
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
		Ok(self.listed.lock().unwrap().clone())
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
		_name: &str,
		_namespace: &str,
		resource_version: &str,
	) -> Result<PodEventStream, K8sError> {
		self
			.watch_versions
			.lock()
			.unwrap()
			.push(resource_version.to_string());
		let scripted = self.watches.lock().unwrap().pop_front();
		Ok(match scripted {
			Some(ScriptedWatch::Fails(error)) => return Err(error),
			Some(ScriptedWatch::Closes(events)) => Box::pin(stream::iter(events)),
			Some(ScriptedWatch::StaysOpen(events)) => {
				Box::pin(stream::iter(events).chain(stream::pending()))
			}
			None => Box::pin(stream::pending::<Result<PodEvent, K8sError>>()),
		})
	}

	async fn exec(
		&self,
		_name: &str,
		_namespace: &str,
		_container: &str,
		command: &[String],
	) -> Result<ExecProcess, K8sError> {
		self.exec_commands.lock().unwrap().push(command.to_vec());
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

/// Fixed node set for lookups.
pub struct StaticNodes {
	names: HashSet<String>,
	available: bool,
}

impl StaticNodes {
	pub fn new(names: &[&str]) -> Self {
		Self {
			names: names.iter().map(|n| n.to_string()).collect(),
			available: true,
		}
	}

	pub fn unavailable() -> Self {
		Self {
			names: HashSet::new(),
			available: false,
		}
	}
}

impl NodeLookup for StaticNodes {
	fn lookup(&self, name: &str) -> Result<Arc<Node>, NodeLookupError> {
		if !self.available {
			return Err(NodeLookupError::Unavailable {
				message: "node watch is not in sync with the API server".to_string(),
			});
		}
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
}

/// The remote end of a mock exec channel.
pub struct RemoteShell {
	/// Reads what the session wrote to the shell's stdin.
	pub stdin: DuplexStream,
	/// Writes shell output; dropping it ends the output stream.
	pub stdout: DuplexStream,
	pub resizes: mpsc::UnboundedReceiver<TerminalSize>,
}

pub fn exec_pair() -> (ExecProcess, RemoteShell) {
	let (stdin_local, stdin_remote) = duplex(4096);
	let (stdout_local, stdout_remote) = duplex(4096);
	let (resize_tx, resize_rx) = mpsc::unbounded();
	let resize = resize_tx.sink_map_err(|e| K8sError::ExecError {
		message: e.to_string(),
	});
	let process = ExecProcess {
		stdin: Box::pin(stdin_local),
		stdout: Box::pin(stdout_local),
		resize: Some(Box::pin(resize)),
		completion: Box::pin(async { Ok(()) }),
	};
	(
		process,
		RemoteShell {
			stdin: stdin_remote,
			stdout: stdout_remote,
			resizes: resize_rx,
		},
	)
}

/// The client end of a [`TerminalBridge`].
pub struct Client {
	pub input: mpsc::UnboundedSender<Result<ClientFrame, TerminalError>>,
	pub output: mpsc::UnboundedReceiver<ServerFrame>,
}

impl Client {
	pub async fn next_notice(&mut self) -> String {
		loop {
			match self.output.next().await {
				Some(ServerFrame::Notice(text)) => return text,
				Some(ServerFrame::Output(_)) => continue,
				None => panic!("connection closed before notice"),
			}
		}
	}

	pub async fn next_output(&mut self) -> Vec<u8> {
		loop {
			match self.output.next().await {
				Some(ServerFrame::Output(bytes)) => return bytes.to_vec(),
				Some(ServerFrame::Notice(_)) => continue,
				None => panic!("connection closed before output"),
			}
		}
	}

	/// Every frame still buffered, as notices only.
	pub fn drain_notices(&mut self) -> Vec<String> {
		let mut notices = Vec::new();
		while let Ok(Some(frame)) = self.output.try_next() {
			if let ServerFrame::Notice(text) = frame {
				notices.push(text);
			}
		}
		notices
	}
}

pub type TestBridge = TerminalBridge<
	mpsc::UnboundedReceiver<Result<ClientFrame, TerminalError>>,
	Box<dyn Sink<ServerFrame, Error = TerminalError> + Send + Unpin>,
>;

pub fn connection() -> (Arc<TestBridge>, Client) {
	let (input_tx, input_rx) = mpsc::unbounded();
	let (output_tx, output_rx) = mpsc::unbounded();
	let sink: Box<dyn Sink<ServerFrame, Error = TerminalError> + Send + Unpin> = Box::new(
		output_tx.sink_map_err(|e| TerminalError::Transport(e.to_string())),
	);
	(
		Arc::new(TerminalBridge::new(input_rx, sink)),
		Client {
			input: input_tx,
			output: output_rx,
		},
	)
}

pub fn test_config() -> ShellConfig {
	ShellConfig {
		reaper_interval_secs: 0,
		..ShellConfig::default()
	}
}

fn pod(resource_version: &str, state: Option<ContainerState>) -> Pod {
	Pod {
		metadata: ObjectMeta {
			name: Some("node-shell-test".to_string()),
			resource_version: Some(resource_version.to_string()),
			..Default::default()
		},
		spec: None,
		status: Some(PodStatus {
			container_statuses: state.map(|state| {
				vec![ContainerStatus {
					name: CONTAINER.to_string(),
					state: Some(state),
					..Default::default()
				}]
			}),
			..Default::default()
		}),
	}
}

pub fn pending_pod(resource_version: &str) -> Pod {
	pod(
		resource_version,
		Some(ContainerState {
			waiting: Some(ContainerStateWaiting {
				reason: Some("ContainerCreating".to_string()),
				..Default::default()
			}),
			..Default::default()
		}),
	)
}

pub fn running_pod(resource_version: &str) -> Pod {
	pod(
		resource_version,
		Some(ContainerState {
			running: Some(ContainerStateRunning::default()),
			..Default::default()
		}),
	)
}
