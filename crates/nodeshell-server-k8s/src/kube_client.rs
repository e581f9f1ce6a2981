// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use std::path::Path;

use async_trait::async_trait;
use futures::{future, SinkExt, StreamExt};
use k8s_openapi::api::core::v1::{Namespace, Pod};
use kube::{
	api::{Api, AttachParams, DeleteParams, ListParams, PostParams, WatchParams},
	config::{KubeConfigOptions, Kubeconfig},
	Client, Config,
};
use tracing::{debug, instrument};

use crate::client::K8sClient;
use crate::error::K8sError;
use crate::types::{ExecCompletion, ExecProcess, PodEvent, PodEventStream, ResizeSink, TerminalSize};

/// Server-side timeout for a single watch request. Watches are resumed by
/// the caller after the server closes them.
const WATCH_TIMEOUT_SECS: u32 = 290;

/// Production K8s client implementation using the kube crate.
#[derive(Clone)]
pub struct KubeClient {
	client: Client,
}

impl KubeClient {
	/// Create a new KubeClient.
	///
	/// With an explicit kubeconfig path the file is loaded as-is. Otherwise
	/// configuration is auto-discovered from:
	/// 1. In-cluster service account (when running in K8s)
	/// 2. KUBECONFIG environment variable
	/// 3. ~/.kube/config
	pub async fn new(kubeconfig: Option<&Path>) -> Result<Self, K8sError> {
		let client = match kubeconfig {
			Some(path) => {
				let kubeconfig = Kubeconfig::read_from(path).map_err(|e| K8sError::ConfigError {
					message: format!("{}: {e}", path.display()),
				})?;
				let config = Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
					.await
					.map_err(|e| K8sError::ConfigError {
						message: e.to_string(),
					})?;
				Client::try_from(config)?
			}
			None => Client::try_default().await?,
		};
		debug!(kubeconfig = ?kubeconfig, "K8s client initialized");
		Ok(Self { client })
	}

	/// The underlying kube client, for components that drive their own
	/// watches (the node cache).
	pub fn kube(&self) -> Client {
		self.client.clone()
	}
}

#[async_trait]
impl K8sClient for KubeClient {
	#[instrument(skip(self, pod), fields(pod = ?pod.metadata.name))]
	async fn create_pod(&self, namespace: &str, pod: Pod) -> Result<Pod, K8sError> {
		let pods: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
		let pod = pods.create(&PostParams::default(), &pod).await?;
		Ok(pod)
	}

	#[instrument(skip(self))]
	async fn delete_pod(
		&self,
		name: &str,
		namespace: &str,
		grace_period_seconds: u32,
	) -> Result<(), K8sError> {
		let pods: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
		let dp = DeleteParams {
			grace_period_seconds: Some(grace_period_seconds),
			..Default::default()
		};
		match pods.delete(name, &dp).await {
			Ok(_) => Ok(()),
			Err(kube::Error::Api(err)) if err.code == 404 => {
				Err(K8sError::PodNotFound { name: name.into() })
			}
			Err(e) => Err(e.into()),
		}
	}

	async fn list_pods(&self, namespace: &str, label_selector: &str) -> Result<Vec<Pod>, K8sError> {
		let pods: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
		let lp = ListParams::default().labels(label_selector);
		let pod_list = pods.list(&lp).await?;
		Ok(pod_list.items)
	}

	async fn get_namespace(&self, name: &str) -> Result<Namespace, K8sError> {
		let namespaces: Api<Namespace> = Api::all(self.client.clone());
		match namespaces.get(name).await {
			Ok(ns) => Ok(ns),
			Err(kube::Error::Api(err)) if err.code == 404 => {
				Err(K8sError::NamespaceNotFound { name: name.into() })
			}
			Err(e) => Err(e.into()),
		}
	}

	async fn watch_pod(
		&self,
		name: &str,
		namespace: &str,
		resource_version: &str,
	) -> Result<PodEventStream, K8sError> {
		let pods: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
		let wp = WatchParams::default()
			.fields(&format!("metadata.name={name}"))
			.timeout(WATCH_TIMEOUT_SECS);

		debug!(pod = %name, resource_version = %resource_version, "Starting pod watch");
		let stream = pods
			.watch(&wp, resource_version)
			.await
			.map_err(|e| K8sError::WatchError {
				message: e.to_string(),
			})?;

		let mapped = stream.map(|item| match item {
			Ok(event) => Ok(PodEvent::from(event)),
			Err(kube::Error::SerdeError(e)) => Err(K8sError::MalformedEvent {
				message: e.to_string(),
			}),
			Err(e) => Err(K8sError::WatchError {
				message: e.to_string(),
			}),
		});
		Ok(Box::pin(mapped))
	}

	#[instrument(skip(self))]
	async fn exec(
		&self,
		name: &str,
		namespace: &str,
		container: &str,
		command: &[String],
	) -> Result<ExecProcess, K8sError> {
		let pods: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
		// Interactive TTY: stdin + stdout, stderr merged by the remote pty.
		let ap = AttachParams::interactive_tty().container(container);

		let mut attached = pods
			.exec(name, command.to_vec(), &ap)
			.await
			.map_err(|e| match e {
				kube::Error::Api(ref err) if err.code == 404 => {
					K8sError::PodNotFound { name: name.into() }
				}
				_ => K8sError::ExecError {
					message: e.to_string(),
				},
			})?;

		let stdin = attached.stdin().ok_or_else(|| K8sError::ExecError {
			message: "stdin not available".into(),
		})?;
		let stdout = attached.stdout().ok_or_else(|| K8sError::ExecError {
			message: "stdout not available".into(),
		})?;

		let resize = attached.terminal_size().map(|sender| {
			let sink = sender
				.sink_map_err(|e| K8sError::ExecError {
					message: e.to_string(),
				})
				.with(|size: TerminalSize| {
					future::ready(Ok::<_, K8sError>(kube::api::TerminalSize {
						width: size.cols,
						height: size.rows,
					}))
				});
			Box::pin(sink) as ResizeSink
		});

		let completion: ExecCompletion = Box::pin(async move {
			attached.join().await.map_err(|e| K8sError::ExecError {
				message: e.to_string(),
			})
		});

		Ok(ExecProcess {
			stdin: Box::pin(stdin),
			stdout: Box::pin(stdout),
			resize,
			completion,
		})
	}
}
