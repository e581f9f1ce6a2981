// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Ephemeral shell pod descriptor.

use std::collections::BTreeMap;
use std::fmt;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use nodeshell_server_k8s::{Container, Pod, PodSpec, SecurityContext};

use crate::config::ShellConfig;

pub const MANAGED_LABEL: &str = "nodeshell.dev/managed";
pub const NODE_LABEL: &str = "nodeshell.dev/node";
pub const TRACE_ID_LABEL: &str = "nodeshell.dev/trace-id";
const NAME_PREFIX: &str = "node-shell-";
const NSENTER: &str = "nsenter";
const MAX_LABEL_LENGTH: usize = 63;

/// Namespace and name of a pod owned by a session.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PodRef {
	pub namespace: String,
	pub name: String,
}

impl fmt::Display for PodRef {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}/{}", self.namespace, self.name)
	}
}

/// Generate a collision-free pod name.
pub fn generate_pod_name() -> String {
	format!("{NAME_PREFIX}{}", uuid::Uuid::new_v4())
}

/// Clamp a string to a valid label value.
fn label_value(value: &str) -> String {
	let sanitized: String = value
		.chars()
		.map(|c| {
			if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
				c
			} else {
				'_'
			}
		})
		.take(MAX_LABEL_LENGTH)
		.collect();
	sanitized
		.trim_matches(|c: char| !c.is_ascii_alphanumeric())
		.to_string()
}

/// Build the privileged pod that hosts a shell on `node_name`.
///
/// The container joins the host's PID, IPC and network namespaces and its
/// main process is `nsenter` into pid 1's mount, UTS, IPC and network
/// namespaces followed by a bounded `sleep`, so the pod expires on its own
/// even if it is never deleted.
pub fn build_pod_spec(pod: &PodRef, node_name: &str, trace_id: &str, config: &ShellConfig) -> Pod {
	let mut labels = BTreeMap::new();
	labels.insert(MANAGED_LABEL.to_string(), "true".to_string());
	labels.insert(NODE_LABEL.to_string(), label_value(node_name));
	labels.insert(TRACE_ID_LABEL.to_string(), label_value(trace_id));

	let args = vec![
		"-t".to_string(),
		"1".to_string(),
		"-m".to_string(),
		"-u".to_string(),
		"-i".to_string(),
		"-n".to_string(),
		"sleep".to_string(),
		config.pod_lifetime_secs.to_string(),
	];

	let container = Container {
		name: config.container_name.clone(),
		image: Some(config.image.clone()),
		image_pull_policy: Some("IfNotPresent".to_string()),
		security_context: Some(SecurityContext {
			privileged: Some(true),
			..Default::default()
		}),
		command: Some(vec![NSENTER.to_string()]),
		args: Some(args),
		..Default::default()
	};

	Pod {
		metadata: ObjectMeta {
			name: Some(pod.name.clone()),
			namespace: Some(pod.namespace.clone()),
			labels: Some(labels),
			..Default::default()
		},
		spec: Some(PodSpec {
			node_name: Some(node_name.to_string()),
			host_ipc: Some(true),
			host_pid: Some(true),
			host_network: Some(true),
			restart_policy: Some("Never".to_string()),
			containers: vec![container],
			..Default::default()
		}),
		status: None,
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	fn pod_ref() -> PodRef {
		PodRef {
			namespace: "default".to_string(),
			name: generate_pod_name(),
		}
	}

	#[test]
	fn test_build_pod_spec_basic() {
		let pod_ref = pod_ref();
		let config = ShellConfig::default();
		let pod = build_pod_spec(&pod_ref, "worker-1", "trace-1", &config);

		assert_eq!(pod.metadata.name, Some(pod_ref.name.clone()));
		assert_eq!(pod.metadata.namespace, Some("default".to_string()));

		let labels = pod.metadata.labels.unwrap();
		assert_eq!(labels.get(MANAGED_LABEL), Some(&"true".to_string()));
		assert_eq!(labels.get(NODE_LABEL), Some(&"worker-1".to_string()));
		assert_eq!(labels.get(TRACE_ID_LABEL), Some(&"trace-1".to_string()));

		let spec = pod.spec.unwrap();
		assert_eq!(spec.node_name, Some("worker-1".to_string()));
		assert_eq!(spec.restart_policy, Some("Never".to_string()));
		assert_eq!(spec.containers.len(), 1);

		let container = &spec.containers[0];
		assert_eq!(container.name, "node-shell");
		assert_eq!(container.image, Some("alpine:latest".to_string()));
		assert_eq!(container.command, Some(vec!["nsenter".to_string()]));
		assert_eq!(
			container.args.as_ref().unwrap().last(),
			Some(&"3600".to_string())
		);
	}

	#[test]
	fn test_pod_names_are_unique() {
		assert_ne!(generate_pod_name(), generate_pod_name());
		assert!(generate_pod_name().starts_with(NAME_PREFIX));
	}

	#[test]
	fn test_pod_ref_display() {
		let pod_ref = PodRef {
			namespace: "default".to_string(),
			name: "node-shell-1".to_string(),
		};
		assert_eq!(pod_ref.to_string(), "default/node-shell-1");
	}

	#[test]
	fn test_label_value_sanitized() {
		assert_eq!(label_value("ip-10-0-0-1.ec2.internal"), "ip-10-0-0-1.ec2.internal");
		assert_eq!(label_value("node:with/slash"), "node_with_slash");
		assert_eq!(label_value(&"a".repeat(100)).len(), MAX_LABEL_LENGTH);
	}

	proptest! {
		#[test]
		fn pod_spec_keeps_security_contract(node in "[a-z0-9][a-z0-9.-]{0,62}") {
			let pod = build_pod_spec(&pod_ref(), &node, "trace", &ShellConfig::default());
			let spec = pod.spec.unwrap();

			prop_assert_eq!(spec.node_name.as_deref(), Some(node.as_str()));
			prop_assert_eq!(spec.host_ipc, Some(true));
			prop_assert_eq!(spec.host_pid, Some(true));
			prop_assert_eq!(spec.host_network, Some(true));
			prop_assert_eq!(spec.restart_policy.as_deref(), Some("Never"));

			let container = &spec.containers[0];
			let privileged = container
				.security_context
				.as_ref()
				.and_then(|sc| sc.privileged);
			prop_assert_eq!(privileged, Some(true));

			let args = container.args.clone().unwrap().join(" ");
			prop_assert!(args.contains("-t 1 -m -u -i -n"));
		}
	}
}
