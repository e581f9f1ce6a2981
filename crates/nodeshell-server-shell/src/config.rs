// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Node shell session configuration.

use std::time::Duration;

use nodeshell_server_config::ShellConfig as SectionConfig;

/// Configuration for node shell sessions.
#[derive(Debug, Clone)]
pub struct ShellConfig {
	/// Kubernetes namespace shared by all ephemeral shell pods
	pub namespace: String,
	/// Image for the shell container; must ship `nsenter` and `sleep`
	pub image: String,
	/// Name of the shell container inside the pod
	pub container_name: String,
	/// Command exec'd in the container for the interactive session
	pub command: Vec<String>,
	/// Timeout waiting for the shell container to start, in seconds
	pub ready_timeout_secs: u64,
	/// Upper bound on the shell container's lifetime, in seconds
	pub pod_lifetime_secs: u64,
	/// Timeout for individual create/delete/exec API calls, in seconds
	pub api_timeout_secs: u64,
	/// Grace period passed to pod deletion
	pub delete_grace_period_secs: u32,
	/// Maximum concurrently active sessions
	pub max_sessions: u32,
	/// Orphan reaper interval in seconds (0 disables the reaper)
	pub reaper_interval_secs: u64,
}

impl ShellConfig {
	pub fn ready_timeout(&self) -> Duration {
		Duration::from_secs(self.ready_timeout_secs)
	}

	pub fn api_timeout(&self) -> Duration {
		Duration::from_secs(self.api_timeout_secs)
	}
}

impl Default for ShellConfig {
	fn default() -> Self {
		Self::from(&SectionConfig::default())
	}
}

impl From<&SectionConfig> for ShellConfig {
	fn from(section: &SectionConfig) -> Self {
		Self {
			namespace: section.namespace.clone(),
			image: section.image.clone(),
			container_name: section.container_name.clone(),
			command: section.command.clone(),
			ready_timeout_secs: section.ready_timeout_secs,
			pod_lifetime_secs: section.pod_lifetime_secs,
			api_timeout_secs: section.api_timeout_secs,
			delete_grace_period_secs: section.delete_grace_period_secs,
			max_sessions: section.max_sessions,
			reaper_interval_secs: section.reaper_interval_secs,
		}
	}
}
