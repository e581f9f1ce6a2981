// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Node shell session configuration section.

use serde::Deserialize;

use crate::error::ConfigError;

const DEFAULT_NAMESPACE: &str = "default";
const DEFAULT_IMAGE: &str = "alpine:latest";
const DEFAULT_CONTAINER_NAME: &str = "node-shell";

/// Host shell entered through the node's init process namespaces.
pub fn default_command() -> Vec<String> {
	["nsenter", "-t", "1", "-m", "-u", "-i", "-n", "--", "sh"]
		.iter()
		.map(|s| s.to_string())
		.collect()
}

/// Node shell configuration layer (for merging).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ShellConfigLayer {
	#[serde(default)]
	pub namespace: Option<String>,
	#[serde(default)]
	pub image: Option<String>,
	#[serde(default)]
	pub container_name: Option<String>,
	#[serde(default)]
	pub command: Option<Vec<String>>,
	#[serde(default)]
	pub ready_timeout_secs: Option<u64>,
	#[serde(default)]
	pub pod_lifetime_secs: Option<u64>,
	#[serde(default)]
	pub api_timeout_secs: Option<u64>,
	#[serde(default)]
	pub delete_grace_period_secs: Option<u32>,
	#[serde(default)]
	pub max_sessions: Option<u32>,
	/// Orphan reaper interval; 0 disables the reaper
	#[serde(default)]
	pub reaper_interval_secs: Option<u64>,
}

impl ShellConfigLayer {
	/// Merges another layer on top of this one.
	/// Values from `other` take precedence when present.
	pub fn merge(&mut self, other: ShellConfigLayer) {
		if other.namespace.is_some() {
			self.namespace = other.namespace;
		}
		if other.image.is_some() {
			self.image = other.image;
		}
		if other.container_name.is_some() {
			self.container_name = other.container_name;
		}
		if other.command.is_some() {
			self.command = other.command;
		}
		if other.ready_timeout_secs.is_some() {
			self.ready_timeout_secs = other.ready_timeout_secs;
		}
		if other.pod_lifetime_secs.is_some() {
			self.pod_lifetime_secs = other.pod_lifetime_secs;
		}
		if other.api_timeout_secs.is_some() {
			self.api_timeout_secs = other.api_timeout_secs;
		}
		if other.delete_grace_period_secs.is_some() {
			self.delete_grace_period_secs = other.delete_grace_period_secs;
		}
		if other.max_sessions.is_some() {
			self.max_sessions = other.max_sessions;
		}
		if other.reaper_interval_secs.is_some() {
			self.reaper_interval_secs = other.reaper_interval_secs;
		}
	}

	pub fn finalize(self) -> ShellConfig {
		let defaults = ShellConfig::default();
		ShellConfig {
			namespace: self.namespace.unwrap_or(defaults.namespace),
			image: self.image.unwrap_or(defaults.image),
			container_name: self.container_name.unwrap_or(defaults.container_name),
			command: self.command.unwrap_or(defaults.command),
			ready_timeout_secs: self.ready_timeout_secs.unwrap_or(defaults.ready_timeout_secs),
			pod_lifetime_secs: self.pod_lifetime_secs.unwrap_or(defaults.pod_lifetime_secs),
			api_timeout_secs: self.api_timeout_secs.unwrap_or(defaults.api_timeout_secs),
			delete_grace_period_secs: self
				.delete_grace_period_secs
				.unwrap_or(defaults.delete_grace_period_secs),
			max_sessions: self.max_sessions.unwrap_or(defaults.max_sessions),
			reaper_interval_secs: self
				.reaper_interval_secs
				.unwrap_or(defaults.reaper_interval_secs),
		}
	}
}

/// Node shell configuration (runtime, resolved).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellConfig {
	pub namespace: String,
	pub image: String,
	pub container_name: String,
	pub command: Vec<String>,
	pub ready_timeout_secs: u64,
	pub pod_lifetime_secs: u64,
	pub api_timeout_secs: u64,
	pub delete_grace_period_secs: u32,
	pub max_sessions: u32,
	pub reaper_interval_secs: u64,
}

impl ShellConfig {
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.namespace.trim().is_empty() {
			return Err(ConfigError::Validation("shell.namespace must not be empty".to_string()));
		}
		if self.image.trim().is_empty() {
			return Err(ConfigError::Validation("shell.image must not be empty".to_string()));
		}
		if self.container_name.trim().is_empty() {
			return Err(ConfigError::Validation(
				"shell.container_name must not be empty".to_string(),
			));
		}
		if self.command.is_empty() || self.command[0].trim().is_empty() {
			return Err(ConfigError::Validation("shell.command must not be empty".to_string()));
		}
		if self.ready_timeout_secs == 0 {
			return Err(ConfigError::Validation(
				"shell.ready_timeout_secs must be greater than zero".to_string(),
			));
		}
		if self.api_timeout_secs == 0 {
			return Err(ConfigError::Validation(
				"shell.api_timeout_secs must be greater than zero".to_string(),
			));
		}
		if self.max_sessions == 0 {
			return Err(ConfigError::Validation(
				"shell.max_sessions must be greater than zero".to_string(),
			));
		}
		Ok(())
	}
}

impl Default for ShellConfig {
	fn default() -> Self {
		Self {
			namespace: DEFAULT_NAMESPACE.to_string(),
			image: DEFAULT_IMAGE.to_string(),
			container_name: DEFAULT_CONTAINER_NAME.to_string(),
			command: default_command(),
			ready_timeout_secs: 60,
			pod_lifetime_secs: 3600,
			api_timeout_secs: 30,
			delete_grace_period_secs: 0,
			max_sessions: 64,
			reaper_interval_secs: 300,
		}
	}
}
