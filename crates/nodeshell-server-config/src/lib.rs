// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration for the node shell server.
//!
//! Layered from built-in defaults, a TOML file, `NODE_SHELL_*` environment
//! variables and command line flags, in increasing precedence.
//!
//! # Usage
//!
//! ```ignore
//! use nodeshell_server_config::{load_config, ArgsSource};
//!
//! let config = load_config(ArgsSource::default())?;
//! println!("listening on {}", config.socket_addr());
//! ```

pub mod error;
pub mod layer;
pub mod sections;
pub mod sources;

pub use error::ConfigError;
pub use layer::ServerConfigLayer;
pub use sections::*;
pub use sources::{ArgsSource, ConfigSource, DefaultsSource, EnvSource, Precedence, TomlSource};

use tracing::{debug, info};

/// Fully resolved server configuration.
#[derive(Debug, Clone, Default)]
pub struct ServerConfig {
	pub http: HttpConfig,
	pub kube: KubeConfig,
	pub shell: ShellConfig,
	pub logging: LoggingConfig,
}

impl ServerConfig {
	/// Get the socket address string for binding.
	pub fn socket_addr(&self) -> String {
		if self.http.host.contains(':') {
			format!("[{}]:{}", self.http.host, self.http.port)
		} else {
			format!("{}:{}", self.http.host, self.http.port)
		}
	}
}

/// Load configuration from all sources with standard precedence.
///
/// Precedence (highest to lowest):
/// 1. Command line flags
/// 2. Environment variables (`NODE_SHELL_*`)
/// 3. Config file (`/etc/nodeshell/server.toml`, skipped when absent)
/// 4. Built-in defaults
pub fn load_config(args: ArgsSource) -> Result<ServerConfig, ConfigError> {
	let sources: Vec<Box<dyn ConfigSource>> = vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::system()),
		Box::new(EnvSource::process()),
		Box::new(args),
	];
	load_from_sources(sources)
}

/// Load configuration with a custom config file path, which must exist.
pub fn load_config_with_file(
	config_path: impl Into<std::path::PathBuf>,
	args: ArgsSource,
) -> Result<ServerConfig, ConfigError> {
	let sources: Vec<Box<dyn ConfigSource>> = vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::new(config_path)),
		Box::new(EnvSource::process()),
		Box::new(args),
	];
	load_from_sources(sources)
}

/// Merge `sources` in precedence order and resolve the result.
pub fn load_from_sources(
	mut sources: Vec<Box<dyn ConfigSource>>,
) -> Result<ServerConfig, ConfigError> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = ServerConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		let layer = source.load()?;
		merged.merge(layer);
	}

	finalize(merged)
}

/// Finalize configuration layer into resolved config.
fn finalize(layer: ServerConfigLayer) -> Result<ServerConfig, ConfigError> {
	let http = layer.http.unwrap_or_default().finalize();
	let kube = layer.kube.unwrap_or_default().finalize();
	let shell = layer.shell.unwrap_or_default().finalize();
	let logging = layer.logging.unwrap_or_default().finalize();

	shell.validate()?;

	info!(
		host = %http.host,
		port = http.port,
		kubeconfig = ?kube.kubeconfig,
		namespace = %shell.namespace,
		image = %shell.image,
		ready_timeout_secs = shell.ready_timeout_secs,
		max_sessions = shell.max_sessions,
		reaper_interval_secs = shell.reaper_interval_secs,
		"Server configuration loaded"
	);

	Ok(ServerConfig {
		http,
		kube,
		shell,
		logging,
	})
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_socket_addr() {
		let config = ServerConfig {
			http: HttpConfig {
				host: "127.0.0.1".to_string(),
				port: 9000,
			},
			..Default::default()
		};
		assert_eq!(config.socket_addr(), "127.0.0.1:9000");
	}

	#[test]
	fn test_socket_addr_ipv6() {
		let config = ServerConfig {
			http: HttpConfig {
				host: "::".to_string(),
				port: 8080,
			},
			..Default::default()
		};
		assert_eq!(config.socket_addr(), "[::]:8080");
	}

	#[test]
	fn test_validation_runs_on_finalize() {
		let layer = ServerConfigLayer {
			shell: Some(ShellConfigLayer {
				ready_timeout_secs: Some(0),
				..Default::default()
			}),
			..Default::default()
		};
		assert!(matches!(finalize(layer), Err(ConfigError::Validation(_))));
	}
}
