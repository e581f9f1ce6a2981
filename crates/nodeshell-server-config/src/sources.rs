// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sources: defaults, TOML files, environment and command line.

use std::collections::HashMap;
use std::path::PathBuf;

use tracing::{debug, trace};

use crate::error::ConfigError;
use crate::layer::ServerConfigLayer;
use crate::sections::{HttpConfigLayer, KubeConfigLayer, LoggingConfigLayer, ShellConfigLayer};

/// Source precedence levels (higher = overrides lower).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
	Defaults = 10,
	ConfigFile = 20,
	Environment = 50,
	CommandLine = 100,
}

/// Trait for configuration sources.
pub trait ConfigSource: Send + Sync {
	fn name(&self) -> &'static str;
	fn precedence(&self) -> Precedence;
	fn load(&self) -> Result<ServerConfigLayer, ConfigError>;
}

/// Built-in defaults source.
pub struct DefaultsSource;

impl ConfigSource for DefaultsSource {
	fn name(&self) -> &'static str {
		"defaults"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Defaults
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		debug!("loading defaults");
		Ok(ServerConfigLayer::default())
	}
}

/// TOML file configuration source.
pub struct TomlSource {
	path: PathBuf,
	required: bool,
}

impl TomlSource {
	/// A file that must exist.
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self {
			path: path.into(),
			required: true,
		}
	}

	/// The system-wide file, skipped when missing.
	pub fn system() -> Self {
		Self {
			path: PathBuf::from("/etc/nodeshell/server.toml"),
			required: false,
		}
	}
}

impl ConfigSource for TomlSource {
	fn name(&self) -> &'static str {
		"toml-config"
	}

	fn precedence(&self) -> Precedence {
		Precedence::ConfigFile
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		if !self.required && !self.path.exists() {
			debug!(path = %self.path.display(), "config file not found, skipping");
			return Ok(ServerConfigLayer::default());
		}

		debug!(path = %self.path.display(), "loading config file");
		let content = std::fs::read_to_string(&self.path).map_err(|e| ConfigError::FileRead {
			path: self.path.clone(),
			source: e,
		})?;

		let layer: ServerConfigLayer =
			toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
				path: self.path.clone(),
				source: e,
			})?;

		trace!("parsed config layer from TOML");
		Ok(layer)
	}
}

/// Environment variable source.
///
/// Convention: `NODE_SHELL_<FIELD>`.
pub struct EnvSource {
	vars: Option<HashMap<String, String>>,
}

impl EnvSource {
	/// Read the process environment.
	pub fn process() -> Self {
		Self { vars: None }
	}

	/// Read from a fixed set of variables instead of the process environment.
	pub fn from_vars<K, V>(vars: impl IntoIterator<Item = (K, V)>) -> Self
	where
		K: Into<String>,
		V: Into<String>,
	{
		Self {
			vars: Some(
				vars
					.into_iter()
					.map(|(k, v)| (k.into(), v.into()))
					.collect(),
			),
		}
	}

	fn var(&self, name: &str) -> Option<String> {
		let value = match &self.vars {
			Some(vars) => vars.get(name).cloned(),
			None => std::env::var(name).ok(),
		};
		value.filter(|s| !s.is_empty())
	}

	fn bool(&self, name: &str) -> Option<bool> {
		self
			.var(name)
			.map(|v| v.eq_ignore_ascii_case("true") || v == "1")
	}

	fn parse<T: std::str::FromStr>(&self, name: &str, kind: &str) -> Result<Option<T>, ConfigError> {
		match self.var(name) {
			Some(v) => v.parse().map(Some).map_err(|_| ConfigError::InvalidValue {
				key: name.to_string(),
				message: format!("invalid {kind} value '{v}'"),
			}),
			None => Ok(None),
		}
	}

	fn load_http(&self) -> Result<HttpConfigLayer, ConfigError> {
		Ok(HttpConfigLayer {
			host: self.var("NODE_SHELL_HOST"),
			port: self.parse("NODE_SHELL_PORT", "u16")?,
		})
	}

	fn load_kube(&self) -> KubeConfigLayer {
		KubeConfigLayer {
			kubeconfig: self.var("NODE_SHELL_KUBECONFIG").map(PathBuf::from),
		}
	}

	fn load_shell(&self) -> Result<ShellConfigLayer, ConfigError> {
		let command = self
			.var("NODE_SHELL_COMMAND")
			.map(|s| s.split_whitespace().map(str::to_string).collect());

		Ok(ShellConfigLayer {
			namespace: self.var("NODE_SHELL_NAMESPACE"),
			image: self.var("NODE_SHELL_IMAGE"),
			container_name: self.var("NODE_SHELL_CONTAINER_NAME"),
			command,
			ready_timeout_secs: self.parse("NODE_SHELL_READY_TIMEOUT_SECS", "u64")?,
			pod_lifetime_secs: self.parse("NODE_SHELL_POD_LIFETIME_SECS", "u64")?,
			api_timeout_secs: self.parse("NODE_SHELL_API_TIMEOUT_SECS", "u64")?,
			delete_grace_period_secs: self.parse("NODE_SHELL_DELETE_GRACE_PERIOD_SECS", "u32")?,
			max_sessions: self.parse("NODE_SHELL_MAX_SESSIONS", "u32")?,
			reaper_interval_secs: self.parse("NODE_SHELL_REAPER_INTERVAL_SECS", "u64")?,
		})
	}

	fn load_logging(&self) -> LoggingConfigLayer {
		LoggingConfigLayer {
			level: self.var("NODE_SHELL_LOG_LEVEL"),
			json: self.bool("NODE_SHELL_LOG_JSON"),
		}
	}
}

impl ConfigSource for EnvSource {
	fn name(&self) -> &'static str {
		"environment"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Environment
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		debug!("loading environment variables");
		Ok(ServerConfigLayer {
			http: Some(self.load_http()?),
			kube: Some(self.load_kube()),
			shell: Some(self.load_shell()?),
			logging: Some(self.load_logging()),
		})
	}
}

/// Command line overrides.
#[derive(Debug, Clone, Default)]
pub struct ArgsSource {
	/// `host:port` to listen on
	pub listen: Option<String>,
	pub kubeconfig: Option<PathBuf>,
}

impl ConfigSource for ArgsSource {
	fn name(&self) -> &'static str {
		"command-line"
	}

	fn precedence(&self) -> Precedence {
		Precedence::CommandLine
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		let http = match &self.listen {
			Some(listen) => {
				let (host, port) = parse_listen(listen)?;
				Some(HttpConfigLayer {
					host: Some(host),
					port: Some(port),
				})
			}
			None => None,
		};

		Ok(ServerConfigLayer {
			http,
			kube: self.kubeconfig.clone().map(|path| KubeConfigLayer {
				kubeconfig: Some(path),
			}),
			..Default::default()
		})
	}
}

/// Split `host:port`. IPv6 hosts may be bracketed.
fn parse_listen(listen: &str) -> Result<(String, u16), ConfigError> {
	let invalid = |message: &str| ConfigError::InvalidValue {
		key: "--listen".to_string(),
		message: format!("{message} in '{listen}'"),
	};

	let (host, port) = listen
		.rsplit_once(':')
		.ok_or_else(|| invalid("expected host:port"))?;
	let port = port.parse::<u16>().map_err(|_| invalid("invalid port"))?;
	let host = host.trim_start_matches('[').trim_end_matches(']');
	if host.is_empty() {
		return Err(invalid("missing host"));
	}
	Ok((host.to_string(), port))
}
