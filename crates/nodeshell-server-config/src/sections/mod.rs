// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

mod http;
mod kube;
mod logging;
mod shell;

pub use http::{HttpConfig, HttpConfigLayer};
pub use kube::{KubeConfig, KubeConfigLayer};
pub use logging::{LoggingConfig, LoggingConfigLayer};
pub use shell::{default_command, ShellConfig, ShellConfigLayer};
