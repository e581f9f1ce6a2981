// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Node shell sessions.
//!
//! A session checks that the node exists, creates a privileged pod pinned
//! to it, waits for the shell container to start, then bridges an
//! interactive exec to the client terminal. The pod is deleted when the
//! session ends, whichever way it ends.

pub mod bridge;
pub mod config;
pub mod error;
pub mod exec;
pub mod lifecycle;
pub mod orchestrator;
pub mod pod_spec;
pub mod readiness;
pub mod reaper;
pub mod session;
pub mod terminal;

pub use bridge::{ClientFrame, ServerFrame, TerminalBridge};
pub use config::ShellConfig;
pub use error::{ErrorKind, SessionError};
pub use exec::StreamEnd;
pub use lifecycle::PodLifecycle;
pub use orchestrator::{NodeShell, SessionReport};
pub use pod_spec::{build_pod_spec, generate_pod_name, PodRef};
pub use readiness::{ReadinessWatcher, WaitError};
pub use reaper::{start_reaper_task, PodReaper, ReapResult};
pub use session::{PodGuard, Session, SessionPhase};
pub use terminal::{Notifier, ReadOutcome, TerminalError, TerminalStream, END_OF_TRANSMISSION};
