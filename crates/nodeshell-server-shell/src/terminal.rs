// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Client-facing terminal abstraction consumed by the exec stream.

use async_trait::async_trait;
use nodeshell_server_k8s::TerminalSize;

/// Byte the remote shell reads as end of input.
pub const END_OF_TRANSMISSION: &[u8] = b"\x04";

/// Errors on the client side of a terminal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TerminalError {
	/// The client closed the connection.
	#[error("client disconnected")]
	Disconnected,

	/// The client transport failed.
	#[error("client transport error: {0}")]
	Transport(String),
}

/// Result of [`TerminalStream::read`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
	/// `n` bytes of client input were copied into the buffer.
	Data(usize),
	/// Reading failed. The buffer holds `n` bytes of the end-of-transmission
	/// sentinel so the remote shell sees a clean EOF.
	Failed { n: usize, error: TerminalError },
	/// A failure was already reported; no more input will arrive.
	Closed,
}

/// A duplex terminal: independently readable, writable and resizable.
///
/// The three operations may be driven concurrently from separate futures.
#[async_trait]
pub trait TerminalStream: Send + Sync {
	/// Block until client input is available and copy it into `buf`.
	async fn read(&self, buf: &mut [u8]) -> ReadOutcome;

	/// Forward shell output to the client.
	async fn write(&self, data: &[u8]) -> Result<usize, TerminalError>;

	/// Block until the client signals a new terminal size.
	///
	/// Returns `None` once no further sizes can arrive. Clients that never
	/// resize leave this pending forever.
	async fn next_size(&self) -> Option<TerminalSize>;
}

/// Sends human-readable progress and error notices to the client.
#[async_trait]
pub trait Notifier: Send + Sync {
	async fn notify(&self, message: &str) -> Result<(), TerminalError>;
}

/// Copy the end-of-transmission sentinel into `buf`, returning its length.
pub(crate) fn write_sentinel(buf: &mut [u8]) -> usize {
	let n = END_OF_TRANSMISSION.len().min(buf.len());
	buf[..n].copy_from_slice(&END_OF_TRANSMISSION[..n]);
	n
}
