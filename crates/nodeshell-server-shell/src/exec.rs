// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Bidirectional copy between an exec channel and a client terminal.

use std::convert::Infallible;

use futures::{future, SinkExt};
use nodeshell_server_k8s::ExecProcess;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, warn};

use crate::error::SessionError;
use crate::terminal::{ReadOutcome, TerminalError, TerminalStream};

const COPY_BUFFER_SIZE: usize = 32 * 1024;

/// How a stream that finished without error ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEnd {
	/// The remote shell exited and its output was fully forwarded.
	RemoteExited,
	/// The client disconnected; the remote shell was sent end of input.
	ClientDisconnected,
}

fn stream_fault(e: impl std::fmt::Display) -> SessionError {
	SessionError::Stream {
		message: e.to_string(),
	}
}

/// Move bytes between `process` and `terminal` until either side ends.
///
/// Input copy, output copy and resize forwarding run concurrently; a
/// client that never resizes does not hold up either copy direction.
pub async fn run<T>(process: ExecProcess, terminal: &T) -> Result<StreamEnd, SessionError>
where
	T: TerminalStream + ?Sized,
{
	let ExecProcess {
		mut stdin,
		mut stdout,
		resize,
		completion,
	} = process;

	let input = async {
		let mut buf = vec![0u8; COPY_BUFFER_SIZE];
		loop {
			match terminal.read(&mut buf).await {
				ReadOutcome::Data(n) => {
					let written = match stdin.write_all(&buf[..n]).await {
						Ok(()) => stdin.flush().await,
						Err(e) => Err(e),
					};
					if let Err(e) = written {
						// The output side reports how the remote ended.
						debug!(error = %e, "Exec stdin closed");
						return future::pending::<Result<StreamEnd, SessionError>>().await;
					}
				}
				ReadOutcome::Failed { n, error } => {
					let delivered = match stdin.write_all(&buf[..n]).await {
						Ok(()) => stdin.flush().await,
						Err(e) => Err(e),
					};
					if let Err(e) = delivered {
						debug!(error = %e, "Could not deliver end of transmission to exec stdin");
					}
					return match error {
						TerminalError::Disconnected => Ok(StreamEnd::ClientDisconnected),
						error => Err(stream_fault(error)),
					};
				}
				ReadOutcome::Closed => return Ok(StreamEnd::ClientDisconnected),
			}
		}
	};

	let output = async {
		let mut buf = vec![0u8; COPY_BUFFER_SIZE];
		loop {
			let n = stdout.read(&mut buf).await.map_err(stream_fault)?;
			if n == 0 {
				return Ok::<(), SessionError>(());
			}
			terminal.write(&buf[..n]).await.map_err(stream_fault)?;
		}
	};

	let resizes = async {
		if let Some(mut sink) = resize {
			while let Some(size) = terminal.next_size().await {
				debug!(rows = size.rows, cols = size.cols, "Resizing remote terminal");
				if let Err(e) = sink.send(size).await {
					warn!(error = %e, "Failed to forward terminal resize");
					break;
				}
			}
		}
		future::pending::<Infallible>().await
	};

	tokio::select! {
		result = input => result,
		result = output => {
			result?;
			completion.await.map_err(stream_fault)?;
			Ok(StreamEnd::RemoteExited)
		}
		never = resizes => match never {},
	}
}
