// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Adapts a framed client connection into a [`TerminalStream`].

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Sink, SinkExt, Stream, StreamExt};
use nodeshell_server_k8s::TerminalSize;
use serde::Deserialize;
use tokio::sync::{watch, Mutex};

use crate::terminal::{write_sentinel, Notifier, ReadOutcome, TerminalError, TerminalStream};

/// A frame received from the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientFrame {
	/// Raw shell input.
	Input(Bytes),
	/// Out-of-band terminal resize.
	Resize(TerminalSize),
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ResizeControl {
	#[serde(rename = "type")]
	kind: String,
	rows: u16,
	cols: u16,
}

impl ClientFrame {
	/// Interpret a text frame.
	///
	/// `{"type":"resize","rows":R,"cols":C}` is a resize control; any other
	/// text is shell input.
	pub fn from_text(text: &str) -> Self {
		if text.starts_with('{') {
			if let Ok(control) = serde_json::from_str::<ResizeControl>(text) {
				if control.kind == "resize" {
					return ClientFrame::Resize(TerminalSize {
						rows: control.rows,
						cols: control.cols,
					});
				}
			}
		}
		ClientFrame::Input(Bytes::copy_from_slice(text.as_bytes()))
	}

	/// Binary frames are always shell input.
	pub fn from_binary(data: Bytes) -> Self {
		ClientFrame::Input(data)
	}
}

/// A frame sent to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerFrame {
	/// Progress or error notice, sent as text.
	Notice(String),
	/// Shell output bytes.
	Output(Bytes),
}

struct Inbound<R> {
	frames: R,
	pending: Bytes,
	failed: bool,
	resize: watch::Sender<Option<TerminalSize>>,
}

/// [`TerminalStream`] over a client frame stream and frame sink.
///
/// Reads, writes and resize waits each lock their own half, so they can
/// run concurrently.
pub struct TerminalBridge<R, W> {
	inbound: Mutex<Inbound<R>>,
	outbound: Mutex<W>,
	sizes: Mutex<watch::Receiver<Option<TerminalSize>>>,
}

impl<R, W> TerminalBridge<R, W>
where
	R: Stream<Item = Result<ClientFrame, TerminalError>> + Send + Unpin,
	W: Sink<ServerFrame, Error = TerminalError> + Send + Unpin,
{
	pub fn new(frames: R, sink: W) -> Self {
		let (resize, sizes) = watch::channel(None);
		Self {
			inbound: Mutex::new(Inbound {
				frames,
				pending: Bytes::new(),
				failed: false,
				resize,
			}),
			outbound: Mutex::new(sink),
			sizes: Mutex::new(sizes),
		}
	}

	/// Flush and close the outbound half.
	pub async fn close(&self) {
		if let Err(e) = self.outbound.lock().await.close().await {
			tracing::debug!(error = %e, "Could not close client connection");
		}
	}
}

#[async_trait]
impl<R, W> TerminalStream for TerminalBridge<R, W>
where
	R: Stream<Item = Result<ClientFrame, TerminalError>> + Send + Unpin,
	W: Sink<ServerFrame, Error = TerminalError> + Send + Unpin,
{
	async fn read(&self, buf: &mut [u8]) -> ReadOutcome {
		let mut guard = self.inbound.lock().await;
		let inbound = &mut *guard;
		if inbound.failed {
			return ReadOutcome::Closed;
		}

		loop {
			if !inbound.pending.is_empty() {
				let n = inbound.pending.len().min(buf.len());
				let chunk = inbound.pending.split_to(n);
				buf[..n].copy_from_slice(&chunk);
				return ReadOutcome::Data(n);
			}

			let error = match inbound.frames.next().await {
				Some(Ok(ClientFrame::Input(data))) => {
					inbound.pending = data;
					continue;
				}
				Some(Ok(ClientFrame::Resize(size))) => {
					inbound.resize.send_replace(Some(size));
					continue;
				}
				Some(Err(error)) => error,
				None => TerminalError::Disconnected,
			};

			inbound.failed = true;
			let n = write_sentinel(buf);
			return ReadOutcome::Failed { n, error };
		}
	}

	async fn write(&self, data: &[u8]) -> Result<usize, TerminalError> {
		self
			.outbound
			.lock()
			.await
			.send(ServerFrame::Output(Bytes::copy_from_slice(data)))
			.await?;
		Ok(data.len())
	}

	async fn next_size(&self) -> Option<TerminalSize> {
		let mut sizes = self.sizes.lock().await;
		loop {
			sizes.changed().await.ok()?;
			if let Some(size) = *sizes.borrow_and_update() {
				return Some(size);
			}
		}
	}
}

#[async_trait]
impl<R, W> Notifier for TerminalBridge<R, W>
where
	R: Stream<Item = Result<ClientFrame, TerminalError>> + Send + Unpin,
	W: Sink<ServerFrame, Error = TerminalError> + Send + Unpin,
{
	async fn notify(&self, message: &str) -> Result<(), TerminalError> {
		self
			.outbound
			.lock()
			.await
			.send(ServerFrame::Notice(message.to_string()))
			.await
	}
}
