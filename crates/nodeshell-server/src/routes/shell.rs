// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! `GET /api/v1/node/{node_name}/shell`: interactive node shell over WebSocket.
//!
//! Binary frames and ordinary text frames are shell input. A text frame of
//! the form `{"type":"resize","rows":R,"cols":C}` resizes the terminal.
//! Shell output is sent as binary frames and progress notices as text.

use std::pin::Pin;
use std::sync::Arc;

use axum::{
	extract::{
		ws::{Message, WebSocket},
		Path, State, WebSocketUpgrade,
	},
	response::IntoResponse,
};
use futures::{future, stream::BoxStream, Sink, SinkExt, StreamExt};
use nodeshell_server_shell::{ClientFrame, NodeShell, ServerFrame, TerminalBridge, TerminalError};
use tracing::{debug, info};

use crate::AppState;

type FrameSink = Pin<Box<dyn Sink<ServerFrame, Error = TerminalError> + Send>>;

pub async fn node_shell(
	State(state): State<AppState>,
	Path(node_name): Path<String>,
	ws: WebSocketUpgrade,
) -> impl IntoResponse {
	info!(node = %node_name, "Node shell requested");
	let shell = Arc::clone(&state.shell);
	ws.on_upgrade(move |socket| handle_shell_socket(socket, shell, node_name))
}

async fn handle_shell_socket(socket: WebSocket, shell: Arc<NodeShell>, node_name: String) {
	let (sender, receiver) = socket.split();

	let frames: BoxStream<'static, Result<ClientFrame, TerminalError>> = receiver
		.filter_map(|msg| future::ready(client_frame(msg)))
		.boxed();
	let sink: FrameSink = Box::pin(
		sender
			.sink_map_err(|e| TerminalError::Transport(e.to_string()))
			.with(|frame| future::ready(Ok::<_, TerminalError>(server_message(frame)))),
	);

	let bridge = TerminalBridge::new(frames, sink);
	let report = shell.run_session(&node_name, &bridge).await;
	bridge.close().await;

	if report.is_success() {
		debug!(
			trace_id = %report.trace_id,
			node = %report.node,
			phase = %report.phase,
			"Node shell connection finished"
		);
	} else {
		debug!(
			trace_id = %report.trace_id,
			node = %report.node,
			phase = %report.phase,
			error = ?report.error,
			"Node shell connection aborted"
		);
	}
}

/// Map an incoming WebSocket message. Pings and pongs are dropped.
fn client_frame(msg: Result<Message, axum::Error>) -> Option<Result<ClientFrame, TerminalError>> {
	match msg {
		Ok(Message::Binary(data)) => Some(Ok(ClientFrame::from_binary(data))),
		Ok(Message::Text(text)) => Some(Ok(ClientFrame::from_text(text.as_str()))),
		Ok(Message::Close(_)) => Some(Err(TerminalError::Disconnected)),
		Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => None,
		Err(e) => Some(Err(TerminalError::Transport(e.to_string()))),
	}
}

fn server_message(frame: ServerFrame) -> Message {
	match frame {
		ServerFrame::Notice(text) => Message::Text(text.into()),
		ServerFrame::Output(data) => Message::Binary(data),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use axum::body::Bytes;
	use nodeshell_server_k8s::TerminalSize;

	#[test]
	fn binary_is_input() {
		let frame = client_frame(Ok(Message::Binary(Bytes::from_static(b"ls\n"))));
		assert_eq!(
			frame,
			Some(Ok(ClientFrame::Input(Bytes::from_static(b"ls\n"))))
		);
	}

	#[test]
	fn resize_text_is_control() {
		let frame = client_frame(Ok(Message::Text(
			r#"{"type":"resize","rows":24,"cols":80}"#.into(),
		)));
		assert_eq!(
			frame,
			Some(Ok(ClientFrame::Resize(TerminalSize { rows: 24, cols: 80 })))
		);
	}

	#[test]
	fn close_is_disconnect_and_pings_are_dropped() {
		assert_eq!(
			client_frame(Ok(Message::Close(None))),
			Some(Err(TerminalError::Disconnected))
		);
		assert_eq!(client_frame(Ok(Message::Ping(Bytes::new()))), None);
	}

	#[test]
	fn notices_are_text_and_output_is_binary() {
		assert!(matches!(
			server_message(ServerFrame::Notice("node worker-1 not found".to_string())),
			Message::Text(_)
		));
		assert!(matches!(
			server_message(ServerFrame::Output(Bytes::from_static(b"\x1b[0m"))),
			Message::Binary(_)
		));
	}
}
