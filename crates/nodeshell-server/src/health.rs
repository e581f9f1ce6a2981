// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Liveness and readiness reporting.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;

use crate::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
	Healthy,
	Degraded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheStatus {
	Synced,
	Unsynced,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
	pub status: HealthStatus,
	pub node_cache: CacheStatus,
	pub active_sessions: usize,
}

/// GET /health
///
/// 503 while the node cache is out of sync, since node lookups would then
/// fail for every session.
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
	let synced = state.nodes.is_synced();
	let response = HealthResponse {
		status: if synced {
			HealthStatus::Healthy
		} else {
			HealthStatus::Degraded
		},
		node_cache: if synced {
			CacheStatus::Synced
		} else {
			CacheStatus::Unsynced
		},
		active_sessions: state.shell.active_sessions(),
	};

	let http_status = if synced {
		StatusCode::OK
	} else {
		StatusCode::SERVICE_UNAVAILABLE
	};
	(http_status, Json(response))
}
