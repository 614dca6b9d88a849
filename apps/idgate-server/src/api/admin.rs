// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Admin-only API endpoints for session management.

use axum::extract::State;
use tracing::{info, warn};

use crate::{
    auth::AdminOnly,
    error::ApiError,
    models::{ApiResponse, FlushResponse},
    state::AppState,
};

/// Invalidate every session.
///
/// All users must log in again afterwards, including the caller.
#[utoipa::path(
    post,
    path = "/v1/admin/sessions/flush",
    tag = "Admin",
    security(("session" = [])),
    responses(
        (status = 200, description = "All sessions removed", body = ApiResponse<FlushResponse>),
        (status = 401, description = "Missing or invalid session"),
        (status = 403, description = "Admin role required"),
        (status = 503, description = "Session store unavailable"),
    )
)]
pub async fn flush_sessions(
    State(state): State<AppState>,
    AdminOnly(_admin, record): AdminOnly,
) -> Result<ApiResponse<FlushResponse>, ApiError> {
    state.sessions.flush_all().await.inspect_err(|e| {
        warn!(error = %e, "Session flush failed");
    })?;
    info!(admin = %record.username, backend = state.sessions.backend(), "All sessions invalidated");

    Ok(ApiResponse::ok(FlushResponse {
        message: "all sessions invalidated".to_string(),
    }))
}
