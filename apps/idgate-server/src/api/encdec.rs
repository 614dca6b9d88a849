// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Codec utility endpoint for operators debugging opaque ids.

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};

use crate::{
    auth::Auth,
    error::ApiError,
    models::{ApiResponse, EncDecOp, EncDecRequest, EncDecResponse},
    state::AppState,
};

/// Encrypt or decrypt a value with the service codec.
#[utoipa::path(
    post,
    path = "/v1/enc-dec",
    tag = "Codec",
    security(("session" = [])),
    request_body = EncDecRequest,
    responses(
        (status = 200, description = "Converted value", body = ApiResponse<EncDecResponse>),
        (status = 400, description = "Value cannot be decrypted"),
        (status = 401, description = "Missing or invalid session"),
    )
)]
pub async fn enc_dec(
    State(state): State<AppState>,
    Auth(_user): Auth,
    payload: Result<Json<EncDecRequest>, JsonRejection>,
) -> Result<ApiResponse<EncDecResponse>, ApiError> {
    let Json(request) = payload?;

    let result = match request.op {
        EncDecOp::Enc => state.codec.encrypt(&request.value, request.mode)?,
        EncDecOp::Dec => state
            .codec
            .decrypt(&request.value, request.mode)
            .map_err(|_| ApiError::bad_request("value cannot be decrypted"))?,
    };

    Ok(ApiResponse::ok(EncDecResponse { result }))
}
