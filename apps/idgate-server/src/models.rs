// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # API Data Models
//!
//! Request and response bodies of the REST API. All types derive
//! `Serialize`/`Deserialize` and `ToSchema` for JSON handling and the OpenAPI
//! document.
//!
//! ## Identifiers
//!
//! Record ids cross the API boundary only as [`OpaqueId`]s (opaque-mode
//! ciphertext). Ids in request bodies are decrypted server-side before any
//! lookup.
//!
//! ## Envelope
//!
//! Successful responses are wrapped as `{"status": <code>, "data": ...}`;
//! errors are `{"status": <code>, "message": ...}`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub use crate::codec::{CipherMode, OpaqueId};
use crate::auth::Role;

// =============================================================================
// Envelope
// =============================================================================

/// Success envelope.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiResponse<T> {
    pub status: u16,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            status: StatusCode::OK.as_u16(),
            data,
        }
    }

    pub fn created(data: T) -> Self {
        Self {
            status: StatusCode::CREATED.as_u16(),
            data,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::OK);
        (status, Json(self)).into_response()
    }
}

// =============================================================================
// Session Models
// =============================================================================

/// Login credentials. `username` may also be the account email.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Issued session and the profile it belongs to.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoginResponse {
    pub id: OpaqueId,
    pub name: String,
    pub username: String,
    pub email: String,
    /// Bearer token; send as `Authorization: <email> <token>`.
    pub token: String,
    pub session_id: String,
    pub expires_at: DateTime<Utc>,
}

/// Result of a logout.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LogoutResponse {
    /// Identity whose session ended
    pub user: String,
    pub message: String,
}

/// Token re-signed with the refresh lifetime.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RefreshResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Result of a mass session invalidation.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FlushResponse {
    pub message: String,
}

// =============================================================================
// User Models
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub name: String,
    pub username: String,
    pub email: String,
    pub password: String,
    /// Opaque role id; defaults to the least privileged role.
    #[serde(default)]
    pub role_id: Option<OpaqueId>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserProfile {
    pub id: OpaqueId,
    pub name: String,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Codec Utility Models
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum EncDecOp {
    Enc,
    Dec,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EncDecRequest {
    pub value: String,
    pub op: EncDecOp,
    #[serde(default = "default_mode")]
    pub mode: CipherMode,
}

fn default_mode() -> CipherMode {
    CipherMode::Opaque
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EncDecResponse {
    pub result: String,
}
