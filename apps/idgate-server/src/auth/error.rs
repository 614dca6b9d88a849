// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication errors.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use super::token::TokenError;
use crate::session::SessionStoreError;

/// Authentication error type.
///
/// Client-fault variants map to 401/403. Session store failures map to 5xx
/// and are never reported as an authentication failure.
#[derive(Debug)]
pub enum AuthError {
    /// No authorization header present
    MissingAuthHeader,
    /// Header is not exactly `<identity> <token>`
    InvalidAuthHeader,
    /// Signature verification failed or the token has expired
    InvalidToken,
    /// Token verified but its claims have the wrong shape
    InvalidClaims,
    /// A session already exists for the identity (exclusive check)
    AlreadyLoggedIn,
    /// No session recorded for the identity (bound check)
    SessionNotFound,
    /// Token identity claim does not belong to the header identity
    IdentityMismatch,
    /// Token belongs to a session that is no longer the recorded one
    SessionSuperseded,
    /// Authenticated but lacking the required role
    InsufficientPermissions,
    /// Session store unreachable
    SessionStoreUnavailable(String),
    /// Session store exceeded the request deadline
    SessionStoreTimeout,
    /// Internal error
    InternalError(String),
}

#[derive(Serialize)]
struct AuthErrorBody {
    status: u16,
    message: String,
    error_code: String,
}

impl AuthError {
    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::MissingAuthHeader => "missing_auth_header",
            AuthError::InvalidAuthHeader => "invalid_token_format",
            AuthError::InvalidToken => "invalid_token",
            AuthError::InvalidClaims => "invalid_token_claims",
            AuthError::AlreadyLoggedIn => "already_logged_in",
            AuthError::SessionNotFound => "session_not_found",
            AuthError::IdentityMismatch => "identity_mismatch",
            AuthError::SessionSuperseded => "session_superseded",
            AuthError::InsufficientPermissions => "insufficient_permissions",
            AuthError::SessionStoreUnavailable(_) => "session_store_unavailable",
            AuthError::SessionStoreTimeout => "session_store_timeout",
            AuthError::InternalError(_) => "internal_error",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::MissingAuthHeader
            | AuthError::InvalidAuthHeader
            | AuthError::InvalidToken
            | AuthError::InvalidClaims
            | AuthError::SessionNotFound => StatusCode::UNAUTHORIZED,
            AuthError::AlreadyLoggedIn
            | AuthError::IdentityMismatch
            | AuthError::SessionSuperseded
            | AuthError::InsufficientPermissions => StatusCode::FORBIDDEN,
            AuthError::SessionStoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AuthError::SessionStoreTimeout => StatusCode::GATEWAY_TIMEOUT,
            AuthError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::MissingAuthHeader => write!(f, "authorization header required"),
            AuthError::InvalidAuthHeader => write!(f, "invalid token format"),
            AuthError::InvalidToken => write!(f, "invalid token"),
            AuthError::InvalidClaims => write!(f, "invalid token claims"),
            AuthError::AlreadyLoggedIn => write!(f, "user already logged in"),
            AuthError::SessionNotFound => write!(f, "session not found"),
            AuthError::IdentityMismatch => write!(f, "identity mismatch"),
            AuthError::SessionSuperseded => write!(f, "session superseded"),
            AuthError::InsufficientPermissions => {
                write!(f, "insufficient permissions for this operation")
            }
            // Backend detail stays in the logs.
            AuthError::SessionStoreUnavailable(_) => write!(f, "session store unavailable"),
            AuthError::SessionStoreTimeout => write!(f, "session store timed out"),
            AuthError::InternalError(_) => write!(f, "internal authentication error"),
        }
    }
}

impl std::error::Error for AuthError {}

impl From<SessionStoreError> for AuthError {
    fn from(e: SessionStoreError) -> Self {
        match e {
            SessionStoreError::Timeout(_) => AuthError::SessionStoreTimeout,
            other => AuthError::SessionStoreUnavailable(other.to_string()),
        }
    }
}

impl From<TokenError> for AuthError {
    fn from(e: TokenError) -> Self {
        match e {
            TokenError::InvalidToken | TokenError::Revoked => AuthError::InvalidToken,
            TokenError::InvalidClaims => AuthError::InvalidClaims,
            TokenError::AlreadyActive => AuthError::AlreadyLoggedIn,
            TokenError::Store(store) => store.into(),
            other => AuthError::InternalError(other.to_string()),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(AuthErrorBody {
            status: status.as_u16(),
            message: self.to_string(),
            error_code: self.error_code().to_string(),
        });
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use std::time::Duration;

    async fn body_of(error: AuthError) -> (StatusCode, serde_json::Value) {
        let response = error.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn missing_auth_returns_401() {
        let (status, body) = body_of(AuthError::MissingAuthHeader).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["status"], 401);
        assert_eq!(body["message"], "authorization header required");
        assert_eq!(body["error_code"], "missing_auth_header");
    }

    #[tokio::test]
    async fn already_logged_in_returns_403() {
        let (status, body) = body_of(AuthError::AlreadyLoggedIn).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["message"], "user already logged in");
    }

    #[tokio::test]
    async fn store_failures_are_server_errors_without_detail() {
        let (status, body) =
            body_of(AuthError::SessionStoreUnavailable("10.0.0.7:6379 refused".into())).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["message"], "session store unavailable");

        let timeout: AuthError = SessionStoreError::Timeout(Duration::from_secs(2)).into();
        assert_eq!(timeout.status_code(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[test]
    fn token_errors_keep_their_taxonomy() {
        assert!(matches!(
            AuthError::from(TokenError::InvalidClaims),
            AuthError::InvalidClaims
        ));
        assert!(matches!(
            AuthError::from(TokenError::Revoked),
            AuthError::InvalidToken
        ));
        assert!(matches!(
            AuthError::from(TokenError::Store(SessionStoreError::Unavailable("x".into()))),
            AuthError::SessionStoreUnavailable(_)
        ));
    }
}
