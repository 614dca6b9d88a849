// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractors for authentication.

use axum::{extract::FromRequestParts, http::header::AUTHORIZATION, http::request::Parts};
use tracing::warn;

use super::{AuthError, AuthenticatedUser, Role};
use crate::directory::UserRecord;
use crate::state::AppState;

/// Extractor for the authenticated caller.
///
/// Uses the user stored by [`require_session`](super::middleware::require_session)
/// when the route sits behind it, otherwise runs the gate itself.
///
/// ```rust,ignore
/// async fn handler(Auth(user): Auth) -> impl IntoResponse {
///     format!("Hello, {}", user.identity)
/// }
/// ```
pub struct Auth(pub AuthenticatedUser);

impl FromRequestParts<AppState> for Auth {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<AuthenticatedUser>() {
            return Ok(Auth(user.clone()));
        }

        let user = state.gate.evaluate(parts.headers.get(AUTHORIZATION)).await?;
        parts.extensions.insert(user.clone());
        Ok(Auth(user))
    }
}

/// Extractor that requires the admin role.
///
/// The role lives in the user directory, not in the token.
pub struct AdminOnly(pub AuthenticatedUser, pub UserRecord);

impl FromRequestParts<AppState> for AdminOnly {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Auth(user) = Auth::from_request_parts(parts, state).await?;

        let record = state
            .users
            .find_by_email(&user.identity)
            .await
            .map_err(|e| {
                warn!(error = %e, "Role lookup failed");
                AuthError::InternalError(e.to_string())
            })?
            .ok_or(AuthError::InsufficientPermissions)?;

        if !record.role.has_privilege(Role::Admin) {
            return Err(AuthError::InsufficientPermissions);
        }

        Ok(AdminOnly(user, record))
    }
}
