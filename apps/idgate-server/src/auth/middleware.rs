// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication middleware for Axum.
//!
//! Runs the [`AuthGate`](super::AuthGate) in front of a router subtree and
//! stores the accepted [`AuthenticatedUser`] in the request extensions, where
//! the [`Auth`](super::Auth) extractor picks it up.
//!
//! ```rust,ignore
//! let protected = Router::new()
//!     .route("/v1/user", get(current_user))
//!     .route_layer(axum::middleware::from_fn_with_state(state.clone(), require_session));
//! ```

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::{IntoResponse, Response},
};

use super::AuthenticatedUser;
use crate::state::AppState;

/// Reject the request unless the gate accepts its authorization header.
pub async fn require_session(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let verdict = state
        .gate
        .evaluate(request.headers().get(AUTHORIZATION))
        .await;

    match verdict {
        Ok(user) => {
            request.extensions_mut().insert::<AuthenticatedUser>(user);
            next.run(request).await
        }
        Err(e) => e.into_response(),
    }
}
