// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    http::HeaderName,
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::{
    openapi::security::{ApiKey, ApiKeyValue, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    auth::{require_session, Role},
    models::{
        CipherMode, EncDecOp, EncDecRequest, EncDecResponse, FlushResponse, LoginRequest,
        LoginResponse, LogoutResponse, OpaqueId, RefreshResponse, RegisterRequest, UserProfile,
    },
    state::AppState,
};

pub mod admin;
pub mod encdec;
pub mod health;
pub mod users;

const REQUEST_ID_HEADER: &str = "x-request-id";

pub fn router(state: AppState) -> Router {
    let public = Router::new()
        .route("/user/login", post(users::login))
        .route("/user/register", post(users::register))
        .route("/user/logout", post(users::logout));

    let protected = Router::new()
        .route("/user", get(users::current_user))
        .route("/user/refresh", post(users::refresh))
        .route("/enc-dec", post(encdec::enc_dec))
        .route("/admin/sessions/flush", post(admin::flush_sessions))
        .route_layer(from_fn_with_state(state.clone(), require_session));

    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);

    Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .nest("/v1", public.merge(protected))
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(request_id.clone(), MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::new(request_id))
                .layer(CorsLayer::permissive()),
        )
}

/// Registers the `Authorization: <email> <token>` scheme.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "session",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new("Authorization"))),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        health::liveness,
        health::readiness,
        users::login,
        users::register,
        users::current_user,
        users::logout,
        users::refresh,
        encdec::enc_dec,
        admin::flush_sessions
    ),
    components(
        schemas(
            health::ReadyResponse,
            health::HealthChecks,
            health::HealthResponse,
            LoginRequest,
            LoginResponse,
            LogoutResponse,
            RefreshResponse,
            RegisterRequest,
            UserProfile,
            EncDecRequest,
            EncDecResponse,
            EncDecOp,
            CipherMode,
            FlushResponse,
            OpaqueId,
            Role
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Liveness and readiness probes"),
        (name = "Users", description = "Login, logout, refresh and registration"),
        (name = "Codec", description = "Identifier codec utility"),
        (name = "Admin", description = "Session administration")
    )
)]
struct ApiDoc;
