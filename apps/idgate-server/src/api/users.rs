// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! User and session endpoints.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header::AUTHORIZATION, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::IntoResponse,
    Json,
};
use tracing::{info, warn};

use crate::{
    auth::{split_authorization, Auth, AuthError, IssuedToken, Role},
    directory::{hash_password, verify_password, NewUser, UserRecord},
    error::ApiError,
    models::{
        ApiResponse, LoginRequest, LoginResponse, LogoutResponse, RefreshResponse,
        RegisterRequest, UserProfile,
    },
    state::AppState,
};

const BAD_CREDENTIALS: &str = "invalid username/password";

fn bearer_header(issued: &IssuedToken) -> Result<[(HeaderName, HeaderValue); 1], ApiError> {
    let value = HeaderValue::from_str(&format!("Bearer {}", issued.token))
        .map_err(|_| ApiError::internal("internal server error"))?;
    Ok([(AUTHORIZATION, value)])
}

fn profile(state: &AppState, user: &UserRecord) -> Result<UserProfile, ApiError> {
    Ok(UserProfile {
        id: state.codec.conceal(user.id)?,
        name: user.name.clone(),
        username: user.username.clone(),
        email: user.email.clone(),
        role: user.role,
        created_at: user.created_at,
    })
}

async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ApiError::internal(format!("worker failed: {e}")))
}

/// Log in with username (or email) and password.
///
/// The token is returned in the body and echoed in the `Authorization`
/// response header. A user with a live session is refused until it ends.
#[utoipa::path(
    post,
    path = "/v1/user/login",
    tag = "Users",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Session issued", body = ApiResponse<LoginResponse>),
        (status = 400, description = "User already has an active session"),
        (status = 401, description = "Wrong password"),
        (status = 404, description = "Unknown user"),
        (status = 503, description = "Session store unavailable"),
    )
)]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = payload?;

    let user = state
        .users
        .find_by_login(&request.username)
        .await?
        .ok_or_else(|| ApiError::not_found(BAD_CREDENTIALS))?;

    let hash = user.password_hash.clone();
    let password = request.password;
    if !blocking(move || verify_password(&password, &hash)).await? {
        return Err(ApiError::unauthorized(BAD_CREDENTIALS));
    }

    let id = state.codec.conceal(user.id)?;
    let issued = state.tokens.issue(&user.email).await?;
    info!(session_id = %issued.claims.sid, "User logged in");

    let body = ApiResponse::ok(LoginResponse {
        id,
        name: user.name,
        username: user.username,
        email: user.email,
        token: issued.token.clone(),
        session_id: issued.claims.sid.clone(),
        expires_at: issued.expires_at(),
    });
    Ok((bearer_header(&issued)?, body))
}

/// Register a new account.
///
/// `role_id` is an opaque id. Admin accounts cannot self-register.
#[utoipa::path(
    post,
    path = "/v1/user/register",
    tag = "Users",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = ApiResponse<UserProfile>),
        (status = 400, description = "Missing fields or undecryptable role id"),
        (status = 403, description = "Privileged role requested"),
        (status = 409, description = "Username or email already registered"),
    )
)]
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<ApiResponse<UserProfile>, ApiError> {
    let Json(request) = payload?;

    if request.name.trim().is_empty()
        || request.username.trim().is_empty()
        || request.email.trim().is_empty()
        || request.password.is_empty()
    {
        return Err(ApiError::bad_request(
            "name, username, email and password are required",
        ));
    }
    if request.username.contains(' ') || request.email.contains(' ') {
        return Err(ApiError::bad_request("username and email must not contain spaces"));
    }

    let role = match &request.role_id {
        Some(opaque) => {
            let raw = state.codec.reveal(opaque.as_ref())?;
            Role::from_id(raw).ok_or_else(|| ApiError::bad_request("unknown role"))?
        }
        None => Role::default(),
    };
    if role == Role::Admin {
        return Err(ApiError::new(
            StatusCode::FORBIDDEN,
            "admin accounts cannot self-register",
        ));
    }

    let password = request.password;
    let password_hash = blocking(move || hash_password(&password)).await??;

    let record = state
        .users
        .create(NewUser {
            role,
            name: request.name,
            username: request.username,
            email: request.email,
            password_hash,
        })
        .await?;
    info!(role = %record.role, "User registered");

    Ok(ApiResponse::created(profile(&state, &record)?))
}

/// Profile of the caller.
#[utoipa::path(
    get,
    path = "/v1/user",
    tag = "Users",
    security(("session" = [])),
    responses(
        (status = 200, description = "Current user", body = ApiResponse<UserProfile>),
        (status = 401, description = "Missing or invalid session"),
        (status = 404, description = "Account no longer exists"),
    )
)]
pub async fn current_user(
    State(state): State<AppState>,
    Auth(user): Auth,
) -> Result<ApiResponse<UserProfile>, ApiError> {
    let record = state
        .users
        .find_by_email(&user.identity)
        .await?
        .ok_or_else(|| ApiError::not_found("user not found"))?;
    Ok(ApiResponse::ok(profile(&state, &record)?))
}

/// End the session of the presented token.
///
/// Accepts `Authorization: <email> <token>` or `Bearer <token>`. Expired
/// tokens are accepted so a client can always log out.
#[utoipa::path(
    post,
    path = "/v1/user/logout",
    tag = "Users",
    security(("session" = [])),
    responses(
        (status = 200, description = "Session ended", body = ApiResponse<LogoutResponse>),
        (status = 401, description = "Missing, malformed or already revoked token"),
    )
)]
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<ApiResponse<LogoutResponse>, ApiError> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingAuthHeader)?
        .to_str()
        .map_err(|_| AuthError::InvalidAuthHeader)?;
    let (_, token) = split_authorization(value).ok_or(AuthError::InvalidAuthHeader)?;

    let identity = state.tokens.revoke(token).await.inspect_err(|e| {
        warn!(error = %e, "Logout failed");
    })?;

    Ok(ApiResponse::ok(LogoutResponse {
        user: identity,
        message: "logout successful".to_string(),
    }))
}

/// Re-sign the caller's token with the refresh lifetime.
///
/// The session store entry keeps its own TTL.
#[utoipa::path(
    post,
    path = "/v1/user/refresh",
    tag = "Users",
    security(("session" = [])),
    responses(
        (status = 200, description = "Token refreshed", body = ApiResponse<RefreshResponse>),
        (status = 401, description = "Missing or invalid session"),
    )
)]
pub async fn refresh(
    State(state): State<AppState>,
    Auth(user): Auth,
) -> Result<impl IntoResponse, ApiError> {
    let issued = state.tokens.refresh(&user.claims)?;
    info!(session_id = %issued.claims.sid, "Session token refreshed");

    let body = ApiResponse::ok(RefreshResponse {
        token: issued.token.clone(),
        expires_at: issued.expires_at(),
    });
    Ok((bearer_header(&issued)?, body))
}
