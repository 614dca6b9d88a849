// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Request Gate
//!
//! Per-request validation of `Authorization: <identity> <token>`.
//!
//! ```text
//! header missing               -> 401 authorization header required
//! not exactly two parts        -> 401 invalid token format
//! bad signature or expired     -> 401 invalid token
//! payload of the wrong shape   -> 401 invalid token claims
//! session check (see below)    -> 401 / 403
//! otherwise                    -> accepted, claims attached to the request
//! ```
//!
//! ## Session Check
//!
//! In both modes the token's identity claim must equal the searchable
//! ciphertext of the header identity (`403 identity mismatch`).
//!
//! - [`SessionCheck::Bound`]: a session entry must exist for the identity and
//!   the stored token must carry the same `sid` as the presented one.
//!   Refreshed tokens keep their `sid` and stay valid.
//! - [`SessionCheck::Exclusive`]: any existing entry for the header identity
//!   rejects the request with `403 user already logged in`.
//!
//! Session store failures are reported as 503/504, never as "not logged in".

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use axum::http::HeaderValue;
use tracing::debug;

use super::claims::{AuthenticatedUser, SessionClaims};
use super::error::AuthError;
use super::token::TokenService;
use crate::codec::CipherCodec;
use crate::session::SessionStore;

/// How the gate relates a verified token to the session store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionCheck {
    /// Entry must exist and belong to the presented token's session
    #[default]
    Bound,
    /// Entry must not exist
    Exclusive,
}

impl FromStr for SessionCheck {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "bound" => Ok(SessionCheck::Bound),
            "exclusive" => Ok(SessionCheck::Exclusive),
            other => Err(format!("expected `bound` or `exclusive`, got `{other}`")),
        }
    }
}

impl fmt::Display for SessionCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionCheck::Bound => write!(f, "bound"),
            SessionCheck::Exclusive => write!(f, "exclusive"),
        }
    }
}

/// Split an authorization value into exactly two space-separated parts.
pub fn split_authorization(value: &str) -> Option<(&str, &str)> {
    let mut parts = value.split(' ');
    let first = parts.next()?;
    let second = parts.next()?;
    if parts.next().is_some() || first.is_empty() || second.is_empty() {
        return None;
    }
    Some((first, second))
}

/// Stateless request guard. Holds no session state of its own.
#[derive(Clone)]
pub struct AuthGate {
    codec: Arc<CipherCodec>,
    tokens: Arc<TokenService>,
    sessions: Arc<dyn SessionStore>,
    check: SessionCheck,
}

impl AuthGate {
    pub fn new(
        codec: Arc<CipherCodec>,
        tokens: Arc<TokenService>,
        sessions: Arc<dyn SessionStore>,
        check: SessionCheck,
    ) -> Self {
        Self {
            codec,
            tokens,
            sessions,
            check,
        }
    }

    /// Evaluate one request's authorization header.
    pub async fn evaluate(
        &self,
        header: Option<&HeaderValue>,
    ) -> Result<AuthenticatedUser, AuthError> {
        let result = self.run(header).await;
        if let Err(e) = &result {
            debug!(error_code = e.error_code(), check = %self.check, "Request rejected by auth gate");
        }
        result
    }

    async fn run(&self, header: Option<&HeaderValue>) -> Result<AuthenticatedUser, AuthError> {
        let header = header.ok_or(AuthError::MissingAuthHeader)?;
        let value = header.to_str().map_err(|_| AuthError::InvalidAuthHeader)?;
        let (identity, token) = split_authorization(value).ok_or(AuthError::InvalidAuthHeader)?;

        let claims = self.tokens.verify(token)?;

        let identity_key = self
            .codec
            .searchable(identity)
            .map_err(|e| AuthError::InternalError(e.to_string()))?;

        // The header identity is only trusted once the signed claim vouches
        // for it. A forged pairing costs no store round trip.
        if claims.email != identity_key {
            return Err(AuthError::IdentityMismatch);
        }

        match self.check {
            SessionCheck::Exclusive => {
                if self.sessions.exists(&identity_key).await? {
                    return Err(AuthError::AlreadyLoggedIn);
                }
            }
            SessionCheck::Bound => self.check_bound(&identity_key, &claims).await?,
        }

        Ok(AuthenticatedUser::new(identity.to_string(), identity_key, claims))
    }

    async fn check_bound(&self, identity_key: &str, claims: &SessionClaims) -> Result<(), AuthError> {
        let stored = self
            .sessions
            .get(identity_key)
            .await?
            .ok_or(AuthError::SessionNotFound)?;

        // The stored token may be past its own exp if it was refreshed.
        let stored_sid = self
            .tokens
            .verify_signature(&stored)
            .map(|stored_claims| stored_claims.sid)
            .map_err(|_| AuthError::SessionSuperseded)?;

        if stored_sid != claims.sid {
            return Err(AuthError::SessionSuperseded);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::token::IssuedToken;
    use crate::config::AppConfig;
    use crate::session::{InMemorySessionStore, SessionStoreError, SessionStoreResult};
    use crate::state::test_support::{test_codec, test_config};
    use async_trait::async_trait;
    use axum::http::StatusCode;
    use chrono::Utc;
    use std::time::Duration;

    const EMAIL: &str = "user@example.com";

    struct Fixture {
        gate: AuthGate,
        tokens: Arc<TokenService>,
        store: Arc<InMemorySessionStore>,
    }

    fn fixture(check: SessionCheck) -> Fixture {
        let config = test_config();
        let codec = Arc::new(test_codec(&config));
        let store = Arc::new(InMemorySessionStore::new());
        let tokens = Arc::new(TokenService::new(&config, codec.clone(), store.clone()));
        let gate = AuthGate::new(codec, tokens.clone(), store.clone(), check);
        Fixture { gate, tokens, store }
    }

    fn header(value: &str) -> HeaderValue {
        HeaderValue::from_str(value).unwrap()
    }

    fn bearer_of(issued: &IssuedToken) -> HeaderValue {
        header(&format!("{EMAIL} {}", issued.token))
    }

    #[test]
    fn split_requires_exactly_two_parts() {
        assert_eq!(split_authorization("a b"), Some(("a", "b")));
        assert_eq!(split_authorization("Bearer t"), Some(("Bearer", "t")));
        assert_eq!(split_authorization("token-only"), None);
        assert_eq!(split_authorization("a b c"), None);
        assert_eq!(split_authorization("a  b"), None);
        assert_eq!(split_authorization("a "), None);
        assert_eq!(split_authorization(""), None);
    }

    #[test]
    fn session_check_parses() {
        assert_eq!("bound".parse::<SessionCheck>(), Ok(SessionCheck::Bound));
        assert_eq!("Exclusive".parse::<SessionCheck>(), Ok(SessionCheck::Exclusive));
        assert!("strict".parse::<SessionCheck>().is_err());
        assert_eq!(SessionCheck::default(), SessionCheck::Bound);
    }

    #[tokio::test]
    async fn rejects_missing_header() {
        let f = fixture(SessionCheck::Bound);
        assert!(matches!(
            f.gate.evaluate(None).await,
            Err(AuthError::MissingAuthHeader)
        ));
    }

    #[tokio::test]
    async fn rejects_malformed_header() {
        let f = fixture(SessionCheck::Bound);
        for value in ["only-one-part", "too many parts here", "trailing "] {
            assert!(matches!(
                f.gate.evaluate(Some(&header(value))).await,
                Err(AuthError::InvalidAuthHeader)
            ));
        }
        let non_ascii = HeaderValue::from_bytes(b"user\xff token").unwrap();
        assert!(matches!(
            f.gate.evaluate(Some(&non_ascii)).await,
            Err(AuthError::InvalidAuthHeader)
        ));
    }

    #[tokio::test]
    async fn rejects_bad_signature() {
        let f = fixture(SessionCheck::Bound);
        let result = f.gate.evaluate(Some(&header(&format!("{EMAIL} abc.def.ghi")))).await;
        assert!(matches!(result, Err(AuthError::InvalidToken)));
    }

    #[tokio::test]
    async fn rejects_expired_token_while_entry_still_present() {
        let f = fixture(SessionCheck::Bound);
        let issued = f.tokens.issue(EMAIL).await.unwrap();
        let expired = f
            .tokens
            .sign(&SessionClaims {
                exp: Utc::now().timestamp() - 5,
                ..issued.claims.clone()
            })
            .unwrap();

        assert!(f.store.exists(&issued.claims.email).await.unwrap());
        let result = f.gate.evaluate(Some(&header(&format!("{EMAIL} {expired}")))).await;
        assert!(matches!(result, Err(AuthError::InvalidToken)));
    }

    #[tokio::test]
    async fn bound_accepts_the_live_session() {
        let f = fixture(SessionCheck::Bound);
        let issued = f.tokens.issue(EMAIL).await.unwrap();

        let user = f.gate.evaluate(Some(&bearer_of(&issued))).await.unwrap();
        assert_eq!(user.identity, EMAIL);
        assert_eq!(user.identity_key, issued.claims.email);
        assert_eq!(user.session_id, issued.claims.sid);

        // Repeated requests with the same token keep working.
        assert!(f.gate.evaluate(Some(&bearer_of(&issued))).await.is_ok());
    }

    #[tokio::test]
    async fn bound_accepts_refreshed_tokens() {
        let f = fixture(SessionCheck::Bound);
        let issued = f.tokens.issue(EMAIL).await.unwrap();
        let refreshed = f.tokens.refresh(&issued.claims).unwrap();

        let user = f.gate.evaluate(Some(&bearer_of(&refreshed))).await.unwrap();
        assert_eq!(user.session_id, issued.claims.sid);
    }

    #[tokio::test]
    async fn bound_rejects_after_logout() {
        let f = fixture(SessionCheck::Bound);
        let issued = f.tokens.issue(EMAIL).await.unwrap();
        f.tokens.revoke(&issued.token).await.unwrap();

        assert!(matches!(
            f.gate.evaluate(Some(&bearer_of(&issued))).await,
            Err(AuthError::SessionNotFound)
        ));
    }

    #[tokio::test]
    async fn bound_rejects_superseded_session() {
        let f = fixture(SessionCheck::Bound);
        let old = f.tokens.issue(EMAIL).await.unwrap();
        f.tokens.revoke(&old.token).await.unwrap();
        let new = f.tokens.issue(EMAIL).await.unwrap();

        // Old token is still within its exp but belongs to a dead session.
        assert!(matches!(
            f.gate.evaluate(Some(&bearer_of(&old))).await,
            Err(AuthError::SessionSuperseded)
        ));
        assert!(f.gate.evaluate(Some(&bearer_of(&new))).await.is_ok());
    }

    #[tokio::test]
    async fn stale_logout_keeps_the_newer_session_valid() {
        let f = fixture(SessionCheck::Bound);
        let old = f.tokens.issue(EMAIL).await.unwrap();
        let old_refreshed = f.tokens.refresh(&old.claims).unwrap();
        f.tokens.revoke(&old.token).await.unwrap();
        let new = f.tokens.issue(EMAIL).await.unwrap();

        f.tokens.revoke(&old_refreshed.token).await.unwrap();

        assert!(f.gate.evaluate(Some(&bearer_of(&new))).await.is_ok());
    }

    #[tokio::test]
    async fn bound_rejects_identity_mismatch() {
        let f = fixture(SessionCheck::Bound);
        let issued = f.tokens.issue(EMAIL).await.unwrap();
        f.tokens.issue("other@example.com").await.unwrap();

        let value = header(&format!("other@example.com {}", issued.token));
        assert!(matches!(
            f.gate.evaluate(Some(&value)).await,
            Err(AuthError::IdentityMismatch)
        ));
    }

    #[tokio::test]
    async fn exclusive_rejects_when_session_exists() {
        let f = fixture(SessionCheck::Exclusive);
        let issued = f.tokens.issue(EMAIL).await.unwrap();

        let err = f.gate.evaluate(Some(&bearer_of(&issued))).await.unwrap_err();
        assert!(matches!(err, AuthError::AlreadyLoggedIn));
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn exclusive_accepts_when_no_session_exists() {
        let f = fixture(SessionCheck::Exclusive);
        let issued = f.tokens.issue(EMAIL).await.unwrap();
        f.store.delete(&issued.claims.email).await.unwrap();

        let user = f.gate.evaluate(Some(&bearer_of(&issued))).await.unwrap();
        assert_eq!(user.identity, EMAIL);
    }

    #[tokio::test]
    async fn exclusive_rejects_identity_mismatch() {
        let f = fixture(SessionCheck::Exclusive);
        let issued = f.tokens.issue("mallory@example.com").await.unwrap();
        f.store.delete(&issued.claims.email).await.unwrap();

        // No session exists for the asserted identity either.
        let value = header(&format!("{EMAIL} {}", issued.token));
        let err = f.gate.evaluate(Some(&value)).await.unwrap_err();
        assert!(matches!(err, AuthError::IdentityMismatch));
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
    }

    /// Store whose every call fails with the given error.
    struct FailingStore(SessionStoreError);

    #[async_trait]
    impl SessionStore for FailingStore {
        async fn set(&self, _: &str, _: &str, _: Duration) -> SessionStoreResult<()> {
            Err(self.0.clone())
        }
        async fn set_if_absent(&self, _: &str, _: &str, _: Duration) -> SessionStoreResult<bool> {
            Err(self.0.clone())
        }
        async fn get(&self, _: &str) -> SessionStoreResult<Option<String>> {
            Err(self.0.clone())
        }
        async fn exists(&self, _: &str) -> SessionStoreResult<bool> {
            Err(self.0.clone())
        }
        async fn delete(&self, _: &str) -> SessionStoreResult<bool> {
            Err(self.0.clone())
        }
        async fn delete_if_eq(&self, _: &str, _: &str) -> SessionStoreResult<bool> {
            Err(self.0.clone())
        }
        async fn flush_all(&self) -> SessionStoreResult<()> {
            Err(self.0.clone())
        }
        async fn ping(&self) -> SessionStoreResult<()> {
            Err(self.0.clone())
        }
        fn backend(&self) -> &'static str {
            "failing"
        }
    }

    async fn evaluate_with_failing_store(error: SessionStoreError, check: SessionCheck) -> AuthError {
        let config: AppConfig = test_config();
        let codec = Arc::new(test_codec(&config));

        // Sign a valid token against a working store first.
        let healthy = Arc::new(InMemorySessionStore::new());
        let issuer = TokenService::new(&config, codec.clone(), healthy);
        let issued = issuer.issue(EMAIL).await.unwrap();

        let failing: Arc<dyn SessionStore> = Arc::new(FailingStore(error));
        let tokens = Arc::new(TokenService::new(&config, codec.clone(), failing.clone()));
        let gate = AuthGate::new(codec, tokens, failing, check);
        gate.evaluate(Some(&bearer_of(&issued))).await.unwrap_err()
    }

    #[tokio::test]
    async fn store_failures_are_not_auth_failures() {
        for check in [SessionCheck::Bound, SessionCheck::Exclusive] {
            let err = evaluate_with_failing_store(
                SessionStoreError::Timeout(Duration::from_millis(50)),
                check,
            )
            .await;
            assert_eq!(err.status_code(), StatusCode::GATEWAY_TIMEOUT);

            let err = evaluate_with_failing_store(
                SessionStoreError::Unavailable("connection refused".into()),
                check,
            )
            .await;
            assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        }
    }
}
