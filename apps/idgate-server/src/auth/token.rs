// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Session Token Service
//!
//! Issues, verifies, refreshes and revokes HS256 bearer tokens.
//!
//! ## Session Lifecycle
//!
//! ```text
//! issue    -> SET NX <searchable(identity)> <token> EX <access ttl>
//! refresh  -> same email/sid/iat, exp = now + refresh ttl (store untouched)
//! revoke   -> DEL <claims.email> if the stored token has the same sid,
//!             remember token in the revoked set
//! ```
//!
//! The session store is the authority for "is this identity logged in". The
//! revoked set is a bounded, best-effort record that only rejects a second
//! revoke of the same token within the process lifetime.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use lru::LruCache;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use super::claims::SessionClaims;
use crate::codec::{CipherCodec, CipherMode, CodecError};
use crate::config::AppConfig;
use crate::session::{SessionStore, SessionStoreError};

/// Token service errors.
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("identity already has an active session")]
    AlreadyActive,

    #[error("invalid token")]
    InvalidToken,

    #[error("invalid token claims")]
    InvalidClaims,

    #[error("token already revoked")]
    Revoked,

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Store(#[from] SessionStoreError),

    #[error("token signing failed: {0}")]
    Signing(String),
}

/// A freshly signed token and the claims it carries.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub claims: SessionClaims,
}

impl IssuedToken {
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.claims.expires_at()
    }
}

/// Bounded set of revoked raw tokens, keyed by token with its `exp`.
struct RevokedTokens {
    cache: Mutex<LruCache<String, i64>>,
}

impl RevokedTokens {
    fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    fn contains(&self, token: &str) -> bool {
        self.cache
            .lock()
            .map(|cache| cache.contains(token))
            .unwrap_or(false)
    }

    fn insert(&self, token: String, exp: i64) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.put(token, exp);
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.cache.lock().map(|cache| cache.len()).unwrap_or(0)
    }
}

/// Issues and validates session bearer tokens.
pub struct TokenService {
    codec: Arc<CipherCodec>,
    sessions: Arc<dyn SessionStore>,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
    revoked: RevokedTokens,
}

impl TokenService {
    pub fn new(
        config: &AppConfig,
        codec: Arc<CipherCodec>,
        sessions: Arc<dyn SessionStore>,
    ) -> Self {
        let secret = config.token_secret.as_bytes();
        Self {
            codec,
            sessions,
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            access_ttl: config.access_token_ttl,
            refresh_ttl: config.refresh_token_ttl,
            revoked: RevokedTokens::new(config.revoked_token_capacity),
        }
    }

    /// Start a session for `identity`.
    ///
    /// Fails with [`TokenError::AlreadyActive`] if the identity already holds
    /// a session. The existing entry is never overwritten.
    pub async fn issue(&self, identity: &str) -> Result<IssuedToken, TokenError> {
        let identity_key = self.codec.searchable(identity)?;
        let now = Utc::now().timestamp();
        let claims = SessionClaims {
            email: identity_key,
            sid: Uuid::new_v4().to_string(),
            iat: now,
            exp: expires_in(now, self.access_ttl)?,
        };
        let token = self.sign(&claims)?;

        let created = self
            .sessions
            .set_if_absent(&claims.email, &token, self.access_ttl)
            .await?;
        if !created {
            debug!(identity_key = %claims.email, "Session already active");
            return Err(TokenError::AlreadyActive);
        }

        info!(identity_key = %claims.email, session_id = %claims.sid, "Session issued");
        Ok(IssuedToken { token, claims })
    }

    /// Re-sign verified claims with `exp = now + refresh ttl`.
    ///
    /// The session id and store entry stay as they are.
    pub fn refresh(&self, claims: &SessionClaims) -> Result<IssuedToken, TokenError> {
        let claims = SessionClaims {
            exp: expires_in(Utc::now().timestamp(), self.refresh_ttl)?,
            ..claims.clone()
        };
        let token = self.sign(&claims)?;
        Ok(IssuedToken { token, claims })
    }

    /// End the session a token belongs to and return the plaintext identity.
    ///
    /// Expired tokens are accepted so a client can always log out. The store
    /// entry is only removed while it still belongs to the token's session; a
    /// stale token never ends a newer login.
    pub async fn revoke(&self, token: &str) -> Result<String, TokenError> {
        if self.revoked.contains(token) {
            return Err(TokenError::Revoked);
        }

        let claims = self.verify_signature(token)?;
        let identity = self
            .codec
            .decrypt(&claims.email, CipherMode::Searchable)
            .map_err(|_| TokenError::InvalidClaims)?;

        let removed = self.end_session(&claims).await?;
        self.revoked.insert(token.to_string(), claims.exp);

        info!(
            identity_key = %claims.email,
            session_id = %claims.sid,
            removed,
            "Session revoked"
        );
        Ok(identity)
    }

    async fn end_session(&self, claims: &SessionClaims) -> Result<bool, TokenError> {
        let Some(stored) = self.sessions.get(&claims.email).await? else {
            return Ok(false);
        };

        let same_session = self
            .verify_signature(&stored)
            .is_ok_and(|stored_claims| stored_claims.sid == claims.sid);
        if !same_session {
            debug!(
                identity_key = %claims.email,
                session_id = %claims.sid,
                "Stored session belongs to another login, left in place"
            );
            return Ok(false);
        }

        Ok(self.sessions.delete_if_eq(&claims.email, &stored).await?)
    }

    /// Verify signature and expiry.
    pub fn verify(&self, token: &str) -> Result<SessionClaims, TokenError> {
        self.decode_claims(token, true)
    }

    /// Verify the signature only. Expired tokens still decode.
    pub fn verify_signature(&self, token: &str) -> Result<SessionClaims, TokenError> {
        self.decode_claims(token, false)
    }

    pub(crate) fn sign(&self, claims: &SessionClaims) -> Result<String, TokenError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    fn decode_claims(&self, token: &str, check_exp: bool) -> Result<SessionClaims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = check_exp;
        validation.validate_aud = false;

        // Two phases: a failed signature or expiry is an invalid token, a
        // verified payload of the wrong shape is invalid claims.
        let payload = decode::<serde_json::Value>(token, &self.decoding_key, &validation)
            .map_err(|e| match e.kind() {
                ErrorKind::MissingRequiredClaim(_) => TokenError::InvalidClaims,
                _ => TokenError::InvalidToken,
            })?
            .claims;

        serde_json::from_value(payload).map_err(|_| TokenError::InvalidClaims)
    }

    #[cfg(test)]
    fn revoked_len(&self) -> usize {
        self.revoked.len()
    }
}

/// `now + ttl` as a numeric date.
fn expires_in(now: i64, ttl: Duration) -> Result<i64, TokenError> {
    i64::try_from(ttl.as_secs())
        .ok()
        .and_then(|secs| now.checked_add(secs))
        .ok_or_else(|| TokenError::Signing(format!("token lifetime {ttl:?} out of range")))
}
