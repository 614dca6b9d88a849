// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Signed-token claims and authenticated user representation.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Claims carried by a session bearer token.
///
/// `email` is always the searchable ciphertext of the identity, so it is
/// directly comparable with the session store key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Searchable ciphertext of the identity
    pub email: String,

    /// Session id, stable across refreshes
    pub sid: String,

    /// Issued at (seconds since epoch)
    pub iat: i64,

    /// Expiration (seconds since epoch)
    pub exp: i64,
}

impl SessionClaims {
    /// Expiry as a UTC timestamp.
    pub fn expires_at(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.exp, 0)
            .single()
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

/// Authenticated caller attached to the request by the gate.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    /// Plaintext identity asserted in the authorization header
    pub identity: String,

    /// Session store key (searchable ciphertext of `identity`)
    pub identity_key: String,

    /// Session id from the presented token
    pub session_id: String,

    /// Token expiration (Unix timestamp)
    pub expires_at: i64,

    /// Verified claims, kept for refresh
    pub claims: SessionClaims,
}

impl AuthenticatedUser {
    pub fn new(identity: String, identity_key: String, claims: SessionClaims) -> Self {
        Self {
            identity,
            identity_key,
            session_id: claims.sid.clone(),
            expires_at: claims.exp,
            claims,
        }
    }
}
