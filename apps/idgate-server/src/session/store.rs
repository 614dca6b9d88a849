// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Session store contract.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Errors surfaced by a session store backend.
///
/// These are infrastructure failures. They must never be read as
/// "not logged in".
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionStoreError {
    /// Backend unreachable or returned an error
    #[error("session store unavailable: {0}")]
    Unavailable(String),
    /// Operation exceeded its deadline
    #[error("session store timed out after {0:?}")]
    Timeout(Duration),
    /// Backend replied with something unexpected
    #[error("unexpected session store reply: {0}")]
    Protocol(String),
}

/// Result type for session store operations.
pub type SessionStoreResult<T> = Result<T, SessionStoreError>;

/// Thin contract over a remote key-value service with per-key TTL.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Store `value` under `key`, replacing any previous entry.
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> SessionStoreResult<()>;

    /// Store `value` under `key` only if no live entry exists.
    ///
    /// Returns `false` when the key is already taken. Backends must make the
    /// check and the write a single atomic step (`SET NX EX` on Redis).
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration)
        -> SessionStoreResult<bool>;

    /// Fetch the value under `key`; `None` means not found.
    async fn get(&self, key: &str) -> SessionStoreResult<Option<String>>;

    /// Check whether a live entry exists under `key`.
    async fn exists(&self, key: &str) -> SessionStoreResult<bool>;

    /// Remove `key`. Returns whether an entry was removed.
    async fn delete(&self, key: &str) -> SessionStoreResult<bool>;

    /// Remove `key` only while it still holds `expected`.
    ///
    /// Returns whether an entry was removed. The comparison and the delete
    /// are one atomic step, so a session written in between survives.
    async fn delete_if_eq(&self, key: &str, expected: &str) -> SessionStoreResult<bool>;

    /// Remove every entry (administrative mass invalidation).
    async fn flush_all(&self) -> SessionStoreResult<()>;

    /// Liveness check used by readiness probes.
    async fn ping(&self) -> SessionStoreResult<()>;

    /// Short backend name for logs and health output.
    fn backend(&self) -> &'static str;
}

/// Whole seconds for a TTL, never below one.
pub(crate) fn ttl_secs(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}
