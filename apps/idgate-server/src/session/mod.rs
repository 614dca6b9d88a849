// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Session Store
//!
//! The remote key-value store is the single source of truth for "is this
//! identity currently logged in". One entry exists per authenticated identity:
//!
//! ```text
//! key   = searchable ciphertext of the identity (email)
//! value = bearer token issued at login
//! ttl   = access-token lifetime
//! ```
//!
//! ## Backends
//!
//! - [`RedisSessionStore`] - production backend (`REDIS_URL`)
//! - [`InMemorySessionStore`] - development and tests
//!
//! Every operation is a single round-trip with no client-side caching.

pub mod memory;
pub mod redis;
pub mod store;

pub use memory::InMemorySessionStore;
pub use self::redis::RedisSessionStore;
pub use store::{SessionStore, SessionStoreError, SessionStoreResult};
