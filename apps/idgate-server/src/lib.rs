// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! IdGate - Identity Protection & Session Authentication Service
//!
//! Fronts an administrative backend with opaque record identifiers and
//! single-session bearer tokens.
//!
//! ## Modules
//!
//! - `codec` - AES-CBC identifier codec (opaque and searchable modes)
//! - `session` - Session store contract with Redis and in-memory backends
//! - `auth` - Token service, request gate, extractors and middleware
//! - `directory` - User accounts with Argon2 password hashes
//! - `api` - HTTP API handlers (Axum) and OpenAPI document

pub mod api;
pub mod auth;
pub mod codec;
pub mod config;
pub mod directory;
pub mod error;
pub mod models;
pub mod session;
pub mod state;
pub mod tls;
