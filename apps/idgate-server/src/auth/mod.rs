// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Single-session bearer tokens for the administrative API.
//!
//! ## Auth Flow
//!
//! 1. `POST /v1/user/login` verifies credentials and asks [`TokenService`] to
//!    issue a token. The session store gains one entry keyed by the
//!    searchable ciphertext of the user's email.
//! 2. The client sends `Authorization: <email> <token>` on every request.
//! 3. [`AuthGate`] verifies the token and checks it against the session
//!    store before the handler runs.
//! 4. `POST /v1/user/logout` revokes the token and deletes the entry.
//!
//! ## Security
//!
//! - Tokens are HS256 with zero clock-skew leeway
//! - The identity claim is ciphertext, never the plaintext email
//! - At most one session per identity (atomic `SET NX` on issue)
//! - Session store failures surface as 503/504, never as "logged out"

pub mod claims;
pub mod error;
pub mod extractor;
pub mod gate;
pub mod middleware;
pub mod roles;
pub mod token;

pub use claims::{AuthenticatedUser, SessionClaims};
pub use error::AuthError;
pub use extractor::{AdminOnly, Auth};
pub use gate::{split_authorization, AuthGate, SessionCheck};
pub use middleware::require_session;
pub use roles::Role;
pub use token::{IssuedToken, TokenError, TokenService};
