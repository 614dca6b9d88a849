// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::auth::{AuthGate, TokenService};
use crate::codec::{CipherCodec, CodecError};
use crate::config::AppConfig;
use crate::directory::UserDirectory;
use crate::session::SessionStore;

/// Shared handler state. Every field is an `Arc`, so cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub codec: Arc<CipherCodec>,
    pub sessions: Arc<dyn SessionStore>,
    pub tokens: Arc<TokenService>,
    pub gate: AuthGate,
    pub users: Arc<dyn UserDirectory>,
}

impl AppState {
    /// Wire the session layer from configuration.
    ///
    /// Fails if the codec key material is invalid.
    pub fn new(
        config: AppConfig,
        sessions: Arc<dyn SessionStore>,
        users: Arc<dyn UserDirectory>,
    ) -> Result<Self, CodecError> {
        let codec = Arc::new(CipherCodec::new(&config.app_key, &config.searchable_iv)?);
        let tokens = Arc::new(TokenService::new(&config, codec.clone(), sessions.clone()));
        let gate = AuthGate::new(
            codec.clone(),
            tokens.clone(),
            sessions.clone(),
            config.session_check,
        );

        Ok(Self {
            config: Arc::new(config),
            codec,
            sessions,
            tokens,
            gate,
            users,
        })
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::directory::InMemoryDirectory;
    use crate::session::InMemorySessionStore;

    pub(crate) fn test_config() -> AppConfig {
        AppConfig::from_lookup(|name| {
            let value = match name {
                "APP_KEY" => "0123456789abcdef0123456789abcdef",
                "SEARCHABLE_IV" => "000102030405060708090a0b0c0d0e0f",
                "TOKEN_SECRET" => "test-signing-secret",
                _ => return None,
            };
            Some(value.to_string())
        })
        .unwrap()
    }

    pub(crate) fn test_codec(config: &AppConfig) -> CipherCodec {
        CipherCodec::new(&config.app_key, &config.searchable_iv).unwrap()
    }

    pub(crate) fn test_state_with(config: AppConfig) -> AppState {
        AppState::new(
            config,
            Arc::new(InMemorySessionStore::new()),
            Arc::new(InMemoryDirectory::new()),
        )
        .unwrap()
    }

    pub(crate) fn test_state() -> AppState {
        test_state_with(test_config())
    }
}
