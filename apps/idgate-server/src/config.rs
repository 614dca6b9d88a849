// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Configuration is loaded once from the environment at startup and shared as
//! `Arc<AppConfig>`. Key material is never re-read per call.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `APP_KEY` | Identifier codec key (16, 24 or 32 bytes) | Required |
//! | `SEARCHABLE_IV` | Hex-encoded fixed IV for searchable mode | Required |
//! | `TOKEN_SECRET` | HS256 signing secret for bearer tokens | Required |
//! | `ACCESS_TOKEN_TTL_SECS` | Access token lifetime and session TTL | `3600` |
//! | `REFRESH_TOKEN_TTL_SECS` | Lifetime of refreshed tokens | `86400` |
//! | `REDIS_URL` | Session store; in-memory when unset | Optional |
//! | `SESSION_STORE_TIMEOUT_MS` | Per-command session store deadline | `2000` |
//! | `SESSION_CHECK` | Gate session check (`bound` or `exclusive`) | `bound` |
//! | `REVOKED_TOKEN_CAPACITY` | Bound of the in-process revoked-token set | `10000` |
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `TLS_CERT_PATH` / `TLS_KEY_PATH` | PEM files; HTTPS when both set | Optional |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |
//! | `SEED_ADMIN_USERNAME` / `SEED_ADMIN_EMAIL` / `SEED_ADMIN_PASSWORD` | Seed admin account | Optional |

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::auth::SessionCheck;

pub const APP_KEY_ENV: &str = "APP_KEY";
pub const SEARCHABLE_IV_ENV: &str = "SEARCHABLE_IV";
pub const TOKEN_SECRET_ENV: &str = "TOKEN_SECRET";
pub const ACCESS_TOKEN_TTL_ENV: &str = "ACCESS_TOKEN_TTL_SECS";
pub const REFRESH_TOKEN_TTL_ENV: &str = "REFRESH_TOKEN_TTL_SECS";
pub const REDIS_URL_ENV: &str = "REDIS_URL";
pub const SESSION_STORE_TIMEOUT_ENV: &str = "SESSION_STORE_TIMEOUT_MS";
pub const SESSION_CHECK_ENV: &str = "SESSION_CHECK";
pub const REVOKED_TOKEN_CAPACITY_ENV: &str = "REVOKED_TOKEN_CAPACITY";
pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const TLS_CERT_PATH_ENV: &str = "TLS_CERT_PATH";
pub const TLS_KEY_PATH_ENV: &str = "TLS_KEY_PATH";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";
pub const SEED_ADMIN_USERNAME_ENV: &str = "SEED_ADMIN_USERNAME";
pub const SEED_ADMIN_EMAIL_ENV: &str = "SEED_ADMIN_EMAIL";
pub const SEED_ADMIN_PASSWORD_ENV: &str = "SEED_ADMIN_PASSWORD";

/// Default log filter when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug";

const DEFAULT_ACCESS_TOKEN_TTL_SECS: u64 = 3600;
const DEFAULT_REFRESH_TOKEN_TTL_SECS: u64 = 86_400;
const DEFAULT_SESSION_STORE_TIMEOUT_MS: u64 = 2000;
/// Upper bound for token and session lifetimes (one year).
pub const MAX_TTL_SECS: u64 = 365 * 24 * 60 * 60;
const DEFAULT_REVOKED_TOKEN_CAPACITY: usize = 10_000;
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;

/// Configuration errors. All of them are fatal at startup.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    Json,
    #[default]
    Pretty,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "pretty" => Ok(LogFormat::Pretty),
            other => Err(format!("expected `json` or `pretty`, got `{other}`")),
        }
    }
}

/// PEM certificate chain and private key paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsPaths {
    pub cert: PathBuf,
    pub key: PathBuf,
}

/// Admin account created in the in-memory directory at startup.
#[derive(Clone)]
pub struct SeedAdmin {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl fmt::Debug for SeedAdmin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SeedAdmin")
            .field("username", &self.username)
            .field("email", &"<redacted>")
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Process configuration.
#[derive(Clone)]
pub struct AppConfig {
    pub app_key: Vec<u8>,
    pub searchable_iv: String,
    pub token_secret: String,
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
    pub redis_url: Option<String>,
    pub session_store_timeout: Duration,
    pub session_check: SessionCheck,
    pub revoked_token_capacity: usize,
    pub host: String,
    pub port: u16,
    pub tls: Option<TlsPaths>,
    pub log_format: LogFormat,
    pub seed_admin: Option<SeedAdmin>,
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("app_key", &"<redacted>")
            .field("searchable_iv", &"<redacted>")
            .field("token_secret", &"<redacted>")
            .field("access_token_ttl", &self.access_token_ttl)
            .field("refresh_token_ttl", &self.refresh_token_ttl)
            .field("redis_url", &self.redis_url.as_ref().map(|_| "<redacted>"))
            .field("session_store_timeout", &self.session_store_timeout)
            .field("session_check", &self.session_check)
            .field("revoked_token_capacity", &self.revoked_token_capacity)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("tls", &self.tls)
            .field("log_format", &self.log_format)
            .field("seed_admin", &self.seed_admin)
            .finish()
    }
}

impl AppConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Empty values count as unset.
        let get = |name: &str| lookup(name).filter(|v| !v.is_empty());

        let app_key = get(APP_KEY_ENV)
            .ok_or(ConfigError::Missing(APP_KEY_ENV))?
            .into_bytes();
        let searchable_iv = get(SEARCHABLE_IV_ENV).ok_or(ConfigError::Missing(SEARCHABLE_IV_ENV))?;
        let token_secret = get(TOKEN_SECRET_ENV).ok_or(ConfigError::Missing(TOKEN_SECRET_ENV))?;

        let access_token_ttl = ttl(
            ACCESS_TOKEN_TTL_ENV,
            get(ACCESS_TOKEN_TTL_ENV),
            DEFAULT_ACCESS_TOKEN_TTL_SECS,
        )?;
        let refresh_token_ttl = ttl(
            REFRESH_TOKEN_TTL_ENV,
            get(REFRESH_TOKEN_TTL_ENV),
            DEFAULT_REFRESH_TOKEN_TTL_SECS,
        )?;
        let session_store_timeout = Duration::from_millis(positive(
            SESSION_STORE_TIMEOUT_ENV,
            get(SESSION_STORE_TIMEOUT_ENV),
            DEFAULT_SESSION_STORE_TIMEOUT_MS,
        )?);
        let revoked_token_capacity = positive(
            REVOKED_TOKEN_CAPACITY_ENV,
            get(REVOKED_TOKEN_CAPACITY_ENV),
            DEFAULT_REVOKED_TOKEN_CAPACITY,
        )?;

        let session_check = parsed(SESSION_CHECK_ENV, get(SESSION_CHECK_ENV))?.unwrap_or_default();
        let log_format = parsed(LOG_FORMAT_ENV, get(LOG_FORMAT_ENV))?.unwrap_or_default();
        let port = parsed(PORT_ENV, get(PORT_ENV))?.unwrap_or(DEFAULT_PORT);
        let host = get(HOST_ENV).unwrap_or_else(|| DEFAULT_HOST.to_string());

        let tls = match (get(TLS_CERT_PATH_ENV), get(TLS_KEY_PATH_ENV)) {
            (Some(cert), Some(key)) => Some(TlsPaths {
                cert: cert.into(),
                key: key.into(),
            }),
            (None, None) => None,
            (Some(_), None) => return Err(ConfigError::Missing(TLS_KEY_PATH_ENV)),
            (None, Some(_)) => return Err(ConfigError::Missing(TLS_CERT_PATH_ENV)),
        };

        let seed_admin = match (
            get(SEED_ADMIN_USERNAME_ENV),
            get(SEED_ADMIN_EMAIL_ENV),
            get(SEED_ADMIN_PASSWORD_ENV),
        ) {
            (Some(username), Some(email), Some(password)) => Some(SeedAdmin {
                username,
                email,
                password,
            }),
            (None, None, None) => None,
            _ => {
                return Err(ConfigError::Invalid {
                    var: SEED_ADMIN_USERNAME_ENV,
                    reason: "seed admin needs username, email and password together".into(),
                })
            }
        };

        Ok(Self {
            app_key,
            searchable_iv,
            token_secret,
            access_token_ttl,
            refresh_token_ttl,
            redis_url: get(REDIS_URL_ENV),
            session_store_timeout,
            session_check,
            revoked_token_capacity,
            host,
            port,
            tls,
            log_format,
            seed_admin,
        })
    }

    /// `host:port` string for the listener.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parsed<T>(var: &'static str, raw: Option<String>) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    raw.map(|value| {
        value.trim().parse::<T>().map_err(|e| ConfigError::Invalid {
            var,
            reason: e.to_string(),
        })
    })
    .transpose()
}

fn positive<T>(var: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: FromStr + PartialOrd + Default,
    T::Err: fmt::Display,
{
    let value = parsed(var, raw)?.unwrap_or(default);
    if value <= T::default() {
        return Err(ConfigError::Invalid {
            var,
            reason: "must be greater than zero".into(),
        });
    }
    Ok(value)
}

fn ttl(var: &'static str, raw: Option<String>, default: u64) -> Result<Duration, ConfigError> {
    let secs = positive(var, raw, default)?;
    if secs > MAX_TTL_SECS {
        return Err(ConfigError::Invalid {
            var,
            reason: format!("must not exceed {MAX_TTL_SECS} seconds"),
        });
    }
    Ok(Duration::from_secs(secs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    const REQUIRED: [(&str, &str); 3] = [
        (APP_KEY_ENV, "0123456789abcdef"),
        (SEARCHABLE_IV_ENV, "000102030405060708090a0b0c0d0e0f"),
        (TOKEN_SECRET_ENV, "signing-secret"),
    ];

    fn with(extra: &[(&'static str, &'static str)]) -> Result<AppConfig, ConfigError> {
        let mut vars = REQUIRED.to_vec();
        vars.extend_from_slice(extra);
        AppConfig::from_lookup(lookup(&vars))
    }

    #[test]
    fn applies_defaults() {
        let config = with(&[]).unwrap();
        assert_eq!(config.access_token_ttl, Duration::from_secs(3600));
        assert_eq!(config.refresh_token_ttl, Duration::from_secs(86_400));
        assert_eq!(config.session_store_timeout, Duration::from_millis(2000));
        assert_eq!(config.session_check, SessionCheck::Bound);
        assert_eq!(config.revoked_token_capacity, 10_000);
        assert_eq!(config.bind_address(), "0.0.0.0:8080");
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert!(config.redis_url.is_none());
        assert!(config.tls.is_none());
        assert!(config.seed_admin.is_none());
    }

    #[test]
    fn missing_secrets_are_fatal() {
        let err = AppConfig::from_lookup(lookup(&REQUIRED[..2])).unwrap_err();
        assert_eq!(err, ConfigError::Missing(TOKEN_SECRET_ENV));

        let err = AppConfig::from_lookup(lookup(&[(APP_KEY_ENV, "")])).unwrap_err();
        assert_eq!(err, ConfigError::Missing(APP_KEY_ENV));
    }

    #[test]
    fn rejects_bad_numbers_instead_of_defaulting() {
        assert!(matches!(
            with(&[(ACCESS_TOKEN_TTL_ENV, "an hour")]),
            Err(ConfigError::Invalid { var: ACCESS_TOKEN_TTL_ENV, .. })
        ));
        assert!(matches!(
            with(&[(REFRESH_TOKEN_TTL_ENV, "0")]),
            Err(ConfigError::Invalid { var: REFRESH_TOKEN_TTL_ENV, .. })
        ));
        assert!(matches!(
            with(&[(PORT_ENV, "70000")]),
            Err(ConfigError::Invalid { var: PORT_ENV, .. })
        ));
    }

    #[test]
    fn rejects_lifetimes_beyond_the_ceiling() {
        assert!(matches!(
            with(&[(ACCESS_TOKEN_TTL_ENV, "18446744073709551615")]),
            Err(ConfigError::Invalid { var: ACCESS_TOKEN_TTL_ENV, .. })
        ));
        let too_long = (MAX_TTL_SECS + 1).to_string();
        let err = AppConfig::from_lookup(lookup(&[
            REQUIRED[0],
            REQUIRED[1],
            REQUIRED[2],
            (REFRESH_TOKEN_TTL_ENV, too_long.as_str()),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: REFRESH_TOKEN_TTL_ENV, .. }));

        let max = MAX_TTL_SECS.to_string();
        let config = AppConfig::from_lookup(lookup(&[
            REQUIRED[0],
            REQUIRED[1],
            REQUIRED[2],
            (ACCESS_TOKEN_TTL_ENV, max.as_str()),
        ]))
        .unwrap();
        assert_eq!(config.access_token_ttl, Duration::from_secs(MAX_TTL_SECS));
    }

    #[test]
    fn parses_session_check_and_log_format() {
        let config = with(&[(SESSION_CHECK_ENV, "exclusive"), (LOG_FORMAT_ENV, "JSON")]).unwrap();
        assert_eq!(config.session_check, SessionCheck::Exclusive);
        assert_eq!(config.log_format, LogFormat::Json);

        assert!(matches!(
            with(&[(SESSION_CHECK_ENV, "sometimes")]),
            Err(ConfigError::Invalid { var: SESSION_CHECK_ENV, .. })
        ));
    }

    #[test]
    fn tls_requires_both_paths() {
        let config = with(&[
            (TLS_CERT_PATH_ENV, "/certs/server.pem"),
            (TLS_KEY_PATH_ENV, "/certs/server.key"),
        ])
        .unwrap();
        assert_eq!(
            config.tls,
            Some(TlsPaths {
                cert: "/certs/server.pem".into(),
                key: "/certs/server.key".into(),
            })
        );

        assert_eq!(
            with(&[(TLS_CERT_PATH_ENV, "/certs/server.pem")]).unwrap_err(),
            ConfigError::Missing(TLS_KEY_PATH_ENV)
        );
    }

    #[test]
    fn seed_admin_is_all_or_nothing() {
        let config = with(&[
            (SEED_ADMIN_USERNAME_ENV, "root"),
            (SEED_ADMIN_EMAIL_ENV, "root@example.com"),
            (SEED_ADMIN_PASSWORD_ENV, "correct horse"),
        ])
        .unwrap();
        assert_eq!(config.seed_admin.unwrap().username, "root");

        assert!(with(&[(SEED_ADMIN_USERNAME_ENV, "root")]).is_err());
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let config = with(&[(REDIS_URL_ENV, "redis://:hunter2@cache:6379")]).unwrap();
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("signing-secret"));
        assert!(!rendered.contains("0123456789abcdef"));
        assert!(!rendered.contains("hunter2"));
    }
}
