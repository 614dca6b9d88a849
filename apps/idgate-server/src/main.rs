// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum_server::Handle;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use idgate_server::{
    api::router,
    auth::Role,
    config::{AppConfig, LogFormat, SeedAdmin, DEFAULT_LOG_FILTER},
    directory::{hash_password, InMemoryDirectory, NewUser, UserDirectory},
    session::{InMemorySessionStore, RedisSessionStore, SessionStore},
    state::AppState,
    tls,
};

/// Time in-flight requests get to finish after a shutdown signal.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::from_env()?;
    init_tracing(config.log_format);
    info!(?config, "Starting IdGate server");

    let sessions: Arc<dyn SessionStore> = match &config.redis_url {
        Some(url) => {
            let store = RedisSessionStore::connect(url, config.session_store_timeout).await?;
            info!("Connected to Redis session store");
            Arc::new(store)
        }
        None => {
            warn!("REDIS_URL not set, sessions are kept in process memory (development mode)");
            Arc::new(InMemorySessionStore::new())
        }
    };

    let directory = Arc::new(InMemoryDirectory::new());
    if let Some(seed) = &config.seed_admin {
        seed_admin(directory.as_ref(), seed).await?;
    }

    let addr: SocketAddr = config.bind_address().parse()?;
    let tls_paths = config.tls.clone();
    let session_check = config.session_check;

    let state = AppState::new(config, sessions, directory)?;
    let app = router(state);

    let handle = Handle::new();
    tokio::spawn({
        let handle = handle.clone();
        async move {
            shutdown_signal().await;
            info!("Shutdown signal received, draining connections");
            handle.graceful_shutdown(Some(SHUTDOWN_GRACE));
        }
    });

    match tls_paths {
        Some(paths) => {
            let tls_config = tls::load_rustls_config(&paths).await?;
            info!(%addr, %session_check, "IdGate listening on https (docs at /docs)");
            axum_server::bind_rustls(addr, tls_config)
                .handle(handle)
                .serve(app.into_make_service())
                .await?;
        }
        None => {
            info!(%addr, %session_check, "IdGate listening on http (docs at /docs)");
            axum_server::bind(addr)
                .handle(handle)
                .serve(app.into_make_service())
                .await?;
        }
    }

    info!("Server shut down");
    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

async fn seed_admin(
    directory: &dyn UserDirectory,
    seed: &SeedAdmin,
) -> Result<(), Box<dyn std::error::Error>> {
    if directory.find_by_email(&seed.email).await?.is_some() {
        return Ok(());
    }
    directory
        .create(NewUser {
            role: Role::Admin,
            name: seed.username.clone(),
            username: seed.username.clone(),
            email: seed.email.clone(),
            password_hash: hash_password(&seed.password)?,
        })
        .await?;
    info!(username = %seed.username, "Seeded admin account");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
