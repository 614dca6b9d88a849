// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Optional HTTPS termination from PEM files.

use std::io;

use axum_server::tls_rustls::RustlsConfig;
use tracing::info;

use crate::config::TlsPaths;

/// Install the ring crypto provider for rustls.
///
/// Must run before any TLS configuration is built. Repeated calls are no-ops.
pub fn install_crypto_provider() {
    // Err only means a provider is already installed.
    let _ = rustls::crypto::ring::default_provider().install_default();
}

/// Build the server TLS configuration from a PEM certificate chain and key.
pub async fn load_rustls_config(paths: &TlsPaths) -> io::Result<RustlsConfig> {
    install_crypto_provider();
    let config = RustlsConfig::from_pem_file(&paths.cert, &paths.key).await?;
    info!(cert = %paths.cert.display(), "Loaded TLS certificate");
    Ok(config)
}
