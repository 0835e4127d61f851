//! pushbutan tool server entry point.
//!
//! Initialises tracing, loads server configuration from environment
//! variables (prefixed with `PUSHBUTAN_MCP_`), builds the engine from the
//! same config file and `GITHUB_TOKEN` the CLI uses, and starts a
//! Streamable-HTTP MCP server.

mod tools;

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::http::StatusCode;
use axum_server::tls_rustls::RustlsConfig;
use tracing_subscriber::EnvFilter;

use rmcp::transport::streamable_http_server::{
    StreamableHttpService, session::local::LocalSessionManager,
};

use pushbutan_cli::app::connect;
use pushbutan_cli::application::ports::ConfigStore;
use pushbutan_cli::infra::config::YamlConfigStore;
use pushbutan_common::ToolboxServerConfig;

use crate::tools::PushbutanTools;

// ===================================================================
// Health endpoint
// ===================================================================

/// Minimal health-check handler for load-balancer probes.
async fn health() -> StatusCode {
    StatusCode::OK
}

// ===================================================================
// Entry point
// ===================================================================

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    tracing::info!("pushbutan-toolbox starting");

    let config: ToolboxServerConfig = envy::prefixed("PUSHBUTAN_MCP_")
        .from_env()
        .context("failed to load config from PUSHBUTAN_MCP_* env vars")?;

    let engine_config = YamlConfigStore.load().context("failed to load pushbutan config")?;
    tracing::info!(
        listen_addr = %config.listen_addr,
        repository = %engine_config.repository.slug(),
        tls_enabled = config.tls_paths().is_some(),
        "configuration loaded",
    );

    // One engine for every session: the claim registry inside it keeps
    // concurrent dispatches from resolving to the same run.
    let engine = Arc::new(connect(engine_config)?);

    let service = StreamableHttpService::new(
        move || Ok(PushbutanTools::new(engine.clone())),
        LocalSessionManager::default().into(),
        Default::default(),
    );

    let router = axum::Router::new()
        .nest_service("/mcp", service)
        .route("/health", axum::routing::get(health));

    if let Some((cert_path, key_path)) = config.tls_paths() {
        // reqwest and axum-server both pull in rustls; pick the provider.
        let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
        tracing::info!(cert = cert_path, "TLS enabled");
        let tls_config = RustlsConfig::from_pem_file(cert_path, key_path)
            .await
            .context("failed to load TLS certificates")?;

        tracing::info!("MCP server ready: https://{}/mcp", config.listen_addr);

        axum_server::bind_rustls(config.listen_addr, tls_config)
            .serve(router.into_make_service())
            .await
            .context("HTTPS server error")?;
    } else {
        tracing::info!("MCP server ready: http://{}/mcp (TLS disabled)", config.listen_addr);

        let listener = tokio::net::TcpListener::bind(config.listen_addr)
            .await
            .context("failed to bind TCP listener")?;

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .context("HTTP server error")?;
    }

    tracing::info!("pushbutan-toolbox shut down");
    Ok(())
}

/// Wait for SIGINT (Ctrl-C) for graceful shutdown.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "cannot listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    tracing::info!("received shutdown signal");
}
