use anyhow::{Context, Result};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use skyrelay::{AppConfig, AppState, OpenSkyClient, metrics, start_web_server};

/// Upstream client configured from `[upstream]`, with credentials if any
pub fn build_upstream_client(config: &AppConfig) -> Result<OpenSkyClient> {
    let credentials = config.load_credentials()?;

    let http = reqwest::Client::builder()
        .user_agent(concat!("skyrelay/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to build HTTP client")?;

    let client = OpenSkyClient::new(http, config.upstream.base_url.as_str())
        .with_credentials(credentials)
        .with_timeout(config.request_timeout());

    info!(
        "Upstream {} ({})",
        client.base_url(),
        if client.is_authenticated() {
            "authenticated"
        } else {
            "anonymous"
        }
    );

    Ok(client)
}

/// Cancel `shutdown` on Ctrl+C
fn spawn_shutdown_handler(shutdown: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received shutdown signal (Ctrl+C), closing open streams...");
                shutdown.cancel();
            }
            Err(err) => {
                error!("Unable to listen for shutdown signal: {}", err);
            }
        }
    });
}

pub async fn handle_serve(config: AppConfig) -> Result<()> {
    sentry::configure_scope(|scope| {
        scope.set_tag("operation", "serve");
    });

    metrics::init_metrics()?;

    let source = build_upstream_client(&config)?;
    let shutdown = CancellationToken::new();
    spawn_shutdown_handler(shutdown.clone());

    info!(
        "Polling every {}s per open stream",
        config.upstream.refresh_interval_seconds
    );

    let state = AppState {
        source: Arc::new(source),
        refresh_interval: config.refresh_interval(),
        shutdown,
    };

    start_web_server(
        &config.server.interface,
        config.server.port,
        state,
        &config.server.cors_origins,
    )
    .await
}
