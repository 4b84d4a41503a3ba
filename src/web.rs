use anyhow::{Context, Result};
use axum::{
    Router,
    body::Body,
    http::{HeaderValue, Request},
    middleware::{self, Next},
    response::Response,
    routing::get,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowHeaders, AllowMethods, CorsLayer};
use tracing::{error, info};
use uuid::Uuid;

use crate::actions;
use crate::metrics::metrics_handler;
use crate::poller::StateVectorSource;

/// Shared state for every request handler
#[derive(Clone)]
pub struct AppState {
    pub source: Arc<dyn StateVectorSource>,
    pub refresh_interval: Duration,
    /// Cancelled on server shutdown; every open stream polls with a child token
    pub shutdown: CancellationToken,
}

// Middleware for request logging with correlation ID
async fn request_logging_middleware(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let request_id = Uuid::new_v4().to_string()[..8].to_string();
    let start_time = Instant::now();

    info!("Started {} {} [{}]", method, uri, request_id);

    let response = next.run(request).await;

    // For event streams this is time to first byte, not stream lifetime
    info!(
        "Completed {} {} [{}] {} in {:.2}ms",
        method,
        uri.path(),
        request_id,
        response.status().as_u16(),
        start_time.elapsed().as_secs_f64() * 1000.0
    );

    response
}

// Middleware to capture HTTP errors to Sentry
async fn sentry_error_middleware(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();

    let response = next.run(request).await;

    if response.status().is_server_error() {
        let status = response.status();
        error!("HTTP {} error on {} {}", status.as_u16(), method, uri);

        sentry::configure_scope(|scope| {
            scope.set_tag("http.method", method.as_str());
            scope.set_tag("http.url", uri.to_string());
            scope.set_tag("http.status_code", status.as_u16().to_string());
        });

        sentry::capture_message(
            &format!("HTTP {} error on {} {}", status.as_u16(), method, uri),
            sentry::Level::Error,
        );
    }

    response
}

/// CORS for the configured browser origins, with credentials.
///
/// An empty origin list allows any origin without credentials.
pub fn cors_layer(origins: &[String]) -> Result<CorsLayer> {
    if origins.is_empty() {
        return Ok(CorsLayer::permissive());
    }

    let origins = origins
        .iter()
        .map(|origin| {
            HeaderValue::from_str(origin)
                .with_context(|| format!("Invalid CORS origin {:?}", origin))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true))
}

pub fn build_router(state: AppState, cors_origins: &[String]) -> Result<Router> {
    Ok(Router::new()
        .route("/states/all", get(actions::stream_state_vectors))
        .route("/status", get(actions::get_status))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
        .layer(middleware::from_fn(request_logging_middleware))
        .layer(middleware::from_fn(sentry_error_middleware))
        .layer(cors_layer(cors_origins)?))
}

/// Serve until `state.shutdown` is cancelled, then drain open connections
pub async fn start_web_server(
    interface: &str,
    port: u16,
    state: AppState,
    cors_origins: &[String],
) -> Result<()> {
    sentry::configure_scope(|scope| {
        scope.set_tag("operation", "web-server");
    });
    info!("Starting web server on {}:{}", interface, port);

    actions::init_server_start_time();

    let shutdown = state.shutdown.clone();
    let app = build_router(state, cors_origins)?;

    let listener = tokio::net::TcpListener::bind(format!("{}:{}", interface, port))
        .await
        .with_context(|| format!("Failed to bind {}:{}", interface, port))?;
    info!("Web server listening on http://{}:{}", interface, port);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .context("Web server failed")?;

    info!("Web server stopped");
    Ok(())
}
