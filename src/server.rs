//! HTTP server assembly: shared state, rate-limit middleware, router
//! composition, and graceful serve.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use axum::extract::{ConnectInfo, Request, State};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::ratelimit::FixedWindowLimiter;
use crate::routes::{self, ApiError};
use crate::service::PanelService;

/// State shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// The orchestration service.
    pub service: Arc<PanelService>,
    /// Per-client request limiter.
    pub limiter: Arc<FixedWindowLimiter>,
    /// Server start time, for the health endpoint.
    pub started_at: Instant,
}

impl AppState {
    /// Assemble shared state.
    pub fn new(service: Arc<PanelService>, limiter: Arc<FixedWindowLimiter>) -> Self {
        Self {
            service,
            limiter,
            started_at: Instant::now(),
        }
    }
}

/// Enforce the fixed-window limit per client IP before any handler runs.
async fn enforce_rate_limit(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if let Err(exceeded) = state.limiter.check(&addr.ip().to_string()) {
        info!(client = %addr.ip(), error = %exceeded, "request rejected at the edge");
        return Err(ApiError::TooManyRequests);
    }
    Ok(next.run(request).await)
}

/// Build the application router.
///
/// Pipeline routes sit behind the rate limiter; health does not. CORS is
/// permissive: the presentation layer is a browser app on another
/// origin and the API carries no credentials.
pub fn app(state: AppState) -> Router {
    let api = routes::api_routes().route_layer(middleware::from_fn_with_state(
        state.clone(),
        enforce_rate_limit,
    ));

    Router::new()
        .merge(api)
        .merge(routes::health_routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Serve the application until shutdown is requested.
///
/// # Errors
///
/// Returns an error if the listener fails while serving.
pub async fn serve(listener: tokio::net::TcpListener, state: AppState) -> Result<()> {
    let router = app(state);
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;
    info!("server shut down cleanly");
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("received shutdown signal, draining in-flight requests");
}
