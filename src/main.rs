#![allow(missing_docs)]

//! Voxpop service entry point.
//!
//! Loads configuration (env > `voxpop.toml` > defaults), initialises
//! structured logging, wires the pipeline, and serves the HTTP API until
//! shutdown. A missing provider API key is the one fatal startup
//! condition.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;

use voxpop::cache::ResponseCache;
use voxpop::config::Config;
use voxpop::logging;
use voxpop::provider::openai::OpenAiGateway;
use voxpop::provider::ChatGateway;
use voxpop::ratelimit::FixedWindowLimiter;
use voxpop::server::{self, AppState};
use voxpop::service::PanelService;

#[tokio::main]
async fn main() -> Result<()> {
    // Pick up OPENAI_API_KEY and friends from a local .env when present.
    dotenvy::dotenv().ok();

    let config = Config::load().context("failed to load configuration")?;
    let _logging_guard = logging::init(&config.logging).context("failed to initialise logging")?;

    info!(version = env!("CARGO_PKG_VERSION"), "voxpop starting");

    let gateway: Arc<dyn ChatGateway> = Arc::new(
        OpenAiGateway::new(&config.provider).context("failed to build the model gateway")?,
    );
    info!(model = %gateway.model_id(), "model gateway ready");

    let cache = Arc::new(ResponseCache::new(Duration::from_secs(
        config.cache.ttl_seconds,
    )));
    let limiter = Arc::new(FixedWindowLimiter::new(
        config.rate_limit.max_requests,
        Duration::from_secs(config.rate_limit.window_seconds),
    ));
    let service = Arc::new(PanelService::new(
        gateway,
        cache,
        config.provider.max_output_tokens,
    ));

    let addr = format!("{}:{}", config.server.bind_addr, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "listening");

    server::serve(listener, AppState::new(service, limiter)).await
}
