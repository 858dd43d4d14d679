// src/lib.rs
// Public library surface for the binary, integration tests and tools.

pub mod api;
pub mod config;
pub mod error;
pub mod identity;
pub mod metrics;
pub mod news;

// ---- Re-exports for stable public API ----
pub use crate::api::{router, AppState};
pub use crate::error::{GenerationError, ParseError, PipelineError};
pub use crate::news::{NewsItem, NewsPipeline, NewsResult, UserContext};

use std::sync::Arc;

use axum::Router;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::GenerativeConfig;
use crate::identity::IdentitySeed;
use crate::metrics::Metrics;

/// Build the full in-process app: config, client, identities, metrics.
/// Everything is constructed here once and injected; nothing is global
/// except the Prometheus recorder.
pub async fn app() -> anyhow::Result<Router> {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();

    let cfg = GenerativeConfig::load_default()?;
    info!(?cfg, "generative config loaded");
    let client = news::build_client(&cfg)?;
    let pipeline = NewsPipeline::from_config(&cfg, client);

    let (store, sessions) = IdentitySeed::load_default()?.into_parts();
    let state = AppState::new(Arc::new(pipeline), Arc::new(store), Arc::new(sessions));

    let metrics = Metrics::init()?;
    Ok(router(state).merge(metrics.router()))
}

/// Install a tracing subscriber unless one is already set (Shuttle installs
/// its own). `NEWS_LOG_FORMAT=json` switches to JSON lines.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("news_genie=info,warn"));
    let json = std::env::var("NEWS_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    let _ = if json {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer().compact()).try_init()
    };
}
