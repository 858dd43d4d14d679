use anyhow::Context;
use axum::{routing::get, Router};
use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

static HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

/// One-time metrics registration (so series carry help text on /metrics).
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(describe_all);
}

fn describe_all() {
    describe_counter!("news_fetch_total", "News pipeline invocations.");
    describe_counter!(
        "news_backend_errors_total",
        "Backend calls that ended as ServiceUnavailable."
    );
    describe_counter!(
        "news_parse_failures_total",
        "Model outputs rejected by the response parser."
    );
    describe_counter!(
        "news_items_dropped_total",
        "Single items dropped by field validation."
    );
    describe_histogram!("news_items_returned", "Items per successful result.");
    describe_histogram!(
        "news_backend_latency_ms",
        "Generative backend attempt latency in milliseconds."
    );
}

#[derive(Clone)]
pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the process-wide Prometheus recorder. Safe to call repeatedly;
    /// later calls reuse the first handle.
    pub fn init() -> anyhow::Result<Self> {
        let handle = HANDLE
            .get_or_try_init(|| {
                PrometheusBuilder::new()
                    .install_recorder()
                    .context("prometheus: install recorder")
            })?
            .clone();
        // Re-describe: the pipeline may have run before the recorder existed.
        describe_all();
        Ok(Self { handle })
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}
