// src/news/pipeline.rs
//! News pipeline: prompt → model → parse → enrich.
//!
//! Content problems (bad JSON, invalid items) degrade to a shorter or empty
//! [`NewsResult`]. Only an unreachable backend fails the call, as
//! [`PipelineError::ServiceUnavailable`].

use std::time::{Duration, Instant};

use metrics::{counter, histogram};
use tracing::{debug, info, instrument, warn};

use super::generative::DynGenerativeClient;
use super::links::LinkEnricher;
use super::parser::ResponseParser;
use super::prompt::PromptBuilder;
use super::types::{NewsResult, UserContext};
use crate::config::GenerativeConfig;
use crate::error::{GenerationError, PipelineError};
use crate::metrics::ensure_metrics_described;

const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(20);
const DEFAULT_BACKOFF: Duration = Duration::from_millis(200);
const MAX_ATTEMPTS_CAP: u32 = 2;

/// Stateless per call; share one instance (behind `Arc`) across handlers.
pub struct NewsPipeline {
    client: DynGenerativeClient,
    prompts: PromptBuilder,
    parser: ResponseParser,
    links: LinkEnricher,
    call_timeout: Duration,
    max_attempts: u32,
    backoff: Duration,
}

impl NewsPipeline {
    pub fn new(client: DynGenerativeClient) -> Self {
        Self {
            client,
            prompts: PromptBuilder::new(),
            parser: ResponseParser::new(),
            links: LinkEnricher::default(),
            call_timeout: DEFAULT_CALL_TIMEOUT,
            max_attempts: 1,
            backoff: DEFAULT_BACKOFF,
        }
    }

    pub fn from_config(config: &GenerativeConfig, client: DynGenerativeClient) -> Self {
        Self::new(client)
            .with_timeout(config.timeout())
            .with_max_attempts(config.max_attempts)
            .with_link_enricher(LinkEnricher::new(config.search_base.clone()))
    }

    /// Deadline for a single backend attempt.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Clamped to 1..=2; the backend call has no remote side effect, so a
    /// retry is safe.
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.clamp(1, MAX_ATTEMPTS_CAP);
        self
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_link_enricher(mut self, links: LinkEnricher) -> Self {
        self.links = links;
        self
    }

    pub fn provider_name(&self) -> &'static str {
        self.client.provider_name()
    }

    /// Run the whole pipeline for one request.
    ///
    /// Dropping the returned future aborts the in-flight backend call.
    #[instrument(
        name = "fetch_news",
        skip_all,
        fields(provider = self.client.provider_name(), personalized = !context.is_empty())
    )]
    pub async fn fetch_news(
        &self,
        topic: &str,
        context: &UserContext,
    ) -> Result<NewsResult, PipelineError> {
        ensure_metrics_described();
        counter!("news_fetch_total").increment(1);

        let prompt = self.prompts.build(topic, context);
        debug!(prompt_version = self.prompts.version(), "prompt built");

        let raw = self.call_model(&prompt).await?;

        let batch = match self.parser.parse_batch(&raw) {
            Ok(b) => b,
            Err(e) => {
                counter!("news_parse_failures_total").increment(1);
                warn!(error = %e, raw_len = raw.len(), "model output rejected, returning no items");
                return Ok(NewsResult::empty());
            }
        };
        if !batch.skipped.is_empty() {
            counter!("news_items_dropped_total").increment(batch.skipped.len() as u64);
        }

        let items = batch
            .items
            .into_iter()
            .map(|it| self.links.enrich(it))
            .collect();
        let result = NewsResult::from_items(items);

        histogram!("news_items_returned").record(result.len() as f64);
        info!(
            items = result.len(),
            skipped = batch.skipped.len(),
            "news fetched"
        );
        Ok(result)
    }

    /// One logical backend call: per-attempt deadline, bounded retry with
    /// exponential backoff. Any final failure maps to `ServiceUnavailable`.
    pub(crate) async fn call_model(&self, prompt: &str) -> Result<String, PipelineError> {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            let started = Instant::now();
            let res = match tokio::time::timeout(self.call_timeout, self.client.complete(prompt))
                .await
            {
                Ok(r) => r,
                Err(_) => Err(GenerationError::Timeout(self.call_timeout)),
            };
            histogram!("news_backend_latency_ms").record(started.elapsed().as_secs_f64() * 1_000.0);

            match res {
                Ok(text) => return Ok(text),
                Err(e) if e.is_retryable() && attempt < self.max_attempts => {
                    warn!(attempt, error = %e, "backend call failed, retrying");
                    tokio::time::sleep(self.backoff * (1u32 << (attempt - 1))).await;
                }
                Err(e) => {
                    counter!("news_backend_errors_total").increment(1);
                    warn!(attempt, error = %e, "generative backend unavailable");
                    return Err(PipelineError::ServiceUnavailable(e));
                }
            }
        }
    }
}
