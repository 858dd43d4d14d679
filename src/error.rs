//! Error taxonomy for the news pipeline.
//!
//! Only [`PipelineError`] crosses the pipeline boundary. [`ParseError`] and
//! [`ItemSkip`] are recovered inside the pipeline and surface as an empty
//! (or shorter) result plus a logged diagnostic.

use std::time::Duration;

/// Failure of a single call to the generative backend.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    /// No API key configured for the selected provider.
    #[error("missing credentials for provider {provider}")]
    MissingCredentials { provider: &'static str },

    /// Generation switched off in config.
    #[error("generative backend disabled")]
    Disabled,

    /// Connection, DNS or TLS failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// Backend answered with a non-2xx status.
    #[error("backend returned HTTP {status}")]
    Status { status: u16 },

    /// No answer within the configured deadline.
    #[error("backend timed out after {0:?}")]
    Timeout(Duration),

    /// Backend answered 2xx but without any completion text.
    #[error("backend returned an empty completion")]
    EmptyBody,

    /// Backend envelope could not be decoded.
    #[error("undecodable backend envelope: {0}")]
    Decode(String),
}

impl GenerationError {
    /// Whether another attempt could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Timeout(_) | Self::EmptyBody => true,
            Self::Status { status } => *status == 429 || *status >= 500,
            Self::MissingCredentials { .. } | Self::Disabled | Self::Decode(_) => false,
        }
    }
}

// Timeouts are mapped by the client, which knows its deadline.
impl From<reqwest::Error> for GenerationError {
    fn from(e: reqwest::Error) -> Self {
        if let Some(status) = e.status() {
            Self::Status {
                status: status.as_u16(),
            }
        } else if e.is_decode() {
            Self::Decode(e.to_string())
        } else {
            Self::Transport(e.to_string())
        }
    }
}

/// The model's text did not decode into the news schema.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("model output is not JSON: {0}")]
    NotJson(String),

    #[error("model output is not a JSON array")]
    NotAnArray,

    #[error("item {index} has {len} fields, expected 4 or 5")]
    WrongArity { index: usize, len: usize },

    #[error("item {index} field `{field}` is not a string")]
    NonStringField { index: usize, field: &'static str },

    #[error("all {count} items failed validation")]
    AllItemsInvalid { count: usize },
}

/// One item dropped from an otherwise valid batch.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("item {index} skipped: {reason}")]
pub struct ItemSkip {
    pub index: usize,
    pub reason: &'static str,
}

/// The only failure callers of `NewsPipeline::fetch_news` ever see.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("generative backend unavailable: {0}")]
    ServiceUnavailable(#[source] GenerationError),
}
