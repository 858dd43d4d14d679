//! Generative backend adapter: client abstraction + concrete providers.
//!
//! One `complete` call is one outbound request. Retries and the overall
//! deadline live in the pipeline, not here.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::GenerativeConfig;
use crate::error::GenerationError;

// ------------------------------------------------------------
// Public surface
// ------------------------------------------------------------

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Trait object used by the pipeline and handlers.
pub trait GenerativeClient: Send + Sync {
    /// Send `prompt`, return the raw completion text.
    fn complete<'a>(&'a self, prompt: &'a str) -> BoxFuture<'a, Result<String, GenerationError>>;
    /// Provider name for diagnostics/headers.
    fn provider_name(&self) -> &'static str;
}

/// Convenient alias used by callers.
pub type DynGenerativeClient = Arc<dyn GenerativeClient>;

const USER_AGENT: &str = concat!("news-genie/", env!("CARGO_PKG_VERSION"));

/// Factory: build a client according to config and environment variables.
///
/// * `AI_TEST_MODE=mock|error|stall` returns a deterministic [`MockClient`].
/// * Else if `config.enabled == false`, returns [`DisabledClient`].
/// * Else builds the configured provider.
pub fn build_client(config: &GenerativeConfig) -> anyhow::Result<DynGenerativeClient> {
    match std::env::var("AI_TEST_MODE").as_deref() {
        Ok("mock") => return Ok(Arc::new(MockClient::replying(MOCK_NEWS_JSON))),
        Ok("error") => return Ok(Arc::new(MockClient::failing())),
        Ok("stall") => return Ok(Arc::new(MockClient::stalling(Duration::from_secs(3600)))),
        _ => {}
    }

    if !config.enabled {
        return Ok(Arc::new(DisabledClient));
    }

    let client: DynGenerativeClient = match config.provider.as_str() {
        "gemini" => Arc::new(GeminiClient::new(config)?),
        "openai" => Arc::new(OpenAiClient::new(config)?),
        other => anyhow::bail!("Unsupported provider: {other}"),
    };
    info!(
        provider = client.provider_name(),
        key_len = config.api_key.len(),
        "generative client ready"
    );
    Ok(client)
}

fn http_client(config: &GenerativeConfig) -> anyhow::Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(config.connect_timeout())
        .timeout(config.timeout())
        .build()
        .context("building reqwest client")
}

// Prompts can carry user preferences, so they only show up at debug level.
fn trace_prompt(provider: &'static str, prompt: &str) {
    debug!(target: "news_genie::prompt", provider, %prompt, "outbound prompt");
}

// reqwest doesn't report which deadline fired; the client knows its own.
fn request_error(e: reqwest::Error, deadline: Duration) -> GenerationError {
    if e.is_timeout() {
        GenerationError::Timeout(deadline)
    } else {
        e.into()
    }
}

fn body_error(e: reqwest::Error, deadline: Duration) -> GenerationError {
    if e.is_timeout() {
        GenerationError::Timeout(deadline)
    } else {
        GenerationError::Decode(e.to_string())
    }
}

fn non_empty(text: String) -> Result<String, GenerationError> {
    if text.trim().is_empty() {
        Err(GenerationError::EmptyBody)
    } else {
        Ok(text)
    }
}

// ------------------------------------------------------------
// Gemini
// ------------------------------------------------------------

/// Google Gemini `generateContent` provider. Requires `GOOGLE_API_KEY`.
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    temperature: f32,
    timeout: Duration,
}

impl GeminiClient {
    pub const DEFAULT_BASE_URL: &'static str = "https://generativelanguage.googleapis.com";
    pub const DEFAULT_MODEL: &'static str = "gemini-2.0-flash";

    pub fn new(config: &GenerativeConfig) -> anyhow::Result<Self> {
        Ok(Self {
            http: http_client(config)?,
            api_key: config.api_key.clone(),
            model: config
                .model
                .clone()
                .unwrap_or_else(|| Self::DEFAULT_MODEL.to_string()),
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| Self::DEFAULT_BASE_URL.to_string()),
            temperature: config.temperature,
            timeout: config.timeout(),
        })
    }

    async fn complete_impl(&self, prompt: &str) -> Result<String, GenerationError> {
        if self.api_key.is_empty() {
            return Err(GenerationError::MissingCredentials { provider: "gemini" });
        }

        #[derive(Serialize)]
        struct Part<'a> {
            text: &'a str,
        }
        #[derive(Serialize)]
        struct Content<'a> {
            role: &'a str,
            parts: Vec<Part<'a>>,
        }
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct GenerationConfig {
            temperature: f32,
        }
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct Req<'a> {
            contents: Vec<Content<'a>>,
            generation_config: GenerationConfig,
        }
        #[derive(Deserialize)]
        struct Resp {
            #[serde(default)]
            candidates: Vec<Candidate>,
        }
        #[derive(Deserialize)]
        struct Candidate {
            content: Option<CandidateContent>,
        }
        #[derive(Deserialize)]
        struct CandidateContent {
            #[serde(default)]
            parts: Vec<CandidatePart>,
        }
        #[derive(Deserialize)]
        struct CandidatePart {
            #[serde(default)]
            text: String,
        }

        trace_prompt("gemini", prompt);

        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        );
        let req = Req {
            contents: vec![Content {
                role: "user",
                parts: vec![Part { text: prompt }],
            }],
            generation_config: GenerationConfig {
                temperature: self.temperature,
            },
        };

        let resp = self
            .http
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(&req)
            .send()
            .await
            .map_err(|e| request_error(e, self.timeout))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(GenerationError::Status {
                status: status.as_u16(),
            });
        }

        let body: Resp = resp
            .json()
            .await
            .map_err(|e| body_error(e, self.timeout))?;
        let text = body
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().map(|p| p.text).collect::<String>())
            .unwrap_or_default();
        non_empty(text)
    }
}

impl GenerativeClient for GeminiClient {
    fn complete<'a>(&'a self, prompt: &'a str) -> BoxFuture<'a, Result<String, GenerationError>> {
        Box::pin(self.complete_impl(prompt))
    }
    fn provider_name(&self) -> &'static str {
        "gemini"
    }
}

// ------------------------------------------------------------
// OpenAI
// ------------------------------------------------------------

/// OpenAI provider (Chat Completions API). Requires `OPENAI_API_KEY`.
pub struct OpenAiClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    temperature: f32,
    timeout: Duration,
}

impl OpenAiClient {
    pub const DEFAULT_BASE_URL: &'static str = "https://api.openai.com";
    pub const DEFAULT_MODEL: &'static str = "gpt-4o-mini";

    pub fn new(config: &GenerativeConfig) -> anyhow::Result<Self> {
        Ok(Self {
            http: http_client(config)?,
            api_key: config.api_key.clone(),
            model: config
                .model
                .clone()
                .unwrap_or_else(|| Self::DEFAULT_MODEL.to_string()),
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| Self::DEFAULT_BASE_URL.to_string()),
            temperature: config.temperature,
            timeout: config.timeout(),
        })
    }

    async fn complete_impl(&self, prompt: &str) -> Result<String, GenerationError> {
        if self.api_key.is_empty() {
            return Err(GenerationError::MissingCredentials { provider: "openai" });
        }

        #[derive(Serialize)]
        struct Msg<'a> {
            role: &'a str,
            content: &'a str,
        }
        #[derive(Serialize)]
        struct Req<'a> {
            model: &'a str,
            messages: Vec<Msg<'a>>,
            temperature: f32,
        }
        #[derive(Deserialize)]
        struct Resp {
            #[serde(default)]
            choices: Vec<Choice>,
        }
        #[derive(Deserialize)]
        struct Choice {
            message: ChoiceMsg,
        }
        #[derive(Deserialize)]
        struct ChoiceMsg {
            #[serde(default)]
            content: Option<String>,
        }

        trace_prompt("openai", prompt);

        let req = Req {
            model: &self.model,
            messages: vec![Msg {
                role: "user",
                content: prompt,
            }],
            temperature: self.temperature,
        };

        let resp = self
            .http
            .post(format!(
                "{}/v1/chat/completions",
                self.base_url.trim_end_matches('/')
            ))
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .await
            .map_err(|e| request_error(e, self.timeout))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(GenerationError::Status {
                status: status.as_u16(),
            });
        }

        let body: Resp = resp
            .json()
            .await
            .map_err(|e| body_error(e, self.timeout))?;
        let text = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();
        non_empty(text)
    }
}

impl GenerativeClient for OpenAiClient {
    fn complete<'a>(&'a self, prompt: &'a str) -> BoxFuture<'a, Result<String, GenerationError>> {
        Box::pin(self.complete_impl(prompt))
    }
    fn provider_name(&self) -> &'static str {
        "openai"
    }
}

// ------------------------------------------------------------
// Disabled + mock
// ------------------------------------------------------------

/// Fails every call; used when generation is disabled in config.
pub struct DisabledClient;

impl GenerativeClient for DisabledClient {
    fn complete<'a>(&'a self, _prompt: &'a str) -> BoxFuture<'a, Result<String, GenerationError>> {
        Box::pin(async { Err(GenerationError::Disabled) })
    }
    fn provider_name(&self) -> &'static str {
        "disabled"
    }
}

/// Canned five-story answer served by `AI_TEST_MODE=mock`.
pub const MOCK_NEWS_JSON: &str = r#"[
  [1, "Automakers expand EV lineups", "Several manufacturers announced new battery-electric models this week.", "Reuters, June 2, 2025"],
  [2, "Charging network grows", "Public fast-charging stations rose sharply over the last quarter.", "Bloomberg, June 1, 2025"],
  [3, "Battery costs keep falling", "Cell prices dropped again as production scales up.", "Financial Times, May 31, 2025"],
  [4, "Used EV prices stabilize", "Dealers report steadier resale values for electric cars.", "The Verge, May 30, 2025"],
  [5, "New incentives announced", "Regulators outlined updated purchase credits for EV buyers.", "Associated Press, May 29, 2025"]
]"#;

/// One scripted answer of a [`MockClient`].
#[derive(Debug, Clone)]
pub enum MockReply {
    Text(String),
    Fail,
    Stall(Duration),
}

/// Deterministic client for tests and local runs. Replays its script in
/// order; the last reply repeats once the script is exhausted.
pub struct MockClient {
    script: Mutex<VecDeque<MockReply>>,
    calls: AtomicUsize,
}

impl MockClient {
    pub fn scripted(replies: Vec<MockReply>) -> Self {
        Self {
            script: Mutex::new(replies.into()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn replying(text: impl Into<String>) -> Self {
        Self::scripted(vec![MockReply::Text(text.into())])
    }

    pub fn failing() -> Self {
        Self::scripted(vec![MockReply::Fail])
    }

    pub fn stalling(d: Duration) -> Self {
        Self::scripted(vec![MockReply::Stall(d)])
    }

    /// Number of `complete` calls seen so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn next_reply(&self) -> MockReply {
        let mut q = self.script.lock().unwrap_or_else(|p| p.into_inner());
        if q.len() > 1 {
            q.pop_front().unwrap_or(MockReply::Fail)
        } else {
            q.front().cloned().unwrap_or(MockReply::Fail)
        }
    }
}

impl GenerativeClient for MockClient {
    fn complete<'a>(&'a self, prompt: &'a str) -> BoxFuture<'a, Result<String, GenerationError>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let reply = self.next_reply();
        Box::pin(async move {
            trace_prompt("mock", prompt);
            match reply {
                MockReply::Text(t) => non_empty(t),
                MockReply::Fail => Err(GenerationError::Transport(
                    "mock backend unreachable".to_string(),
                )),
                MockReply::Stall(d) => {
                    tokio::time::sleep(d).await;
                    Err(GenerationError::Timeout(d))
                }
            }
        })
    }
    fn provider_name(&self) -> &'static str {
        "mock"
    }
}
