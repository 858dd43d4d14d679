// src/config/generative.rs
use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::{env, fs, path::Path, path::PathBuf, time::Duration};

pub const ENV_CONFIG_PATH: &str = "NEWS_CONFIG_PATH";
pub const DEFAULT_SEARCH_BASE: &str = "https://www.google.com/search?q=";

const MIN_TIMEOUT_MS: u64 = 100;
const MAX_ATTEMPTS_CAP: u32 = 2;

fn default_enabled() -> bool {
    true
}
fn default_provider() -> String {
    "gemini".to_string()
}
fn default_api_key() -> String {
    "ENV".to_string()
}
fn default_timeout_ms() -> u64 {
    20_000
}
fn default_connect_timeout_ms() -> u64 {
    4_000
}
fn default_max_attempts() -> u32 {
    1
}
fn default_temperature() -> f32 {
    0.4
}
fn default_search_base() -> String {
    DEFAULT_SEARCH_BASE.to_string()
}

/// Generative backend settings. Built once at startup and handed to the
/// client factory and the pipeline.
#[derive(Clone, Serialize, Deserialize)]
pub struct GenerativeConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// "gemini" | "openai" (case-insensitive)
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Provider model id; `None` picks the provider default.
    #[serde(default)]
    pub model: Option<String>,
    /// "ENV" means: read from GOOGLE_API_KEY / OPENAI_API_KEY (by provider)
    #[serde(default = "default_api_key")]
    pub api_key: String,
    /// Override the provider endpoint (proxies, tests).
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Attempts per backend call, clamped to 1..=2.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Query template prefix for fallback citation links.
    #[serde(default = "default_search_base")]
    pub search_base: String,
}

impl Default for GenerativeConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            provider: default_provider(),
            model: None,
            api_key: default_api_key(),
            base_url: None,
            timeout_ms: default_timeout_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
            max_attempts: default_max_attempts(),
            temperature: default_temperature(),
            search_base: default_search_base(),
        }
    }
}

// Hand-written so the key never ends up in logs.
impl std::fmt::Debug for GenerativeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerativeConfig")
            .field("enabled", &self.enabled)
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("key_len", &self.api_key.len())
            .field("base_url", &self.base_url)
            .field("timeout_ms", &self.timeout_ms)
            .field("max_attempts", &self.max_attempts)
            .finish()
    }
}

impl GenerativeConfig {
    /// Load from an explicit path. Supports TOML or JSON formats.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading generative config from {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let cfg: GenerativeConfig = match ext.as_str() {
            "toml" => toml::from_str(&data).context("parsing generative config toml")?,
            _ => serde_json::from_str(&data).context("parsing generative config json")?,
        };
        cfg.finalize()
    }

    /// Load using env var + fallbacks:
    /// 1) $NEWS_CONFIG_PATH
    /// 2) config/generative.json
    /// 3) config/generative.toml
    /// 4) built-in defaults
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                bail!("{ENV_CONFIG_PATH} points to non-existent path");
            }
            return Self::load_from_file(&pb);
        }
        for candidate in ["config/generative.json", "config/generative.toml"] {
            let pb = PathBuf::from(candidate);
            if pb.exists() {
                return Self::load_from_file(&pb);
            }
        }
        Self::default().finalize()
    }

    /// Normalize provider, apply env overrides, resolve the key, sanitize bounds.
    fn finalize(mut self) -> Result<Self> {
        if let Ok(p) = env::var("NEWS_AI_PROVIDER") {
            self.provider = p;
        }
        if let Ok(m) = env::var("NEWS_AI_MODEL") {
            self.model = Some(m);
        }
        if let Some(ms) = env_u64("NEWS_AI_TIMEOUT_MS") {
            self.timeout_ms = ms;
        }
        if let Some(n) = env_u64("NEWS_AI_MAX_ATTEMPTS") {
            self.max_attempts = u32::try_from(n).unwrap_or(MAX_ATTEMPTS_CAP);
        }

        self.provider = self.provider.trim().to_lowercase();

        if self.api_key.trim().eq_ignore_ascii_case("env") {
            let var = match self.provider.as_str() {
                "gemini" => "GOOGLE_API_KEY",
                "openai" => "OPENAI_API_KEY",
                other => return Err(anyhow!("Unsupported provider in config: {other}")),
            };
            // Missing key is not fatal here: the client reports MissingCredentials per call.
            self.api_key = env::var(var).unwrap_or_default();
        }

        self.max_attempts = self.max_attempts.clamp(1, MAX_ATTEMPTS_CAP);
        self.timeout_ms = self.timeout_ms.max(MIN_TIMEOUT_MS);
        self.connect_timeout_ms = self.connect_timeout_ms.clamp(1, self.timeout_ms);
        if !(0.0..=2.0).contains(&self.temperature) {
            self.temperature = default_temperature();
        }
        if self.search_base.trim().is_empty() {
            self.search_base = default_search_base();
        }
        Ok(self)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

fn env_u64(name: &str) -> Option<u64> {
    env::var(name).ok().and_then(|s| s.trim().parse().ok())
}
