//! identity.rs: identity-store and session collaborators.
//!
//! The pipeline only needs "who is calling, if anyone" and that caller's
//! stored preferences. Account creation, passwords and token issuance live
//! elsewhere; the in-memory implementations here are seeded from a file.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::news::UserContext;

pub const ENV_IDENTITIES_PATH: &str = "NEWS_IDENTITIES_PATH";

pub type UserId = String;

/// Stored preference record (field names as persisted by the account service).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default, alias = "outlets")]
    pub news_outlets: Vec<String>,
}

impl From<Preferences> for UserContext {
    fn from(p: Preferences) -> Self {
        UserContext::new(p.categories, p.news_outlets)
    }
}

#[async_trait::async_trait]
pub trait IdentityStore: Send + Sync {
    /// `Ok(None)` when the user has no preference record.
    async fn get_preferences(&self, user_id: &str) -> Result<Option<Preferences>>;
}

pub trait SessionVerifier: Send + Sync {
    /// Authenticated identity behind a bearer token, or `None`.
    fn verify(&self, token: &str) -> Option<UserId>;
}

/// Outcome of building a [`UserContext`] for one request. Every variant
/// yields a context; none of them is an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextLookup {
    Anonymous,
    NoPreferences,
    Personalized(UserContext),
}

impl ContextLookup {
    pub fn is_personalized(&self) -> bool {
        matches!(self, Self::Personalized(_))
    }

    pub fn into_context(self) -> UserContext {
        match self {
            Self::Personalized(ctx) => ctx,
            Self::Anonymous | Self::NoPreferences => UserContext::default(),
        }
    }
}

/// Read-through context lookup. Store I/O failures are returned, not
/// downgraded to an empty context.
pub async fn resolve_context(
    store: &dyn IdentityStore,
    identity: Option<&str>,
) -> Result<ContextLookup> {
    let Some(user_id) = identity else {
        return Ok(ContextLookup::Anonymous);
    };
    let prefs = store
        .get_preferences(user_id)
        .await
        .with_context(|| format!("loading preferences for user {}", anon_id(user_id)))?;
    let lookup = match prefs {
        Some(p) => ContextLookup::Personalized(p.into()),
        None => ContextLookup::NoPreferences,
    };
    debug!(user = %anon_id(user_id), personalized = lookup.is_personalized(), "context resolved");
    Ok(lookup)
}

/// Short, stable, non-reversible id for logs.
pub fn anon_id(user_id: &str) -> String {
    let digest = Sha256::digest(user_id.as_bytes());
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

// ------------------------------------------------------------
// In-memory implementations
// ------------------------------------------------------------

#[derive(Debug, Default)]
pub struct InMemoryIdentityStore {
    users: RwLock<HashMap<UserId, Preferences>>,
}

impl InMemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_preferences(&self, user_id: impl Into<UserId>, prefs: Preferences) {
        let mut g = self.users.write().unwrap_or_else(|p| p.into_inner());
        g.insert(user_id.into(), prefs);
    }
}

#[async_trait::async_trait]
impl IdentityStore for InMemoryIdentityStore {
    async fn get_preferences(&self, user_id: &str) -> Result<Option<Preferences>> {
        let g = self
            .users
            .read()
            .map_err(|_| anyhow!("identity store lock poisoned"))?;
        Ok(g.get(user_id).cloned())
    }
}

/// Fixed bearer-token table.
#[derive(Debug, Default, Clone)]
pub struct StaticSessions {
    tokens: HashMap<String, UserId>,
}

impl StaticSessions {
    pub fn insert(&mut self, token: impl Into<String>, user_id: impl Into<UserId>) {
        self.tokens.insert(token.into(), user_id.into());
    }
}

impl SessionVerifier for StaticSessions {
    fn verify(&self, token: &str) -> Option<UserId> {
        self.tokens.get(token.trim()).cloned()
    }
}

// ------------------------------------------------------------
// Seed file
// ------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct SeedUser {
    pub id: UserId,
    #[serde(default)]
    pub token: Option<String>,
    /// Users without a preference record are kept as identities only.
    #[serde(default)]
    pub preferences: Option<Preferences>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct IdentitySeed {
    #[serde(default)]
    pub users: Vec<SeedUser>,
}

impl IdentitySeed {
    /// Load from an explicit path. Supports TOML or JSON formats.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading identities from {}", path.display()))?;
        let is_toml = path
            .extension()
            .and_then(|s| s.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("toml"));
        if is_toml {
            toml::from_str(&content).context("parsing identities toml")
        } else {
            serde_json::from_str(&content).context("parsing identities json")
        }
    }

    /// Load using env var + fallbacks:
    /// 1) $NEWS_IDENTITIES_PATH
    /// 2) config/identities.toml
    /// 3) no identities
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_IDENTITIES_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("{ENV_IDENTITIES_PATH} points to non-existent path"));
            }
            return Self::load_from(&pb);
        }
        let toml_p = PathBuf::from("config/identities.toml");
        if toml_p.exists() {
            return Self::load_from(&toml_p);
        }
        Ok(Self::default())
    }

    pub fn into_parts(self) -> (InMemoryIdentityStore, StaticSessions) {
        let store = InMemoryIdentityStore::new();
        let mut sessions = StaticSessions::default();
        for u in self.users {
            if let Some(t) = u.token.filter(|t| !t.trim().is_empty()) {
                sessions.insert(t.trim(), u.id.clone());
            }
            if let Some(p) = u.preferences {
                store.put_preferences(u.id, p);
            }
        }
        (store, sessions)
    }
}
