// src/news/types.rs
use serde::ser::{Serialize, SerializeTuple, Serializer};
use serde::Deserialize;

/// Upper bound on items in a [`NewsResult`]. The prompt asks for exactly this many.
pub const MAX_ITEMS: usize = 5;

/// Content preferences steering a single pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Deserialize)]
pub struct UserContext {
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub outlets: Vec<String>,
}

impl UserContext {
    pub fn new(categories: Vec<String>, outlets: Vec<String>) -> Self {
        Self {
            categories,
            outlets,
        }
    }

    /// No preferences at all (anonymous caller or empty profile).
    pub fn is_empty(&self) -> bool {
        self.categories.is_empty() && self.outlets.is_empty()
    }
}

/// One cited news summary.
///
/// `source` is display text ("Outlet, Month Day, Year"); it is never parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewsItem {
    pub rank: u32,
    pub title: String,
    pub description: String,
    pub source: String,
    pub citation_link: Option<String>,
}

// Wire form: `[rank, title, description, source]`, plus the link when present.
// Rank goes out stringified.
impl Serialize for NewsItem {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let len = if self.citation_link.is_some() { 5 } else { 4 };
        let mut tup = serializer.serialize_tuple(len)?;
        tup.serialize_element(&self.rank.to_string())?;
        tup.serialize_element(&self.title)?;
        tup.serialize_element(&self.description)?;
        tup.serialize_element(&self.source)?;
        if let Some(link) = &self.citation_link {
            tup.serialize_element(link)?;
        }
        tup.end()
    }
}

/// Ordered result of one pipeline run, 0..=5 items. Empty means
/// "no qualifying recent news", not a failure.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
#[serde(transparent)]
pub struct NewsResult(Vec<NewsItem>);

impl NewsResult {
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    /// Wraps already validated items, truncating anything past [`MAX_ITEMS`].
    pub fn from_items(mut items: Vec<NewsItem>) -> Self {
        items.truncate(MAX_ITEMS);
        Self(items)
    }

    pub fn items(&self) -> &[NewsItem] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_items(self) -> Vec<NewsItem> {
        self.0
    }
}
