// src/news/links.rs
use url::Url;

use super::types::NewsItem;
use crate::config::generative::DEFAULT_SEARCH_BASE;

/// Guarantees every item carries a navigable citation link, synthesizing a
/// web-search URL from the title when the model gave none.
#[derive(Debug, Clone)]
pub struct LinkEnricher {
    search_base: String,
}

impl Default for LinkEnricher {
    fn default() -> Self {
        Self::new(DEFAULT_SEARCH_BASE)
    }
}

impl LinkEnricher {
    /// `search_base` is the query template prefix the encoded title is appended to.
    pub fn new(search_base: impl Into<String>) -> Self {
        Self {
            search_base: search_base.into(),
        }
    }

    /// Items with a usable link pass through untouched. Idempotent.
    pub fn enrich(&self, item: NewsItem) -> NewsItem {
        if item.citation_link.as_deref().is_some_and(is_usable_link) {
            return item;
        }
        let citation_link = Some(self.search_url(&item.title));
        NewsItem {
            citation_link,
            ..item
        }
    }

    pub fn search_url(&self, title: &str) -> String {
        format!("{}{}", self.search_base, urlencoding::encode(title))
    }
}

/// Absolute http(s) URL with a host.
pub fn is_usable_link(link: &str) -> bool {
    if link.is_empty() || link.trim() != link {
        return false;
    }
    match Url::parse(link) {
        Ok(u) => matches!(u.scheme(), "http" | "https") && u.host_str().is_some_and(|h| !h.is_empty()),
        Err(_) => false,
    }
}
