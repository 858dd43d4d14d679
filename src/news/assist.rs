// src/news/assist.rs
//! Secondary generation tasks served by the same backend: single-article
//! summaries, headline suggestions, sentiment labels and category tags.

use once_cell::sync::OnceCell;
use regex::Regex;
use serde::Serialize;
use tracing::{info, warn};

use super::pipeline::NewsPipeline;
use super::types::{UserContext, MAX_ITEMS};
use crate::error::PipelineError;

pub fn summary_prompt(article_text: &str) -> String {
    format!(
        "Objective: Provide a concise summary of the given news article in 3-4 sentences.
Instructions:
1. Identify the main points of the article.
2. Summarize the key information in a clear and concise manner.
3. Maintain a neutral tone.
4. Ensure the summary is self-contained and understandable without additional context.

Article:
{article_text}

Summary:"
    )
}

pub fn headlines_prompt(topic: &str, context: &UserContext) -> String {
    format!(
        "Objective: Generate {n} catchy news headlines about the given topic, considering user preferences if available.
Instructions:
1. Create headlines that are attention-grabbing and informative.
2. Ensure headlines are relevant to the topic and user preferences (if provided).
3. Use a mix of styles: questions, numbers, how-to, and declarative statements.
4. Keep headlines concise, ideally under 10 words each.
5. Output one headline per line with no numbering.
Preferred categories: {categories}
Preferred news outlets: {outlets}

Topic: {topic}

Headlines:",
        n = MAX_ITEMS,
        categories = context.categories.join(", "),
        outlets = context.outlets.join(", "),
    )
}

/// Fixed tag set for [`NewsPipeline::categorize_article`].
pub const ARTICLE_CATEGORIES: [&str; 15] = [
    "World News",
    "Politics",
    "Business",
    "Technology",
    "Health",
    "Science",
    "Environment",
    "Sports",
    "Entertainment",
    "Lifestyle",
    "Education",
    "Fashion",
    "Food",
    "Travel",
    "Economy",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
}

impl Sentiment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Positive => "positive",
            Self::Negative => "negative",
            Self::Neutral => "neutral",
        }
    }

    /// Exactly one label, case-insensitive, optional quotes/period. Anything
    /// else is `None`.
    pub fn from_label(raw: &str) -> Option<Self> {
        let label = raw
            .trim()
            .trim_matches(|c: char| c == '"' || c == '\'' || c == '.')
            .trim()
            .to_ascii_lowercase();
        match label.as_str() {
            "positive" => Some(Self::Positive),
            "negative" => Some(Self::Negative),
            "neutral" => Some(Self::Neutral),
            _ => None,
        }
    }
}

pub fn sentiment_prompt(text: &str) -> String {
    format!(
        "Analyze the sentiment of the following text and respond with exactly one word: \
positive, negative, or neutral.\n\n{text}"
    )
}

pub fn categories_prompt(article_text: &str) -> String {
    format!(
        "Categorize the following news article into one or more of these categories: {list}. \
List only the categories, separated by commas.\n\n{article_text}",
        list = ARTICLE_CATEGORIES.join(", ")
    )
}

/// Comma-separated model answer to canonical category names. Unknown
/// entries are dropped, duplicates collapse, model order is kept.
pub fn split_categories(raw: &str) -> Vec<&'static str> {
    let mut out: Vec<&'static str> = Vec::new();
    for part in raw.split([',', '\n']) {
        let name = part.trim().trim_matches(|c: char| c == '"' || c == '.').trim();
        let known = ARTICLE_CATEGORIES
            .into_iter()
            .find(|c| c.eq_ignore_ascii_case(name));
        match known {
            Some(c) if !out.contains(&c) => out.push(c),
            Some(_) => {}
            None if name.is_empty() => {}
            None => warn!(category = name, "model returned unknown category"),
        }
    }
    out
}

/// Split model output into at most five clean headlines.
pub fn split_headlines(raw: &str) -> Vec<String> {
    static RE_MARKER: OnceCell<Regex> = OnceCell::new();
    let re = RE_MARKER
        .get_or_init(|| Regex::new(r"^\s*(?:[-*•]|\d+[.)])\s*").expect("list marker regex"));
    raw.lines()
        .map(|l| re.replace(l, "").trim().trim_matches('"').trim().to_string())
        .filter(|l| !l.is_empty())
        .take(MAX_ITEMS)
        .collect()
}

impl NewsPipeline {
    pub async fn summarize_article(&self, article_text: &str) -> Result<String, PipelineError> {
        let raw = self.call_model(&summary_prompt(article_text)).await?;
        info!(article_len = article_text.len(), "article summarized");
        Ok(raw.trim().to_string())
    }

    pub async fn generate_headlines(
        &self,
        topic: &str,
        context: &UserContext,
    ) -> Result<Vec<String>, PipelineError> {
        let raw = self.call_model(&headlines_prompt(topic, context)).await?;
        let headlines = split_headlines(&raw);
        info!(count = headlines.len(), "headlines generated");
        Ok(headlines)
    }
}

impl NewsPipeline {
    /// `Ok(None)` when the model answers anything but one of the three labels.
    pub async fn analyze_sentiment(&self, text: &str) -> Result<Option<Sentiment>, PipelineError> {
        let raw = self.call_model(&sentiment_prompt(text)).await?;
        let label = Sentiment::from_label(&raw);
        match label {
            Some(s) => info!(sentiment = s.as_str(), "sentiment analyzed"),
            None => warn!(raw_len = raw.len(), "unrecognized sentiment label"),
        }
        Ok(label)
    }

    /// Only names from [`ARTICLE_CATEGORIES`] are returned.
    pub async fn categorize_article(
        &self,
        article_text: &str,
    ) -> Result<Vec<&'static str>, PipelineError> {
        let raw = self.call_model(&categories_prompt(article_text)).await?;
        let categories = split_categories(&raw);
        info!(count = categories.len(), "article categorized");
        Ok(categories)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::news::generative::MockClient;
    use std::sync::Arc;

    #[test]
    fn split_strips_markers_blanks_and_caps() {
        let raw = "1. First one\n\n- Second\n* \"Third\"\n4) Fourth\n• Fifth\nSixth";
        assert_eq!(
            split_headlines(raw),
            vec!["First one", "Second", "Third", "Fourth", "Fifth"]
        );
    }

    #[test]
    fn headline_prompt_keeps_empty_preference_lines() {
        let p = headlines_prompt("space", &UserContext::default());
        assert!(p.contains("Preferred categories: \n"));
        assert!(p.contains("Topic: space"));
    }

    #[tokio::test]
    async fn summary_is_trimmed_and_failure_propagates() {
        let ok = NewsPipeline::new(Arc::new(MockClient::replying("  Short summary.\n")));
        assert_eq!(ok.summarize_article("text").await.unwrap(), "Short summary.");

        let down = NewsPipeline::new(Arc::new(MockClient::failing()));
        assert!(matches!(
            down.generate_headlines("x", &UserContext::default()).await,
            Err(PipelineError::ServiceUnavailable(_))
        ));
    }

    #[test]
    fn sentiment_labels_fail_closed() {
        assert_eq!(Sentiment::from_label(" Positive.\n"), Some(Sentiment::Positive));
        assert_eq!(Sentiment::from_label("'neutral'"), Some(Sentiment::Neutral));
        assert_eq!(Sentiment::from_label("NEGATIVE"), Some(Sentiment::Negative));
        assert_eq!(Sentiment::from_label("mostly positive"), None);
        assert_eq!(Sentiment::from_label(""), None);
    }

    #[test]
    fn categories_keep_only_known_names() {
        assert_eq!(
            split_categories("technology, Business, Crypto, Business,  economy."),
            vec!["Technology", "Business", "Economy"]
        );
        assert!(split_categories("Gossip, Memes").is_empty());
    }

    #[tokio::test]
    async fn sentiment_and_categories_via_pipeline() {
        let p = NewsPipeline::new(Arc::new(MockClient::replying("negative")));
        assert_eq!(
            p.analyze_sentiment("Markets slump").await.unwrap(),
            Some(Sentiment::Negative)
        );

        let p = NewsPipeline::new(Arc::new(MockClient::replying("I think it is mixed")));
        assert_eq!(p.analyze_sentiment("text").await.unwrap(), None);

        let p = NewsPipeline::new(Arc::new(MockClient::replying("Science, Health")));
        assert_eq!(
            p.categorize_article("Vaccine trial").await.unwrap(),
            vec!["Science", "Health"]
        );

        let down = NewsPipeline::new(Arc::new(MockClient::failing()));
        assert!(down.categorize_article("x").await.is_err());
    }

    #[test]
    fn categories_prompt_lists_every_tag() {
        let p = categories_prompt("body");
        for c in ARTICLE_CATEGORIES {
            assert!(p.contains(c));
        }
    }
}
