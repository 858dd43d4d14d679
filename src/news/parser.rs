// src/news/parser.rs
//! Strict decoding of the model's answer into [`NewsItem`]s.
//!
//! Accepted shape: a JSON array of `[rank, title, description, source]`
//! tuples, optionally with a fifth `link` element. Structural problems reject
//! the whole batch; empty title/source only drop the offending item. Field
//! text is passed through as the model wrote it, only trimmed.

use once_cell::sync::OnceCell;
use regex::Regex;
use serde_json::Value;
use tracing::debug;

use super::types::{NewsItem, MAX_ITEMS};
use crate::error::{ItemSkip, ParseError};

/// Validated items plus the per-item rejections, for diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedBatch {
    pub items: Vec<NewsItem>,
    pub skipped: Vec<ItemSkip>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseParser;

impl ResponseParser {
    pub fn new() -> Self {
        Self
    }

    pub fn parse(&self, raw_text: &str) -> Result<Vec<NewsItem>, ParseError> {
        self.parse_batch(raw_text).map(|b| b.items)
    }

    pub fn parse_batch(&self, raw_text: &str) -> Result<ParsedBatch, ParseError> {
        let body = strip_code_fence(raw_text);
        let value: Value =
            serde_json::from_str(body).map_err(|e| ParseError::NotJson(e.to_string()))?;
        let Value::Array(rows) = value else {
            return Err(ParseError::NotAnArray);
        };

        // Structural pass first: one bad row rejects the batch.
        let mut candidates = Vec::with_capacity(rows.len());
        for (index, row) in rows.iter().enumerate() {
            candidates.push(decode_row(index, row)?);
        }

        let total = candidates.len();
        let mut batch = ParsedBatch::default();
        for raw in candidates {
            if batch.items.len() == MAX_ITEMS {
                break;
            }
            match raw.validate() {
                Ok(mut item) => {
                    let position = batch.items.len() as u32 + 1;
                    if raw.rank.is_some_and(|r| r != position) {
                        debug!(model_rank = ?raw.rank, position, "renumbering model rank");
                    }
                    item.rank = position;
                    batch.items.push(item);
                }
                Err(skip) => {
                    debug!(index = skip.index, reason = skip.reason, "dropping news item");
                    batch.skipped.push(skip);
                }
            }
        }

        if batch.items.is_empty() && total > 0 {
            return Err(ParseError::AllItemsInvalid { count: total });
        }
        Ok(batch)
    }
}

/// A structurally valid row, before field validation.
struct RawRow {
    index: usize,
    rank: Option<u32>,
    title: String,
    description: String,
    source: String,
    link: Option<String>,
}

impl RawRow {
    fn validate(&self) -> Result<NewsItem, ItemSkip> {
        let skip = |reason| ItemSkip {
            index: self.index,
            reason,
        };
        let title = self.title.trim();
        if title.is_empty() {
            return Err(skip("empty title"));
        }
        let source = self.source.trim();
        if source.is_empty() {
            return Err(skip("empty source"));
        }
        let citation_link = self
            .link
            .as_deref()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string);
        Ok(NewsItem {
            rank: 0,
            title: title.to_string(),
            description: self.description.trim().to_string(),
            source: source.to_string(),
            citation_link,
        })
    }
}

fn decode_row(index: usize, row: &Value) -> Result<RawRow, ParseError> {
    let Value::Array(fields) = row else {
        return Err(ParseError::WrongArity { index, len: 1 });
    };
    if !(4..=5).contains(&fields.len()) {
        return Err(ParseError::WrongArity {
            index,
            len: fields.len(),
        });
    }

    let text = |pos: usize, field: &'static str| -> Result<String, ParseError> {
        fields[pos]
            .as_str()
            .map(str::to_string)
            .ok_or(ParseError::NonStringField { index, field })
    };

    let link = match fields.get(4) {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(_) => return Err(ParseError::NonStringField { index, field: "link" }),
    };

    Ok(RawRow {
        index,
        rank: coerce_rank(&fields[0]),
        title: text(1, "title")?,
        description: text(2, "description")?,
        source: text(3, "source")?,
        link,
    })
}

/// Numeric or numeric-string ranks; anything else counts as absent.
fn coerce_rank(v: &Value) -> Option<u32> {
    match v {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().trim_end_matches('.').parse().ok(),
        _ => None,
    }
}

/// Models like to wrap JSON in a markdown fence; unwrap exactly one.
fn strip_code_fence(raw: &str) -> &str {
    static RE_FENCE: OnceCell<Regex> = OnceCell::new();
    let re = RE_FENCE.get_or_init(|| {
        Regex::new(r"(?s)\A\s*```(?:[A-Za-z]+\b)?[ \t]*\r?\n?(.*?)\s*```\s*\z").expect("fence regex")
    });
    match re.captures(raw).and_then(|c| c.get(1)) {
        Some(m) => m.as_str(),
        None => raw.trim(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tuple(rank: u32, title: &str) -> String {
        format!(r#"[{rank}, "{title}", "desc {rank}", "Reuters, June {rank}, 2025"]"#)
    }

    fn array_of(n: u32) -> String {
        let rows: Vec<String> = (1..=n).map(|r| tuple(r, &format!("Story {r}"))).collect();
        format!("[{}]", rows.join(","))
    }

    #[test]
    fn well_formed_batch_keeps_order_and_renumbers() {
        let raw = r#"[[3, "A", "a", "Reuters, June 1, 2025"], ["7", "B", "b", "AP, June 2, 2025"], [null, "C", "c", "BBC, June 3, 2025"]]"#;
        let items = ResponseParser::new().parse(raw).unwrap();
        let titles: Vec<_> = items.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, ["A", "B", "C"]);
        let ranks: Vec<_> = items.iter().map(|i| i.rank).collect();
        assert_eq!(ranks, [1, 2, 3]);
        assert!(items.iter().all(|i| i.citation_link.is_none()));
    }

    #[test]
    fn caps_at_five_without_padding() {
        let p = ResponseParser::new();
        assert_eq!(p.parse(&array_of(7)).unwrap().len(), 5);
        assert_eq!(p.parse(&array_of(2)).unwrap().len(), 2);
        assert!(p.parse("[]").unwrap().is_empty());
    }

    #[test]
    fn non_json_and_wrong_shapes_are_errors() {
        let p = ResponseParser::new();
        assert!(matches!(p.parse("not json"), Err(ParseError::NotJson(_))));
        assert_eq!(p.parse(r#"{"a":1}"#), Err(ParseError::NotAnArray));
        assert_eq!(
            p.parse(r#"[[1, "t", "d"]]"#),
            Err(ParseError::WrongArity { index: 0, len: 3 })
        );
        assert_eq!(
            p.parse(r#"[[1, "t", "d", "s"], "loose string"]"#),
            Err(ParseError::WrongArity { index: 1, len: 1 })
        );
        assert_eq!(
            p.parse(r#"[[1, "t", 42, "s"]]"#),
            Err(ParseError::NonStringField {
                index: 0,
                field: "description"
            })
        );
        assert_eq!(
            p.parse(r#"[[1, "t", "d", "s", 5]]"#),
            Err(ParseError::NonStringField { index: 0, field: "link" })
        );
    }

    #[test]
    fn invalid_items_are_dropped_individually() {
        let raw = r#"[[1, "  ", "d", "Reuters"], [2, "Kept", "d", "AP"], [3, "No source", "d", ""]]"#;
        let batch = ResponseParser::new().parse_batch(raw).unwrap();
        assert_eq!(batch.items.len(), 1);
        assert_eq!(batch.items[0].title, "Kept");
        assert_eq!(batch.items[0].rank, 1);
        assert_eq!(
            batch.skipped,
            vec![
                ItemSkip { index: 0, reason: "empty title" },
                ItemSkip { index: 2, reason: "empty source" },
            ]
        );
    }

    #[test]
    fn all_items_invalid_is_an_error() {
        let raw = r#"[[1, "", "d", "Reuters"]]"#;
        assert_eq!(
            ResponseParser::new().parse(raw),
            Err(ParseError::AllItemsInvalid { count: 1 })
        );
    }

    #[test]
    fn unwraps_markdown_fence_and_trims_fields() {
        let raw = "```json\n[[1, \" Fed &amp; markets \", \"two\\n lines\", \"WSJ, May 1, 2025\", \" https://wsj.com/x \"]]\n```";
        let items = ResponseParser::new().parse(raw).unwrap();
        assert_eq!(items[0].title, "Fed &amp; markets");
        assert_eq!(items[0].description, "two\n lines");
        assert_eq!(items[0].citation_link.as_deref(), Some("https://wsj.com/x"));
    }

    #[test]
    fn single_line_fence_is_unwrapped() {
        let p = ResponseParser::new();
        let one_line = format!("```json {} ```", array_of(2));
        assert_eq!(p.parse(&one_line).unwrap().len(), 2);
        let bare = format!("```{}```", array_of(1));
        assert_eq!(p.parse(&bare).unwrap().len(), 1);
    }

    #[test]
    fn field_text_passes_through_verbatim() {
        let raw = r#"[[1, "R&amp;D  budget\nrises", "a  b", "Reuters,  June 1, 2025"]]"#;
        let item = &ResponseParser::new().parse(raw).unwrap()[0];
        assert_eq!(item.title, "R&amp;D  budget\nrises");
        assert_eq!(item.description, "a  b");
        assert_eq!(item.source, "Reuters,  June 1, 2025");
    }

    #[test]
    fn prose_around_json_is_rejected() {
        let raw = format!("Here are your stories:\n{}", array_of(2));
        assert!(ResponseParser::new().parse(&raw).is_err());
    }
}
