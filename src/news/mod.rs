// src/news/mod.rs
//! News retrieval pipeline: prompt construction, generative backend,
//! response validation and citation enrichment.

pub mod assist;
pub mod generative;
pub mod links;
pub mod parser;
pub mod pipeline;
pub mod prompt;
pub mod types;

// Re-export convenient types.
pub use generative::{build_client, DynGenerativeClient, GenerativeClient, MockClient, MockReply};
pub use links::LinkEnricher;
pub use parser::ResponseParser;
pub use pipeline::NewsPipeline;
pub use prompt::PromptBuilder;
pub use types::{NewsItem, NewsResult, UserContext, MAX_ITEMS};
