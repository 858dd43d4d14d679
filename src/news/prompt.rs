// src/news/prompt.rs
//! Prompt construction for the news briefing.
//!
//! The instruction block is the protocol the model is expected to honor;
//! bump [`PROMPT_VERSION`] whenever its wording or output shape changes.

use super::types::{UserContext, MAX_ITEMS};

pub const PROMPT_VERSION: &str = "news-v2";

/// How far back an item may have been published.
pub const RECENCY_DAYS: u32 = 7;

/// Renders the system-context block followed by the task block.
/// Pure: identical inputs always give byte-identical output.
#[derive(Debug, Clone, Copy, Default)]
pub struct PromptBuilder;

impl PromptBuilder {
    pub fn new() -> Self {
        Self
    }

    pub fn version(&self) -> &'static str {
        PROMPT_VERSION
    }

    pub fn build(&self, topic: &str, context: &UserContext) -> String {
        format!(
            "{system}\n\n{task}",
            system = system_context(),
            task = task_block(topic, context)
        )
    }
}

fn system_context() -> String {
    format!(
        "Objective: Provide a summary of the biggest news stories for the user's topic, tailored to \
their preferred categories and news outlets when available. Keep a professional yet relaxed tone. \
All information must be verifiable and cited.
Instructions:
1. Select exactly {n} news stories that are relevant to the topic and the user's preferences.
2. Only use stories published within the last {days} days, from credible sources that can be cited.
3. If fewer than {n} recent, relevant stories exist, return only those; never invent stories.
4. Write one concise, clear description per story.
5. Every story must name its source outlet and publication date.
6. Respond with JSON only: an array of arrays, one per story, in the form
   [rank, \"title\", \"description\", \"Source, Month Day, Year\"]
   where rank is 1 for the most important story. No prose, no markdown.",
        n = MAX_ITEMS,
        days = RECENCY_DAYS,
    )
}

// Both preference lines are always rendered, even when empty.
fn task_block(topic: &str, context: &UserContext) -> String {
    format!(
        "Preferred categories: {categories}\nPreferred news outlets: {outlets}\n\nTopic: {topic}",
        categories = context.categories.join(", "),
        outlets = context.outlets.join(", "),
    )
}
