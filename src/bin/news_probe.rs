//! One-shot probe: fetch news for a topic with the configured backend and
//! print the result as JSON.
//!
//! Usage: `news_probe <topic> [category,...] [outlet,...]`

use std::process::ExitCode;

use news_genie::config::GenerativeConfig;
use news_genie::news::{build_client, NewsPipeline, UserContext};

fn split_list(arg: Option<String>) -> Vec<String> {
    arg.map(|s| {
        s.split(',')
            .map(str::trim)
            .filter(|x| !x.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    news_genie::init_tracing();

    let mut args = std::env::args().skip(1);
    let Some(topic) = args.next() else {
        eprintln!("usage: news_probe <topic> [category,...] [outlet,...]");
        return ExitCode::from(2);
    };
    let context = UserContext::new(split_list(args.next()), split_list(args.next()));

    let pipeline = match GenerativeConfig::load_default()
        .and_then(|cfg| Ok(NewsPipeline::from_config(&cfg, build_client(&cfg)?)))
    {
        Ok(p) => p,
        Err(e) => {
            eprintln!("setup failed: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    match pipeline.fetch_news(&topic, &context).await {
        Ok(result) => {
            match serde_json::to_string_pretty(&result) {
                Ok(s) => println!("{s}"),
                Err(e) => eprintln!("serialize failed: {e}"),
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{e}");
            ExitCode::from(3)
        }
    }
}
