// tests/api_http.rs
//
// HTTP-level tests for the public API Router without opening sockets.
// We exercise the router directly via tower::ServiceExt::oneshot.
//
// Covered:
// - GET /health
// - GET/POST /news  (anonymous, personalized, bad input, backend down)
// - POST /summarize_news
// - POST /generate_headlines

use std::sync::{Arc, Mutex};

use axum::{
    body::{self, Body},
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::{json, Value as Json};
use tower::ServiceExt as _; // for `oneshot`

use news_genie::api::{self, AppState, HEADER_PERSONALIZED};
use news_genie::error::GenerationError;
use news_genie::identity::{InMemoryIdentityStore, Preferences, StaticSessions};
use news_genie::news::generative::{BoxFuture, MOCK_NEWS_JSON};
use news_genie::news::{GenerativeClient, MockClient, NewsPipeline};

const BODY_LIMIT: usize = 1024 * 1024; // 1MB, safe for tests

/// Remembers the last prompt so tests can see what context reached the model.
#[derive(Default)]
struct PromptSpy {
    last: Mutex<Option<String>>,
}

impl GenerativeClient for PromptSpy {
    fn complete<'a>(&'a self, prompt: &'a str) -> BoxFuture<'a, Result<String, GenerationError>> {
        *self.last.lock().unwrap() = Some(prompt.to_string());
        Box::pin(async { Ok(MOCK_NEWS_JSON.to_string()) })
    }
    fn provider_name(&self) -> &'static str {
        "spy"
    }
}

fn anonymous_router(client: MockClient) -> Router {
    let pipeline = NewsPipeline::new(Arc::new(client));
    api::router(AppState::anonymous(Arc::new(pipeline)))
}

/// One user with preferences (`tok-tech`), one without (`tok-empty`).
fn seeded_router(spy: Arc<PromptSpy>) -> Router {
    let store = InMemoryIdentityStore::new();
    store.put_preferences(
        "tech-user",
        Preferences {
            categories: vec!["Technology".into(), "Business".into()],
            news_outlets: vec!["Reuters".into()],
        },
    );
    let mut sessions = StaticSessions::default();
    sessions.insert("tok-tech", "tech-user");
    sessions.insert("tok-empty", "plain-user");

    let pipeline = NewsPipeline::new(spy);
    api::router(AppState::new(
        Arc::new(pipeline),
        Arc::new(store),
        Arc::new(sessions),
    ))
}

async fn read_json(resp: axum::response::Response) -> Json {
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("json body")
}

fn post_json(uri: &str, payload: &Json) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(payload.to_string()))
        .expect("build POST")
}

#[tokio::test]
async fn api_health_returns_200_and_ok_body() {
    let app = anonymous_router(MockClient::replying(MOCK_NEWS_JSON));

    let req = Request::builder()
        .method("GET")
        .uri("/health")
        .body(Body::empty())
        .expect("build GET /health");

    let resp = app.oneshot(req).await.expect("oneshot /health");
    assert_eq!(resp.status(), StatusCode::OK, "health should be 200");

    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body");
    assert_eq!(String::from_utf8_lossy(&bytes).trim(), "OK");
}

#[tokio::test]
async fn news_post_returns_ranked_tuples() {
    let app = anonymous_router(MockClient::replying(MOCK_NEWS_JSON));

    let resp = app
        .oneshot(post_json("/news", &json!({ "topic": "electric vehicles" })))
        .await
        .expect("oneshot /news");
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers().get(&HEADER_PERSONALIZED).unwrap(),
        "0",
        "anonymous caller is not personalized"
    );

    let body = read_json(resp).await;
    let items = body.as_array().expect("top-level array");
    assert_eq!(items.len(), 5);
    for (i, it) in items.iter().enumerate() {
        let row = it.as_array().expect("tuple");
        assert_eq!(row.len(), 5, "rank, title, description, source, link");
        assert_eq!(row[0], json!((i + 1).to_string()));
        assert!(row[4].as_str().unwrap().starts_with("https://"));
    }
}

#[tokio::test]
async fn news_get_accepts_query_topic() {
    let app = anonymous_router(MockClient::replying(MOCK_NEWS_JSON));
    let req = Request::builder()
        .method("GET")
        .uri("/news?topic=electric%20vehicles")
        .body(Body::empty())
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(read_json(resp).await.as_array().unwrap().len(), 5);
}

#[tokio::test]
async fn blank_topic_is_bad_request() {
    let app = anonymous_router(MockClient::replying(MOCK_NEWS_JSON));
    let resp = app
        .oneshot(post_json("/news", &json!({ "topic": "   " })))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(read_json(resp).await["error"], "bad_request");
}

#[tokio::test]
async fn unparseable_model_output_is_an_empty_list() {
    let app = anonymous_router(MockClient::replying("Sorry, I cannot help with that."));
    let resp = app
        .oneshot(post_json("/news", &json!({ "topic": "x" })))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(read_json(resp).await, json!([]));
}

#[tokio::test]
async fn backend_down_is_503_with_retry_after() {
    let app = anonymous_router(MockClient::failing());
    let resp = app
        .oneshot(post_json("/news", &json!({ "topic": "x" })))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert!(resp.headers().contains_key(header::RETRY_AFTER));
    assert_eq!(read_json(resp).await["error"], "service_unavailable");
}

#[tokio::test]
async fn known_token_personalizes_the_prompt() {
    let spy = Arc::new(PromptSpy::default());
    let app = seeded_router(spy.clone());

    let mut req = post_json("/news", &json!({ "topic": "chips" }));
    req.headers_mut()
        .insert(header::AUTHORIZATION, "Bearer tok-tech".parse().unwrap());
    let resp = app.oneshot(req).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers().get(&HEADER_PERSONALIZED).unwrap(), "1");
    let prompt = spy.last.lock().unwrap().clone().expect("prompt sent");
    assert!(prompt.contains("Preferred categories: Technology, Business"));
    assert!(prompt.contains("Preferred news outlets: Reuters"));
}

#[tokio::test]
async fn unknown_token_and_missing_preferences_fall_back_to_generic() {
    for token in ["Bearer nope", "Bearer tok-empty"] {
        let spy = Arc::new(PromptSpy::default());
        let app = seeded_router(spy.clone());

        let mut req = post_json("/news", &json!({ "topic": "chips" }));
        req.headers_mut()
            .insert(header::AUTHORIZATION, token.parse().unwrap());
        let resp = app.oneshot(req).await.unwrap();

        assert_eq!(resp.status(), StatusCode::OK, "{token}");
        assert_eq!(resp.headers().get(&HEADER_PERSONALIZED).unwrap(), "0");
        let prompt = spy.last.lock().unwrap().clone().unwrap();
        assert!(!prompt.contains("Technology"), "{token}");
    }
}

#[tokio::test]
async fn summarize_returns_trimmed_summary() {
    let app = anonymous_router(MockClient::replying("  A short summary.  "));
    let resp = app
        .oneshot(post_json(
            "/summarize_news",
            &json!({ "article_text": "Long article body." }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(read_json(resp).await["summary"], "A short summary.");
}

#[tokio::test]
async fn summarize_requires_article_text() {
    let app = anonymous_router(MockClient::replying("unused"));
    let resp = app
        .oneshot(post_json("/summarize_news", &json!({})))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn headlines_are_split_into_a_list() {
    let app = anonymous_router(MockClient::replying(
        "1. First headline\n2. \"Second headline\"\n\n- Third headline",
    ));
    let resp = app
        .oneshot(post_json("/generate_headlines", &json!({ "topic": "space" })))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        read_json(resp).await["headlines"],
        json!(["First headline", "Second headline", "Third headline"])
    );
}
