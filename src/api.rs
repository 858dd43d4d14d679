use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tracing::{debug, error, warn};

use crate::error::PipelineError;
use crate::identity::{
    resolve_context, ContextLookup, IdentityStore, InMemoryIdentityStore, SessionVerifier,
    StaticSessions,
};
use crate::news::{NewsPipeline, NewsResult};

pub const HEADER_PERSONALIZED: HeaderName = HeaderName::from_static("x-news-personalized");
const RETRY_AFTER_SECS: &str = "5";

#[derive(Clone)]
pub struct AppState {
    pipeline: Arc<NewsPipeline>,
    identities: Arc<dyn IdentityStore>,
    sessions: Arc<dyn SessionVerifier>,
}

impl AppState {
    pub fn new(
        pipeline: Arc<NewsPipeline>,
        identities: Arc<dyn IdentityStore>,
        sessions: Arc<dyn SessionVerifier>,
    ) -> Self {
        Self {
            pipeline,
            identities,
            sessions,
        }
    }

    /// No known users: every caller is anonymous.
    pub fn anonymous(pipeline: Arc<NewsPipeline>) -> Self {
        Self::new(
            pipeline,
            Arc::new(InMemoryIdentityStore::new()),
            Arc::new(StaticSessions::default()),
        )
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/news", get(news_get).post(news_post))
        .route("/summarize_news", post(summarize_news))
        .route("/generate_headlines", post(generate_headlines))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

// ------------------------------------------------------------
// Errors
// ------------------------------------------------------------

#[derive(Debug)]
pub enum ApiError {
    BadRequest(&'static str),
    Backend(PipelineError),
    Identity(anyhow::Error),
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                Json(ErrorBody {
                    error: "bad_request",
                    message: msg.to_string(),
                }),
            )
                .into_response(),
            ApiError::Backend(e) => (
                StatusCode::SERVICE_UNAVAILABLE,
                [(header::RETRY_AFTER, HeaderValue::from_static(RETRY_AFTER_SECS))],
                Json(ErrorBody {
                    error: "service_unavailable",
                    message: e.to_string(),
                }),
            )
                .into_response(),
            ApiError::Identity(e) => {
                error!(error = ?e, "identity store failure");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    Json(ErrorBody {
                        error: "identity_unavailable",
                        message: "user preferences could not be loaded".to_string(),
                    }),
                )
                    .into_response()
            }
        }
    }
}

impl From<PipelineError> for ApiError {
    fn from(e: PipelineError) -> Self {
        ApiError::Backend(e)
    }
}

// ------------------------------------------------------------
// Identity
// ------------------------------------------------------------

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let raw = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = raw.trim().split_once(' ')?;
    scheme.eq_ignore_ascii_case("bearer").then_some(token.trim())
}

/// Unknown or malformed tokens count as anonymous.
async fn caller_context(state: &AppState, headers: &HeaderMap) -> Result<ContextLookup, ApiError> {
    let identity = bearer_token(headers).and_then(|t| {
        let id = state.sessions.verify(t);
        if id.is_none() {
            debug!("bearer token not recognized, continuing anonymously");
        }
        id
    });
    resolve_context(state.identities.as_ref(), identity.as_deref())
        .await
        .map_err(ApiError::Identity)
}

// ------------------------------------------------------------
// News
// ------------------------------------------------------------

#[derive(Deserialize)]
struct NewsReq {
    #[serde(default)]
    topic: String,
}

#[derive(Deserialize)]
struct NewsQuery {
    topic: Option<String>,
}

async fn news_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<NewsReq>,
) -> Result<Response, ApiError> {
    serve_news(&state, &headers, &body.topic).await
}

async fn news_get(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(q): Query<NewsQuery>,
) -> Result<Response, ApiError> {
    serve_news(&state, &headers, q.topic.as_deref().unwrap_or_default()).await
}

async fn serve_news(state: &AppState, headers: &HeaderMap, topic: &str) -> Result<Response, ApiError> {
    let topic = topic.trim();
    if topic.is_empty() {
        return Err(ApiError::BadRequest("topic is required"));
    }

    let lookup = caller_context(state, headers).await?;
    let personalized = lookup.is_personalized();
    let context = lookup.into_context();

    let result: NewsResult = state.pipeline.fetch_news(topic, &context).await.map_err(|e| {
        warn!(error = %e, "news request failed");
        ApiError::from(e)
    })?;

    let flag = if personalized { "1" } else { "0" };
    Ok(([(HEADER_PERSONALIZED, HeaderValue::from_static(flag))], Json(result)).into_response())
}

// ------------------------------------------------------------
// Assist
// ------------------------------------------------------------

#[derive(Deserialize)]
struct SummarizeReq {
    #[serde(default)]
    article_text: String,
}

#[derive(Serialize)]
struct SummarizeResp {
    summary: String,
}

async fn summarize_news(
    State(state): State<AppState>,
    Json(body): Json<SummarizeReq>,
) -> Result<Json<SummarizeResp>, ApiError> {
    if body.article_text.trim().is_empty() {
        return Err(ApiError::BadRequest("article_text is required"));
    }
    let summary = state.pipeline.summarize_article(&body.article_text).await?;
    Ok(Json(SummarizeResp { summary }))
}

#[derive(Serialize)]
struct HeadlinesResp {
    headlines: Vec<String>,
}

async fn generate_headlines(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<NewsReq>,
) -> Result<Json<HeadlinesResp>, ApiError> {
    let topic = body.topic.trim();
    if topic.is_empty() {
        return Err(ApiError::BadRequest("topic is required"));
    }
    let context = caller_context(&state, &headers).await?.into_context();
    let headlines = state.pipeline.generate_headlines(topic, &context).await?;
    Ok(Json(HeadlinesResp { headlines }))
}
