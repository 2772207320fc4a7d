//! Precedent-API: the HTTP surface over the pipeline engine.
//!
//! Thin by design: request validation, per-client-IP rate limiting, and
//! JSON mapping. Everything else lives in the pipeline. Only malformed
//! input and rate limiting surface as HTTP errors; every pipeline
//! degradation is reported inside the response body.

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use precedent_core::{CaseCandidate, PipelineTrace, SearchResponse};
use precedent_pipeline::PipelineEngine;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use thiserror::Error;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Minimum query length accepted by the search endpoints.
pub use precedent_core::MIN_QUERY_CHARS;

const MAX_RESULTS_RANGE: (usize, usize) = (5, 40);
const DEFAULT_MAX_RESULTS: usize = 20;

/// API errors.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Rate limit exceeded")]
    RateLimited { retry_after_ms: u64 },
}

/// Error response body.
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    retry_after_ms: Option<u64>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, body) = match self {
            ApiError::BadRequest(message) => (
                StatusCode::BAD_REQUEST,
                ErrorResponse {
                    error: message,
                    retry_after_ms: None,
                },
            ),
            ApiError::RateLimited { retry_after_ms } => (
                StatusCode::TOO_MANY_REQUESTS,
                ErrorResponse {
                    error: "Too many requests. Please slow down.".to_string(),
                    retry_after_ms: Some(retry_after_ms),
                },
            ),
        };
        (status, Json(body)).into_response()
    }
}

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<PipelineEngine>,
}

/// Search request body.
#[derive(Debug, Deserialize)]
pub struct SearchBody {
    pub query: String,
    pub max_results: Option<usize>,
    #[serde(default)]
    pub debug: bool,
}

/// Finalize request body: candidates retrieved directly by the client.
#[derive(Debug, Deserialize)]
pub struct FinalizeBody {
    pub query: String,
    pub candidates: Vec<CaseCandidate>,
    pub max_results: Option<usize>,
}

/// Health probe query parameters.
#[derive(Debug, Deserialize)]
pub struct HealthParams {
    pub timeout_ms: Option<u64>,
}

fn client_ip(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(',').next().unwrap_or(v).trim().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn ip_hash(ip: &str) -> String {
    let digest = Sha256::digest(ip.as_bytes());
    digest.iter().take(6).map(|b| format!("{b:02x}")).collect()
}

async fn check_rate_limit(
    state: &AppState,
    headers: &HeaderMap,
    scope: &str,
) -> Result<(), ApiError> {
    let api = &state.engine.config().api;
    let now_sec = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    let window = api.ip_rate_window_sec.max(1);
    let bucket = now_sec / window;
    let key = format!("{scope}:rl:{bucket}:{}", ip_hash(&client_ip(headers)));
    let count = state
        .engine
        .cache()
        .increment(&key, window)
        .await;
    if count > api.ip_rate_limit {
        let retry_after_ms = (window - (now_sec % window)) * 1000;
        return Err(ApiError::RateLimited { retry_after_ms });
    }
    Ok(())
}

fn validate_query(query: &str) -> Result<(), ApiError> {
    if query.trim().chars().count() < MIN_QUERY_CHARS {
        return Err(ApiError::BadRequest(format!(
            "Query too short; describe the scenario in at least {MIN_QUERY_CHARS} characters."
        )));
    }
    Ok(())
}

fn clamp_max_results(requested: Option<usize>) -> usize {
    requested
        .unwrap_or(DEFAULT_MAX_RESULTS)
        .clamp(MAX_RESULTS_RANGE.0, MAX_RESULTS_RANGE.1)
}

fn strip_debug(mut response: SearchResponse, debug: bool) -> SearchResponse {
    if !debug {
        response.pipeline_trace = PipelineTrace::default();
    }
    response
}

async fn search_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<SearchBody>,
) -> Result<Json<SearchResponse>, ApiError> {
    check_rate_limit(&state, &headers, "search").await?;
    validate_query(&body.query)?;
    let max_results = clamp_max_results(body.max_results);
    tracing::info!(query_chars = body.query.len(), max_results, "search request");
    let response = state.engine.search(&body.query, max_results).await;
    Ok(Json(strip_debug(response, body.debug)))
}

async fn plan_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<SearchBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    check_rate_limit(&state, &headers, "search:plan").await?;
    validate_query(&body.query)?;
    let output = state.engine.plan(&body.query).await;
    Ok(Json(
        serde_json::to_value(&output).unwrap_or(serde_json::Value::Null),
    ))
}

async fn finalize_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<FinalizeBody>,
) -> Result<Json<SearchResponse>, ApiError> {
    check_rate_limit(&state, &headers, "search:finalize").await?;
    validate_query(&body.query)?;
    let max_results = clamp_max_results(body.max_results);
    let response = state
        .engine
        .finalize(&body.query, body.candidates, max_results)
        .await;
    Ok(Json(response))
}

async fn health_handler(
    State(state): State<AppState>,
    Query(params): Query<HealthParams>,
) -> Json<serde_json::Value> {
    let timeout_ms = params.timeout_ms.unwrap_or(1_500).clamp(100, 10_000);
    let report = state.engine.reasoner().health(timeout_ms).await;
    Json(serde_json::to_value(&report).unwrap_or(serde_json::Value::Null))
}

/// Builds the API router.
pub fn router(engine: Arc<PipelineEngine>) -> Router {
    let state = AppState { engine };
    Router::new()
        .route("/api/search", post(search_handler))
        .route("/api/search/plan", post(plan_handler))
        .route("/api/search/finalize", post(finalize_handler))
        .route("/api/health/bedrock", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use precedent_cache::MemoryCache;
    use precedent_pipeline::PipelineConfig;
    use precedent_reasoner::{ReasonerConfig, ReasonerMode, ReasonerOrchestrator};
    use precedent_retrieval::{
        ProviderDebug, ProviderError, ProviderOutcome, ProviderRequest, RetrievalProvider,
    };
    use tower::ServiceExt;

    struct EmptyProvider;

    #[async_trait::async_trait]
    impl RetrievalProvider for EmptyProvider {
        fn id(&self) -> &str {
            "empty"
        }

        async fn search(
            &self,
            request: &ProviderRequest,
        ) -> Result<ProviderOutcome, ProviderError> {
            Ok(ProviderOutcome {
                cases: Vec::new(),
                debug: ProviderDebug {
                    search_query: request.phrase.clone(),
                    ok: true,
                    ..Default::default()
                },
            })
        }
    }

    struct NoModel;

    #[async_trait::async_trait]
    impl precedent_reasoner::ReasonerModel for NoModel {
        async fn complete(&self, _system: &str, _user: &str) -> anyhow::Result<String> {
            anyhow::bail!("unavailable")
        }

        fn model_name(&self) -> &str {
            "none"
        }
    }

    fn test_router(rate_limit: i64) -> Router {
        let mut config = PipelineConfig {
            reasoner: ReasonerConfig {
                mode: ReasonerMode::Deterministic,
                ..Default::default()
            },
            ..Default::default()
        };
        config.api.ip_rate_limit = rate_limit;
        let cache = Arc::new(MemoryCache::new());
        let reasoner = Arc::new(ReasonerOrchestrator::new(
            cache.clone(),
            Arc::new(NoModel),
            config.reasoner.clone(),
        ));
        let engine = Arc::new(PipelineEngine::new(
            config,
            cache,
            reasoner,
            Arc::new(EmptyProvider),
        ));
        router(engine)
    }

    fn search_request(query: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/search")
            .header("content-type", "application/json")
            .header("x-forwarded-for", "10.0.0.1")
            .body(Body::from(
                serde_json::json!({"query": query}).to_string(),
            ))
            .unwrap()
    }

    #[tokio::test]
    async fn test_short_query_rejected_with_400() {
        let router = test_router(100);
        let response = router.oneshot(search_request("too short")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_search_returns_response_body() {
        let router = test_router(100);
        let response = router
            .oneshot(search_request(
                "delay condonation refused appeal dismissed limitation act",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert!(body.get("status").is_some());
        assert!(body.get("tier_counts").is_some());
        // Debug not requested, so the trace is stripped.
        assert_eq!(body["pipeline_trace"]["stages"].as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_rate_limit_yields_429() {
        let router = test_router(1);
        let first = router
            .clone()
            .oneshot(search_request(
                "delay condonation refused appeal dismissed limitation act",
            ))
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::OK);
        let second = router
            .oneshot(search_request(
                "delay condonation refused appeal dismissed limitation act",
            ))
            .await
            .unwrap();
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
        let bytes = axum::body::to_bytes(second.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert!(body["retry_after_ms"].as_u64().is_some());
    }

    #[tokio::test]
    async fn test_plan_endpoint_returns_variants() {
        let router = test_router(100);
        let request = Request::builder()
            .method("POST")
            .uri("/api/search/plan")
            .header("content-type", "application/json")
            .header("x-forwarded-for", "10.0.0.2")
            .body(Body::from(
                serde_json::json!({
                    "query": "fir quashed under section 482 crpc civil in nature"
                })
                .to_string(),
            ))
            .unwrap();
        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert!(!body["variants"].as_array().unwrap().is_empty());
        assert!(body["checklist"]["hook_groups"]
            .as_array()
            .unwrap()
            .iter()
            .any(|g| g["group_id"] == "sec_482_crpc"));
    }

    #[tokio::test]
    async fn test_finalize_gates_client_candidates() {
        let router = test_router(100);
        let request = Request::builder()
            .method("POST")
            .uri("/api/search/finalize")
            .header("content-type", "application/json")
            .header("x-forwarded-for", "10.0.0.3")
            .body(Body::from(
                serde_json::json!({
                    "query": "fir quashed under section 482 crpc civil in nature",
                    "candidates": [{
                        "url": "https://k.example/doc/1/",
                        "title": "A vs State of Maharashtra",
                        "snippet": "petition under section 482 crpc; allegations civil in nature; fir quashed",
                        "court": "HC",
                        "court_text": null,
                        "detail_text": null,
                        "detail_artifact": null,
                        "cites_count": null,
                        "cited_by_count": null,
                        "full_document_url": null
                    }]
                })
                .to_string(),
            ))
            .unwrap();
        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        let counts = &body["tier_counts"];
        let total = counts["strict"].as_u64().unwrap()
            + counts["provisional"].as_u64().unwrap()
            + counts["exploratory"].as_u64().unwrap();
        assert!(total >= 1);
    }

    #[tokio::test]
    async fn test_health_probe_reports_failure_without_500() {
        let router = test_router(100);
        let request = Request::builder()
            .method("GET")
            .uri("/api/health/bedrock?timeout_ms=300")
            .body(Body::empty())
            .unwrap();
        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["ok"], false);
        assert_eq!(body["model"], "none");
    }
}
