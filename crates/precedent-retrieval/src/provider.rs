//! The retrieval provider seam.
//!
//! Providers return a `(cases, debug)` pair and errors carry the same
//! debug shape by contract; the scheduler never unwraps provider
//! internals.

use crate::variant::QueryMode;
use async_trait::async_trait;
use precedent_core::{CaseCandidate, CourtHint};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a provider refused to serve the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockedType {
    /// The provider itself is cooling down; terminal for the request.
    LocalCooldown,
    /// An anti-bot challenge page was served.
    CloudflareChallenge,
    /// HTTP 429.
    RateLimit,
}

/// One search request to a provider.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProviderRequest {
    pub phrase: String,
    pub court_scope: CourtHint,
    pub max_results_per_phrase: usize,
    pub max_pages: usize,
    /// Provider-specific court filter string, when the phase keeps filters.
    pub court_type: Option<String>,
    pub from_date: Option<String>,
    pub to_date: Option<String>,
    pub sort_by_most_recent: bool,
    pub crawl_max_elapsed_ms: u64,
    pub fetch_timeout_ms: u64,
    pub max_429_retries: u32,
    pub max_retry_after_ms: u64,
    pub cooldown_scope: Option<String>,
    /// Pre-compiled provider query, when the planner built one.
    pub compiled_query: Option<String>,
    pub include_tokens: Vec<String>,
    pub exclude_tokens: Vec<String>,
    pub provider_hints: Option<serde_json::Value>,
    pub query_mode: QueryMode,
    pub doctype_profile: String,
    pub variant_priority: i32,
}

/// Structured debug information for one provider call.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProviderDebug {
    pub search_query: String,
    pub status: Option<u16>,
    pub ok: bool,
    pub parsed_count: usize,
    pub parser_mode: String,
    pub pages_scanned: usize,
    pub challenge_detected: bool,
    pub cooldown_active: bool,
    pub retry_after_ms: Option<u64>,
    pub blocked_type: Option<BlockedType>,
    pub timed_out: bool,
    /// First bytes of an unparseable page, for diagnostics.
    pub html_preview: Option<String>,
    pub error: Option<String>,
}

/// A provider search result.
#[derive(Debug, Clone, Default)]
pub struct ProviderOutcome {
    pub cases: Vec<CaseCandidate>,
    pub debug: ProviderDebug,
}

/// A detail document fetched for verification.
#[derive(Debug, Clone, Default)]
pub struct DetailDocument {
    /// Judgment body text.
    pub text: String,
    /// Canonical document URL, when it differs from the search hit.
    pub full_document_url: Option<String>,
}

/// Provider error; always carries the debug shape.
#[derive(Debug, Clone, Error)]
#[error("provider error: {message}")]
pub struct ProviderError {
    pub message: String,
    pub debug: ProviderDebug,
}

impl ProviderError {
    /// Builds an error with a matching debug payload.
    pub fn new(message: impl Into<String>, debug: ProviderDebug) -> Self {
        let message = message.into();
        Self { message, debug }
    }
}

/// A pluggable case-law source.
#[async_trait]
pub trait RetrievalProvider: Send + Sync {
    /// Stable provider id.
    fn id(&self) -> &str;

    /// Whether [`RetrievalProvider::fetch_detail`] is implemented.
    fn supports_detail_fetch(&self) -> bool {
        false
    }

    /// Executes one search.
    async fn search(&self, request: &ProviderRequest) -> Result<ProviderOutcome, ProviderError>;

    /// Fetches the detail document for a candidate URL.
    async fn fetch_detail(
        &self,
        url: &str,
        fetch_timeout_ms: u64,
    ) -> Result<DetailDocument, ProviderError> {
        let _ = (url, fetch_timeout_ms);
        Err(ProviderError::new(
            "detail fetch not supported",
            ProviderDebug::default(),
        ))
    }
}
