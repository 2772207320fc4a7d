//! Bundled retrieval providers.
//!
//! Both are thin reqwest clients behind [`RetrievalProvider`]. Parsing is
//! deliberately conservative: a page that does not look like results
//! yields an empty outcome with diagnostics, never a guess.

use crate::provider::{
    BlockedType, DetailDocument, ProviderDebug, ProviderError, ProviderOutcome, ProviderRequest,
    RetrievalProvider,
};
use async_trait::async_trait;
use precedent_core::{CaseCandidate, Court};
use regex::Regex;
use std::sync::LazyLock;
use std::sync::Mutex;
use std::time::{Duration, Instant};

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").unwrap());

static DOC_LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"<a\s+href="(/doc/\d+/)"[^>]*>(.*?)</a>"#).unwrap());

const CHALLENGE_MARKERS: &[&str] = &[
    "cf-browser-verification",
    "challenge-platform",
    "just a moment",
];

/// Strips markup and collapses whitespace.
fn strip_tags(html: &str) -> String {
    let text = TAG_RE.replace_all(html, " ");
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Court attribution from title / URL / source court string.
pub fn infer_court(title: &str, url: &str, court_text: Option<&str>) -> Court {
    let haystack = format!(
        "{} {} {}",
        title.to_lowercase(),
        url.to_lowercase(),
        court_text.map(|t| t.to_lowercase()).unwrap_or_default()
    );
    if haystack.contains("supreme court") || haystack.contains("supremecourt") {
        Court::Supreme
    } else if haystack.contains("high court") || haystack.contains("highcourt") {
        Court::High
    } else {
        Court::Unknown
    }
}

/// Lexical HTML case-law source; supports detail fetches.
pub struct LexicalCaseLawProvider {
    base_url: String,
    client: reqwest::Client,
    cooldown_until: Mutex<Option<Instant>>,
}

impl LexicalCaseLawProvider {
    /// Creates a provider against the given base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: reqwest::Client::new(),
            cooldown_until: Mutex::new(None),
        }
    }

    /// Composes the provider query string from a request.
    pub fn compose_query(request: &ProviderRequest) -> String {
        let mut query = request
            .compiled_query
            .clone()
            .unwrap_or_else(|| request.phrase.clone());
        if let Some(court_type) = &request.court_type {
            query.push_str(&format!(" doctypes: {court_type}"));
        } else if !request.doctype_profile.is_empty() {
            query.push_str(&format!(" doctypes: {}", request.doctype_profile));
        }
        if let Some(from) = &request.from_date {
            query.push_str(&format!(" fromdate: {from}"));
        }
        if let Some(to) = &request.to_date {
            query.push_str(&format!(" todate: {to}"));
        }
        if request.sort_by_most_recent {
            query.push_str(" sortby: mostrecent");
        }
        query
    }

    /// Parses result links out of a search page.
    pub fn parse_results(&self, html: &str) -> Vec<CaseCandidate> {
        let mut cases = Vec::new();
        for capture in DOC_LINK_RE.captures_iter(html) {
            let path = &capture[1];
            let title = strip_tags(&capture[2]);
            if title.is_empty() {
                continue;
            }
            let url = format!("{}{path}", self.base_url);
            let court = infer_court(&title, &url, None);
            cases.push(CaseCandidate {
                court,
                ..CaseCandidate::new(url, title)
            });
        }
        cases
    }

    fn cooldown_remaining_ms(&self) -> Option<u64> {
        let guard = self.cooldown_until.lock().ok()?;
        let until = (*guard)?;
        let now = Instant::now();
        (until > now).then(|| (until - now).as_millis() as u64)
    }

    fn enter_cooldown(&self, duration_ms: u64) {
        if let Ok(mut guard) = self.cooldown_until.lock() {
            *guard = Some(Instant::now() + Duration::from_millis(duration_ms));
        }
    }
}

#[async_trait]
impl RetrievalProvider for LexicalCaseLawProvider {
    fn id(&self) -> &str {
        "lexical"
    }

    fn supports_detail_fetch(&self) -> bool {
        true
    }

    async fn search(&self, request: &ProviderRequest) -> Result<ProviderOutcome, ProviderError> {
        let query = Self::compose_query(request);
        let mut debug = ProviderDebug {
            search_query: query.clone(),
            parser_mode: "html".to_string(),
            ..Default::default()
        };

        if let Some(remaining) = self.cooldown_remaining_ms() {
            debug.cooldown_active = true;
            debug.blocked_type = Some(BlockedType::LocalCooldown);
            debug.retry_after_ms = Some(remaining);
            return Err(ProviderError::new("provider cooling down", debug));
        }

        let mut cases = Vec::new();
        let started = Instant::now();
        let mut retries_429 = 0u32;
        let mut page = 0usize;
        while page < request.max_pages.max(1) {
            if started.elapsed().as_millis() as u64 >= request.crawl_max_elapsed_ms {
                break;
            }
            let response = self
                .client
                .get(format!("{}/search/", self.base_url))
                .query(&[("formInput", query.as_str()), ("pagenum", &page.to_string())])
                .timeout(Duration::from_millis(request.fetch_timeout_ms))
                .send()
                .await;

            let response = match response {
                Ok(response) => response,
                Err(error) => {
                    debug.timed_out = error.is_timeout();
                    debug.error = Some(error.to_string());
                    return Ok(ProviderOutcome {
                        cases,
                        debug,
                    });
                }
            };

            let status = response.status();
            debug.status = Some(status.as_u16());

            if status.as_u16() == 429 {
                let retry_after_ms = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                    .map(|secs| secs * 1000)
                    .unwrap_or(2_000)
                    .min(request.max_retry_after_ms);
                if retries_429 < request.max_429_retries {
                    retries_429 += 1;
                    tokio::time::sleep(Duration::from_millis(retry_after_ms.min(1_500))).await;
                    continue;
                }
                self.enter_cooldown(retry_after_ms.max(2_000));
                debug.blocked_type = Some(BlockedType::RateLimit);
                debug.retry_after_ms = Some(retry_after_ms);
                return Ok(ProviderOutcome { cases, debug });
            }

            let body = match response.text().await {
                Ok(body) => body,
                Err(error) => {
                    debug.error = Some(error.to_string());
                    return Ok(ProviderOutcome { cases, debug });
                }
            };

            let lowered = body.to_lowercase();
            if status.as_u16() == 403
                || CHALLENGE_MARKERS.iter().any(|marker| lowered.contains(marker))
            {
                debug.challenge_detected = true;
                debug.blocked_type = Some(BlockedType::CloudflareChallenge);
                debug.html_preview = Some(body.chars().take(160).collect());
                return Ok(ProviderOutcome { cases, debug });
            }

            let page_cases = self.parse_results(&body);
            debug.pages_scanned += 1;
            if page_cases.is_empty() {
                if debug.pages_scanned == 1 {
                    debug.html_preview = Some(body.chars().take(160).collect());
                }
                break;
            }
            cases.extend(page_cases);
            if cases.len() >= request.max_results_per_phrase {
                cases.truncate(request.max_results_per_phrase);
                break;
            }
            page += 1;
        }

        debug.ok = true;
        debug.parsed_count = cases.len();
        Ok(ProviderOutcome { cases, debug })
    }

    async fn fetch_detail(
        &self,
        url: &str,
        fetch_timeout_ms: u64,
    ) -> Result<DetailDocument, ProviderError> {
        let response = self
            .client
            .get(url)
            .timeout(Duration::from_millis(fetch_timeout_ms))
            .send()
            .await
            .map_err(|error| {
                ProviderError::new(
                    error.to_string(),
                    ProviderDebug {
                        search_query: url.to_string(),
                        timed_out: error.is_timeout(),
                        ..Default::default()
                    },
                )
            })?;
        let body = response.text().await.map_err(|error| {
            ProviderError::new(
                error.to_string(),
                ProviderDebug {
                    search_query: url.to_string(),
                    ..Default::default()
                },
            )
        })?;
        Ok(DetailDocument {
            text: strip_tags(&body),
            full_document_url: Some(url.to_string()),
        })
    }
}

/// Serper-style web search provider. Snippet-only: no detail fetch, so
/// candidates found here never pass the detail-checked confidence gate.
pub struct SerperProvider {
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

impl SerperProvider {
    /// Creates a provider with the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: "https://google.serper.dev".to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Sets a custom base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Parses the organic results array of a response body.
    pub fn parse_organic(body: &serde_json::Value) -> Vec<CaseCandidate> {
        let Some(organic) = body.get("organic").and_then(|v| v.as_array()) else {
            return Vec::new();
        };
        organic
            .iter()
            .filter_map(|entry| {
                let link = entry.get("link")?.as_str()?;
                let title = entry.get("title")?.as_str()?;
                let snippet = entry
                    .get("snippet")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default();
                Some(CaseCandidate {
                    snippet: snippet.to_string(),
                    court: infer_court(title, link, None),
                    ..CaseCandidate::new(link, title)
                })
            })
            .collect()
    }
}

#[async_trait]
impl RetrievalProvider for SerperProvider {
    fn id(&self) -> &str {
        "serper"
    }

    async fn search(&self, request: &ProviderRequest) -> Result<ProviderOutcome, ProviderError> {
        let query = format!("{} indian judgment", request.phrase);
        let mut debug = ProviderDebug {
            search_query: query.clone(),
            parser_mode: "json".to_string(),
            ..Default::default()
        };

        let response = self
            .client
            .post(format!("{}/search", self.base_url))
            .header("X-API-KEY", &self.api_key)
            .json(&serde_json::json!({
                "q": query,
                "num": request.max_results_per_phrase,
            }))
            .timeout(Duration::from_millis(request.fetch_timeout_ms))
            .send()
            .await;

        let response = match response {
            Ok(response) => response,
            Err(error) => {
                debug.timed_out = error.is_timeout();
                debug.error = Some(error.to_string());
                return Ok(ProviderOutcome {
                    cases: Vec::new(),
                    debug,
                });
            }
        };

        let status = response.status();
        debug.status = Some(status.as_u16());
        if status.as_u16() == 429 {
            debug.blocked_type = Some(BlockedType::RateLimit);
            debug.retry_after_ms = Some(2_000.min(request.max_retry_after_ms));
            return Ok(ProviderOutcome {
                cases: Vec::new(),
                debug,
            });
        }

        let body: serde_json::Value = match response.json().await {
            Ok(body) => body,
            Err(error) => {
                debug.error = Some(error.to_string());
                return Ok(ProviderOutcome {
                    cases: Vec::new(),
                    debug,
                });
            }
        };

        let cases = Self::parse_organic(&body);
        debug.ok = true;
        debug.parsed_count = cases.len();
        debug.pages_scanned = 1;
        Ok(ProviderOutcome { cases, debug })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compose_query_with_filters() {
        let request = ProviderRequest {
            phrase: "condonation refused appeal".to_string(),
            court_type: Some("supremecourt".to_string()),
            from_date: Some("1-1-2015".to_string()),
            to_date: Some("31-12-2015".to_string()),
            ..Default::default()
        };
        let query = LexicalCaseLawProvider::compose_query(&request);
        assert_eq!(
            query,
            "condonation refused appeal doctypes: supremecourt fromdate: 1-1-2015 todate: 31-12-2015"
        );
    }

    #[test]
    fn test_parse_results_extracts_doc_links() {
        let provider = LexicalCaseLawProvider::new("https://k.example");
        let html = r#"
            <div class="result_title"><a href="/doc/123/">State of <b>Punjab</b> vs Sarwan Singh</a></div>
            <div class="result_title"><a href="/doc/456/">Collector vs Mst Katiji on 19 February, 1987 - Supreme Court</a></div>
            <a href="/browse/">browse</a>
        "#;
        let cases = provider.parse_results(html);
        assert_eq!(cases.len(), 2);
        assert_eq!(cases[0].url, "https://k.example/doc/123/");
        assert_eq!(cases[0].title, "State of Punjab vs Sarwan Singh");
        assert_eq!(cases[1].court, Court::Supreme);
    }

    #[test]
    fn test_infer_court() {
        assert_eq!(
            infer_court("A vs B", "https://x/doc/1/", Some("Supreme Court of India")),
            Court::Supreme
        );
        assert_eq!(
            infer_court("A vs B - Bombay High Court", "https://x/doc/2/", None),
            Court::High
        );
        assert_eq!(infer_court("A vs B", "https://x/doc/3/", None), Court::Unknown);
    }

    #[test]
    fn test_parse_organic() {
        let body = serde_json::json!({
            "organic": [
                {"title": "A vs B - Supreme Court", "link": "https://x/doc/1/", "snippet": "delay condoned"},
                {"title": "noise", "link": "https://x/page"},
                {"notalink": true}
            ]
        });
        let cases = SerperProvider::parse_organic(&body);
        assert_eq!(cases.len(), 2);
        assert_eq!(cases[0].court, Court::Supreme);
        assert_eq!(cases[0].snippet, "delay condoned");
    }

    #[test]
    fn test_serper_has_no_detail_fetch() {
        let provider = SerperProvider::new("key");
        assert!(!provider.supports_detail_fetch());
    }
}
