//! Second-stage verification: detail fetches and evidence windows.
//!
//! Up to `verify_limit` shortlisted candidates get a detail fetch when
//! the provider supports one. The fetched body is condensed into
//! evidence windows, the ratio-like sentences the proposition gate runs
//! its proximity checks against. A failed fetch leaves the candidate
//! unchecked but still in play with a minimal artifact from its snippet.

use precedent_core::{CaseCandidate, DetailArtifact, PropositionChecklist};
use precedent_core::lexicon;
use precedent_retrieval::{passes_case_filter, RetrievalProvider};
use serde::{Deserialize, Serialize};

/// Verifier knobs.
#[derive(Debug, Clone)]
pub struct VerifierConfig {
    /// Candidates to attempt a detail fetch for.
    pub verify_limit: usize,
    pub fetch_timeout_ms: u64,
    /// Maximum characters per evidence window.
    pub window_chars: usize,
    /// Maximum evidence windows per candidate.
    pub max_windows: usize,
    /// Sentences kept as body excerpt.
    pub excerpt_sentences: usize,
    pub strict_case_only: bool,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            verify_limit: 6,
            fetch_timeout_ms: 3_000,
            window_chars: 240,
            max_windows: 8,
            excerpt_sentences: 3,
            strict_case_only: true,
        }
    }
}

/// Summary statistics of one verification pass.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct VerifierStats {
    pub attempted: usize,
    pub detail_fetched: usize,
    pub detail_fetch_failed: usize,
    /// Fraction of attempted candidates that ended up with a detail body.
    pub detail_hydration_coverage: f64,
    pub passed_case_gate: usize,
}

fn sentences(text: &str) -> impl Iterator<Item = &str> {
    text.split(['.', ';', '\n'])
        .map(str::trim)
        .filter(|s| s.len() > 20)
}

fn checklist_terms(checklist: &PropositionChecklist) -> Vec<String> {
    let mut terms: Vec<String> = Vec::new();
    for group in &checklist.hook_groups {
        terms.extend(group.terms.iter().cloned());
    }
    terms.extend(checklist.outcome_constraint.terms.iter().cloned());
    for chain in &checklist.graph.chain_constraints {
        terms.extend(chain.left_terms.iter().cloned());
        terms.extend(chain.right_terms.iter().cloned());
    }
    terms.extend(checklist.graph.mandatory_steps.iter().cloned());
    terms
}

/// Extracts ratio-like sentences from a judgment body.
///
/// A sentence qualifies when it carries at least one checklist term; each
/// window is truncated to the configured size.
pub fn extract_evidence_windows(
    text: &str,
    checklist: &PropositionChecklist,
    window_chars: usize,
    max_windows: usize,
) -> Vec<String> {
    let terms = checklist_terms(checklist);
    let mut windows = Vec::new();
    for sentence in sentences(text) {
        let lowered = sentence.to_lowercase();
        if terms.iter().any(|term| lexicon::contains_term(&lowered, term)) {
            let window: String = sentence.chars().take(window_chars).collect();
            windows.push(window);
            if windows.len() >= max_windows {
                break;
            }
        }
    }
    windows
}

fn fallback_artifact(candidate: &CaseCandidate, config: &VerifierConfig) -> DetailArtifact {
    let excerpt: Vec<String> = sentences(&candidate.snippet)
        .take(config.excerpt_sentences)
        .map(|s| s.chars().take(config.window_chars).collect())
        .collect();
    DetailArtifact {
        evidence_windows: excerpt.clone(),
        body_excerpt: excerpt,
    }
}

/// Runs verification over a shortlist, mutating candidates in place.
pub async fn verify_candidates(
    provider: &dyn RetrievalProvider,
    candidates: &mut [CaseCandidate],
    checklist: &PropositionChecklist,
    config: &VerifierConfig,
) -> VerifierStats {
    let mut stats = VerifierStats::default();
    stats.passed_case_gate = candidates
        .iter()
        .filter(|c| passes_case_filter(c, config.strict_case_only))
        .count();

    let detail_capable = provider.supports_detail_fetch();
    for candidate in candidates.iter_mut().take(config.verify_limit) {
        stats.attempted += 1;
        if !detail_capable {
            if candidate.detail_artifact.is_none() {
                candidate.detail_artifact = Some(fallback_artifact(candidate, config));
            }
            continue;
        }
        match provider
            .fetch_detail(&candidate.url, config.fetch_timeout_ms)
            .await
        {
            Ok(document) => {
                stats.detail_fetched += 1;
                let windows = extract_evidence_windows(
                    &document.text,
                    checklist,
                    config.window_chars,
                    config.max_windows,
                );
                let excerpt: Vec<String> = sentences(&document.text)
                    .take(config.excerpt_sentences)
                    .map(|s| s.chars().take(config.window_chars).collect())
                    .collect();
                if candidate.full_document_url.is_none() {
                    candidate.full_document_url = document.full_document_url.clone();
                }
                candidate.detail_text = Some(document.text);
                candidate.detail_artifact = Some(DetailArtifact {
                    evidence_windows: windows,
                    body_excerpt: excerpt,
                });
            }
            Err(error) => {
                stats.detail_fetch_failed += 1;
                tracing::debug!(url = %candidate.url, %error, "detail fetch failed");
                if candidate.detail_artifact.is_none() {
                    candidate.detail_artifact = Some(fallback_artifact(candidate, config));
                }
            }
        }
    }

    stats.detail_hydration_coverage = if stats.attempted == 0 {
        0.0
    } else {
        stats.detail_fetched as f64 / stats.attempted as f64
    };
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use precedent_core::{build_proposition_checklist, profile_query};
    use precedent_retrieval::{
        DetailDocument, ProviderDebug, ProviderError, ProviderOutcome, ProviderRequest,
    };

    struct DetailProvider {
        text: String,
        fail: bool,
    }

    #[async_trait::async_trait]
    impl RetrievalProvider for DetailProvider {
        fn id(&self) -> &str {
            "detail"
        }

        fn supports_detail_fetch(&self) -> bool {
            true
        }

        async fn search(
            &self,
            _request: &ProviderRequest,
        ) -> Result<ProviderOutcome, ProviderError> {
            Ok(ProviderOutcome::default())
        }

        async fn fetch_detail(
            &self,
            _url: &str,
            _fetch_timeout_ms: u64,
        ) -> Result<DetailDocument, ProviderError> {
            if self.fail {
                return Err(ProviderError::new("down", ProviderDebug::default()));
            }
            Ok(DetailDocument {
                text: self.text.clone(),
                full_document_url: Some("https://k.example/doc/1/full".to_string()),
            })
        }
    }

    fn checklist() -> PropositionChecklist {
        let profile = profile_query(
            "State as appellant filed criminal appeal and delay condonation application was refused under section 5 of the Limitation Act",
        );
        build_proposition_checklist(&profile, None)
    }

    #[tokio::test]
    async fn test_detail_fetch_builds_evidence_windows() {
        let provider = DetailProvider {
            text: "The application for condonation of delay was refused by this Court. \
                   The appeal therefore stands dismissed as barred by limitation. \
                   Unrelated boilerplate follows here with enough length to be a sentence."
                .to_string(),
            fail: false,
        };
        let mut candidates = vec![CaseCandidate::new("https://k.example/doc/1/", "A vs B")];
        let stats = verify_candidates(
            &provider,
            &mut candidates,
            &checklist(),
            &VerifierConfig::default(),
        )
        .await;
        assert_eq!(stats.detail_fetched, 1);
        assert!((stats.detail_hydration_coverage - 1.0).abs() < f64::EPSILON);
        let artifact = candidates[0].detail_artifact.as_ref().unwrap();
        assert!(artifact
            .evidence_windows
            .iter()
            .any(|w| w.contains("condonation")));
        assert!(candidates[0].detail_text.is_some());
        assert_eq!(
            candidates[0].full_document_url.as_deref(),
            Some("https://k.example/doc/1/full")
        );
    }

    #[tokio::test]
    async fn test_failed_fetch_leaves_fallback_artifact() {
        let provider = DetailProvider {
            text: String::new(),
            fail: true,
        };
        let mut candidates = vec![CaseCandidate {
            snippet: "The delay condonation application was refused and the appeal was dismissed."
                .to_string(),
            ..CaseCandidate::new("https://k.example/doc/1/", "A vs B")
        }];
        let stats = verify_candidates(
            &provider,
            &mut candidates,
            &checklist(),
            &VerifierConfig::default(),
        )
        .await;
        assert_eq!(stats.detail_fetch_failed, 1);
        assert!(candidates[0].detail_text.is_none());
        assert!(candidates[0].detail_artifact.is_some());
    }

    #[tokio::test]
    async fn test_verify_limit_respected() {
        let provider = DetailProvider {
            text: "The condonation of delay was refused in this matter by the court".to_string(),
            fail: false,
        };
        let mut candidates: Vec<CaseCandidate> = (0..5)
            .map(|i| CaseCandidate::new(format!("https://k.example/doc/{i}/"), "A vs B"))
            .collect();
        let config = VerifierConfig {
            verify_limit: 2,
            ..Default::default()
        };
        let stats =
            verify_candidates(&provider, &mut candidates, &checklist(), &config).await;
        assert_eq!(stats.attempted, 2);
        assert_eq!(stats.detail_fetched, 2);
        assert!(candidates[2].detail_text.is_none());
    }

    #[test]
    fn test_windows_truncated() {
        let long_sentence = format!(
            "The condonation application was refused because {}",
            "reason ".repeat(80)
        );
        let windows = extract_evidence_windows(&long_sentence, &checklist(), 100, 4);
        assert_eq!(windows.len(), 1);
        assert!(windows[0].chars().count() <= 100);
    }
}
