//! Candidate classification: judgment, statute, noise, or unknown.
//!
//! Used by the scheduler for utility accounting and by the verifier for
//! the strict-case-only filter. Rejections carry short reason codes.

use precedent_core::CaseCandidate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// What a retrieved result appears to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateKind {
    /// A judgment.
    Case,
    /// A bare statute text.
    Statute,
    /// Clearly not a judgment or statute.
    Noise,
    /// Indeterminate.
    Unknown,
}

/// Classification with reason codes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub kind: CandidateKind,
    pub reasons: Vec<String>,
}

static VERSUS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:vs\.?|v\.?|versus)\b").unwrap());

static STATUTE_TITLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:the\s+)?[a-z ,]+act(?:,?\s*\d{4})?$").unwrap()
});

static SECTION_IN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(?:section|article)\s+\d+[a-z]?\s+in\b").unwrap());

/// Classifies one candidate.
pub fn classify(candidate: &CaseCandidate) -> Classification {
    let title = candidate.title.trim();
    if title.is_empty() || candidate.url.is_empty() {
        return Classification {
            kind: CandidateKind::Noise,
            reasons: vec!["empty_title_or_url".to_string()],
        };
    }
    if candidate.url.contains("/search") || candidate.url.ends_with('#') {
        return Classification {
            kind: CandidateKind::Noise,
            reasons: vec!["search_artifact_url".to_string()],
        };
    }
    if SECTION_IN_RE.is_match(title) {
        return Classification {
            kind: CandidateKind::Statute,
            reasons: vec!["title_bare_section".to_string()],
        };
    }
    if STATUTE_TITLE_RE.is_match(title) {
        return Classification {
            kind: CandidateKind::Statute,
            reasons: vec!["title_statute_prefix".to_string()],
        };
    }
    if VERSUS_RE.is_match(title) {
        return Classification {
            kind: CandidateKind::Case,
            reasons: Vec::new(),
        };
    }
    if candidate
        .court_text
        .as_deref()
        .is_some_and(|text| text.to_lowercase().contains("court"))
    {
        return Classification {
            kind: CandidateKind::Case,
            reasons: vec!["court_text_attribution".to_string()],
        };
    }
    Classification {
        kind: CandidateKind::Unknown,
        reasons: vec!["title_no_versus_separator".to_string()],
    }
}

/// True for candidates the scheduler counts as case-like.
pub fn is_case_like(candidate: &CaseCandidate) -> bool {
    classify(candidate).kind == CandidateKind::Case
}

/// True for candidates the strict-case-only filter keeps.
pub fn passes_case_filter(candidate: &CaseCandidate, strict_case_only: bool) -> bool {
    if !strict_case_only {
        return classify(candidate).kind != CandidateKind::Noise;
    }
    matches!(
        classify(candidate).kind,
        CandidateKind::Case | CandidateKind::Unknown
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(url: &str, title: &str) -> CaseCandidate {
        CaseCandidate::new(url, title)
    }

    #[test]
    fn test_judgment_titles() {
        for title in [
            "State of Punjab vs Sarwan Singh",
            "Pundlik Jalam Patil v. Jalgaon Medical College",
            "Collector, Land Acquisition versus Mst. Katiji",
        ] {
            assert_eq!(
                classify(&candidate("https://example.org/doc/1/", title)).kind,
                CandidateKind::Case
            );
        }
    }

    #[test]
    fn test_statute_titles() {
        let classification =
            classify(&candidate("https://example.org/doc/2/", "The Limitation Act, 1963"));
        assert_eq!(classification.kind, CandidateKind::Statute);
        assert_eq!(classification.reasons, vec!["title_statute_prefix".to_string()]);

        let classification = classify(&candidate(
            "https://example.org/doc/3/",
            "Section 5 in The Limitation Act, 1963",
        ));
        assert_eq!(classification.kind, CandidateKind::Statute);
        assert_eq!(classification.reasons, vec!["title_bare_section".to_string()]);
    }

    #[test]
    fn test_noise_and_unknown() {
        assert_eq!(
            classify(&candidate("https://example.org/search?q=x", "Results")).kind,
            CandidateKind::Noise
        );
        let classification = classify(&candidate("https://example.org/doc/4/", "Some order"));
        assert_eq!(classification.kind, CandidateKind::Unknown);
        assert_eq!(classification.reasons, vec!["title_no_versus_separator".to_string()]);
    }

    #[test]
    fn test_strict_case_filter() {
        let case = candidate("https://example.org/doc/1/", "A vs B");
        let statute = candidate("https://example.org/doc/2/", "The Limitation Act");
        let unknown = candidate("https://example.org/doc/3/", "Order sheet");
        assert!(passes_case_filter(&case, true));
        assert!(!passes_case_filter(&statute, true));
        assert!(passes_case_filter(&unknown, true));
        assert!(passes_case_filter(&statute, false));
    }
}
