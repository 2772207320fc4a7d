//! Property-based tests for phrase normalization and candidate merging.

use precedent_core::{CaseCandidate, Court};
use precedent_retrieval::{normalize_phrase, Phase};
use proptest::prelude::*;

proptest! {
    #[test]
    fn normalized_phrases_respect_token_limits(raw in "[a-zA-Z0-9 :.]{0,200}") {
        for phase in Phase::ALL {
            if let Some(phrase) = normalize_phrase(&raw, phase) {
                let tokens: Vec<&str> = phrase.split_whitespace().collect();
                prop_assert!(tokens.len() >= 2);
                prop_assert!(tokens.len() <= phase.token_limit());
                for token in tokens {
                    prop_assert!(!["supreme", "high", "court", "sc", "hc"].contains(&token));
                    prop_assert_eq!(token.to_lowercase(), token.to_string());
                }
            }
        }
    }

    #[test]
    fn merge_preserves_url_and_never_loses_detail(
        snippet_a in "[a-z ]{0,80}",
        snippet_b in "[a-z ]{0,80}",
        detail_on_a in any::<bool>(),
        court_known_on_b in any::<bool>(),
    ) {
        let a = CaseCandidate {
            snippet: snippet_a,
            detail_text: detail_on_a.then(|| "judgment body".to_string()),
            ..CaseCandidate::new("https://k.example/doc/1/", "A vs B")
        };
        let b = CaseCandidate {
            snippet: snippet_b,
            court: if court_known_on_b { Court::Supreme } else { Court::Unknown },
            ..CaseCandidate::new("https://k.example/doc/1/", "A vs B")
        };
        let had_detail = a.detail_text.is_some();
        let had_court = b.court != Court::Unknown;
        let longest = a.snippet.len().max(b.snippet.len());
        let merged = a.merge(b);
        prop_assert_eq!(merged.url, "https://k.example/doc/1/");
        prop_assert_eq!(merged.detail_text.is_some(), had_detail);
        prop_assert_eq!(merged.court != Court::Unknown, had_court);
        prop_assert!(merged.snippet.len() >= longest);
    }
}
