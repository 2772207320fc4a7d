//! Context scorer: a [0, 1] blend of lexical match and proposition axis
//! coverage.
//!
//! The weight split between the deterministic keyword signals and the
//! canonical lexical profile is not settled doctrine; every weight is a
//! struct field so deployments can tune the blend without a rebuild.

use precedent_core::lexicon;
use precedent_core::{CaseCandidate, IntentProfile, PropositionChecklist};
use precedent_retrieval::QueryVariant;
use serde::{Deserialize, Serialize};

/// Tuneable scorer weights; they sum to 1.0 at the defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScorerWeights {
    pub issues: f64,
    pub procedures: f64,
    pub anchors: f64,
    pub hook_groups: f64,
    pub outcome: f64,
    pub strict_tokens: f64,
    pub citation_metadata: f64,
    /// Flat deduction when a contradiction token is visible.
    pub contradiction_penalty: f64,
}

impl Default for ScorerWeights {
    fn default() -> Self {
        Self {
            issues: 0.20,
            procedures: 0.15,
            anchors: 0.05,
            hook_groups: 0.25,
            outcome: 0.20,
            strict_tokens: 0.10,
            citation_metadata: 0.05,
            contradiction_penalty: 0.20,
        }
    }
}

/// Canonical lexical profile shared by scoring and gating.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LexicalProfile {
    pub must_include_tokens: Vec<String>,
    pub strict_variant_tokens: Vec<String>,
    pub checklist_tokens: Vec<String>,
    pub contradiction_tokens: Vec<String>,
}

/// Builds the lexical profile from the checklist and the strict variants.
pub fn build_lexical_profile(
    checklist: &PropositionChecklist,
    variants: &[QueryVariant],
) -> LexicalProfile {
    let mut profile = LexicalProfile::default();
    for variant in variants {
        if variant.phase == precedent_retrieval::Phase::Primary {
            for token in &variant.tokens {
                push_unique(&mut profile.strict_variant_tokens, token.clone());
            }
            for token in &variant.must_include_tokens {
                push_unique(&mut profile.must_include_tokens, token.clone());
            }
        }
    }
    for group in &checklist.hook_groups {
        for term in &group.terms {
            for token in lexicon::tokenize(term) {
                push_unique(&mut profile.checklist_tokens, token);
            }
        }
    }
    for term in &checklist.outcome_constraint.terms {
        for token in lexicon::tokenize(term) {
            push_unique(&mut profile.checklist_tokens, token);
        }
    }
    profile.contradiction_tokens = checklist
        .outcome_constraint
        .contradiction_terms
        .clone();
    profile
}

fn push_unique(list: &mut Vec<String>, value: String) {
    if !list.contains(&value) {
        list.push(value);
    }
}

fn matched_fraction(text: &str, terms: &[String]) -> f64 {
    if terms.is_empty() {
        return 0.0;
    }
    let hits = terms
        .iter()
        .filter(|term| lexicon::contains_term(text, term))
        .count();
    hits as f64 / terms.len() as f64
}

fn candidate_text(candidate: &CaseCandidate) -> String {
    let mut text = format!("{} {}", candidate.title, candidate.snippet);
    if let Some(artifact) = &candidate.detail_artifact {
        for excerpt in &artifact.body_excerpt {
            text.push(' ');
            text.push_str(excerpt);
        }
    }
    text.to_lowercase()
}

/// Scores one candidate against the request context.
///
/// Returns the score and the human-readable reasons that earned it.
pub fn score_candidate(
    intent: &IntentProfile,
    checklist: &PropositionChecklist,
    lexical: &LexicalProfile,
    candidate: &CaseCandidate,
    weights: &ScorerWeights,
) -> (f64, Vec<String>) {
    let text = candidate_text(candidate);
    let mut score = 0.0;
    let mut reasons = Vec::new();

    let issues = matched_fraction(&text, &intent.issues);
    if issues > 0.0 {
        score += weights.issues * issues;
        reasons.push(format!("issues matched ({:.0}%)", issues * 100.0));
    }
    let procedures = matched_fraction(&text, &intent.procedures);
    if procedures > 0.0 {
        score += weights.procedures * procedures;
        reasons.push(format!("procedures matched ({:.0}%)", procedures * 100.0));
    }
    let anchors = matched_fraction(&text, &intent.anchors);
    if anchors > 0.0 {
        score += weights.anchors * anchors;
        reasons.push("doctrinal anchor present".to_string());
    }

    let required_groups: Vec<_> = checklist.required_hook_groups().collect();
    if !required_groups.is_empty() {
        let satisfied = required_groups
            .iter()
            .filter(|group| {
                group
                    .terms
                    .iter()
                    .any(|term| lexicon::contains_term(&text, term))
            })
            .count();
        let coverage = satisfied as f64 / required_groups.len() as f64;
        score += weights.hook_groups * coverage;
        if coverage > 0.0 {
            reasons.push(format!(
                "statutory hooks matched ({satisfied}/{})",
                required_groups.len()
            ));
        }
    }

    let outcome_hit = checklist
        .outcome_constraint
        .terms
        .iter()
        .any(|term| lexicon::contains_affirmative_term(&text, term));
    if outcome_hit {
        score += weights.outcome;
        reasons.push("outcome language present".to_string());
    }

    let strict_tokens = matched_fraction(&text, &lexical.strict_variant_tokens);
    score += weights.strict_tokens * strict_tokens;

    if candidate.cites_count.is_some() || candidate.cited_by_count.is_some() {
        score += weights.citation_metadata;
        reasons.push("citation metadata available".to_string());
    }

    let contradiction = lexical
        .contradiction_tokens
        .iter()
        .any(|term| lexicon::contains_affirmative_term(&text, term));
    if contradiction {
        score -= weights.contradiction_penalty;
        reasons.push("contradictory outcome language".to_string());
    }

    (score.clamp(0.0, 1.0), reasons)
}

#[cfg(test)]
mod tests {
    use super::*;
    use precedent_core::{build_proposition_checklist, profile_query};

    fn setup() -> (IntentProfile, PropositionChecklist, LexicalProfile) {
        let profile = profile_query(
            "State as appellant filed criminal appeal and delay condonation application was refused under section 5 of the Limitation Act",
        );
        let checklist = build_proposition_checklist(&profile, None);
        let variants = precedent_retrieval::build_variants(&profile, &checklist, None);
        let lexical = build_lexical_profile(&checklist, &variants);
        (profile, checklist, lexical)
    }

    #[test]
    fn test_on_point_candidate_outscores_off_point() {
        let (profile, checklist, lexical) = setup();
        let on_point = CaseCandidate {
            snippet: "application under section 5 of the limitation act for condonation of delay \
                      was refused and the criminal appeal was dismissed as barred"
                .to_string(),
            ..CaseCandidate::new("https://k.example/doc/1/", "State of Punjab vs Sarwan Singh")
        };
        let off_point = CaseCandidate {
            snippet: "suit for specific performance of an agreement to sell decreed".to_string(),
            ..CaseCandidate::new("https://k.example/doc/2/", "A vs B")
        };
        let (on_score, on_reasons) =
            score_candidate(&profile, &checklist, &lexical, &on_point, &ScorerWeights::default());
        let (off_score, _) =
            score_candidate(&profile, &checklist, &lexical, &off_point, &ScorerWeights::default());
        assert!(on_score > off_score);
        assert!(on_score > 0.4);
        assert!(!on_reasons.is_empty());
    }

    #[test]
    fn test_contradiction_penalised() {
        let (profile, checklist, lexical) = setup();
        let contradicted = CaseCandidate {
            snippet: "the delay was condoned and the appeal restored under section 5 limitation act"
                .to_string(),
            ..CaseCandidate::new("https://k.example/doc/3/", "C vs D")
        };
        let clean = CaseCandidate {
            snippet: "the delay was refused condonation under section 5 limitation act".to_string(),
            ..CaseCandidate::new("https://k.example/doc/4/", "C vs D")
        };
        let weights = ScorerWeights::default();
        let (bad, reasons) =
            score_candidate(&profile, &checklist, &lexical, &contradicted, &weights);
        let (good, _) = score_candidate(&profile, &checklist, &lexical, &clean, &weights);
        assert!(good > bad);
        assert!(reasons.iter().any(|r| r.contains("contradictory")));
    }

    #[test]
    fn test_score_clamped() {
        let (profile, checklist, lexical) = setup();
        let empty = CaseCandidate::new("https://k.example/doc/5/", "X vs Y");
        let (score, _) =
            score_candidate(&profile, &checklist, &lexical, &empty, &ScorerWeights::default());
        assert!((0.0..=1.0).contains(&score));
    }
}
