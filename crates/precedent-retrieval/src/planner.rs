//! Query variant planner.
//!
//! Synthesises variants across phases and strictness tiers from the
//! proposition checklist, the intent profile and an optional reasoner
//! plan. Strict variants are required to carry every mandatory hook
//! group and a polarity token, so the primary lane can only return
//! results that are at least lexically on-proposition.

use crate::variant::{Phase, QueryMode, QueryVariant, RetrievalDirectives, Strictness};
use precedent_core::lexicon;
use precedent_core::{HookGroup, IntentProfile, PropositionChecklist, ReasonerPlan};
use std::collections::HashMap;

const MIN_STRICT_CHARS: usize = 20;
const MAX_AXIS_TERMS: usize = 3;
const TRACE_MIN_CHARS: usize = 6;

/// Representative search term for a hook group: the term with the most
/// legal-signal tokens, shortest on ties.
fn representative_term(group: &HookGroup) -> Option<&str> {
    group
        .terms
        .iter()
        .map(|term| {
            let signals = lexicon::tokenize(term)
                .iter()
                .filter(|token| lexicon::is_legal_signal(token))
                .count();
            (term, signals)
        })
        .max_by(|(a, sa), (b, sb)| sa.cmp(sb).then(b.len().cmp(&a.len())))
        .map(|(term, _)| term.as_str())
}

fn hook_suffix(checklist: &PropositionChecklist) -> String {
    checklist
        .required_hook_groups()
        .filter_map(representative_term)
        .collect::<Vec<_>>()
        .join(" ")
}

/// True when the phrase carries at least one term of every required group.
fn satisfies_required_hooks(phrase: &str, checklist: &PropositionChecklist) -> bool {
    let lowered = phrase.to_lowercase();
    checklist.required_hook_groups().all(|group| {
        group
            .terms
            .iter()
            .any(|term| lexicon::contains_term(&lowered, term))
    })
}

/// Axis token sets enforced on strict phrases when no hook group exists.
struct AxisTokens {
    sets: Vec<Vec<String>>,
}

impl AxisTokens {
    fn from_checklist(checklist: &PropositionChecklist) -> Option<Self> {
        if checklist.required_hook_groups().next().is_some() {
            return None;
        }
        let mut sets = Vec::new();
        for terms in [
            &checklist.actor.terms,
            &checklist.proceeding.terms,
            &checklist.outcome.terms,
        ] {
            let tokens: Vec<String> = terms.iter().flat_map(|t| lexicon::tokenize(t)).collect();
            if !tokens.is_empty() {
                sets.push(tokens);
            }
        }
        let role_tokens: Vec<String> = checklist
            .graph
            .role_constraints
            .iter()
            .flat_map(|rc| rc.role.cues().iter().map(|c| c.to_string()))
            .flat_map(|c| lexicon::tokenize(&c))
            .collect();
        if !role_tokens.is_empty() {
            sets.push(role_tokens);
        }
        let chain_tokens: Vec<String> = checklist
            .graph
            .chain_constraints
            .iter()
            .flat_map(|chain| chain.left_terms.iter().chain(chain.right_terms.iter()))
            .flat_map(|t| lexicon::tokenize(t))
            .collect();
        if !chain_tokens.is_empty() {
            sets.push(chain_tokens);
        }
        Some(Self { sets })
    }

    fn satisfied_by(&self, phrase: &str) -> bool {
        let tokens = lexicon::tokenize(phrase);
        self.sets
            .iter()
            .all(|set| set.iter().any(|token| tokens.contains(token)))
    }
}

fn polarity_token_present(phrase: &str, checklist: &PropositionChecklist) -> bool {
    if !checklist.outcome_constraint.required {
        return true;
    }
    let tokens = lexicon::tokenize(phrase);
    checklist
        .outcome_constraint
        .terms
        .iter()
        .flat_map(|term| lexicon::tokenize(term))
        .any(|token| tokens.contains(&token))
}

fn strict_directives(checklist: &PropositionChecklist) -> RetrievalDirectives {
    RetrievalDirectives {
        query_mode: QueryMode::Precision,
        doctype_profile: "judgments".to_string(),
        apply_contradiction_exclusions: !checklist
            .outcome_constraint
            .contradiction_terms
            .is_empty(),
    }
}

fn contradiction_excludes(checklist: &PropositionChecklist) -> Vec<String> {
    checklist
        .outcome_constraint
        .contradiction_terms
        .iter()
        .filter(|term| !term.contains(' '))
        .cloned()
        .collect()
}

fn cap<'a>(terms: &'a [String]) -> impl Iterator<Item = &'a String> {
    terms.iter().take(MAX_AXIS_TERMS)
}

fn keyword_pack(profile: &IntentProfile) -> Vec<String> {
    let mut pack = Vec::new();
    for issue in &profile.issues {
        pack.push(issue.clone());
    }
    for domain in &profile.domains {
        pack.push(format!("{domain} judgment"));
    }
    pack
}

/// Builds the full initial variant set.
pub fn build_variants(
    profile: &IntentProfile,
    checklist: &PropositionChecklist,
    plan: Option<&ReasonerPlan>,
) -> Vec<QueryVariant> {
    let mut variants: Vec<QueryVariant> = Vec::new();
    let hook = hook_suffix(checklist);
    let axis = AxisTokens::from_checklist(checklist);
    let court = profile.court_hint;

    // Phrase building uses the canonical profile labels; the checklist's
    // expanded surface forms are for gating, not for queries.
    let actors: Vec<String> = if profile.actors.is_empty() {
        vec![String::new()]
    } else {
        cap(&profile.actors).cloned().collect()
    };
    let proceedings: Vec<String> = if profile.procedures.is_empty() {
        vec![String::new()]
    } else {
        cap(&profile.procedures).cloned().collect()
    };
    let outcomes: Vec<String> = if checklist.outcome_constraint.terms.is_empty() {
        vec![String::new()]
    } else {
        cap(&checklist.outcome_constraint.terms).cloned().collect()
    };

    // Proposition-strict phrases: actor x proceeding x outcome + hooks.
    for actor in &actors {
        for proceeding in &proceedings {
            for outcome in &outcomes {
                let raw = [actor.as_str(), proceeding.as_str(), outcome.as_str(), hook.as_str()]
                    .iter()
                    .filter(|part| !part.is_empty())
                    .cloned()
                    .collect::<Vec<_>>()
                    .join(" ");
                if raw.len() < MIN_STRICT_CHARS {
                    continue;
                }
                if !satisfies_required_hooks(&raw, checklist) {
                    continue;
                }
                if let Some(axis) = &axis {
                    if !axis.satisfied_by(&raw) {
                        continue;
                    }
                }
                if !polarity_token_present(&raw, checklist) {
                    continue;
                }
                if let Some(variant) = QueryVariant::build(
                    &raw,
                    Phase::Primary,
                    Strictness::Strict,
                    court,
                    "proposition_strict",
                ) {
                    variants.push(
                        variant
                            .with_directives(strict_directives(checklist))
                            .with_must_exclude(contradiction_excludes(checklist)),
                    );
                }
            }
        }
    }

    // Reasoner-strict phrases join the primary lane when they carry the
    // mandatory hooks.
    if let Some(plan) = plan {
        for raw in &plan.query_variants_strict {
            if !satisfies_required_hooks(raw, checklist) {
                continue;
            }
            if let Some(variant) = QueryVariant::build(
                raw,
                Phase::Primary,
                Strictness::Strict,
                court,
                "reasoner_strict",
            ) {
                variants.push(
                    variant
                        .with_must_include(plan.must_have_terms.clone())
                        .with_must_exclude(plan.must_not_have_terms.clone())
                        .with_directives(strict_directives(checklist)),
                );
            }
        }
    }

    // Proposition-broad: proceeding x outcome + hooks.
    for proceeding in &proceedings {
        for outcome in &outcomes {
            let raw = [proceeding.as_str(), outcome.as_str(), hook.as_str()]
                .iter()
                .filter(|part| !part.is_empty())
                .cloned()
                .collect::<Vec<_>>()
                .join(" ");
            if let Some(variant) = QueryVariant::build(
                &raw,
                Phase::Fallback,
                Strictness::Relaxed,
                court,
                "proposition_broad",
            ) {
                variants.push(variant.with_directives(RetrievalDirectives {
                    query_mode: QueryMode::Expansion,
                    ..RetrievalDirectives::default()
                }));
            }
        }
    }

    if let Some(plan) = plan {
        for raw in &plan.query_variants_broad {
            if let Some(variant) = QueryVariant::build(
                raw,
                Phase::Fallback,
                Strictness::Relaxed,
                court,
                "reasoner_broad",
            ) {
                variants.push(variant.with_must_exclude(plan.must_not_have_terms.clone()));
            }
        }
    }

    // Rescue: outcome phrases padded with an issue, plus the keyword pack.
    let pack = keyword_pack(profile);
    for outcome in &outcomes {
        if outcome.is_empty() {
            continue;
        }
        let padding = profile.issues.first().or(profile.domains.first());
        let raw = match padding {
            Some(padding) => format!("{outcome} {padding}"),
            None => outcome.clone(),
        };
        if let Some(variant) =
            QueryVariant::build(&raw, Phase::Rescue, Strictness::Relaxed, court, "outcome_rescue")
        {
            variants.push(variant);
        }
    }
    for raw in &pack {
        if let Some(variant) =
            QueryVariant::build(raw, Phase::Rescue, Strictness::Relaxed, court, "keyword_rescue")
        {
            variants.push(variant);
        }
    }

    // Micro: statute / procedure / issue singletons.
    for raw in profile
        .statutes
        .iter()
        .chain(profile.procedures.iter())
        .chain(profile.issues.iter())
    {
        if let Some(variant) =
            QueryVariant::build(raw, Phase::Micro, Strictness::Relaxed, court, "micro_singleton")
        {
            variants.push(variant);
        }
    }

    // Revolving: the generic keyword pack.
    for raw in &pack {
        if let Some(variant) = QueryVariant::build(
            raw,
            Phase::Revolving,
            Strictness::Relaxed,
            court,
            "keyword_revolving",
        ) {
            variants.push(variant);
        }
    }

    // Browse: reasoner case anchors.
    if let Some(plan) = plan {
        for raw in &plan.case_anchors {
            if let Some(variant) =
                QueryVariant::build(raw, Phase::Browse, Strictness::Relaxed, court, "case_anchor")
            {
                variants.push(variant);
            }
        }
    }

    dedupe_by_canonical_key(variants)
}

/// True when a variant's phrase carries every mandatory hook group.
pub fn variant_satisfies_hooks(variant: &QueryVariant, checklist: &PropositionChecklist) -> bool {
    satisfies_required_hooks(&variant.phrase, checklist)
}

/// Trace variants: seed case titles crossed with proposition pivots.
///
/// Each phrase must carry a legal signal token and a minimum length, so a
/// bare party name never becomes a query.
pub fn build_trace_variants(
    seed_titles: &[String],
    checklist: &PropositionChecklist,
) -> Vec<QueryVariant> {
    let mut pivots: Vec<String> = checklist
        .required_hook_groups()
        .filter_map(representative_term)
        .map(|t| t.to_string())
        .collect();
    pivots.extend(
        checklist
            .outcome_constraint
            .terms
            .iter()
            .take(2)
            .cloned(),
    );

    let mut variants = Vec::new();
    for title in seed_titles {
        let head: Vec<&str> = title
            .split_whitespace()
            .filter(|word| {
                let lowered = word.to_lowercase();
                lowered != "v" && lowered != "v." && lowered != "vs" && lowered != "versus"
            })
            .take(4)
            .collect();
        if head.is_empty() {
            continue;
        }
        for pivot in &pivots {
            let raw = format!("{} {pivot}", head.join(" "));
            if raw.len() < TRACE_MIN_CHARS {
                continue;
            }
            let has_signal = lexicon::tokenize(&raw)
                .iter()
                .any(|token| lexicon::is_legal_signal(token));
            if !has_signal {
                continue;
            }
            if let Some(variant) = QueryVariant::build(
                &raw,
                Phase::Browse,
                Strictness::Relaxed,
                precedent_core::CourtHint::Any,
                "trace_pivot",
            ) {
                variants.push(variant);
            }
        }
    }
    dedupe_by_canonical_key(variants)
}

/// Guarantee-backfill variants: broad browse phrases from ontology
/// templates plus reasoner anchors.
pub fn build_guarantee_variants(
    profile: &IntentProfile,
    plan: Option<&ReasonerPlan>,
) -> Vec<QueryVariant> {
    let mut raws: Vec<String> = Vec::new();
    for issue in &profile.issues {
        raws.push(format!("{issue} landmark judgment"));
        raws.push(format!("{issue} leading case"));
    }
    for domain in &profile.domains {
        raws.push(format!("{domain} notable judgment"));
    }
    if let Some(plan) = plan {
        raws.extend(plan.case_anchors.iter().cloned());
    }
    let mut variants = Vec::new();
    for raw in &raws {
        if let Some(variant) = QueryVariant::build(
            raw,
            Phase::Browse,
            Strictness::Relaxed,
            precedent_core::CourtHint::Any,
            "guarantee_backfill",
        ) {
            variants.push(variant.with_priority(30));
        }
    }
    dedupe_by_canonical_key(variants)
}

fn dedupe_by_canonical_key(variants: Vec<QueryVariant>) -> Vec<QueryVariant> {
    let mut by_key: HashMap<String, QueryVariant> = HashMap::new();
    for variant in variants {
        match by_key.get(&variant.canonical_key) {
            Some(existing) if existing.priority >= variant.priority => {}
            _ => {
                by_key.insert(variant.canonical_key.clone(), variant);
            }
        }
    }
    let mut variants: Vec<QueryVariant> = by_key.into_values().collect();
    variants.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.phrase.cmp(&b.phrase)));
    variants
}

/// Checks a dedup key is never reused across the output; used by tests
/// and debug assertions.
pub fn has_unique_keys(variants: &[QueryVariant]) -> bool {
    let mut seen = std::collections::HashSet::new();
    variants.iter().all(|v| seen.insert(&v.canonical_key))
}
