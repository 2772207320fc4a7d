//! Proposition compiler: intent profile + optional reasoner plan into a
//! [`PropositionChecklist`].
//!
//! Reasoner material is grounded against the cleaned query before it is
//! admitted: hook groups and outcome terms the model invented out of thin
//! air are dropped, so a hallucinating plan can widen retrieval but never
//! redefine the proposition.

use crate::checklist::{
    Axis, ChainConstraint, HookGroup, OutcomeConstraint, PropositionChecklist, PropositionGraph,
    Relation, RelationType, RoleConstraint, RoleKind, DEFAULT_WINDOW_CHARS,
};
use crate::intent::{IntentProfile, OutcomePolarity};
use crate::lexicon::{self, PolarityCues};
use crate::plan::ReasonerPlan;
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;

static SECTION_NUM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(section|article)\s+(\d+[a-z]?)$").unwrap());

/// Polarity cue table lookup.
pub fn polarity_cues(polarity: OutcomePolarity) -> Option<&'static PolarityCues> {
    match polarity {
        OutcomePolarity::Required => Some(&lexicon::CUES_REQUIRED),
        OutcomePolarity::NotRequired => Some(&lexicon::CUES_NOT_REQUIRED),
        OutcomePolarity::Allowed => Some(&lexicon::CUES_ALLOWED),
        OutcomePolarity::Refused => Some(&lexicon::CUES_REFUSED),
        OutcomePolarity::Dismissed => Some(&lexicon::CUES_DISMISSED),
        OutcomePolarity::Quashed => Some(&lexicon::CUES_QUASHED),
        OutcomePolarity::Unknown => None,
    }
}

/// Seeds deterministic hook groups from recognised statutes and sections.
///
/// A section that sits near a known statute family in the query becomes a
/// combined `sec_<n>_<family>` group and suppresses the bare family group;
/// unpaired families and sections get their own groups. Groups sharing an
/// id are merged.
pub fn seed_hook_groups(statutes: &[String], sections: &[String], cleaned: &str) -> Vec<HookGroup> {
    let lowered = cleaned.to_lowercase();
    let mut groups: BTreeMap<String, HookGroup> = BTreeMap::new();
    let mut paired_families: Vec<&'static str> = Vec::new();

    for section in sections {
        let Some(capture) = SECTION_NUM_RE.captures(section) else {
            continue;
        };
        let kind = &capture[1];
        let number = &capture[2];
        let family = nearest_family(&lowered, section);
        let (group_id, mut terms) = match (kind, family) {
            ("section", Some(family)) => {
                paired_families.push(family.id);
                let id = format!("sec_{number}_{}", family.id);
                let mut terms = section_terms(number);
                for alias in family.aliases {
                    terms.push(format!("section {number} {alias}"));
                    terms.push(format!("section {number} of the {alias}"));
                }
                (id, terms)
            }
            ("section", None) => (format!("sec_{number}"), section_terms(number)),
            (_, _) => (format!("art_{number}"), vec![
                format!("article {number}"),
                format!("article {number} of the constitution"),
            ]),
        };
        terms.sort();
        terms.dedup();
        merge_group(&mut groups, HookGroup::required(group_id, terms));
    }

    for statute in statutes {
        let Some(family) = lexicon::hook_family(statute) else {
            merge_group(
                &mut groups,
                HookGroup::required(format!("hook_{}", slug(statute)), vec![statute.clone()]),
            );
            continue;
        };
        if paired_families.contains(&family.id) {
            continue;
        }
        merge_group(
            &mut groups,
            HookGroup::required(
                family.id,
                family.aliases.iter().map(|a| a.to_string()).collect(),
            ),
        );
    }

    groups.into_values().collect()
}

fn section_terms(number: &str) -> Vec<String> {
    vec![
        format!("section {number}"),
        format!("sec. {number}"),
        format!("s. {number}"),
        format!("u/s {number}"),
    ]
}

fn nearest_family(lowered: &str, section: &str) -> Option<&'static lexicon::HookFamily> {
    let positions = lexicon::term_positions(lowered, section);
    let section_pos = *positions.first()?;
    let mut best: Option<(&'static lexicon::HookFamily, usize)> = None;
    for family in lexicon::HOOK_FAMILIES {
        for alias in family.aliases {
            for alias_pos in lexicon::term_positions(lowered, alias) {
                let distance = alias_pos.abs_diff(section_pos);
                if distance <= 80 && best.is_none_or(|(_, d)| distance < d) {
                    best = Some((family, distance));
                }
            }
        }
    }
    best.map(|(family, _)| family)
}

fn merge_group(groups: &mut BTreeMap<String, HookGroup>, group: HookGroup) {
    match groups.get_mut(&group.group_id) {
        Some(existing) => {
            for term in group.terms {
                if !existing.terms.contains(&term) {
                    existing.terms.push(term);
                }
            }
            existing.required |= group.required;
            existing.min_match = existing.min_match.max(group.min_match);
        }
        None => {
            groups.insert(group.group_id.clone(), group);
        }
    }
}

fn slug(text: &str) -> String {
    lexicon::tokenize(text).join("_")
}

/// True when at least one of the group's terms is visible in the query.
fn grounded_in_query(group: &HookGroup, lowered_query: &str) -> bool {
    group
        .terms
        .iter()
        .any(|term| lexicon::contains_term(lowered_query, term))
}

fn relation_type(label: &str) -> Option<RelationType> {
    match label {
        "requires" => Some(RelationType::Requires),
        "applies_to" => Some(RelationType::AppliesTo),
        "interacts_with" => Some(RelationType::InteractsWith),
        "excluded_by" => Some(RelationType::ExcludedBy),
        _ => None,
    }
}

/// Outcome terms for the polarity, with curated synonyms expanded.
pub fn polarity_terms(polarity: OutcomePolarity) -> Vec<String> {
    polarity_cues(polarity)
        .map(|cues| cues.positive.iter().map(|t| t.to_string()).collect())
        .unwrap_or_default()
}

/// Contradiction terms for the polarity.
pub fn polarity_contradiction_terms(polarity: OutcomePolarity) -> Vec<String> {
    polarity_cues(polarity)
        .map(|cues| cues.contradiction.iter().map(|t| t.to_string()).collect())
        .unwrap_or_default()
}

const CORE_ISSUES: &[&str] = &[
    "sanction for prosecution",
    "condonation of delay",
    "quashing of fir",
    "limitation bar",
];

/// Builds the proposition checklist from the profile and an optional plan.
///
/// Deterministic for fixed inputs; the returned checklist always satisfies
/// its structural invariants (offending plan material is demoted, never
/// admitted broken).
pub fn build_proposition_checklist(
    profile: &IntentProfile,
    plan: Option<&ReasonerPlan>,
) -> PropositionChecklist {
    let lowered_query = profile.cleaned_query.to_lowercase();
    let polarity = profile.retrieval_intent.outcome_polarity;

    let mut groups: BTreeMap<String, HookGroup> = BTreeMap::new();
    for seed in &profile.retrieval_intent.hook_groups {
        merge_group(&mut groups, seed.clone());
    }

    let proposition = plan.and_then(|p| p.proposition.as_ref());
    if let Some(proposition) = proposition {
        for plan_group in &proposition.hook_groups {
            if plan_group.group_id.is_empty() || plan_group.terms.is_empty() {
                continue;
            }
            let candidate = HookGroup {
                group_id: plan_group.group_id.clone(),
                terms: plan_group.terms.iter().map(|t| t.to_lowercase()).collect(),
                min_match: plan_group.min_match.max(1),
                required: plan_group.required,
            };
            if candidate.required && !grounded_in_query(&candidate, &lowered_query) {
                tracing::debug!(group = %candidate.group_id, "dropping ungrounded plan hook group");
                continue;
            }
            merge_group(&mut groups, candidate);
        }
    }
    let hook_groups: Vec<HookGroup> = groups.into_values().collect();

    let mut relations = Vec::new();
    if let Some(proposition) = proposition {
        for (index, plan_relation) in proposition.relations.iter().enumerate() {
            let Some(relation_type) = relation_type(&plan_relation.r#type) else {
                continue;
            };
            let exists = |id: &str| hook_groups.iter().any(|g| g.group_id == id);
            if !exists(&plan_relation.left_group_id) || !exists(&plan_relation.right_group_id) {
                continue;
            }
            relations.push(Relation {
                relation_id: format!("rel_{index}"),
                relation_type,
                left: plan_relation.left_group_id.clone(),
                right: plan_relation.right_group_id.clone(),
                required: plan_relation.required,
            });
        }
    }

    let required_group_count = hook_groups.iter().filter(|g| g.required).count();
    let interaction_required = proposition
        .map(|p| p.interaction_required)
        .unwrap_or(false)
        && required_group_count >= 2;

    // Axis terms carry the full surface-form expansion of each label, so
    // the gate can find them in judgment prose.
    let mut actor_terms: Vec<String> = Vec::new();
    for label in &profile.actors {
        for term in lexicon::expansion_terms(label) {
            push_unique(&mut actor_terms, term);
        }
    }
    let mut proceeding_terms: Vec<String> = Vec::new();
    for label in &profile.procedures {
        for term in lexicon::expansion_terms(label) {
            push_unique(&mut proceeding_terms, term);
        }
    }
    if let Some(proposition) = proposition {
        for term in &proposition.actors {
            push_unique(&mut actor_terms, term.to_lowercase());
        }
        for term in &proposition.proceeding {
            push_unique(&mut proceeding_terms, term.to_lowercase());
        }
    }

    let mut outcome_terms = polarity_terms(polarity);
    let contradiction_terms = polarity_contradiction_terms(polarity);
    if let Some(proposition) = proposition {
        if let Some(constraint) = &proposition.outcome_constraint {
            if constraint.polarity == polarity || polarity == OutcomePolarity::Unknown {
                for term in &constraint.terms {
                    let lowered = term.to_lowercase();
                    if !contradiction_terms.contains(&lowered) {
                        push_unique(&mut outcome_terms, lowered);
                    }
                }
            }
        }
    }

    let legal_hook_terms: Vec<String> = hook_groups
        .iter()
        .filter(|g| g.required)
        .flat_map(|g| g.terms.iter().cloned())
        .collect();

    let mandatory_steps: Vec<String> = profile
        .issues
        .iter()
        .filter(|issue| CORE_ISSUES.contains(&issue.as_str()))
        .cloned()
        .collect();
    let peripheral_steps: Vec<String> = profile
        .issues
        .iter()
        .filter(|issue| !CORE_ISSUES.contains(&issue.as_str()))
        .cloned()
        .chain(profile.anchors.iter().cloned())
        .collect();

    let graph = PropositionGraph {
        mandatory_steps,
        peripheral_steps,
        role_constraints: derive_role_constraints(profile, &lowered_query),
        chain_constraints: derive_chain_constraints(profile, polarity),
    };

    let checklist = PropositionChecklist {
        actor: Axis::required(actor_terms),
        proceeding: Axis::required(proceeding_terms),
        legal_hook: Axis {
            required: required_group_count > 0,
            terms: legal_hook_terms,
        },
        outcome: Axis {
            required: polarity != OutcomePolarity::Unknown,
            terms: outcome_terms.clone(),
        },
        hook_groups,
        relations,
        interaction_required,
        outcome_constraint: OutcomeConstraint {
            polarity,
            required: polarity != OutcomePolarity::Unknown,
            terms: outcome_terms,
            contradiction_terms,
        },
        graph,
    };
    debug_assert!(checklist.validate().is_ok());
    checklist
}

fn push_unique(list: &mut Vec<String>, value: String) {
    if !value.is_empty() && !list.contains(&value) {
        list.push(value);
    }
}

fn derive_role_constraints(profile: &IntentProfile, lowered_query: &str) -> Vec<RoleConstraint> {
    let mut constraints = Vec::new();
    let principal: Vec<String> = profile
        .actors
        .iter()
        .filter(|a| *a != "appellant" && *a != "respondent")
        .cloned()
        .collect();
    if principal.is_empty() {
        return constraints;
    }
    if lowered_query.contains("as appellant") || profile.actors.iter().any(|a| a == "appellant") {
        constraints.push(RoleConstraint {
            actor_terms: principal.clone(),
            role: RoleKind::Appellant,
        });
    }
    if lowered_query.contains("as respondent") {
        constraints.push(RoleConstraint {
            actor_terms: principal.clone(),
            role: RoleKind::Respondent,
        });
    }
    if profile.actors.iter().any(|a| a == "prosecution")
        && profile.actors.iter().any(|a| a == "public servant" || a == "accused")
    {
        constraints.push(RoleConstraint {
            actor_terms: vec!["prosecution".to_string()],
            role: RoleKind::Prosecution,
        });
    }
    constraints
}

fn derive_chain_constraints(
    profile: &IntentProfile,
    polarity: OutcomePolarity,
) -> Vec<ChainConstraint> {
    let mut chains = Vec::new();
    let has_condonation = profile
        .issues
        .iter()
        .any(|issue| issue == "condonation of delay");
    if has_condonation && matches!(polarity, OutcomePolarity::Refused | OutcomePolarity::Dismissed)
    {
        chains.push(ChainConstraint {
            left_terms: vec![
                "condonation".to_string(),
                "condone".to_string(),
                "condonation of delay".to_string(),
            ],
            right_terms: vec![
                "refused".to_string(),
                "rejected".to_string(),
                "not condoned".to_string(),
                "dismissed".to_string(),
                "time barred".to_string(),
                "time-barred".to_string(),
            ],
            window_chars: DEFAULT_WINDOW_CHARS,
        });
    }
    let has_sanction = profile
        .issues
        .iter()
        .any(|issue| issue == "sanction for prosecution");
    if has_sanction
        && matches!(
            polarity,
            OutcomePolarity::Required | OutcomePolarity::NotRequired
        )
    {
        chains.push(ChainConstraint {
            left_terms: vec!["sanction".to_string(), "prior sanction".to_string()],
            right_terms: polarity_terms(polarity),
            window_chars: DEFAULT_WINDOW_CHARS,
        });
    }
    chains
}
