//! Proposition gate: signal evaluation, the tier decision ladder, and
//! confidence calibration.
//!
//! The gate never trusts a single lexical hit: every required element of
//! the checklist is evaluated separately over the candidate text and the
//! evidence windows, and the tier decision is a total, ordered ladder
//! from exact-strict down to reject. Confidence is calibrated from the
//! structural coverage and capped per tier, so a provisional row can
//! never outrank a strict one on score alone.

use precedent_core::lexicon;
use precedent_core::{
    CaseCandidate, ConfidenceBand, ExactnessType, PropositionChecklist, RetrievalTier, ScoredCase,
    Verification,
};
use serde::{Deserialize, Serialize};

/// Gate thresholds and caps.
#[derive(Debug, Clone)]
pub struct GateConfig {
    pub strict_cap: f64,
    pub provisional_cap: f64,
    pub exploratory_cap: f64,
    pub reject_cap: f64,
    pub no_detail_cap: f64,
    /// Peripheral coverage floor for exact-strict.
    pub peripheral_floor: f64,
    /// Mandatory-step floor for provisional without a detail check.
    pub provisional_mandatory_floor: f64,
    /// Core coverage floor for a doctrinal near miss.
    pub near_miss_core_floor: f64,
    /// Proximity window for actor/role co-occurrence.
    pub role_proximity_chars: usize,
    /// Proximity window for required relations.
    pub relation_window_chars: usize,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            strict_cap: 0.95,
            provisional_cap: 0.70,
            exploratory_cap: 0.45,
            reject_cap: 0.50,
            no_detail_cap: 0.55,
            peripheral_floor: 0.6,
            provisional_mandatory_floor: 0.75,
            near_miss_core_floor: 0.65,
            role_proximity_chars: 120,
            relation_window_chars: 220,
        }
    }
}

/// Calibration weights; the defaults are the tuned production values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationWeights {
    pub core: f64,
    pub mandatory: f64,
    pub chain: f64,
    pub hook_group: f64,
    pub relation: f64,
    pub polarity: f64,
    pub peripheral: f64,
    pub base_blend: f64,
    pub structural_blend: f64,
    pub missing_detail_penalty: f64,
    pub role_sentence_bonus: f64,
    pub chain_sentence_bonus: f64,
    pub relation_sentence_bonus: f64,
    pub polarity_sentence_bonus: f64,
    pub hook_intersection_bonus: f64,
    pub actor_role_miss: f64,
    pub proceeding_role_miss: f64,
    pub chain_miss: f64,
    pub polarity_miss: f64,
    pub contradiction_penalty: f64,
}

impl Default for CalibrationWeights {
    fn default() -> Self {
        Self {
            core: 0.34,
            mandatory: 0.22,
            chain: 0.10,
            hook_group: 0.12,
            relation: 0.08,
            polarity: 0.08,
            peripheral: 0.06,
            base_blend: 0.45,
            structural_blend: 0.55,
            missing_detail_penalty: 0.06,
            role_sentence_bonus: 0.02,
            chain_sentence_bonus: 0.02,
            relation_sentence_bonus: 0.03,
            polarity_sentence_bonus: 0.03,
            hook_intersection_bonus: 0.03,
            actor_role_miss: 0.12,
            proceeding_role_miss: 0.08,
            chain_miss: 0.12,
            polarity_miss: 0.16,
            contradiction_penalty: 0.25,
        }
    }
}

/// Gate tier decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateDecision {
    ExactStrict,
    ExactProvisional,
    NearMiss,
    Reject,
}

/// Everything the gate observed about one candidate.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SignalReport {
    pub detail_checked: bool,
    pub contradiction: bool,
    pub hook_group_coverage: f64,
    pub relation_satisfied: bool,
    pub outcome_polarity_satisfied: bool,
    pub actor_role_satisfied: bool,
    pub proceeding_role_satisfied: bool,
    pub chain_coverage: f64,
    pub chain_satisfied: bool,
    pub mandatory_step_coverage: f64,
    pub core_coverage: f64,
    pub peripheral_coverage: f64,
    pub required_coverage: f64,
    /// Count of all evaluated components, core and peripheral; the same
    /// denominator `required_coverage` uses and the count the near-miss
    /// threshold is keyed off.
    pub required_components: usize,
    pub has_relation_sentence: bool,
    pub has_polarity_sentence: bool,
    pub has_hook_intersection_sentence: bool,
    pub has_role_sentence: bool,
    pub has_chain_sentence: bool,
    /// Every constraint class present in the checklist is backed by an
    /// evidence sentence; vacuously true for absent classes.
    pub structural_sentences_complete: bool,
    pub matched_elements: Vec<String>,
    pub missing_core_elements: Vec<String>,
    pub missing_mandatory_steps: Vec<String>,
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

fn evidence_windows(candidate: &CaseCandidate) -> Vec<String> {
    match &candidate.detail_artifact {
        Some(artifact) if !artifact.evidence_windows.is_empty() => artifact
            .evidence_windows
            .iter()
            .map(|w| w.to_lowercase())
            .collect(),
        _ => vec![candidate.snippet.to_lowercase()],
    }
}

fn any_term(text: &str, terms: &[String]) -> bool {
    terms.iter().any(|term| lexicon::contains_term(text, term))
}

fn positions(text: &str, terms: &[String]) -> Vec<usize> {
    terms
        .iter()
        .flat_map(|term| lexicon::term_positions(text, term))
        .collect()
}

fn within_window(left: &[usize], right: &[usize], window: usize) -> bool {
    left.iter()
        .any(|l| right.iter().any(|r| l.abs_diff(*r) <= window))
}

struct Component {
    name: String,
    hit: bool,
    core: bool,
}

/// Evaluates every checklist signal for a candidate.
pub fn evaluate_signals(
    candidate: &CaseCandidate,
    checklist: &PropositionChecklist,
    config: &GateConfig,
) -> SignalReport {
    let text = candidate_text(candidate);
    let windows = evidence_windows(candidate);
    let evidence_text = windows.join(" \n ");
    let mut report = SignalReport {
        detail_checked: candidate.detail_text.is_some(),
        ..Default::default()
    };
    let mut components: Vec<Component> = Vec::new();

    // Axis hits.
    if checklist.actor.required {
        components.push(Component {
            name: "actor".to_string(),
            hit: any_term(&text, &checklist.actor.terms),
            core: true,
        });
    }
    if checklist.proceeding.required {
        components.push(Component {
            name: "proceeding".to_string(),
            hit: any_term(&text, &checklist.proceeding.terms),
            core: true,
        });
    }

    // Hook groups: required ones are core, the rest peripheral.
    let mut required_groups = 0usize;
    let mut satisfied_groups = 0usize;
    for group in &checklist.hook_groups {
        let distinct_hits = group
            .terms
            .iter()
            .filter(|term| lexicon::contains_term(&text, term))
            .count();
        let hit = distinct_hits >= group.min_match;
        if group.required {
            required_groups += 1;
            if hit {
                satisfied_groups += 1;
            }
        }
        components.push(Component {
            name: format!("hook:{}", group.group_id),
            hit,
            core: group.required,
        });
    }
    report.hook_group_coverage = if required_groups == 0 {
        1.0
    } else {
        satisfied_groups as f64 / required_groups as f64
    };

    // Outcome polarity with the contradiction guard.
    report.contradiction = checklist
        .outcome_constraint
        .contradiction_terms
        .iter()
        .any(|term| lexicon::contains_affirmative_term(&text, term));
    let outcome_present = checklist
        .outcome_constraint
        .terms
        .iter()
        .any(|term| lexicon::contains_affirmative_term(&text, term));
    report.outcome_polarity_satisfied = if checklist.outcome_constraint.required {
        outcome_present && !report.contradiction
    } else {
        !report.contradiction
    };
    if checklist.outcome_constraint.required {
        components.push(Component {
            name: "outcome".to_string(),
            hit: report.outcome_polarity_satisfied,
            core: true,
        });
    }

    // Relations over evidence text.
    let mut required_relations_ok = true;
    for relation in checklist.required_relations() {
        let left_terms = checklist
            .hook_groups
            .iter()
            .find(|g| g.group_id == relation.left)
            .map(|g| g.terms.clone())
            .unwrap_or_default();
        let right_terms = checklist
            .hook_groups
            .iter()
            .find(|g| g.group_id == relation.right)
            .map(|g| g.terms.clone())
            .unwrap_or_default();
        let hit = within_window(
            &positions(&evidence_text, &left_terms),
            &positions(&evidence_text, &right_terms),
            config.relation_window_chars,
        );
        if !hit {
            required_relations_ok = false;
        }
        components.push(Component {
            name: format!("relation:{}", relation.relation_id),
            hit,
            core: true,
        });
        if windows.iter().any(|window| {
            any_term(window, &left_terms) && any_term(window, &right_terms)
        }) {
            report.has_relation_sentence = true;
        }
    }
    report.relation_satisfied = required_relations_ok;

    // Chains over the full text.
    let mut chains_ok = 0usize;
    for (index, chain) in checklist.graph.chain_constraints.iter().enumerate() {
        let hit = within_window(
            &positions(&text, &chain.left_terms),
            &positions(&text, &chain.right_terms),
            chain.window_chars,
        );
        if hit {
            chains_ok += 1;
        }
        components.push(Component {
            name: format!("chain:{index}"),
            hit,
            core: true,
        });
        if windows.iter().any(|window| {
            any_term(window, &chain.left_terms) && any_term(window, &chain.right_terms)
        }) {
            report.has_chain_sentence = true;
        }
    }
    let chain_total = checklist.graph.chain_constraints.len();
    report.chain_coverage = if chain_total == 0 {
        1.0
    } else {
        chains_ok as f64 / chain_total as f64
    };
    report.chain_satisfied = chains_ok == chain_total;

    // Mandatory and peripheral steps, matched through their surface forms.
    let mut mandatory_hits = 0usize;
    for step in &checklist.graph.mandatory_steps {
        let hit = lexicon::expansion_terms(step)
            .iter()
            .any(|term| lexicon::contains_term(&text, term));
        if hit {
            mandatory_hits += 1;
        } else {
            report.missing_mandatory_steps.push(step.clone());
        }
        components.push(Component {
            name: format!("step:{step}"),
            hit,
            core: true,
        });
    }
    report.mandatory_step_coverage = if checklist.graph.mandatory_steps.is_empty() {
        1.0
    } else {
        mandatory_hits as f64 / checklist.graph.mandatory_steps.len() as f64
    };
    for step in &checklist.graph.peripheral_steps {
        let hit = lexicon::expansion_terms(step)
            .iter()
            .any(|term| lexicon::contains_term(&text, term));
        components.push(Component {
            name: format!("peripheral:{step}"),
            hit,
            core: false,
        });
    }

    // Roles.
    let mut roles_ok = true;
    for constraint in &checklist.graph.role_constraints {
        let actor_terms: Vec<String> = constraint
            .actor_terms
            .iter()
            .flat_map(|label| lexicon::expansion_terms(label))
            .collect();
        let actor_positions = positions(&text, &actor_terms);
        let cue_terms: Vec<String> = constraint
            .role
            .cues()
            .iter()
            .map(|c| c.to_string())
            .collect();
        let cue_positions = positions(&text, &cue_terms);
        let hit = within_window(&actor_positions, &cue_positions, config.role_proximity_chars);
        if !hit {
            roles_ok = false;
        }
        if windows.iter().any(|window| {
            any_term(window, &actor_terms) && any_term(window, &cue_terms)
        }) {
            report.has_role_sentence = true;
        }
    }
    report.actor_role_satisfied = roles_ok;
    report.proceeding_role_satisfied =
        !checklist.proceeding.required || any_term(&text, &checklist.proceeding.terms);

    // Evidence-sentence flags that span groups.
    let required_group_terms: Vec<&Vec<String>> = checklist
        .required_hook_groups()
        .map(|g| &g.terms)
        .collect();
    if required_group_terms.len() >= 2 {
        report.has_hook_intersection_sentence = windows.iter().any(|window| {
            required_group_terms
                .iter()
                .filter(|terms| any_term(window, terms))
                .count()
                >= 2
        });
    }
    report.has_polarity_sentence = windows.iter().any(|window| {
        checklist
            .outcome_constraint
            .terms
            .iter()
            .any(|term| lexicon::contains_affirmative_term(window, term))
    });
    report.structural_sentences_complete = (checklist.required_relations().next().is_none()
        || report.has_relation_sentence)
        && (!checklist.outcome_constraint.required || report.has_polarity_sentence)
        && (checklist.graph.chain_constraints.is_empty() || report.has_chain_sentence);

    // Coverage metrics.
    let core: Vec<&Component> = components.iter().filter(|c| c.core).collect();
    let peripheral: Vec<&Component> = components.iter().filter(|c| !c.core).collect();
    let core_hits = core.iter().filter(|c| c.hit).count();
    let peripheral_hits = peripheral.iter().filter(|c| c.hit).count();
    report.core_coverage = if core.is_empty() {
        1.0
    } else {
        core_hits as f64 / core.len() as f64
    };
    report.peripheral_coverage = if peripheral.is_empty() {
        1.0
    } else {
        peripheral_hits as f64 / peripheral.len() as f64
    };
    let total = components.len();
    report.required_coverage = if total == 0 {
        1.0
    } else {
        (core_hits + peripheral_hits) as f64 / total as f64
    };
    report.required_components = components.len();
    for component in &components {
        if component.hit {
            report.matched_elements.push(component.name.clone());
        } else if component.core {
            report.missing_core_elements.push(component.name.clone());
        }
    }
    report
}

/// Near-miss required-coverage threshold by component count.
fn near_miss_threshold(count: usize) -> f64 {
    match count {
        0 | 1 => 1.0,
        2 => 0.5,
        3 => 2.0 / 3.0,
        _ => 0.75,
    }
}

/// Applies the ordered decision ladder.
pub fn decide(
    report: &SignalReport,
    checklist: &PropositionChecklist,
    config: &GateConfig,
) -> GateDecision {
    let strict = report.detail_checked
        && !report.contradiction
        && report.core_coverage >= 1.0
        && report.mandatory_step_coverage >= 1.0
        && report.hook_group_coverage >= 1.0
        && report.relation_satisfied
        && report.outcome_polarity_satisfied
        && report.chain_satisfied
        && report.actor_role_satisfied
        && report.proceeding_role_satisfied
        && report.peripheral_coverage >= config.peripheral_floor;
    if strict {
        return GateDecision::ExactStrict;
    }

    let mandatory_floor = if report.detail_checked {
        1.0
    } else {
        config.provisional_mandatory_floor
    };
    let provisional = !report.contradiction
        && report.core_coverage >= 1.0
        && report.hook_group_coverage >= 1.0
        && report.relation_satisfied
        && report.outcome_polarity_satisfied
        && report.mandatory_step_coverage >= mandatory_floor;
    if provisional {
        return GateDecision::ExactProvisional;
    }

    let near_miss = checklist.is_doctrinally_constrained()
        && !report.contradiction
        && report.core_coverage >= config.near_miss_core_floor
        && report.required_coverage >= near_miss_threshold(report.required_components)
        && !report.matched_elements.is_empty();
    if near_miss {
        return GateDecision::NearMiss;
    }

    GateDecision::Reject
}

/// Calibration result for one candidate.
#[derive(Debug, Clone, Copy)]
pub struct Calibration {
    pub confidence: f64,
    pub band: ConfidenceBand,
    /// True when the tier cap lowered the raw score.
    pub saturation_prevented: bool,
}

/// Calibrates confidence from the ranking score and the signal report.
pub fn calibrate(
    ranking_score: f64,
    report: &SignalReport,
    decision: GateDecision,
    config: &GateConfig,
    weights: &CalibrationWeights,
) -> Calibration {
    let structural = report.core_coverage * weights.core
        + report.mandatory_step_coverage * weights.mandatory
        + report.chain_coverage * weights.chain
        + report.hook_group_coverage * weights.hook_group
        + f64::from(report.relation_satisfied) * weights.relation
        + f64::from(report.outcome_polarity_satisfied) * weights.polarity
        + report.peripheral_coverage * weights.peripheral;
    let mut raw = weights.base_blend * ranking_score + weights.structural_blend * structural;

    if !report.detail_checked {
        raw -= weights.missing_detail_penalty;
    }
    if report.has_role_sentence {
        raw += weights.role_sentence_bonus;
    }
    if report.has_chain_sentence {
        raw += weights.chain_sentence_bonus;
    }
    if report.has_relation_sentence {
        raw += weights.relation_sentence_bonus;
    }
    if report.has_polarity_sentence {
        raw += weights.polarity_sentence_bonus;
    }
    if report.has_hook_intersection_sentence {
        raw += weights.hook_intersection_bonus;
    }
    if !report.actor_role_satisfied {
        raw -= weights.actor_role_miss;
    }
    if !report.proceeding_role_satisfied {
        raw -= weights.proceeding_role_miss;
    }
    if !report.chain_satisfied {
        raw -= weights.chain_miss;
    }
    if !report.outcome_polarity_satisfied {
        raw -= weights.polarity_miss;
    }
    if report.contradiction {
        raw -= weights.contradiction_penalty;
    }
    raw = raw.clamp(0.0, 1.0);

    let mut cap = match decision {
        GateDecision::ExactStrict if report.structural_sentences_complete => config.strict_cap,
        GateDecision::ExactStrict => config.provisional_cap,
        GateDecision::ExactProvisional => config.provisional_cap,
        GateDecision::NearMiss => config.exploratory_cap,
        GateDecision::Reject => config.reject_cap,
    };
    if !report.detail_checked {
        cap = cap.min(config.no_detail_cap);
    }
    let saturation_prevented = raw > cap;
    let confidence = raw.min(cap);

    let band = match decision {
        GateDecision::NearMiss => {
            if confidence >= 0.40 {
                ConfidenceBand::Medium
            } else {
                ConfidenceBand::Low
            }
        }
        _ => {
            if confidence >= 0.86 {
                ConfidenceBand::VeryHigh
            } else if confidence >= 0.71 {
                ConfidenceBand::High
            } else if confidence >= 0.51 {
                ConfidenceBand::Medium
            } else {
                ConfidenceBand::Low
            }
        }
    };

    Calibration {
        confidence,
        band,
        saturation_prevented,
    }
}

/// Tiered output of a gating pass.
#[derive(Debug, Default)]
pub struct GateOutcome {
    pub exact_strict: Vec<ScoredCase>,
    pub exact_provisional: Vec<ScoredCase>,
    pub near_miss: Vec<ScoredCase>,
    pub rejected: usize,
    pub contradiction_rejects: usize,
    pub saturation_prevented: usize,
}

impl GateOutcome {
    /// Total rows that survived the gate.
    pub fn surviving(&self) -> usize {
        self.exact_strict.len() + self.exact_provisional.len() + self.near_miss.len()
    }
}

fn selection_summary(decision: GateDecision, report: &SignalReport) -> String {
    match decision {
        GateDecision::ExactStrict => "verified match on every required proposition element".to_string(),
        GateDecision::ExactProvisional => {
            "matches the proposition; awaiting full-document verification".to_string()
        }
        GateDecision::NearMiss => format!(
            "doctrinal near miss ({} of {} required elements)",
            report.matched_elements.len(),
            report.required_components.max(report.matched_elements.len())
        ),
        GateDecision::Reject => "does not satisfy the proposition".to_string(),
    }
}

/// Gates a ranked candidate list into tiers.
pub fn gate_candidates(
    scored: Vec<ScoredCase>,
    checklist: &PropositionChecklist,
    config: &GateConfig,
    weights: &CalibrationWeights,
) -> GateOutcome {
    let mut outcome = GateOutcome::default();
    for mut case in scored {
        let report = evaluate_signals(&case.candidate, checklist, config);
        let decision = decide(&report, checklist, config);
        let calibration = calibrate(case.ranking_score, &report, decision, config, weights);
        if calibration.saturation_prevented {
            outcome.saturation_prevented += 1;
        }

        case.confidence_score = calibration.confidence;
        case.confidence_band = calibration.band;
        case.selection_summary = selection_summary(decision, &report);
        case.match_evidence = report.matched_elements.clone();
        case.missing_core_elements = report.missing_core_elements.clone();
        case.missing_mandatory_steps = report.missing_mandatory_steps.clone();
        case.verification = Verification {
            detail_checked: report.detail_checked,
            issues_matched: Vec::new(),
            procedures_matched: Vec::new(),
            anchors_matched: Vec::new(),
            has_relation_sentence: report.has_relation_sentence,
            has_polarity_sentence: report.has_polarity_sentence,
            has_hook_intersection_sentence: report.has_hook_intersection_sentence,
            has_role_sentence: report.has_role_sentence,
            has_chain_sentence: report.has_chain_sentence,
        };

        match decision {
            GateDecision::ExactStrict => {
                case.exactness_type = Some(ExactnessType::Strict);
                case.retrieval_tier = RetrievalTier::Strict;
                outcome.exact_strict.push(case);
            }
            GateDecision::ExactProvisional => {
                case.exactness_type = Some(ExactnessType::Provisional);
                case.retrieval_tier = RetrievalTier::Provisional;
                outcome.exact_provisional.push(case);
            }
            GateDecision::NearMiss => {
                case.exactness_type = None;
                case.retrieval_tier = RetrievalTier::Exploratory;
                outcome.near_miss.push(case);
            }
            GateDecision::Reject => {
                outcome.rejected += 1;
                if report.contradiction {
                    outcome.contradiction_rejects += 1;
                }
            }
        }
    }

    for tier in [
        &mut outcome.exact_strict,
        &mut outcome.exact_provisional,
        &mut outcome.near_miss,
    ] {
        tier.sort_by(|a, b| {
            b.confidence_score
                .partial_cmp(&a.confidence_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
    }
    outcome
}
