//! Reasoner plan: the optional structured output of an LLM pass.
//!
//! Every field is defaulted so a partially formed plan still parses; the
//! orchestrator decides usability after schema validation and drops the
//! plan entirely when it is not usable.

use crate::intent::OutcomePolarity;
use serde::{Deserialize, Serialize};

/// Hook group as proposed by the reasoner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct PlanHookGroup {
    /// Group id proposed by the model.
    #[serde(default)]
    pub group_id: String,
    /// Terms for the group.
    #[serde(default)]
    pub terms: Vec<String>,
    /// Collective match floor.
    #[serde(default = "default_min_match")]
    pub min_match: usize,
    /// Whether the group is mandatory.
    #[serde(default)]
    pub required: bool,
}

fn default_min_match() -> usize {
    1
}

/// Relation as proposed by the reasoner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct PlanRelation {
    /// One of requires / applies_to / interacts_with / excluded_by.
    #[serde(default)]
    pub r#type: String,
    /// Left group id.
    #[serde(default)]
    pub left_group_id: String,
    /// Right group id.
    #[serde(default)]
    pub right_group_id: String,
    /// Whether the relation is mandatory.
    #[serde(default)]
    pub required: bool,
}

/// Outcome constraint as proposed by the reasoner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct PlanOutcomeConstraint {
    /// Polarity label.
    #[serde(default)]
    pub polarity: OutcomePolarity,
    /// Modality qualifier (e.g. "must", "may").
    #[serde(default)]
    pub modality: String,
    /// Outcome phrases.
    #[serde(default)]
    pub terms: Vec<String>,
    /// Phrases that defeat the outcome.
    #[serde(default)]
    pub contradiction_terms: Vec<String>,
}

/// The structured proposition inside a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct PlanProposition {
    /// Actor phrases.
    #[serde(default)]
    pub actors: Vec<String>,
    /// Proceeding phrases.
    #[serde(default)]
    pub proceeding: Vec<String>,
    /// Legal hook phrases.
    #[serde(default)]
    pub legal_hooks: Vec<String>,
    /// Phrases that must hold in the outcome.
    #[serde(default)]
    pub outcome_required: Vec<String>,
    /// Phrases that must not hold.
    #[serde(default)]
    pub outcome_negative: Vec<String>,
    /// Jurisdiction hint ("SC", "HC", "ANY").
    #[serde(default)]
    pub jurisdiction_hint: String,
    /// Proposed hook groups.
    #[serde(default)]
    pub hook_groups: Vec<PlanHookGroup>,
    /// Proposed relations.
    #[serde(default)]
    pub relations: Vec<PlanRelation>,
    /// Proposed outcome constraint.
    #[serde(default)]
    pub outcome_constraint: Option<PlanOutcomeConstraint>,
    /// Whether the hooks must interact.
    #[serde(default)]
    pub interaction_required: bool,
}

/// A reasoner plan: proposition plus query material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ReasonerPlan {
    /// Structured proposition, when the model produced one.
    #[serde(default)]
    pub proposition: Option<PlanProposition>,
    /// Terms every variant should include.
    #[serde(default)]
    pub must_have_terms: Vec<String>,
    /// Terms every variant should exclude.
    #[serde(default)]
    pub must_not_have_terms: Vec<String>,
    /// Strict query phrases.
    #[serde(default)]
    pub query_variants_strict: Vec<String>,
    /// Broad query phrases.
    #[serde(default)]
    pub query_variants_broad: Vec<String>,
    /// Known case names usable as anchors.
    #[serde(default)]
    pub case_anchors: Vec<String>,
}

impl ReasonerPlan {
    /// True when the plan carries no query material at all.
    pub fn has_variants(&self) -> bool {
        !self.query_variants_strict.is_empty() || !self.query_variants_broad.is_empty()
    }
}
