//! Proposition checklist: the structured legal claim a candidate judgment
//! must satisfy.
//!
//! Compiled once per request from the intent profile and, when available,
//! a reasoner plan. Downstream the planner enforces its axes on query
//! variants and the gate evaluates candidates against it.

use crate::error::ChecklistError;
use crate::intent::OutcomePolarity;
use serde::{Deserialize, Serialize};

/// One proposition axis: a term set that is either required or advisory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Axis {
    /// Whether a strict match must touch this axis.
    pub required: bool,
    /// Terms evidencing the axis.
    pub terms: Vec<String>,
}

impl Axis {
    /// A required axis over the given terms; empty terms demote it to advisory.
    pub fn required(terms: Vec<String>) -> Self {
        let required = !terms.is_empty();
        Self { required, terms }
    }

    /// An advisory axis.
    pub fn advisory(terms: Vec<String>) -> Self {
        Self {
            required: false,
            terms,
        }
    }
}

/// One statutory hook family with a collective match floor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookGroup {
    /// Canonical family id, e.g. `sec_5_limitation_act`.
    pub group_id: String,
    /// Alias terms for the family.
    pub terms: Vec<String>,
    /// How many distinct terms must appear.
    pub min_match: usize,
    /// Whether the group is mandatory for a match.
    pub required: bool,
}

impl HookGroup {
    /// A required group with a floor of one.
    pub fn required(group_id: impl Into<String>, terms: Vec<String>) -> Self {
        Self {
            group_id: group_id.into(),
            terms,
            min_match: 1,
            required: true,
        }
    }
}

/// Relation kinds between two hook groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationType {
    /// The left group presupposes the right.
    Requires,
    /// The left group applies to the right.
    AppliesTo,
    /// The groups must be discussed together.
    InteractsWith,
    /// The left group is displaced by the right.
    ExcludedBy,
}

/// A required or advisory relation between two hook groups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relation {
    /// Stable id for reporting.
    pub relation_id: String,
    /// Relation kind.
    pub relation_type: RelationType,
    /// Left hook group id.
    pub left: String,
    /// Right hook group id.
    pub right: String,
    /// Whether a strict match must satisfy it.
    pub required: bool,
}

/// Outcome constraint with contradiction guards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct OutcomeConstraint {
    /// Required polarity.
    pub polarity: OutcomePolarity,
    /// Whether the outcome is mandatory for a match.
    pub required: bool,
    /// Phrases evidencing the outcome.
    pub terms: Vec<String>,
    /// Phrases that defeat the outcome outright.
    pub contradiction_terms: Vec<String>,
}

/// Role a constrained actor must carry in the judgment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleKind {
    Appellant,
    Respondent,
    Prosecution,
}

impl RoleKind {
    /// Surface forms evidencing the role near an actor term.
    pub fn cues(self) -> &'static [&'static str] {
        match self {
            RoleKind::Appellant => &["appellant", "appellants", "appeal filed by", "preferred an appeal"],
            RoleKind::Respondent => &["respondent", "respondents"],
            RoleKind::Prosecution => &["prosecution", "prosecuted", "prosecutor"],
        }
    }
}

/// Constraint that an actor appears in a specific role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleConstraint {
    /// Actor terms the role attaches to.
    pub actor_terms: Vec<String>,
    /// Required role.
    pub role: RoleKind,
}

/// Constraint that two term families co-occur within a character window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainConstraint {
    /// Left family, e.g. condonation terms.
    pub left_terms: Vec<String>,
    /// Right family, e.g. refusal terms.
    pub right_terms: Vec<String>,
    /// Maximum character distance between a left and right hit.
    pub window_chars: usize,
}

/// Default proximity window for relations and chains.
pub const DEFAULT_WINDOW_CHARS: usize = 220;

/// Role and chain structure of the proposition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct PropositionGraph {
    /// Steps every matching judgment must evidence.
    pub mandatory_steps: Vec<String>,
    /// Steps that strengthen but do not decide a match.
    pub peripheral_steps: Vec<String>,
    /// Actor-role constraints.
    pub role_constraints: Vec<RoleConstraint>,
    /// Proximity chains.
    pub chain_constraints: Vec<ChainConstraint>,
}

/// The compiled proposition checklist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PropositionChecklist {
    /// Actor axis.
    pub actor: Axis,
    /// Proceeding axis.
    pub proceeding: Axis,
    /// Legal hook axis (flattened view of hook-group terms).
    pub legal_hook: Axis,
    /// Outcome axis.
    pub outcome: Axis,
    /// Statutory hook groups.
    pub hook_groups: Vec<HookGroup>,
    /// Relations between hook groups.
    pub relations: Vec<Relation>,
    /// Whether at least two required groups must interact.
    pub interaction_required: bool,
    /// Outcome constraint.
    pub outcome_constraint: OutcomeConstraint,
    /// Role/chain graph.
    pub graph: PropositionGraph,
}

impl PropositionChecklist {
    /// Hook groups that are mandatory for a match.
    pub fn required_hook_groups(&self) -> impl Iterator<Item = &HookGroup> {
        self.hook_groups.iter().filter(|g| g.required)
    }

    /// Relations that are mandatory for a match.
    pub fn required_relations(&self) -> impl Iterator<Item = &Relation> {
        self.relations.iter().filter(|r| r.required)
    }

    /// True when the checklist constrains at least one of hooks, relations
    /// or outcome, making doctrinal near-miss reporting meaningful.
    pub fn is_doctrinally_constrained(&self) -> bool {
        self.required_hook_groups().next().is_some()
            || self.required_relations().next().is_some()
            || self.outcome_constraint.required
    }

    /// Checks structural invariants: relations reference existing groups
    /// and interaction presupposes at least two required groups.
    pub fn validate(&self) -> Result<(), ChecklistError> {
        for relation in &self.relations {
            for group_id in [&relation.left, &relation.right] {
                if !self.hook_groups.iter().any(|g| &g.group_id == group_id) {
                    return Err(ChecklistError::UnknownHookGroup {
                        relation_id: relation.relation_id.clone(),
                        group_id: group_id.clone(),
                    });
                }
            }
        }
        if self.interaction_required {
            let required = self.required_hook_groups().count();
            if required < 2 {
                return Err(ChecklistError::InteractionUnderconstrained { found: required });
            }
        }
        Ok(())
    }
}
