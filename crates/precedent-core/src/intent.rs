//! Intent profile: the immutable product of profiling a raw user query.

use crate::checklist::HookGroup;
use serde::{Deserialize, Serialize};

/// Court preference inferred from the query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum CourtHint {
    /// Supreme Court only.
    #[serde(rename = "SC")]
    Supreme,
    /// High Courts only.
    #[serde(rename = "HC")]
    High,
    /// No preference.
    #[serde(rename = "ANY")]
    #[default]
    Any,
}

/// Required disposition of the matter, inferred from the query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OutcomePolarity {
    /// Something (typically sanction) must exist for the proceeding to stand.
    Required,
    /// The same element is held unnecessary.
    NotRequired,
    /// Relief was allowed / granted / condoned.
    Allowed,
    /// Relief was refused / rejected / not condoned.
    Refused,
    /// The matter was dismissed, typically as time barred.
    Dismissed,
    /// Proceedings were quashed.
    Quashed,
    /// No disposition could be inferred.
    #[default]
    Unknown,
}

/// Inclusive date window in unpadded `D-M-YYYY` form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DateWindow {
    /// Window start, if any.
    pub from_date: Option<String>,
    /// Window end, if any.
    pub to_date: Option<String>,
}

impl DateWindow {
    /// True when neither bound is set.
    pub fn is_empty(&self) -> bool {
        self.from_date.is_none() && self.to_date.is_none()
    }
}

/// Entities extracted from the query text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct EntityBag {
    /// Person names (title-prefixed).
    pub persons: Vec<String>,
    /// Organisations and government bodies.
    pub orgs: Vec<String>,
    /// Statute names.
    pub statutes: Vec<String>,
    /// Section / article references.
    pub sections: Vec<String>,
    /// Reporter citations (AIR, SCC).
    pub citations: Vec<String>,
}

/// Retrieval-facing summary attached to the profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct RetrievalIntent {
    /// Deterministically seeded hook groups.
    pub hook_groups: Vec<HookGroup>,
    /// Inferred outcome polarity.
    pub outcome_polarity: OutcomePolarity,
    /// Reporter citations usable as retrieval hints.
    pub citation_hints: Vec<String>,
    /// Judge names usable as retrieval hints.
    pub judge_hints: Vec<String>,
    /// Document-type profile passed to providers.
    pub doctype_profile: String,
}

/// The immutable result of intent profiling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct IntentProfile {
    /// Query with conversational noise removed.
    pub cleaned_query: String,
    /// Recognised legal domains.
    pub domains: Vec<String>,
    /// Recognised legal issues.
    pub issues: Vec<String>,
    /// Recognised statutes.
    pub statutes: Vec<String>,
    /// Recognised procedural postures.
    pub procedures: Vec<String>,
    /// Recognised actor roles.
    pub actors: Vec<String>,
    /// Doctrinal anchor phrases.
    pub anchors: Vec<String>,
    /// Court preference.
    pub court_hint: CourtHint,
    /// Date window, when the query names one.
    pub date_window: DateWindow,
    /// Extracted entities.
    pub entities: EntityBag,
    /// Retrieval-facing summary.
    pub retrieval_intent: RetrievalIntent,
}

impl IntentProfile {
    /// True when the profile carries almost no recognised signal, which
    /// relaxes the reasoner plan usability check.
    pub fn is_sparse(&self) -> bool {
        self.issues.is_empty() && self.statutes.is_empty() && self.procedures.is_empty()
    }
}
