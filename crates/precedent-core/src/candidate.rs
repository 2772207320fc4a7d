//! Case candidates and scored results.
//!
//! A candidate's URL is its identity; duplicates are merged preferring the
//! record with the higher quality score so evidence is never thrown away.

use serde::{Deserialize, Serialize};

/// Court attribution of a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Court {
    /// Supreme Court of India.
    #[serde(rename = "SC")]
    Supreme,
    /// A High Court.
    #[serde(rename = "HC")]
    High,
    /// Attribution unknown.
    #[serde(rename = "UNKNOWN")]
    #[default]
    Unknown,
}

/// Evidence extracted by a detail fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DetailArtifact {
    /// Ratio-like sentences, each bounded in length.
    pub evidence_windows: Vec<String>,
    /// Short excerpts of the judgment body.
    pub body_excerpt: Vec<String>,
}

impl DetailArtifact {
    /// True when the artifact carries no evidence at all.
    pub fn is_empty(&self) -> bool {
        self.evidence_windows.is_empty() && self.body_excerpt.is_empty()
    }
}

/// A retrieved judgment candidate, keyed by URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CaseCandidate {
    /// Unique identity.
    pub url: String,
    /// Case title as returned by the source.
    pub title: String,
    /// Result snippet.
    pub snippet: String,
    /// Court attribution.
    pub court: Court,
    /// Raw court string from the source, when present.
    pub court_text: Option<String>,
    /// Full detail text, when a detail fetch ran.
    pub detail_text: Option<String>,
    /// Extracted evidence, when a detail fetch ran.
    pub detail_artifact: Option<DetailArtifact>,
    /// Citations made by this judgment.
    pub cites_count: Option<u32>,
    /// Citations of this judgment.
    pub cited_by_count: Option<u32>,
    /// Link to the full document, when distinct from `url`.
    pub full_document_url: Option<String>,
}

impl CaseCandidate {
    /// Minimal candidate.
    pub fn new(url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            ..Default::default()
        }
    }

    /// Richness score used to pick the survivor when two records share a URL.
    pub fn quality_score(&self) -> f64 {
        let mut score = 0.0;
        if self.court != Court::Unknown {
            score += 10.0;
        }
        if self.detail_text.is_some() {
            score += 12.0;
        }
        if self
            .detail_artifact
            .as_ref()
            .is_some_and(|a| !a.evidence_windows.is_empty())
        {
            score += 8.0;
        }
        if self.court_text.is_some() {
            score += 4.0;
        }
        if self.full_document_url.is_some() {
            score += 2.0;
        }
        score += self.snippet.len() as f64 / 120.0;
        if self.cites_count.is_some() {
            score += 1.0;
        }
        if self.cited_by_count.is_some() {
            score += 1.0;
        }
        score
    }

    /// Merges two records sharing a URL, keeping the richer fields.
    pub fn merge(self, other: CaseCandidate) -> CaseCandidate {
        let (mut base, donor) = if self.quality_score() >= other.quality_score() {
            (self, other)
        } else {
            (other, self)
        };
        if base.snippet.len() < donor.snippet.len() {
            base.snippet = donor.snippet;
        }
        if base.court == Court::Unknown {
            base.court = donor.court;
        }
        if base.court_text.is_none() {
            base.court_text = donor.court_text;
        }
        if base.detail_text.is_none() {
            base.detail_text = donor.detail_text;
        }
        if base.detail_artifact.is_none() {
            base.detail_artifact = donor.detail_artifact;
        }
        if base.cites_count.is_none() {
            base.cites_count = donor.cites_count;
        }
        if base.cited_by_count.is_none() {
            base.cited_by_count = donor.cited_by_count;
        }
        if base.full_document_url.is_none() {
            base.full_document_url = donor.full_document_url;
        }
        base
    }
}

/// Confidence band derived from the calibrated score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConfidenceBand {
    VeryHigh,
    High,
    Medium,
    #[default]
    Low,
}

/// Exactness tier assigned by the proposition gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExactnessType {
    Strict,
    Provisional,
}

/// User-visible retrieval lane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalTier {
    Strict,
    Provisional,
    #[default]
    Exploratory,
}

/// Verification facts recorded for a candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Verification {
    /// Whether a detail fetch backed the evaluation.
    pub detail_checked: bool,
    /// Issues matched in the candidate text.
    pub issues_matched: Vec<String>,
    /// Procedures matched.
    pub procedures_matched: Vec<String>,
    /// Anchors matched.
    pub anchors_matched: Vec<String>,
    /// An evidence sentence satisfied a relation.
    pub has_relation_sentence: bool,
    /// An evidence sentence satisfied the polarity.
    pub has_polarity_sentence: bool,
    /// An evidence sentence intersected two hook groups.
    pub has_hook_intersection_sentence: bool,
    /// An evidence sentence tied the actor to its role.
    pub has_role_sentence: bool,
    /// An evidence sentence satisfied a chain.
    pub has_chain_sentence: bool,
}

/// A candidate with its scores and gate outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredCase {
    /// The underlying candidate.
    #[serde(flatten)]
    pub candidate: CaseCandidate,
    /// Lexical/context score in [0, 1].
    pub score: f64,
    /// Ranking score after boosts.
    pub ranking_score: f64,
    /// Calibrated confidence in [0, 1].
    pub confidence_score: f64,
    /// Confidence band.
    pub confidence_band: ConfidenceBand,
    /// Human-readable reasons for the placement.
    pub reasons: Vec<String>,
    /// One-line summary of why the case was selected.
    pub selection_summary: String,
    /// Verification facts.
    pub verification: Verification,
    /// Gate exactness, when the candidate passed the gate.
    pub exactness_type: Option<ExactnessType>,
    /// Matched proposition elements.
    pub match_evidence: Vec<String>,
    /// Required elements that did not match.
    pub missing_core_elements: Vec<String>,
    /// Mandatory steps that did not match.
    pub missing_mandatory_steps: Vec<String>,
    /// User-visible lane.
    pub retrieval_tier: RetrievalTier,
    /// Set when the row was produced by a fallback lane.
    pub fallback_reason: Option<String>,
}

impl ScoredCase {
    /// Wraps a candidate with neutral scores.
    pub fn unscored(candidate: CaseCandidate) -> Self {
        Self {
            candidate,
            score: 0.0,
            ranking_score: 0.0,
            confidence_score: 0.0,
            confidence_band: ConfidenceBand::Low,
            reasons: Vec::new(),
            selection_summary: String::new(),
            verification: Verification::default(),
            exactness_type: None,
            match_evidence: Vec::new(),
            missing_core_elements: Vec::new(),
            missing_mandatory_steps: Vec::new(),
            retrieval_tier: RetrievalTier::Exploratory,
            fallback_reason: None,
        }
    }
}
