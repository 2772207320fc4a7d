//! The assembled search response and its trace shapes.

use crate::candidate::ScoredCase;
use crate::intent::{CourtHint, OutcomePolarity};
use serde::{Deserialize, Serialize};

/// Overall request outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SearchStatus {
    /// Retrieval ran to completion.
    #[default]
    Completed,
    /// Some work completed but the request was cut short.
    Partial,
    /// The source blocked the request before anything useful happened.
    Blocked,
    /// Retrieval completed but nothing survived the gate.
    NoMatch,
}

/// Where guarantee rows came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum GuaranteeSource {
    /// Live backfill retrieval.
    Live,
    /// A recalled prior response.
    StaleCache,
    /// A synthetic advisory row.
    Synthetic,
    /// The guarantee was not needed or could not be met.
    #[default]
    None,
}

/// Record of the always-return guarantee for one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Guarantee {
    /// Minimum rows the response should carry.
    pub target: usize,
    /// Whether the target was met.
    pub met: bool,
    /// Whether any fallback lane was exercised.
    pub used: bool,
    /// Which lane supplied the rows.
    pub source: GuaranteeSource,
}

/// Per-tier result counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct TierCounts {
    pub strict: usize,
    pub provisional: usize,
    pub exploratory: usize,
}

impl TierCounts {
    /// Total rows across tiers.
    pub fn total(&self) -> usize {
        self.strict + self.provisional + self.exploratory
    }
}

/// One named stage in the pipeline trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceStage {
    /// Stage label, e.g. `reasoner_pass1`, `scheduler_run_1`.
    pub stage: String,
    /// Structured stage telemetry.
    pub detail: serde_json::Value,
}

/// Accumulated telemetry for one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PipelineTrace {
    /// Stages in execution order.
    pub stages: Vec<TraceStage>,
}

impl PipelineTrace {
    /// Appends a stage, serializing its detail.
    pub fn push<T: Serialize>(&mut self, stage: impl Into<String>, detail: &T) {
        let detail = serde_json::to_value(detail).unwrap_or(serde_json::Value::Null);
        self.stages.push(TraceStage {
            stage: stage.into(),
            detail,
        });
    }
}

/// Profile summary surfaced to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Insights {
    /// Recognised domains.
    pub domains: Vec<String>,
    /// Recognised issues.
    pub issues: Vec<String>,
    /// Recognised statutes.
    pub statutes: Vec<String>,
    /// Court preference.
    pub court_hint: CourtHint,
    /// Inferred outcome polarity.
    pub outcome_polarity: OutcomePolarity,
}

/// The assembled result of one search request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SearchResponse {
    /// Overall outcome.
    pub status: SearchStatus,
    /// Strictly matching cases.
    pub cases_exact_strict: Vec<ScoredCase>,
    /// Provisionally matching cases.
    pub cases_exact_provisional: Vec<ScoredCase>,
    /// Exploratory cases.
    pub cases_exploratory: Vec<ScoredCase>,
    /// Per-tier counts.
    pub tier_counts: TierCounts,
    /// Always-return guarantee record.
    pub guarantee: Guarantee,
    /// Per-stage telemetry.
    pub pipeline_trace: PipelineTrace,
    /// Human-readable notes about degraded paths.
    pub notes: Vec<String>,
    /// Profile summary.
    pub insights: Insights,
}

impl SearchResponse {
    /// Recomputes tier counts from the case lists.
    pub fn refresh_tier_counts(&mut self) {
        self.tier_counts = TierCounts {
            strict: self.cases_exact_strict.len(),
            provisional: self.cases_exact_provisional.len(),
            exploratory: self.cases_exploratory.len(),
        };
    }
}
