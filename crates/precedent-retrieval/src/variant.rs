//! Query variants: the unit of work the scheduler executes.

use precedent_core::lexicon;
use precedent_core::CourtHint;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Retrieval lane. Phases run in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Primary,
    Fallback,
    Rescue,
    Micro,
    Revolving,
    Browse,
}

impl Phase {
    /// Phases in execution order.
    pub const ALL: [Phase; 6] = [
        Phase::Primary,
        Phase::Fallback,
        Phase::Rescue,
        Phase::Micro,
        Phase::Revolving,
        Phase::Browse,
    ];

    /// Stable label.
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Primary => "primary",
            Phase::Fallback => "fallback",
            Phase::Rescue => "rescue",
            Phase::Micro => "micro",
            Phase::Revolving => "revolving",
            Phase::Browse => "browse",
        }
    }

    /// Base scheduling priority for the phase.
    pub fn base_priority(self) -> i32 {
        match self {
            Phase::Primary => 92,
            Phase::Fallback => 78,
            Phase::Rescue => 62,
            Phase::Micro => 56,
            Phase::Revolving => 48,
            Phase::Browse => 42,
        }
    }

    /// Relaxed phases drop date and court filters at execution time.
    pub fn is_relaxed(self) -> bool {
        matches!(
            self,
            Phase::Rescue | Phase::Micro | Phase::Revolving | Phase::Browse
        )
    }

    /// Token ceiling for normalized phrases in this phase.
    pub fn token_limit(self) -> usize {
        if self == Phase::Primary { 12 } else { 10 }
    }

    /// Phases whose phrases must carry a legal signal token.
    pub fn requires_legal_signal(self) -> bool {
        matches!(self, Phase::Primary | Phase::Fallback)
    }
}

/// How strictly a variant encodes the proposition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strictness {
    Strict,
    Relaxed,
}

/// Provider-facing query mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum QueryMode {
    #[default]
    Precision,
    Expansion,
    Context,
}

/// Directives handed through to the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalDirectives {
    pub query_mode: QueryMode,
    pub doctype_profile: String,
    pub apply_contradiction_exclusions: bool,
}

impl Default for RetrievalDirectives {
    fn default() -> Self {
        Self {
            query_mode: QueryMode::Precision,
            doctype_profile: "judgments".to_string(),
            apply_contradiction_exclusions: false,
        }
    }
}

/// One executable query variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryVariant {
    /// Id derived from the phrase hash.
    pub id: String,
    /// Normalized phrase.
    pub phrase: String,
    pub phase: Phase,
    /// Why the planner emitted this variant.
    pub purpose: String,
    pub court_scope: CourtHint,
    pub strictness: Strictness,
    /// Phrase tokens after normalization.
    pub tokens: Vec<String>,
    /// Dedup and utility-accounting key.
    pub canonical_key: String,
    pub priority: i32,
    pub must_include_tokens: Vec<String>,
    pub must_exclude_tokens: Vec<String>,
    pub provider_hints: Option<serde_json::Value>,
    pub directives: RetrievalDirectives,
}

/// Search operators stripped during normalization.
const OPERATOR_PREFIXES: &[&str] = &["doctypes:", "sortby:", "fromdate:", "todate:", "site:", "author:"];

/// Court words removed from phrases; court scope travels separately.
const COURT_WORDS: &[&str] = &["supreme", "high", "court", "courts", "sc", "hc"];

/// Normalizes a raw phrase for the given phase.
///
/// Lowercases, strips operators and court words, removes structural
/// punctuation, caps the token count, and rejects phrases that are too
/// thin or (for primary/fallback) carry no legal signal.
pub fn normalize_phrase(raw: &str, phase: Phase) -> Option<String> {
    let lowered = raw.to_lowercase();
    let tokens: Vec<String> = lowered
        .split_whitespace()
        .filter(|word| !OPERATOR_PREFIXES.iter().any(|op| word.starts_with(op)))
        .map(|word| {
            word.chars()
                .filter(|c| c.is_alphanumeric() || *c == '-')
                .collect::<String>()
        })
        .filter(|word| !word.is_empty())
        .filter(|word| !COURT_WORDS.contains(&word.as_str()))
        .take(phase.token_limit())
        .collect();

    if tokens.len() < 2 {
        return None;
    }
    if phase.requires_legal_signal()
        && !tokens.iter().any(|token| lexicon::is_legal_signal(token))
    {
        return None;
    }
    Some(tokens.join(" "))
}

/// Canonical key: `{phase}:{strictness}:{normalized phrase}`.
pub fn canonical_key(phase: Phase, strictness: Strictness, phrase: &str) -> String {
    let strictness = match strictness {
        Strictness::Strict => "strict",
        Strictness::Relaxed => "relaxed",
    };
    format!("{}:{strictness}:{phrase}", phase.as_str())
}

fn phrase_id(phrase: &str) -> String {
    let digest = Sha256::digest(phrase.as_bytes());
    let hex: String = digest.iter().take(4).map(|b| format!("{b:02x}")).collect();
    format!("qv_{hex}")
}

impl QueryVariant {
    /// Builds a variant from a raw phrase; `None` when normalization
    /// rejects the phrase.
    pub fn build(
        raw_phrase: &str,
        phase: Phase,
        strictness: Strictness,
        court_scope: CourtHint,
        purpose: impl Into<String>,
    ) -> Option<Self> {
        let phrase = normalize_phrase(raw_phrase, phase)?;
        let tokens: Vec<String> = phrase.split_whitespace().map(|t| t.to_string()).collect();
        let mut priority = phase.base_priority();
        if strictness == Strictness::Strict {
            priority += 12;
        }
        Some(Self {
            id: phrase_id(&phrase),
            canonical_key: canonical_key(phase, strictness, &phrase),
            phrase,
            phase,
            purpose: purpose.into(),
            court_scope,
            strictness,
            tokens,
            priority,
            must_include_tokens: Vec::new(),
            must_exclude_tokens: Vec::new(),
            provider_hints: None,
            directives: RetrievalDirectives::default(),
        })
    }

    /// Overrides the priority.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Sets must-include tokens.
    pub fn with_must_include(mut self, tokens: Vec<String>) -> Self {
        self.must_include_tokens = tokens;
        self
    }

    /// Sets must-exclude tokens.
    pub fn with_must_exclude(mut self, tokens: Vec<String>) -> Self {
        self.must_exclude_tokens = tokens;
        self
    }

    /// Sets retrieval directives.
    pub fn with_directives(mut self, directives: RetrievalDirectives) -> Self {
        self.directives = directives;
        self
    }
}
