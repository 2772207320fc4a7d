//! Retrieval scheduler: executes query variants under strict budgets.
//!
//! Attempts are strictly sequential so blocked-count accumulation and
//! adaptive reordering stay meaningful. The carry state is an owned value
//! returned to the caller, which threads it into the next scheduler run;
//! four runs of one request accumulate as if they were a single run.

use crate::classify::{classify, is_case_like, CandidateKind};
use crate::provider::{BlockedType, ProviderRequest, RetrievalProvider};
use crate::variant::{Phase, QueryVariant};
use precedent_core::{CaseCandidate, Court, CourtHint, DateWindow};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

/// Scheduler configuration; clamped upstream by the pipeline config.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub strict_case_only: bool,
    pub verify_limit: usize,
    /// Attempt budget across all runs of one request.
    pub global_budget: u32,
    /// Per-phase variant slice sizes.
    pub phase_limits: HashMap<Phase, usize>,
    pub blocked_threshold: u32,
    pub min_case_target: usize,
    pub require_supreme_court: bool,
    /// Wall-clock budget across all runs of one request.
    pub max_elapsed_ms: u64,
    pub stop_on_candidate_target: bool,
    pub fetch_timeout_ms: u64,
    pub fetch_timeout_cap_ms: u64,
    pub max_429_retries: u32,
    pub max_retry_after_ms: u64,
    pub max_pages_primary: usize,
    pub max_pages_fallback: usize,
    pub max_pages_other: usize,
    pub adaptive_reorder: bool,
    pub max_results_per_phrase: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        let mut phase_limits = HashMap::new();
        phase_limits.insert(Phase::Primary, 6);
        phase_limits.insert(Phase::Fallback, 5);
        phase_limits.insert(Phase::Rescue, 4);
        phase_limits.insert(Phase::Micro, 4);
        phase_limits.insert(Phase::Revolving, 3);
        phase_limits.insert(Phase::Browse, 3);
        Self {
            strict_case_only: true,
            verify_limit: 6,
            global_budget: 14,
            phase_limits,
            blocked_threshold: 3,
            min_case_target: 6,
            require_supreme_court: false,
            max_elapsed_ms: 9_000,
            stop_on_candidate_target: true,
            fetch_timeout_ms: 3_000,
            fetch_timeout_cap_ms: 3_500,
            max_429_retries: 1,
            max_retry_after_ms: 4_000,
            max_pages_primary: 2,
            max_pages_fallback: 2,
            max_pages_other: 1,
            adaptive_reorder: true,
            max_results_per_phrase: 10,
        }
    }
}

impl SchedulerConfig {
    fn phase_limit(&self, phase: Phase) -> usize {
        self.phase_limits.get(&phase).copied().unwrap_or(3)
    }

    fn max_pages(&self, phase: Phase) -> usize {
        match phase {
            Phase::Primary => self.max_pages_primary,
            Phase::Fallback => self.max_pages_fallback,
            _ => self.max_pages_other,
        }
    }
}

/// Running utility statistics for one canonical variant key.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
pub struct VariantUtility {
    pub mean_utility: f64,
    pub samples: u32,
    pub case_like_hits: u32,
    pub challenges: u32,
    pub timeouts: u32,
}

impl VariantUtility {
    fn observe(&mut self, utility: f64, case_like: bool, challenge: bool, timed_out: bool) {
        let n = self.samples as f64;
        self.mean_utility = (self.mean_utility * n + utility) / (n + 1.0);
        self.samples += 1;
        if case_like {
            self.case_like_hits += 1;
        }
        if challenge {
            self.challenges += 1;
        }
        if timed_out {
            self.timeouts += 1;
        }
    }

    fn rate(hits: u32, samples: u32) -> f64 {
        if samples == 0 {
            0.0
        } else {
            hits as f64 / samples as f64
        }
    }

    /// Reorder score contribution for this key.
    pub fn reorder_bonus(&self) -> f64 {
        40.0 * self.mean_utility + 18.0 * Self::rate(self.case_like_hits, self.samples)
            - 14.0 * Self::rate(self.challenges, self.samples)
            - 8.0 * Self::rate(self.timeouts, self.samples)
    }
}

/// Record of one scheduler attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attempt {
    pub phase: Phase,
    pub variant_id: String,
    pub canonical_key: String,
    pub priority: i32,
    pub phrase: String,
    pub status: String,
    pub ok: bool,
    pub parsed_count: usize,
    pub elapsed_ms: u64,
    pub challenge: bool,
    pub cooldown: bool,
    pub rate_limited: bool,
    pub timed_out: bool,
    pub html_preview: Option<String>,
    pub error: Option<String>,
}

/// Why a scheduler run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    Completed,
    EnoughCandidates,
    BudgetExhausted,
    Blocked,
}

/// State threaded across scheduler runs of one request.
#[derive(Debug, Clone)]
pub struct CarryState {
    pub started_at: Instant,
    pub seen_signatures: HashSet<String>,
    pub attempts_used: u32,
    pub skipped_duplicates: u32,
    pub blocked_count: u32,
    pub blocked_reason: Option<String>,
    pub blocked_kind: Option<BlockedType>,
    pub retry_after_ms: Option<u64>,
    pub variant_utility: HashMap<String, VariantUtility>,
    /// url -> canonical keys of the variants that surfaced it.
    pub candidate_provenance: HashMap<String, Vec<String>>,
    pub attempts: Vec<Attempt>,
    /// Deduped by URL, merged by quality score.
    pub candidates: Vec<CaseCandidate>,
}

impl Default for CarryState {
    fn default() -> Self {
        Self::new()
    }
}

impl CarryState {
    /// Fresh state; starts the request clock.
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            seen_signatures: HashSet::new(),
            attempts_used: 0,
            skipped_duplicates: 0,
            blocked_count: 0,
            blocked_reason: None,
            blocked_kind: None,
            retry_after_ms: None,
            variant_utility: HashMap::new(),
            candidate_provenance: HashMap::new(),
            attempts: Vec::new(),
            candidates: Vec::new(),
        }
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.started_at.elapsed().as_millis() as u64
    }

    fn absorb_candidate(&mut self, candidate: CaseCandidate, canonical_key: &str) {
        self.candidate_provenance
            .entry(candidate.url.clone())
            .or_default()
            .push(canonical_key.to_string());
        if let Some(existing) = self
            .candidates
            .iter()
            .position(|c| c.url == candidate.url)
        {
            let merged = self.candidates.swap_remove(existing).merge(candidate);
            self.candidates.push(merged);
        } else {
            self.candidates.push(candidate);
        }
    }

    fn case_like_count(&self) -> usize {
        self.candidates.iter().filter(|c| is_case_like(c)).count()
    }

    fn has_supreme_candidate(&self) -> bool {
        self.candidates.iter().any(|c| c.court == Court::Supreme)
    }
}

/// A finished scheduler run.
#[derive(Debug)]
pub struct SchedulerResult {
    pub stop_reason: StopReason,
    /// Qualified stop detail, e.g. `blocked_threshold_reached:3`.
    pub stop_detail: Option<String>,
    pub carry: CarryState,
}

fn court_type_label(scope: CourtHint) -> Option<String> {
    match scope {
        CourtHint::Supreme => Some("supremecourt".to_string()),
        CourtHint::High => Some("highcourts".to_string()),
        CourtHint::Any => None,
    }
}

fn utility_score(
    ok: bool,
    parsed_count: usize,
    case_like: usize,
    statute_like: usize,
    challenge: bool,
    timed_out: bool,
) -> f64 {
    let parsed_signal = if ok && parsed_count > 0 { 1.0 } else { 0.0 };
    let total = parsed_count.max(1) as f64;
    let case_ratio = case_like as f64 / total;
    let statute_ratio = statute_like as f64 / total;
    let challenge_penalty = if challenge { 0.25 } else { 0.0 };
    let timeout_penalty = if timed_out { 0.15 } else { 0.0 };
    (parsed_signal * 0.40 + case_ratio * 0.45 - statute_ratio * 0.18
        - challenge_penalty
        - timeout_penalty)
        .clamp(0.0, 1.0)
}

/// Runs one scheduler pass over `variants`, accumulating into `carry`.
pub async fn run_scheduler(
    provider: &dyn RetrievalProvider,
    variants: &[QueryVariant],
    config: &SchedulerConfig,
    date_window: &DateWindow,
    mut carry: CarryState,
) -> SchedulerResult {
    let mut stop_reason = StopReason::Completed;
    let mut stop_detail: Option<String> = None;

    'phases: for phase in Phase::ALL {
        let mut slice: Vec<QueryVariant> = variants
            .iter()
            .filter(|v| v.phase == phase)
            .take(config.phase_limit(phase))
            .cloned()
            .collect();

        while !slice.is_empty() {
            if config.adaptive_reorder {
                slice.sort_by(|a, b| {
                    let score = |v: &QueryVariant| {
                        v.priority as f64
                            + carry
                                .variant_utility
                                .get(&v.canonical_key)
                                .map(VariantUtility::reorder_bonus)
                                .unwrap_or(0.0)
                    };
                    score(b)
                        .partial_cmp(&score(a))
                        .unwrap_or(std::cmp::Ordering::Equal)
                });
            }
            let variant = slice.remove(0);

            let elapsed = carry.elapsed_ms();
            if elapsed >= config.max_elapsed_ms {
                stop_reason = StopReason::BudgetExhausted;
                stop_detail = Some(format!("time_budget_exhausted:{}", carry.attempts_used));
                break 'phases;
            }
            if carry.attempts_used >= config.global_budget {
                stop_reason = StopReason::BudgetExhausted;
                stop_detail = Some("budget_exhausted".to_string());
                break 'phases;
            }

            let relaxed = variant.phase.is_relaxed();
            let court_type = if relaxed {
                None
            } else {
                court_type_label(variant.court_scope)
            };
            let (from_date, to_date) = if relaxed {
                (None, None)
            } else {
                (date_window.from_date.clone(), date_window.to_date.clone())
            };

            let signature = format!(
                "{}|{}|{}|{}|{}",
                variant.phase.as_str(),
                variant.phrase,
                court_type.as_deref().unwrap_or("any"),
                from_date.as_deref().unwrap_or(""),
                to_date.as_deref().unwrap_or("")
            );
            if !carry.seen_signatures.insert(signature) {
                carry.skipped_duplicates += 1;
                continue;
            }

            let remaining = config.max_elapsed_ms.saturating_sub(elapsed);
            if remaining < 1_000 {
                stop_reason = StopReason::BudgetExhausted;
                stop_detail = Some(format!("time_budget_exhausted:{}", carry.attempts_used));
                break 'phases;
            }
            let fetch_timeout_ms = config
                .fetch_timeout_ms
                .min(config.fetch_timeout_cap_ms)
                .min(remaining.saturating_sub(250));

            let request = ProviderRequest {
                phrase: variant.phrase.clone(),
                court_scope: variant.court_scope,
                max_results_per_phrase: config.max_results_per_phrase,
                max_pages: config.max_pages(variant.phase),
                court_type,
                from_date,
                to_date,
                sort_by_most_recent: false,
                crawl_max_elapsed_ms: remaining,
                fetch_timeout_ms,
                max_429_retries: config.max_429_retries,
                max_retry_after_ms: config.max_retry_after_ms,
                cooldown_scope: None,
                compiled_query: None,
                include_tokens: variant.must_include_tokens.clone(),
                exclude_tokens: variant.must_exclude_tokens.clone(),
                provider_hints: variant.provider_hints.clone(),
                query_mode: variant.directives.query_mode,
                doctype_profile: variant.directives.doctype_profile.clone(),
                variant_priority: variant.priority,
            };

            carry.attempts_used += 1;
            let attempt_started = Instant::now();
            let outcome = provider.search(&request).await;

            let (cases, debug) = match outcome {
                Ok(outcome) => (outcome.cases, outcome.debug),
                Err(error) => (Vec::new(), error.debug),
            };

            let case_like = cases.iter().filter(|c| is_case_like(c)).count();
            let statute_like = cases
                .iter()
                .filter(|c| classify(c).kind == CandidateKind::Statute)
                .count();
            let challenge = debug.challenge_detected;
            let timed_out = debug.timed_out;
            let utility = utility_score(
                debug.ok,
                debug.parsed_count.max(cases.len()),
                case_like,
                statute_like,
                challenge,
                timed_out,
            );
            carry
                .variant_utility
                .entry(variant.canonical_key.clone())
                .or_default()
                .observe(utility, case_like > 0, challenge, timed_out);

            for case in cases {
                carry.absorb_candidate(case, &variant.canonical_key);
            }

            carry.attempts.push(Attempt {
                phase: variant.phase,
                variant_id: variant.id.clone(),
                canonical_key: variant.canonical_key.clone(),
                priority: variant.priority,
                phrase: variant.phrase.clone(),
                status: debug
                    .status
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "none".to_string()),
                ok: debug.ok,
                parsed_count: debug.parsed_count,
                elapsed_ms: attempt_started.elapsed().as_millis() as u64,
                challenge,
                cooldown: debug.cooldown_active,
                rate_limited: debug.blocked_type == Some(BlockedType::RateLimit),
                timed_out,
                html_preview: debug.html_preview.clone(),
                error: debug.error.clone(),
            });

            if debug.blocked_type == Some(BlockedType::LocalCooldown) || debug.cooldown_active {
                carry.blocked_kind = Some(BlockedType::LocalCooldown);
                carry.blocked_reason = Some("local_cooldown".to_string());
                carry.retry_after_ms = debug.retry_after_ms;
                stop_reason = StopReason::Blocked;
                stop_detail = Some("local_cooldown".to_string());
                break 'phases;
            }

            if challenge || debug.blocked_type == Some(BlockedType::RateLimit) {
                carry.blocked_count += 1;
                carry.blocked_kind = Some(if challenge {
                    BlockedType::CloudflareChallenge
                } else {
                    BlockedType::RateLimit
                });
                if let Some(retry_after) = debug.retry_after_ms {
                    carry.retry_after_ms = Some(retry_after.min(config.max_retry_after_ms));
                }
                if carry.blocked_count >= config.blocked_threshold {
                    carry.blocked_reason =
                        Some(format!("blocked_threshold_reached:{}", carry.blocked_count));
                    stop_reason = StopReason::Blocked;
                    stop_detail = carry.blocked_reason.clone();
                    break 'phases;
                }
                let delay = rand::rng().random_range(220..=400);
                tokio::time::sleep(Duration::from_millis(delay)).await;
                continue;
            }

            if timed_out {
                tokio::time::sleep(Duration::from_millis(90)).await;
                continue;
            }

            carry.blocked_count = 0;

            if config.stop_on_candidate_target
                && carry.case_like_count() >= config.min_case_target
                && (!config.require_supreme_court || carry.has_supreme_candidate())
            {
                stop_reason = StopReason::EnoughCandidates;
                stop_detail = Some("enough_candidates".to_string());
                break 'phases;
            }

            if config.max_elapsed_ms.saturating_sub(carry.elapsed_ms()) > 1_000 {
                let pause = rand::rng().random_range(80..=160);
                tokio::time::sleep(Duration::from_millis(pause)).await;
            }
        }
    }

    tracing::debug!(
        attempts = carry.attempts_used,
        candidates = carry.candidates.len(),
        ?stop_reason,
        "scheduler run finished"
    );
    SchedulerResult {
        stop_reason,
        stop_detail,
        carry,
    }
}
