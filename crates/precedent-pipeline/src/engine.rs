//! Pipeline engine: drives one search request end to end.
//!
//! One request is one pass through: intent profiling, reasoner pass-1,
//! deterministic + reasoner variants, a first scheduler run, evaluation
//! (classify, verify, score, diversify, gate), then the conditional
//! stages in order: trace expansion, reasoner pass-2, guarantee backfill,
//! stale-cache recall, synthetic advisory. The scheduler carry state
//! accumulates across runs, so budgets hold for the request as a whole.

use crate::config::PipelineConfig;
use crate::stale;
use precedent_cache::SharedCache;
use precedent_core::{
    build_proposition_checklist, profile_query, CaseCandidate, ConfidenceBand, ExactnessType,
    Guarantee, GuaranteeSource, Insights, IntentProfile, PipelineTrace, PropositionChecklist,
    PropositionGraph, ReasonerPlan, RetrievalTier, ScoredCase, SearchResponse, SearchStatus,
};
use precedent_rank::{
    apply_supreme_preference, build_lexical_profile, diversify, gate_candidates, score_candidate,
    verify_candidates, CalibrationWeights, GateConfig, GateOutcome, ScorerWeights, VerifierConfig,
    VerifierStats,
};
use precedent_retrieval::{
    build_guarantee_variants, build_trace_variants, build_variants, passes_case_filter,
    run_scheduler, variant_satisfies_hooks, CarryState, QueryVariant, RetrievalProvider,
    SchedulerResult, StopReason,
};
use precedent_reasoner::{ReasonerOrchestrator, ReasonerPass};
use std::sync::Arc;

const TRACE_SEED_TITLES: usize = 4;
const PASS2_SNIPPETS: usize = 10;

/// The engine owning one process's pipeline collaborators.
pub struct PipelineEngine {
    config: PipelineConfig,
    cache: Arc<dyn SharedCache>,
    reasoner: Arc<ReasonerOrchestrator>,
    provider: Arc<dyn RetrievalProvider>,
}

struct Evaluation {
    gate: GateOutcome,
    verifier_stats: VerifierStats,
    collapsed: usize,
    boosted: usize,
    ranked_titles: Vec<String>,
    snippets: Vec<String>,
}

/// Plan-only output for clients performing direct retrieval.
#[derive(Debug, serde::Serialize)]
pub struct PlanOutput {
    pub profile: IntentProfile,
    pub plan: Option<ReasonerPlan>,
    pub reasoner_telemetry: serde_json::Value,
    pub checklist: PropositionChecklist,
    pub variants: Vec<QueryVariant>,
}

fn run_summary(result: &SchedulerResult) -> serde_json::Value {
    serde_json::json!({
        "attempts_used": result.carry.attempts_used,
        "candidates": result.carry.candidates.len(),
        "skipped_duplicates": result.carry.skipped_duplicates,
        "stop_reason": result.stop_reason,
        "stop_detail": result.stop_detail,
        "blocked_count": result.carry.blocked_count,
        "blocked_kind": result.carry.blocked_kind,
        "retry_after_ms": result.carry.retry_after_ms,
    })
}

fn encode_query(query: &str) -> String {
    query
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("+")
        .replace('"', "")
}

impl PipelineEngine {
    /// Creates an engine over the process collaborators.
    pub fn new(
        config: PipelineConfig,
        cache: Arc<dyn SharedCache>,
        reasoner: Arc<ReasonerOrchestrator>,
        provider: Arc<dyn RetrievalProvider>,
    ) -> Self {
        Self {
            config,
            cache,
            reasoner,
            provider,
        }
    }

    /// The engine's configuration.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// The shared cache (used by the API surface for rate limiting).
    pub fn cache(&self) -> &Arc<dyn SharedCache> {
        &self.cache
    }

    /// The reasoner orchestrator (used by the health probe).
    pub fn reasoner(&self) -> &Arc<ReasonerOrchestrator> {
        &self.reasoner
    }

    fn apply_proposition_flags(&self, checklist: &mut PropositionChecklist) {
        if !self.config.proposition.v3 {
            for group in &mut checklist.hook_groups {
                group.required = false;
            }
            checklist.relations.clear();
            checklist.interaction_required = false;
            checklist.legal_hook.required = false;
            checklist.outcome_constraint.required = false;
            checklist.outcome.required = false;
        }
        if !self.config.proposition.v5 {
            checklist.graph = PropositionGraph::default();
        }
    }

    async fn evaluate(
        &self,
        mut candidates: Vec<CaseCandidate>,
        checklist: &PropositionChecklist,
        profile: &IntentProfile,
        variants: &[QueryVariant],
    ) -> Evaluation {
        candidates.retain(|c| passes_case_filter(c, true));
        let verifier_config = VerifierConfig {
            verify_limit: self.config.verify_limit,
            fetch_timeout_ms: self.config.fetch_timeout_ms,
            ..Default::default()
        };
        let verifier_stats = verify_candidates(
            self.provider.as_ref(),
            &mut candidates,
            checklist,
            &verifier_config,
        )
        .await;

        let lexical = build_lexical_profile(checklist, variants);
        let weights = ScorerWeights::default();
        let mut scored: Vec<ScoredCase> = candidates
            .into_iter()
            .map(|candidate| {
                let (score, reasons) =
                    score_candidate(profile, checklist, &lexical, &candidate, &weights);
                let mut case = ScoredCase::unscored(candidate);
                case.score = score;
                case.ranking_score = score;
                case.reasons = reasons;
                case
            })
            .collect();
        scored.sort_by(|a, b| {
            b.ranking_score
                .partial_cmp(&a.ranking_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let diversity = diversify(scored);
        let mut kept = diversity.kept;
        let boosted = apply_supreme_preference(&mut kept, self.config.prefer_supreme);

        let ranked_titles: Vec<String> = kept
            .iter()
            .take(TRACE_SEED_TITLES)
            .map(|case| case.candidate.title.clone())
            .collect();
        let snippets: Vec<String> = kept
            .iter()
            .take(PASS2_SNIPPETS)
            .map(|case| {
                format!(
                    "{}: {}",
                    case.candidate.title,
                    case.candidate.snippet.chars().take(200).collect::<String>()
                )
            })
            .collect();

        let gate = gate_candidates(
            kept,
            checklist,
            &GateConfig::default(),
            &CalibrationWeights::default(),
        );
        Evaluation {
            gate,
            verifier_stats,
            collapsed: diversity.collapsed,
            boosted,
            ranked_titles,
            snippets,
        }
    }

    fn quality_shortfall(&self, gate: &GateOutcome) -> bool {
        let exact = gate.exact_strict.len() + gate.exact_provisional.len();
        exact < self.config.proposition.strict_stop_target || gate.contradiction_rejects > 0
    }

    fn synthetic_advisory(&self, profile: &IntentProfile) -> ScoredCase {
        let url = format!(
            "{}{}",
            self.config.upstream_search_url,
            encode_query(&profile.cleaned_query)
        );
        let candidate = CaseCandidate {
            snippet: format!(
                "No indexed judgment satisfied every required element of this proposition \
                 ({} issue(s), {} statutory hook(s)). The linked search covers the closest \
                 doctrinal neighbourhood.",
                profile.issues.len().max(1),
                profile.retrieval_intent.hook_groups.len()
            ),
            ..CaseCandidate::new(
                url,
                "Advisory: non-citation gap for this proposition",
            )
        };
        let mut case = ScoredCase::unscored(candidate);
        case.confidence_score = 0.2;
        case.confidence_band = ConfidenceBand::Low;
        case.retrieval_tier = RetrievalTier::Exploratory;
        case.fallback_reason = Some("synthetic_advisory".to_string());
        case.selection_summary =
            "no citable judgment matched; advisory pointer to the closest search".to_string();
        case
    }

    /// Builds the plan, checklist and variants without retrieval. Used by
    /// clients that perform direct retrieval themselves.
    pub async fn plan(&self, raw_query: &str) -> PlanOutput {
        let profile = profile_query(raw_query);
        let pass1 = self
            .reasoner
            .run(ReasonerPass::Pass1, &profile, 0, None, &[])
            .await;
        let mut checklist = build_proposition_checklist(&profile, pass1.plan.as_ref());
        self.apply_proposition_flags(&mut checklist);
        let variants = build_variants(&profile, &checklist, pass1.plan.as_ref());
        PlanOutput {
            profile,
            plan: pass1.plan,
            reasoner_telemetry: serde_json::to_value(&pass1.telemetry)
                .unwrap_or(serde_json::Value::Null),
            checklist,
            variants,
        }
    }

    /// Runs classification, verification, scoring and gating over
    /// candidates a client retrieved directly.
    pub async fn finalize(
        &self,
        raw_query: &str,
        candidates: Vec<CaseCandidate>,
        max_results: usize,
    ) -> SearchResponse {
        let profile = profile_query(raw_query);
        let mut checklist = build_proposition_checklist(&profile, None);
        self.apply_proposition_flags(&mut checklist);
        let variants = build_variants(&profile, &checklist, None);
        let mut evaluation = self
            .evaluate(candidates, &checklist, &profile, &variants)
            .await;

        let mut trace = PipelineTrace::default();
        trace.push("verifier_finalize", &evaluation.verifier_stats);
        let mut strict_rows = std::mem::take(&mut evaluation.gate.exact_strict);
        let mut provisional_rows = std::mem::take(&mut evaluation.gate.exact_provisional);
        let mut exploratory_rows = std::mem::take(&mut evaluation.gate.near_miss);
        if !self.config.proposition.v41 {
            for mut case in strict_rows.drain(..) {
                case.exactness_type = Some(ExactnessType::Provisional);
                case.retrieval_tier = RetrievalTier::Provisional;
                provisional_rows.push(case);
            }
        }
        let mut remaining = max_results.max(1);
        for tier in [&mut strict_rows, &mut provisional_rows, &mut exploratory_rows] {
            if tier.len() > remaining {
                tier.truncate(remaining);
            }
            remaining -= tier.len();
        }
        let total = strict_rows.len() + provisional_rows.len() + exploratory_rows.len();
        let mut response = SearchResponse {
            status: if total == 0 {
                SearchStatus::NoMatch
            } else {
                SearchStatus::Completed
            },
            cases_exact_strict: strict_rows,
            cases_exact_provisional: provisional_rows,
            cases_exploratory: exploratory_rows,
            tier_counts: Default::default(),
            guarantee: Guarantee {
                target: self.config.guarantee.min_results,
                met: total >= self.config.guarantee.min_results,
                used: false,
                source: GuaranteeSource::None,
            },
            pipeline_trace: trace,
            notes: Vec::new(),
            insights: Insights {
                domains: profile.domains.clone(),
                issues: profile.issues.clone(),
                statutes: profile.statutes.clone(),
                court_hint: profile.court_hint,
                outcome_polarity: profile.retrieval_intent.outcome_polarity,
            },
        };
        response.refresh_tier_counts();
        response
    }

    /// Runs one search request.
    pub async fn search(&self, raw_query: &str, max_results: usize) -> SearchResponse {
        let profile = profile_query(raw_query);
        let mut trace = PipelineTrace::default();
        let mut notes: Vec<String> = Vec::new();
        let mut reasoner_calls = 0u32;

        let pass1 = self
            .reasoner
            .run(ReasonerPass::Pass1, &profile, reasoner_calls, None, &[])
            .await;
        reasoner_calls += 1;
        trace.push("reasoner_pass1", &pass1.telemetry);
        if pass1.telemetry.degraded {
            notes.push("reasoner degraded; deterministic planning used".to_string());
        }

        let extended = pass1.telemetry.timeout && pass1.plan.is_none();
        let (budget_bonus, phase_bonus) = if extended {
            notes.push("reasoner timeout; extended deterministic budgets applied".to_string());
            (self.config.extended_budget_bonus, 1)
        } else {
            (0, 0)
        };

        let mut plan: Option<ReasonerPlan> = pass1.plan;
        let mut checklist = build_proposition_checklist(&profile, plan.as_ref());
        self.apply_proposition_flags(&mut checklist);
        let mut variants = build_variants(&profile, &checklist, plan.as_ref());

        let scheduler_config = self.config.scheduler_config(budget_bonus, phase_bonus);
        let mut result = run_scheduler(
            self.provider.as_ref(),
            &variants,
            &scheduler_config,
            &profile.date_window,
            CarryState::new(),
        )
        .await;
        trace.push("scheduler_run_1", &run_summary(&result));

        let mut evaluation = self
            .evaluate(result.carry.candidates.clone(), &checklist, &profile, &variants)
            .await;
        trace.push("verifier_1", &evaluation.verifier_stats);

        // Trace expansion: only worthwhile under extended-deterministic
        // recovery, with budget and time to spend.
        let blocked = result.stop_reason == StopReason::Blocked;
        let attempts_left = scheduler_config
            .global_budget
            .saturating_sub(result.carry.attempts_used);
        let remaining_ms = self
            .config
            .max_elapsed_ms
            .saturating_sub(result.carry.elapsed_ms());
        if extended
            && !blocked
            && evaluation.gate.exact_strict.len() < self.config.proposition.strict_stop_target
            && attempts_left >= 3
            && remaining_ms >= self.config.guarantee.min_remaining_ms
        {
            let trace_variants: Vec<QueryVariant> =
                build_trace_variants(&evaluation.ranked_titles, &checklist)
                    .into_iter()
                    .filter(|variant| variant_satisfies_hooks(variant, &checklist))
                    .collect();
            if !trace_variants.is_empty() {
                result = run_scheduler(
                    self.provider.as_ref(),
                    &trace_variants,
                    &scheduler_config,
                    &profile.date_window,
                    result.carry,
                )
                .await;
                trace.push("scheduler_run_2", &run_summary(&result));
                evaluation = self
                    .evaluate(result.carry.candidates.clone(), &checklist, &profile, &variants)
                    .await;
            }
        }

        // Reasoner pass-2 on a quality shortfall.
        let blocked = result.stop_reason == StopReason::Blocked;
        let attempts_left = scheduler_config
            .global_budget
            .saturating_sub(result.carry.attempts_used);
        let remaining_ms = self
            .config
            .max_elapsed_ms
            .saturating_sub(result.carry.elapsed_ms());
        if plan.is_some()
            && !blocked
            && attempts_left >= self.config.pass2_min_remaining_budget
            && remaining_ms >= self.config.pass2_min_remaining_ms
            && self.quality_shortfall(&evaluation.gate)
        {
            let pass2 = self
                .reasoner
                .run(
                    ReasonerPass::Pass2,
                    &profile,
                    reasoner_calls,
                    plan.as_ref(),
                    &evaluation.snippets,
                )
                .await;
            trace.push("reasoner_pass2", &pass2.telemetry);
            if let Some(refined) = pass2.plan {
                plan = Some(refined);
                checklist = build_proposition_checklist(&profile, plan.as_ref());
                self.apply_proposition_flags(&mut checklist);
                variants = build_variants(&profile, &checklist, plan.as_ref());
                result = run_scheduler(
                    self.provider.as_ref(),
                    &variants,
                    &scheduler_config,
                    &profile.date_window,
                    result.carry,
                )
                .await;
                trace.push("scheduler_run_3", &run_summary(&result));
                evaluation = self
                    .evaluate(result.carry.candidates.clone(), &checklist, &profile, &variants)
                    .await;
            }
        }

        let mut strict_rows = std::mem::take(&mut evaluation.gate.exact_strict);
        let mut provisional_rows = std::mem::take(&mut evaluation.gate.exact_provisional);
        let mut exploratory_rows = std::mem::take(&mut evaluation.gate.near_miss);
        if !self.config.proposition.v41 {
            for mut case in strict_rows.drain(..) {
                case.exactness_type = Some(ExactnessType::Provisional);
                case.retrieval_tier = RetrievalTier::Provisional;
                provisional_rows.push(case);
            }
        }
        trace.push(
            "gate",
            &serde_json::json!({
                "strict": strict_rows.len(),
                "provisional": provisional_rows.len(),
                "exploratory": exploratory_rows.len(),
                "rejected": evaluation.gate.rejected,
                "contradiction_rejects": evaluation.gate.contradiction_rejects,
                "saturation_prevented": evaluation.gate.saturation_prevented,
                "collapsed": evaluation.collapsed,
                "supreme_boosted": evaluation.boosted,
            }),
        );

        let mut guarantee = Guarantee {
            target: self.config.guarantee.min_results,
            met: false,
            used: false,
            source: GuaranteeSource::None,
        };

        // Guarantee backfill: live retrieval first.
        let blocked = result.stop_reason == StopReason::Blocked;
        let total_before = strict_rows.len() + provisional_rows.len() + exploratory_rows.len();
        let remaining_ms = self
            .config
            .max_elapsed_ms
            .saturating_sub(result.carry.elapsed_ms());
        if self.config.guarantee.always_return
            && total_before < self.config.guarantee.min_results
            && !blocked
            && remaining_ms >= self.config.guarantee.min_remaining_ms
        {
            let backfill = build_guarantee_variants(&profile, plan.as_ref());
            if !backfill.is_empty() {
                let backfill_config = self
                    .config
                    .scheduler_config(budget_bonus + self.config.guarantee.extra_attempts, phase_bonus);
                result = run_scheduler(
                    self.provider.as_ref(),
                    &backfill,
                    &backfill_config,
                    &profile.date_window,
                    result.carry,
                )
                .await;
                trace.push("scheduler_run_4", &run_summary(&result));
                let refreshed = self
                    .evaluate(result.carry.candidates.clone(), &checklist, &profile, &variants)
                    .await;
                let gained = refreshed.gate.surviving() > total_before;
                let mut gate = refreshed.gate;
                strict_rows = std::mem::take(&mut gate.exact_strict);
                provisional_rows = std::mem::take(&mut gate.exact_provisional);
                exploratory_rows = std::mem::take(&mut gate.near_miss);
                if gained {
                    guarantee.used = true;
                    guarantee.source = GuaranteeSource::Live;
                }
            }
        }

        // Stale-cache recall.
        let blocked = result.stop_reason == StopReason::Blocked;
        let mut stale_used = false;
        let real_total = strict_rows.len() + provisional_rows.len() + exploratory_rows.len();
        if real_total == 0 && !blocked && self.config.guarantee.stale_fallback {
            if let Some(recalled) = stale::recall(
                self.cache.as_ref(),
                &profile,
                self.config.guarantee.stale_min_similarity,
            )
            .await
            {
                trace.push(
                    "stale_fallback",
                    &serde_json::json!({
                        "level": recalled.level,
                        "similarity": recalled.similarity,
                        "cases": recalled.entry.cases.len(),
                    }),
                );
                notes.push("serving a prior similar response as exploratory results".to_string());
                for mut case in recalled.entry.cases {
                    case.retrieval_tier = RetrievalTier::Exploratory;
                    case.exactness_type = None;
                    case.fallback_reason = Some("stale_cache".to_string());
                    case.confidence_band = ConfidenceBand::Low;
                    case.confidence_score = case.confidence_score.min(0.45);
                    exploratory_rows.push(case);
                }
                stale_used = true;
                guarantee.used = true;
                guarantee.source = GuaranteeSource::StaleCache;
            }
        }

        // Synthetic advisory.
        let mut synthetic_used = false;
        let real_total = strict_rows.len() + provisional_rows.len() + exploratory_rows.len();
        if real_total == 0
            && self.config.guarantee.always_return
            && self.config.guarantee.synthetic_fallback
        {
            exploratory_rows.push(self.synthetic_advisory(&profile));
            synthetic_used = true;
            guarantee.used = true;
            guarantee.source = GuaranteeSource::Synthetic;
            trace.push("synthetic_advisory", &serde_json::json!({"emitted": true}));
        }

        // Truncate to the requested size, strict tier first.
        let mut remaining = max_results.max(1);
        for tier in [&mut strict_rows, &mut provisional_rows, &mut exploratory_rows] {
            if tier.len() > remaining {
                tier.truncate(remaining);
            }
            remaining -= tier.len();
        }

        let any_success = result.carry.attempts.iter().any(|attempt| attempt.ok);
        let time_partial = result
            .stop_detail
            .as_deref()
            .is_some_and(|detail| detail.starts_with("time_budget_exhausted"));
        let total = strict_rows.len() + provisional_rows.len() + exploratory_rows.len();
        let status = derive_status(
            blocked,
            any_success,
            stale_used,
            synthetic_used,
            time_partial,
            total,
        );
        if blocked {
            if let Some(retry_after) = result.carry.retry_after_ms {
                notes.push(format!("source blocked; retry after {retry_after} ms"));
            } else {
                notes.push("source blocked before retrieval completed".to_string());
            }
        }

        guarantee.met = total >= guarantee.target;

        let insights = Insights {
            domains: profile.domains.clone(),
            issues: profile.issues.clone(),
            statutes: profile.statutes.clone(),
            court_hint: profile.court_hint,
            outcome_polarity: profile.retrieval_intent.outcome_polarity,
        };

        let mut response = SearchResponse {
            status,
            cases_exact_strict: strict_rows,
            cases_exact_provisional: provisional_rows,
            cases_exploratory: exploratory_rows,
            tier_counts: Default::default(),
            guarantee,
            pipeline_trace: trace,
            notes,
            insights,
        };
        response.refresh_tier_counts();

        // Successful, non-fallback responses feed the recall cache.
        if !blocked && !stale_used && !synthetic_used && response.tier_counts.total() > 0 {
            let mut all_rows: Vec<ScoredCase> = Vec::new();
            all_rows.extend(response.cases_exact_strict.iter().cloned());
            all_rows.extend(response.cases_exact_provisional.iter().cloned());
            all_rows.extend(response.cases_exploratory.iter().cloned());
            stale::persist(self.cache.as_ref(), &profile, &all_rows).await;
        }

        response
    }
}

fn derive_status(
    blocked: bool,
    any_success: bool,
    stale_used: bool,
    synthetic_used: bool,
    time_partial: bool,
    total: usize,
) -> SearchStatus {
    if blocked && !any_success && !stale_used {
        return SearchStatus::Blocked;
    }
    if synthetic_used {
        // The advisory inherits the truthful underlying state: a blocked
        // run stays blocked even when an earlier attempt fetched fine.
        return if blocked {
            SearchStatus::Blocked
        } else {
            SearchStatus::NoMatch
        };
    }
    if (blocked && any_success) || stale_used || (time_partial && total > 0) {
        return SearchStatus::Partial;
    }
    if total == 0 {
        return SearchStatus::NoMatch;
    }
    SearchStatus::Completed
}

#[cfg(test)]
mod tests {
    use super::*;
    use precedent_cache::MemoryCache;
    use precedent_reasoner::{ReasonerConfig, ReasonerMode};
    use precedent_retrieval::{
        BlockedType, DetailDocument, ProviderDebug, ProviderError, ProviderOutcome,
        ProviderRequest,
    };

    const DELAY_QUERY: &str = "State as appellant filed criminal appeal and delay condonation application was refused; appeal dismissed as time-barred under section 5 of the Limitation Act";

    const DELAY_BODY: &str = "The State preferred this criminal appeal as appellant. \
        The application for condonation of delay under Section 5 of the Limitation Act was refused. \
        The appeal was accordingly dismissed as barred by limitation.";

    enum Behaviour {
        Results,
        Empty,
        Challenge,
        Cooldown,
        /// One clean empty page, then the source cools down.
        EmptyThenCooldown,
    }

    struct FakeProvider {
        behaviour: Behaviour,
        detail: bool,
        calls: std::sync::atomic::AtomicUsize,
    }

    #[async_trait::async_trait]
    impl RetrievalProvider for FakeProvider {
        fn id(&self) -> &str {
            "fake"
        }

        fn supports_detail_fetch(&self) -> bool {
            self.detail
        }

        async fn search(
            &self,
            request: &ProviderRequest,
        ) -> Result<ProviderOutcome, ProviderError> {
            let call_index = self
                .calls
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            let mut debug = ProviderDebug {
                search_query: request.phrase.clone(),
                ..Default::default()
            };
            match self.behaviour {
                Behaviour::Results => {
                    let cases: Vec<CaseCandidate> = (1..=6)
                        .map(|i| CaseCandidate {
                            snippet:
                                "condonation of delay under section 5 limitation act refused, appeal dismissed"
                                    .to_string(),
                            ..CaseCandidate::new(
                                format!("https://k.example/doc/{i}/"),
                                format!("State vs Respondent {i}"),
                            )
                        })
                        .collect();
                    debug.ok = true;
                    debug.parsed_count = cases.len();
                    Ok(ProviderOutcome { cases, debug })
                }
                Behaviour::Empty => {
                    debug.ok = true;
                    Ok(ProviderOutcome {
                        cases: Vec::new(),
                        debug,
                    })
                }
                Behaviour::Challenge => {
                    debug.challenge_detected = true;
                    debug.blocked_type = Some(BlockedType::CloudflareChallenge);
                    debug.retry_after_ms = Some(8_000);
                    Ok(ProviderOutcome {
                        cases: Vec::new(),
                        debug,
                    })
                }
                Behaviour::Cooldown => {
                    debug.cooldown_active = true;
                    debug.blocked_type = Some(BlockedType::LocalCooldown);
                    debug.retry_after_ms = Some(30_000);
                    Err(ProviderError::new("cooldown", debug))
                }
                Behaviour::EmptyThenCooldown => {
                    if call_index == 0 {
                        debug.ok = true;
                        Ok(ProviderOutcome {
                            cases: Vec::new(),
                            debug,
                        })
                    } else {
                        debug.cooldown_active = true;
                        debug.blocked_type = Some(BlockedType::LocalCooldown);
                        debug.retry_after_ms = Some(30_000);
                        Err(ProviderError::new("cooldown", debug))
                    }
                }
            }
        }

        async fn fetch_detail(
            &self,
            _url: &str,
            _fetch_timeout_ms: u64,
        ) -> Result<DetailDocument, ProviderError> {
            Ok(DetailDocument {
                text: DELAY_BODY.to_string(),
                full_document_url: None,
            })
        }
    }

    fn engine(behaviour: Behaviour, detail: bool) -> PipelineEngine {
        let config = PipelineConfig {
            reasoner: ReasonerConfig {
                mode: ReasonerMode::Deterministic,
                ..Default::default()
            },
            ..Default::default()
        };
        let cache = Arc::new(MemoryCache::new());
        let reasoner = Arc::new(ReasonerOrchestrator::new(
            cache.clone(),
            Arc::new(NoModel),
            config.reasoner.clone(),
        ));
        PipelineEngine::new(
            config,
            cache,
            reasoner,
            Arc::new(FakeProvider {
                behaviour,
                detail,
                calls: std::sync::atomic::AtomicUsize::new(0),
            }),
        )
    }

    struct NoModel;

    #[async_trait::async_trait]
    impl precedent_reasoner::ReasonerModel for NoModel {
        async fn complete(&self, _system: &str, _user: &str) -> anyhow::Result<String> {
            anyhow::bail!("not available in tests")
        }

        fn model_name(&self) -> &str {
            "none"
        }
    }

    #[tokio::test]
    async fn test_end_to_end_exact_results() {
        let engine = engine(Behaviour::Results, true);
        let response = engine.search(DELAY_QUERY, 20).await;
        assert_eq!(response.status, SearchStatus::Completed);
        assert!(
            response.tier_counts.strict + response.tier_counts.provisional >= 1,
            "expected exact-tier results, got {:?}",
            response.tier_counts
        );
        assert!(response.guarantee.met);
        assert!(!response.guarantee.used);
        for case in &response.cases_exact_strict {
            assert!(case.verification.detail_checked);
            assert!(case.confidence_score <= 0.95);
        }
        for case in &response.cases_exact_provisional {
            assert!(case.confidence_score <= 0.70);
        }
    }

    #[tokio::test]
    async fn test_snippet_only_provider_caps_confidence() {
        let engine = engine(Behaviour::Results, false);
        let response = engine.search(DELAY_QUERY, 20).await;
        assert_eq!(response.tier_counts.strict, 0);
        let all: Vec<&ScoredCase> = response
            .cases_exact_provisional
            .iter()
            .chain(response.cases_exploratory.iter())
            .collect();
        assert!(!all.is_empty());
        for case in all {
            assert!(!case.verification.detail_checked);
            assert!(case.confidence_score <= 0.55);
        }
    }

    #[tokio::test]
    async fn test_blocked_by_challenges() {
        let engine = engine(Behaviour::Challenge, false);
        let response = engine.search(DELAY_QUERY, 20).await;
        assert_eq!(response.status, SearchStatus::Blocked);
        // The advisory may still be emitted, but the status stays truthful.
        assert_eq!(response.tier_counts.strict, 0);
        assert_eq!(response.tier_counts.provisional, 0);
        assert!(response
            .notes
            .iter()
            .any(|note| note.contains("retry after")));
    }

    #[tokio::test]
    async fn test_cooldown_blocked_keeps_blocked_status_with_synthetic_enabled() {
        let engine = engine(Behaviour::Cooldown, false);
        let response = engine.search(DELAY_QUERY, 20).await;
        assert_eq!(response.status, SearchStatus::Blocked);
        assert!(response
            .cases_exploratory
            .iter()
            .all(|case| case.fallback_reason.as_deref() == Some("synthetic_advisory")));
    }

    #[tokio::test]
    async fn test_blocked_after_successful_attempt_stays_blocked_with_synthetic() {
        // One clean empty fetch before the cooldown: the advisory still
        // fires, and the truthful blocked status must survive it.
        let engine = engine(Behaviour::EmptyThenCooldown, false);
        let response = engine.search(DELAY_QUERY, 20).await;
        assert_eq!(response.status, SearchStatus::Blocked);
        assert!(response
            .cases_exploratory
            .iter()
            .all(|case| case.fallback_reason.as_deref() == Some("synthetic_advisory")));
    }

    #[tokio::test]
    async fn test_synthetic_advisory_when_nothing_found() {
        let engine = engine(Behaviour::Empty, false);
        let response = engine.search(DELAY_QUERY, 20).await;
        assert_eq!(response.status, SearchStatus::NoMatch);
        assert_eq!(response.tier_counts.exploratory, 1);
        let advisory = &response.cases_exploratory[0];
        assert!(advisory.candidate.title.contains("non-citation"));
        assert!(advisory
            .candidate
            .url
            .starts_with("https://indiankanoon.org/search/?formInput="));
        assert_eq!(advisory.confidence_band, ConfidenceBand::Low);
        assert_eq!(
            advisory.fallback_reason.as_deref(),
            Some("synthetic_advisory")
        );
        assert_eq!(response.guarantee.source, GuaranteeSource::Synthetic);
        assert!(response.guarantee.used);
    }

    #[tokio::test]
    async fn test_stale_fallback_serves_prior_response() {
        let good = engine(Behaviour::Results, true);
        let first = good.search(DELAY_QUERY, 20).await;
        assert!(first.tier_counts.total() > 0);

        // Same cache, but a provider that now finds nothing.
        let config = PipelineConfig {
            reasoner: ReasonerConfig {
                mode: ReasonerMode::Deterministic,
                ..Default::default()
            },
            ..Default::default()
        };
        let cache = good.cache.clone();
        let reasoner = Arc::new(ReasonerOrchestrator::new(
            cache.clone(),
            Arc::new(NoModel),
            config.reasoner.clone(),
        ));
        let empty = PipelineEngine::new(
            config,
            cache,
            reasoner,
            Arc::new(FakeProvider {
                behaviour: Behaviour::Empty,
                detail: false,
                calls: std::sync::atomic::AtomicUsize::new(0),
            }),
        );
        let second = empty.search(DELAY_QUERY, 20).await;
        assert_eq!(second.status, SearchStatus::Partial);
        assert!(second.tier_counts.exploratory > 0);
        assert!(second
            .cases_exploratory
            .iter()
            .all(|case| case.fallback_reason.as_deref() == Some("stale_cache")));
        assert_eq!(second.guarantee.source, GuaranteeSource::StaleCache);
    }

    #[tokio::test]
    async fn test_budget_invariant_holds() {
        let engine = engine(Behaviour::Empty, false);
        let response = engine.search(DELAY_QUERY, 20).await;
        let budget = engine.config().global_budget + engine.config().guarantee.extra_attempts;
        let attempts = response
            .pipeline_trace
            .stages
            .iter()
            .filter_map(|stage| stage.detail.get("attempts_used"))
            .filter_map(|v| v.as_u64())
            .max()
            .unwrap_or(0);
        assert!(attempts <= budget as u64);
    }
}
