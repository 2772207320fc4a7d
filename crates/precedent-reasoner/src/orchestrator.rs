//! Reasoner orchestrator: a single guarded path to the LLM.
//!
//! Every call runs the same gating ladder: pass preconditions, mode and
//! per-request budget, config, plan cache, circuit breaker, global rate
//! bucket, per-fingerprint distributed lock, local semaphore, and only
//! then the model. Any failure degrades to deterministic planning and is
//! reported through structured telemetry, never an error.

use crate::model::ReasonerModel;
use crate::plan_parse::parse_plan;
use crate::prompts;
use precedent_cache::{get_typed, set_typed, SharedCache};
use precedent_core::{IntentProfile, ReasonerPlan};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio::sync::Semaphore;

/// Key of the process-wide circuit breaker entry.
pub const CIRCUIT_KEY: &str = "reasoner:circuit:v1";

const PROBE_LOCK_KEY: &str = "reasoner:circuit:v1:probe";
const LOCK_POLL_MS: u64 = 120;

/// Operating mode of the reasoner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReasonerMode {
    /// LLM passes enabled.
    #[default]
    Initial,
    /// Reasoner switched off entirely.
    Off,
    /// Deterministic planning only; the model is never called.
    Deterministic,
}

impl ReasonerMode {
    /// Parses the `LLM_REASONER_MODE` value; unknown strings mean `Initial`.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "off" => ReasonerMode::Off,
            "deterministic" => ReasonerMode::Deterministic,
            _ => ReasonerMode::Initial,
        }
    }
}

/// Which reasoner pass is being run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonerPass {
    /// Build a plan from the query alone.
    Pass1,
    /// Refine an existing plan with retrieved snippets.
    Pass2,
}

impl ReasonerPass {
    fn as_str(self) -> &'static str {
        match self {
            ReasonerPass::Pass1 => "pass1",
            ReasonerPass::Pass2 => "pass2",
        }
    }
}

/// Reasoner configuration, clamped at construction time by the pipeline
/// config layer.
#[derive(Debug, Clone)]
pub struct ReasonerConfig {
    pub mode: ReasonerMode,
    /// Base model timeout in milliseconds.
    pub timeout_ms: u64,
    /// Hard ceiling for the adaptive timeout and retry extension.
    pub max_timeout_ms: u64,
    /// LLM calls allowed per request.
    pub max_calls_per_request: u32,
    /// Pass-1 plan cache TTL.
    pub cache_ttl_sec: u64,
    /// Pass-2 plan cache TTL.
    pub pass2_cache_ttl_sec: u64,
    pub circuit_enabled: bool,
    pub circuit_fail_threshold: u32,
    pub circuit_cooldown_ms: u64,
    /// Local in-flight model call limit.
    pub max_inflight: usize,
    /// Global calls allowed per rate window.
    pub global_rate_limit: i64,
    pub global_rate_window_sec: u64,
    /// How long a lock loser polls the cache before giving up.
    pub lock_wait_ms: u64,
    pub retry_on_timeout: bool,
    pub retry_timeout_bonus_ms: u64,
    /// Model identifier; empty means misconfigured.
    pub model_id: String,
}

impl Default for ReasonerConfig {
    fn default() -> Self {
        Self {
            mode: ReasonerMode::Initial,
            timeout_ms: 1500,
            max_timeout_ms: 2400,
            max_calls_per_request: 2,
            cache_ttl_sec: 6 * 3600,
            pass2_cache_ttl_sec: 900,
            circuit_enabled: true,
            circuit_fail_threshold: 3,
            circuit_cooldown_ms: 30_000,
            max_inflight: 4,
            global_rate_limit: 60,
            global_rate_window_sec: 60,
            lock_wait_ms: 1500,
            retry_on_timeout: true,
            retry_timeout_bonus_ms: 600,
            model_id: "anthropic.claude-3-sonnet".to_string(),
        }
    }
}

impl ReasonerConfig {
    fn is_valid(&self) -> bool {
        !self.model_id.is_empty() && self.timeout_ms >= 200
    }
}

/// Why the model was not (successfully) consulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    Pass2MissingBasePlan,
    ModeOff,
    ModeDeterministic,
    CallBudgetExhausted,
    ConfigError,
    CircuitOpen,
    RateLimited,
    LockTimeout,
    SemaphoreSaturated,
    PlanNotUsable,
    ModelTimeout,
    ModelError,
}

impl SkipReason {
    /// Stable code string surfaced in telemetry.
    pub fn code(self) -> &'static str {
        match self {
            SkipReason::Pass2MissingBasePlan => "pass2_missing_base_plan",
            SkipReason::ModeOff => "mode_off",
            SkipReason::ModeDeterministic => "mode_deterministic",
            SkipReason::CallBudgetExhausted => "call_budget_exhausted",
            SkipReason::ConfigError => "config_error",
            SkipReason::CircuitOpen => "circuit_open",
            SkipReason::RateLimited => "rate_limited",
            SkipReason::LockTimeout => "lock_timeout",
            SkipReason::SemaphoreSaturated => "semaphore_saturated",
            SkipReason::PlanNotUsable => "plan_not_usable",
            SkipReason::ModelTimeout => "model_timeout",
            SkipReason::ModelError => "model_error",
        }
    }
}

/// Structured telemetry for one orchestrator call.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ReasonerTelemetry {
    /// `opus` when a model-produced plan was used, `deterministic` otherwise.
    pub mode: String,
    pub cache_hit: bool,
    pub latency_ms: u64,
    /// True whenever the call fell back to deterministic planning.
    pub degraded: bool,
    pub timeout: bool,
    pub timeout_ms_used: u64,
    pub adaptive_timeout_applied: bool,
    pub error: Option<String>,
    pub warnings: Vec<String>,
    pub skip_reason: Option<SkipReason>,
}

/// The orchestrator's answer: an optional plan plus telemetry.
#[derive(Debug, Clone)]
pub struct ReasonerOutcome {
    pub plan: Option<ReasonerPlan>,
    pub telemetry: ReasonerTelemetry,
    pub fingerprint: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
struct CircuitState {
    failures: u32,
    open_until_ms: u64,
}

/// Health probe result for the reasoner backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub ok: bool,
    pub model: String,
    pub latency_ms: u64,
    pub circuit_open: bool,
    pub error: Option<String>,
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

fn truncated_sha(input: &str, chars: usize) -> String {
    let digest = Sha256::digest(input.as_bytes());
    let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    hex[..chars.min(hex.len())].to_string()
}

/// Orchestrates reasoner calls for all requests in the process.
pub struct ReasonerOrchestrator {
    cache: Arc<dyn SharedCache>,
    model: Arc<dyn ReasonerModel>,
    config: ReasonerConfig,
    semaphore: Arc<Semaphore>,
    instance: String,
}

impl ReasonerOrchestrator {
    /// Creates an orchestrator over a shared cache and a model.
    pub fn new(
        cache: Arc<dyn SharedCache>,
        model: Arc<dyn ReasonerModel>,
        config: ReasonerConfig,
    ) -> Self {
        let semaphore = Arc::new(Semaphore::new(config.max_inflight.max(1)));
        Self {
            cache,
            model,
            config,
            semaphore,
            instance: uuid::Uuid::new_v4().to_string(),
        }
    }

    /// Fingerprint of a profile: SHA-256 of the normalised query and the
    /// sorted context arrays, truncated.
    pub fn fingerprint(profile: &IntentProfile) -> String {
        let mut parts: Vec<String> = Vec::new();
        parts.push(precedent_core::lexicon::normalize(&profile.cleaned_query));
        for list in [
            &profile.domains,
            &profile.issues,
            &profile.statutes,
            &profile.procedures,
            &profile.actors,
            &profile.anchors,
        ] {
            let mut sorted = list.clone();
            sorted.sort();
            parts.push(sorted.join("|"));
        }
        truncated_sha(&parts.join("\n"), 16)
    }

    fn adaptive_timeout(&self, profile: &IntentProfile, pass: ReasonerPass) -> (u64, bool) {
        let base = self.config.timeout_ms.clamp(200, self.config.max_timeout_ms);
        let mut score = 0usize;
        if profile.statutes.len() >= 2 {
            score += 1;
        }
        if profile
            .issues
            .iter()
            .any(|issue| issue == "read with" || issue == "interplay")
        {
            score += 1;
        }
        if profile.procedures.len() >= 2 {
            score += 1;
        }
        if profile.cleaned_query.len() > 180 {
            score += 1;
        }
        if pass == ReasonerPass::Pass2 {
            score += 1;
        }
        let bump = (score.min(2) as u64) * 400;
        let timeout = (base + bump).min(self.config.max_timeout_ms);
        (timeout, bump > 0)
    }

    fn cache_key(&self, pass: ReasonerPass, fingerprint: &str, seed_hash: Option<&str>) -> String {
        match (pass, seed_hash) {
            (ReasonerPass::Pass2, Some(seed)) => {
                format!("reasoner:v2:pass2:{fingerprint}:{seed}")
            }
            _ => format!("reasoner:v2:{}:{fingerprint}", pass.as_str()),
        }
    }

    fn lock_key(&self, pass: ReasonerPass, fingerprint: &str) -> String {
        format!("lock:reasoner:{}:{fingerprint}", pass.as_str())
    }

    async fn circuit_state(&self) -> CircuitState {
        get_typed(self.cache.as_ref(), CIRCUIT_KEY)
            .await
            .unwrap_or_default()
    }

    async fn record_failure(&self) {
        if !self.config.circuit_enabled {
            return;
        }
        let mut state = self.circuit_state().await;
        state.failures += 1;
        if state.failures >= self.config.circuit_fail_threshold {
            state.open_until_ms = now_ms() + self.config.circuit_cooldown_ms;
            tracing::warn!(failures = state.failures, "reasoner circuit opened");
        }
        set_typed(self.cache.as_ref(), CIRCUIT_KEY, &state, 24 * 3600).await;
    }

    async fn record_success(&self) {
        if !self.config.circuit_enabled {
            return;
        }
        set_typed(
            self.cache.as_ref(),
            CIRCUIT_KEY,
            &CircuitState::default(),
            24 * 3600,
        )
        .await;
    }

    fn fallback(
        fingerprint: &str,
        reason: SkipReason,
        telemetry: ReasonerTelemetry,
    ) -> ReasonerOutcome {
        let mut telemetry = telemetry;
        telemetry.mode = "deterministic".to_string();
        telemetry.degraded = true;
        telemetry.skip_reason = Some(reason);
        if telemetry.error.is_none() {
            telemetry.error = Some(reason.code().to_string());
        }
        ReasonerOutcome {
            plan: None,
            telemetry,
            fingerprint: fingerprint.to_string(),
        }
    }

    fn cache_hit_outcome(
        fingerprint: &str,
        plan: ReasonerPlan,
        mut telemetry: ReasonerTelemetry,
        started: Instant,
    ) -> ReasonerOutcome {
        telemetry.mode = "opus".to_string();
        telemetry.cache_hit = true;
        telemetry.latency_ms = started.elapsed().as_millis() as u64;
        ReasonerOutcome {
            plan: Some(plan),
            telemetry,
            fingerprint: fingerprint.to_string(),
        }
    }

    /// Runs one reasoner pass through the full gating ladder.
    pub async fn run(
        &self,
        pass: ReasonerPass,
        profile: &IntentProfile,
        call_index: u32,
        base_plan: Option<&ReasonerPlan>,
        snippets: &[String],
    ) -> ReasonerOutcome {
        let started = Instant::now();
        let fingerprint = Self::fingerprint(profile);
        let mut telemetry = ReasonerTelemetry::default();

        if pass == ReasonerPass::Pass2 && base_plan.is_none() {
            return Self::fallback(&fingerprint, SkipReason::Pass2MissingBasePlan, telemetry);
        }
        match self.config.mode {
            ReasonerMode::Off => {
                return Self::fallback(&fingerprint, SkipReason::ModeOff, telemetry);
            }
            ReasonerMode::Deterministic => {
                return Self::fallback(&fingerprint, SkipReason::ModeDeterministic, telemetry);
            }
            ReasonerMode::Initial => {}
        }
        if call_index >= self.config.max_calls_per_request {
            return Self::fallback(&fingerprint, SkipReason::CallBudgetExhausted, telemetry);
        }
        if !self.config.is_valid() {
            return Self::fallback(&fingerprint, SkipReason::ConfigError, telemetry);
        }

        let seed_hash = (pass == ReasonerPass::Pass2).then(|| {
            let mut seed = snippets.join("\n");
            if let Some(base) = base_plan {
                seed.push('\n');
                seed.push_str(&serde_json::to_string(base).unwrap_or_default());
            }
            truncated_sha(&seed, 12)
        });
        let cache_key = self.cache_key(pass, &fingerprint, seed_hash.as_deref());

        if let Some(plan) = get_typed::<ReasonerPlan>(self.cache.as_ref(), &cache_key).await {
            return Self::cache_hit_outcome(&fingerprint, plan, telemetry, started);
        }

        if self.config.circuit_enabled {
            let circuit = self.circuit_state().await;
            if circuit.open_until_ms > now_ms() {
                let probe_ttl = (circuit.open_until_ms.saturating_sub(now_ms()) / 1000).max(1);
                let probe = pass == ReasonerPass::Pass1
                    && self
                        .cache
                        .acquire_lock(PROBE_LOCK_KEY, &self.instance, probe_ttl)
                        .await;
                if !probe {
                    return Self::fallback(&fingerprint, SkipReason::CircuitOpen, telemetry);
                }
                tracing::debug!("circuit open, running forced pass-1 probe");
            }
        }

        let bucket = now_ms() / 1000 / self.config.global_rate_window_sec.max(1);
        let rate_key = format!("reasoner:rate:{bucket}");
        let count = self
            .cache
            .increment(&rate_key, self.config.global_rate_window_sec)
            .await;
        if count > self.config.global_rate_limit {
            return Self::fallback(&fingerprint, SkipReason::RateLimited, telemetry);
        }

        let (timeout_ms, adaptive) = self.adaptive_timeout(profile, pass);
        telemetry.timeout_ms_used = timeout_ms;
        telemetry.adaptive_timeout_applied = adaptive;

        let lock_key = self.lock_key(pass, &fingerprint);
        let lock_owner = format!("{}:{call_index}", self.instance);
        let lock_ttl_sec = (timeout_ms + 2000).div_ceil(1000);
        let locked = self
            .cache
            .acquire_lock(&lock_key, &lock_owner, lock_ttl_sec)
            .await;
        if !locked {
            let deadline = Instant::now() + Duration::from_millis(self.config.lock_wait_ms);
            while Instant::now() < deadline {
                tokio::time::sleep(Duration::from_millis(LOCK_POLL_MS)).await;
                if let Some(plan) =
                    get_typed::<ReasonerPlan>(self.cache.as_ref(), &cache_key).await
                {
                    return Self::cache_hit_outcome(&fingerprint, plan, telemetry, started);
                }
            }
            return Self::fallback(&fingerprint, SkipReason::LockTimeout, telemetry);
        }

        // The winner may still find a fresh entry written between the
        // first lookup and lock acquisition.
        if let Some(plan) = get_typed::<ReasonerPlan>(self.cache.as_ref(), &cache_key).await {
            self.cache.release_lock(&lock_key, &lock_owner).await;
            return Self::cache_hit_outcome(&fingerprint, plan, telemetry, started);
        }

        let Ok(permit) = self.semaphore.clone().try_acquire_owned() else {
            self.cache.release_lock(&lock_key, &lock_owner).await;
            return Self::fallback(&fingerprint, SkipReason::SemaphoreSaturated, telemetry);
        };

        let outcome = self
            .invoke(pass, profile, base_plan, snippets, timeout_ms, &mut telemetry)
            .await;
        drop(permit);
        self.cache.release_lock(&lock_key, &lock_owner).await;

        match outcome {
            Ok(plan) => {
                let ttl = match pass {
                    ReasonerPass::Pass1 => self.config.cache_ttl_sec,
                    ReasonerPass::Pass2 => self.config.pass2_cache_ttl_sec,
                };
                set_typed(self.cache.as_ref(), &cache_key, &plan, ttl).await;
                self.record_success().await;
                telemetry.mode = "opus".to_string();
                telemetry.latency_ms = started.elapsed().as_millis() as u64;
                ReasonerOutcome {
                    plan: Some(plan),
                    telemetry,
                    fingerprint,
                }
            }
            Err(reason) => {
                self.record_failure().await;
                telemetry.latency_ms = started.elapsed().as_millis() as u64;
                Self::fallback(&fingerprint, reason, telemetry)
            }
        }
    }

    async fn invoke(
        &self,
        pass: ReasonerPass,
        profile: &IntentProfile,
        base_plan: Option<&ReasonerPlan>,
        snippets: &[String],
        timeout_ms: u64,
        telemetry: &mut ReasonerTelemetry,
    ) -> Result<ReasonerPlan, SkipReason> {
        let user_prompt = prompts::user_prompt(pass, profile, base_plan, snippets);
        let mut attempt_timeout = timeout_ms;

        for attempt in 0..2 {
            let call = self.model.complete(prompts::SYSTEM_PROMPT, &user_prompt);
            match tokio::time::timeout(Duration::from_millis(attempt_timeout), call).await {
                Ok(Ok(text)) => {
                    let validation = parse_plan(&text, profile.is_sparse());
                    telemetry.warnings.extend(validation.warnings);
                    return match (validation.usable, validation.plan) {
                        (true, Some(plan)) => Ok(plan),
                        _ => Err(SkipReason::PlanNotUsable),
                    };
                }
                Ok(Err(error)) => {
                    telemetry.error = Some(error.to_string());
                    return Err(SkipReason::ModelError);
                }
                Err(_elapsed) => {
                    telemetry.timeout = true;
                    let extended = attempt_timeout + self.config.retry_timeout_bonus_ms;
                    let can_retry = attempt == 0
                        && pass == ReasonerPass::Pass1
                        && self.config.retry_on_timeout
                        && extended <= self.config.max_timeout_ms;
                    if !can_retry {
                        return Err(SkipReason::ModelTimeout);
                    }
                    attempt_timeout = extended;
                    telemetry.timeout_ms_used = extended;
                    tracing::debug!(extended, "reasoner timeout, retrying with bonus");
                }
            }
        }
        Err(SkipReason::ModelTimeout)
    }

    /// Probes the model with a settable timeout.
    pub async fn health(&self, timeout_ms: u64) -> HealthReport {
        let started = Instant::now();
        let circuit = self.circuit_state().await;
        let circuit_open = circuit.open_until_ms > now_ms();
        let call = self.model.complete("Reply with the single word: ok", "ping");
        match tokio::time::timeout(Duration::from_millis(timeout_ms), call).await {
            Ok(Ok(_)) => HealthReport {
                ok: true,
                model: self.model.model_name().to_string(),
                latency_ms: started.elapsed().as_millis() as u64,
                circuit_open,
                error: None,
            },
            Ok(Err(error)) => HealthReport {
                ok: false,
                model: self.model.model_name().to_string(),
                latency_ms: started.elapsed().as_millis() as u64,
                circuit_open,
                error: Some(error.to_string()),
            },
            Err(_elapsed) => HealthReport {
                ok: false,
                model: self.model.model_name().to_string(),
                latency_ms: started.elapsed().as_millis() as u64,
                circuit_open,
                error: Some("timeout".to_string()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use precedent_cache::MemoryCache;
    use precedent_core::profile_query;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const PLAN_JSON: &str = r#"{"query_variants_strict": ["state appeal condonation refused"],
                                "query_variants_broad": ["condonation of delay limitation"]}"#;

    struct FakeModel {
        calls: AtomicUsize,
        response: String,
        fail: bool,
        delay_ms: u64,
    }

    impl FakeModel {
        fn returning(response: &str) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                response: response.to_string(),
                fail: false,
                delay_ms: 0,
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                response: String::new(),
                fail: true,
                delay_ms: 0,
            })
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl ReasonerModel for FakeModel {
        async fn complete(&self, _system: &str, _user: &str) -> anyhow::Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
            }
            if self.fail {
                anyhow::bail!("model unavailable");
            }
            Ok(self.response.clone())
        }

        fn model_name(&self) -> &str {
            "fake-model"
        }
    }

    fn orchestrator(
        model: Arc<FakeModel>,
        config: ReasonerConfig,
    ) -> (ReasonerOrchestrator, Arc<MemoryCache>) {
        let cache = Arc::new(MemoryCache::new());
        (
            ReasonerOrchestrator::new(cache.clone(), model, config),
            cache,
        )
    }

    fn sample_profile() -> IntentProfile {
        profile_query(
            "State as appellant filed criminal appeal and delay condonation application was refused under section 5 of the Limitation Act",
        )
    }

    #[tokio::test]
    async fn test_pass1_success_and_cache_hit() {
        let model = FakeModel::returning(PLAN_JSON);
        let (orchestrator, _cache) = orchestrator(model.clone(), ReasonerConfig::default());
        let profile = sample_profile();

        let first = orchestrator
            .run(ReasonerPass::Pass1, &profile, 0, None, &[])
            .await;
        assert!(first.plan.is_some());
        assert_eq!(first.telemetry.mode, "opus");
        assert!(!first.telemetry.cache_hit);

        let second = orchestrator
            .run(ReasonerPass::Pass1, &profile, 1, None, &[])
            .await;
        assert!(second.telemetry.cache_hit);
        assert_eq!(model.call_count(), 1);
        assert_eq!(first.fingerprint, second.fingerprint);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_identical_queries_one_model_call() {
        let model = FakeModel::returning(PLAN_JSON);
        let (orchestrator, _cache) = orchestrator(model.clone(), ReasonerConfig::default());
        let orchestrator = Arc::new(orchestrator);
        let profile = sample_profile();

        let mut handles = Vec::new();
        for _ in 0..4 {
            let orchestrator = orchestrator.clone();
            let profile = profile.clone();
            handles.push(tokio::spawn(async move {
                orchestrator
                    .run(ReasonerPass::Pass1, &profile, 0, None, &[])
                    .await
            }));
        }
        let mut outcomes = Vec::new();
        for handle in handles {
            outcomes.push(handle.await.unwrap());
        }

        assert_eq!(model.call_count(), 1);
        let with_plan = outcomes.iter().filter(|o| o.plan.is_some()).count();
        let cache_hits = outcomes.iter().filter(|o| o.telemetry.cache_hit).count();
        assert!(with_plan >= 1);
        assert_eq!(cache_hits, with_plan - 1);
        for outcome in outcomes.iter().filter(|o| o.plan.is_none()) {
            assert_eq!(outcome.telemetry.skip_reason, Some(SkipReason::LockTimeout));
        }
    }

    #[tokio::test]
    async fn test_pass2_requires_base_plan() {
        let model = FakeModel::returning(PLAN_JSON);
        let (orchestrator, _cache) = orchestrator(model.clone(), ReasonerConfig::default());
        let outcome = orchestrator
            .run(ReasonerPass::Pass2, &sample_profile(), 0, None, &[])
            .await;
        assert_eq!(
            outcome.telemetry.skip_reason,
            Some(SkipReason::Pass2MissingBasePlan)
        );
        assert_eq!(model.call_count(), 0);
    }

    #[tokio::test]
    async fn test_mode_and_budget_gates() {
        let model = FakeModel::returning(PLAN_JSON);
        let config = ReasonerConfig {
            mode: ReasonerMode::Off,
            ..Default::default()
        };
        let (orchestrator1, _cache) = orchestrator(model.clone(), config);
        let outcome = orchestrator1
            .run(ReasonerPass::Pass1, &sample_profile(), 0, None, &[])
            .await;
        assert_eq!(outcome.telemetry.skip_reason, Some(SkipReason::ModeOff));

        let config = ReasonerConfig {
            max_calls_per_request: 1,
            ..Default::default()
        };
        let model = FakeModel::returning(PLAN_JSON);
        let (orchestrator2, _cache) = orchestrator(model.clone(), config);
        let outcome = orchestrator2
            .run(ReasonerPass::Pass1, &sample_profile(), 1, None, &[])
            .await;
        assert_eq!(
            outcome.telemetry.skip_reason,
            Some(SkipReason::CallBudgetExhausted)
        );
        assert_eq!(model.call_count(), 0);
    }

    #[tokio::test]
    async fn test_config_error_gate() {
        let model = FakeModel::returning(PLAN_JSON);
        let config = ReasonerConfig {
            model_id: String::new(),
            ..Default::default()
        };
        let (orchestrator, _cache) = orchestrator(model.clone(), config);
        let outcome = orchestrator
            .run(ReasonerPass::Pass1, &sample_profile(), 0, None, &[])
            .await;
        assert_eq!(outcome.telemetry.skip_reason, Some(SkipReason::ConfigError));
    }

    #[tokio::test]
    async fn test_unusable_plan_degrades() {
        let model = FakeModel::returning("not json at all");
        let (orchestrator, _cache) = orchestrator(model.clone(), ReasonerConfig::default());
        let outcome = orchestrator
            .run(ReasonerPass::Pass1, &sample_profile(), 0, None, &[])
            .await;
        assert!(outcome.plan.is_none());
        assert_eq!(outcome.telemetry.skip_reason, Some(SkipReason::PlanNotUsable));
        assert_eq!(outcome.telemetry.mode, "deterministic");
    }

    #[tokio::test]
    async fn test_circuit_opens_and_blocks_then_resets() {
        let failing = FakeModel::failing();
        let config = ReasonerConfig {
            circuit_fail_threshold: 2,
            circuit_cooldown_ms: 60_000,
            ..Default::default()
        };
        let cache = Arc::new(MemoryCache::new());
        let orchestrator =
            ReasonerOrchestrator::new(cache.clone(), failing.clone(), config.clone());

        // Distinct profiles so the plan cache never short-circuits.
        let profiles = [
            profile_query("anticipatory bail under section 438 crpc refused"),
            profile_query("fir quashed under section 482 crpc abuse of process"),
        ];
        for profile in &profiles {
            let outcome = orchestrator
                .run(ReasonerPass::Pass1, profile, 0, None, &[])
                .await;
            assert_eq!(outcome.telemetry.skip_reason, Some(SkipReason::ModelError));
        }
        assert_eq!(failing.call_count(), 2);

        // Circuit is open: the first pass-1 call wins the probe slot, the
        // next is rejected without touching the model.
        let probe_profile = profile_query("suit dismissed as time barred limitation act");
        let probe = orchestrator
            .run(ReasonerPass::Pass1, &probe_profile, 0, None, &[])
            .await;
        assert_eq!(probe.telemetry.skip_reason, Some(SkipReason::ModelError));
        assert_eq!(failing.call_count(), 3);

        let blocked = orchestrator
            .run(ReasonerPass::Pass1, &sample_profile(), 0, None, &[])
            .await;
        assert_eq!(blocked.telemetry.skip_reason, Some(SkipReason::CircuitOpen));
        assert_eq!(failing.call_count(), 3);

        // A healthy model on the same shared circuit entry resets failures.
        let healthy = FakeModel::returning(PLAN_JSON);
        let recovered = ReasonerOrchestrator::new(cache.clone(), healthy.clone(), config);
        cache
            .set_json(
                CIRCUIT_KEY,
                serde_json::json!({"failures": 2, "open_until_ms": 0}),
                3600,
            )
            .await;
        let outcome = recovered
            .run(ReasonerPass::Pass1, &sample_profile(), 0, None, &[])
            .await;
        assert!(outcome.plan.is_some());
        let state: CircuitState = precedent_cache::get_typed(cache.as_ref(), CIRCUIT_KEY)
            .await
            .unwrap();
        assert_eq!(state.failures, 0);
    }

    #[tokio::test]
    async fn test_rate_limit_gate() {
        let model = FakeModel::returning(PLAN_JSON);
        let config = ReasonerConfig {
            global_rate_limit: 1,
            ..Default::default()
        };
        let (orchestrator, _cache) = orchestrator(model.clone(), config);
        let first = orchestrator
            .run(
                ReasonerPass::Pass1,
                &profile_query("anticipatory bail under section 438 crpc refused"),
                0,
                None,
                &[],
            )
            .await;
        assert!(first.plan.is_some());
        let second = orchestrator
            .run(
                ReasonerPass::Pass1,
                &profile_query("fir quashed under section 482 crpc abuse of process"),
                0,
                None,
                &[],
            )
            .await;
        assert_eq!(second.telemetry.skip_reason, Some(SkipReason::RateLimited));
        assert_eq!(model.call_count(), 1);
    }

    #[tokio::test]
    async fn test_adaptive_timeout_bumps_capped() {
        let model = FakeModel::returning(PLAN_JSON);
        let config = ReasonerConfig {
            timeout_ms: 1000,
            max_timeout_ms: 2400,
            ..Default::default()
        };
        let (orchestrator, _cache) = orchestrator(model, config);
        let profile = profile_query(
            "criminal appeal and writ petition on sanction under the prevention of corruption act read with the code of criminal procedure where the public servant was prosecuted and the long narration keeps going to exceed the length threshold for complexity",
        );
        let (timeout, applied) = orchestrator.adaptive_timeout(&profile, ReasonerPass::Pass2);
        assert!(applied);
        assert_eq!(timeout, 1800);
    }

    #[tokio::test]
    async fn test_health_report() {
        let model = FakeModel::returning("ok");
        let (orchestrator, _cache) = orchestrator(model, ReasonerConfig::default());
        let report = orchestrator.health(500).await;
        assert!(report.ok);
        assert_eq!(report.model, "fake-model");
        assert!(!report.circuit_open);
    }
}
