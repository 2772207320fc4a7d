//! Pipeline configuration: one fallible pass over the environment into an
//! immutable config, with every numeric clamped to its safe range.
//!
//! A malformed variable never aborts the process; the default wins and a
//! warning is logged once at startup.

use precedent_reasoner::{ReasonerConfig, ReasonerMode};
use precedent_retrieval::{Phase, SchedulerConfig};
use std::collections::HashMap;
use std::env;

fn env_u64(name: &str, default: u64, min: u64, max: u64) -> u64 {
    match env::var(name) {
        Ok(value) => match value.trim().parse::<u64>() {
            Ok(parsed) => parsed.clamp(min, max),
            Err(_) => {
                tracing::warn!(%name, %value, "unparseable env var, using default");
                default
            }
        },
        Err(_) => default,
    }
}

fn env_usize(name: &str, default: usize, min: usize, max: usize) -> usize {
    env_u64(name, default as u64, min as u64, max as u64) as usize
}

fn env_f64(name: &str, default: f64, min: f64, max: f64) -> f64 {
    match env::var(name) {
        Ok(value) => match value.trim().parse::<f64>() {
            Ok(parsed) => parsed.clamp(min, max),
            Err(_) => {
                tracing::warn!(%name, %value, "unparseable env var, using default");
                default
            }
        },
        Err(_) => default,
    }
}

fn env_flag(name: &str, default: bool) -> bool {
    match env::var(name) {
        Ok(value) => matches!(value.trim(), "1" | "true" | "TRUE" | "on" | "yes"),
        Err(_) => default,
    }
}

/// Proposition feature toggles.
#[derive(Debug, Clone)]
pub struct PropositionFlags {
    /// Hook groups + polarity enforcement.
    pub v3: bool,
    /// Strict / provisional split.
    pub v41: bool,
    /// Role / chain graph.
    pub v5: bool,
    /// Strict-tier result target that ends retrieval early.
    pub strict_stop_target: usize,
    /// Combined-tier target for best-effort stopping.
    pub best_effort_stop_target: usize,
    pub provisional_confidence_floor: f64,
    pub chain_min_coverage: f64,
}

impl Default for PropositionFlags {
    fn default() -> Self {
        Self {
            v3: true,
            v41: true,
            v5: true,
            strict_stop_target: 3,
            best_effort_stop_target: 5,
            provisional_confidence_floor: 0.35,
            chain_min_coverage: 1.0,
        }
    }
}

/// Always-return guarantee knobs.
#[derive(Debug, Clone)]
pub struct GuaranteeConfig {
    pub always_return: bool,
    pub synthetic_fallback: bool,
    pub stale_fallback: bool,
    pub min_results: usize,
    pub extra_attempts: u32,
    pub min_remaining_ms: u64,
    pub stale_min_similarity: f64,
}

impl Default for GuaranteeConfig {
    fn default() -> Self {
        Self {
            always_return: true,
            synthetic_fallback: true,
            stale_fallback: true,
            min_results: 3,
            extra_attempts: 4,
            min_remaining_ms: 1_200,
            stale_min_similarity: 0.35,
        }
    }
}

/// HTTP-surface knobs consumed by the API crate.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub ip_rate_limit: i64,
    pub ip_rate_window_sec: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            ip_rate_limit: 30,
            ip_rate_window_sec: 60,
        }
    }
}

/// The immutable pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub max_elapsed_ms: u64,
    pub verify_limit: usize,
    pub global_budget: u32,
    /// Budget bonus applied under extended-deterministic recovery.
    pub extended_budget_bonus: u32,
    /// Attempts that must remain for a pass-2 to be worthwhile.
    pub pass2_min_remaining_budget: u32,
    pub pass2_min_remaining_ms: u64,
    pub fetch_timeout_ms: u64,
    pub fetch_timeout_cap_ms: u64,
    pub max_429_retries: u32,
    pub max_retry_after_ms: u64,
    pub primary_max_pages: usize,
    pub fallback_max_pages: usize,
    pub other_max_pages: usize,
    pub adaptive_scheduler: bool,
    pub stop_on_raw_candidate_target: bool,
    pub prefer_supreme: bool,
    /// Base of the upstream search URL, used by the synthetic advisory.
    pub upstream_search_url: String,
    pub reasoner: ReasonerConfig,
    pub proposition: PropositionFlags,
    pub guarantee: GuaranteeConfig,
    pub api: ApiConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_elapsed_ms: 9_000,
            verify_limit: 6,
            global_budget: 14,
            extended_budget_bonus: 2,
            pass2_min_remaining_budget: 3,
            pass2_min_remaining_ms: 2_500,
            fetch_timeout_ms: 3_000,
            fetch_timeout_cap_ms: 3_500,
            max_429_retries: 1,
            max_retry_after_ms: 4_000,
            primary_max_pages: 2,
            fallback_max_pages: 2,
            other_max_pages: 1,
            adaptive_scheduler: true,
            stop_on_raw_candidate_target: true,
            prefer_supreme: true,
            upstream_search_url: "https://indiankanoon.org/search/?formInput=".to_string(),
            reasoner: ReasonerConfig::default(),
            proposition: PropositionFlags::default(),
            guarantee: GuaranteeConfig::default(),
            api: ApiConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Loads the configuration from the environment.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let reasoner = ReasonerConfig {
            mode: env::var("LLM_REASONER_MODE")
                .map(|v| ReasonerMode::parse(&v))
                .unwrap_or(ReasonerMode::Initial),
            timeout_ms: env_u64("LLM_REASONER_TIMEOUT_MS", 1_500, 200, 10_000),
            max_timeout_ms: env_u64("LLM_REASONER_MAX_TIMEOUT_MS", 2_400, 400, 12_000),
            max_calls_per_request: env_u64("LLM_REASONER_MAX_CALLS_PER_REQUEST", 2, 1, 6) as u32,
            cache_ttl_sec: env_u64("LLM_REASONER_CACHE_TTL_SEC", 6 * 3600, 60, 7 * 24 * 3600),
            pass2_cache_ttl_sec: env_u64("LLM_REASONER_PASS2_CACHE_TTL_SEC", 900, 30, 24 * 3600),
            circuit_enabled: env_flag("LLM_CIRCUIT_BREAKER_ENABLED", true),
            circuit_fail_threshold: env_u64("LLM_CIRCUIT_FAIL_THRESHOLD", 3, 1, 20) as u32,
            circuit_cooldown_ms: env_u64("LLM_CIRCUIT_COOLDOWN_MS", 30_000, 1_000, 600_000),
            max_inflight: env_usize("LLM_REASONER_MAX_INFLIGHT", 4, 1, 64),
            global_rate_limit: env_u64("LLM_REASONER_GLOBAL_RATE_LIMIT", 60, 1, 10_000) as i64,
            global_rate_window_sec: env_u64("LLM_REASONER_GLOBAL_RATE_WINDOW_SEC", 60, 1, 3_600),
            lock_wait_ms: env_u64("LLM_REASONER_LOCK_WAIT_MS", 1_500, 100, 10_000),
            retry_on_timeout: env_flag("LLM_REASONER_RETRY_ON_TIMEOUT", true),
            retry_timeout_bonus_ms: env_u64("LLM_REASONER_RETRY_TIMEOUT_BONUS_MS", 600, 0, 5_000),
            model_id: env::var("LLM_REASONER_MODEL_ID")
                .unwrap_or_else(|_| defaults.reasoner.model_id.clone()),
        };

        let proposition = PropositionFlags {
            v3: env_flag("PROPOSITION_V3", true),
            v41: env_flag("PROPOSITION_V41", true),
            v5: env_flag("PROPOSITION_V5", true),
            strict_stop_target: env_usize("PROPOSITION_STRICT_STOP_TARGET", 3, 1, 20),
            best_effort_stop_target: env_usize("PROPOSITION_BEST_EFFORT_STOP_TARGET", 5, 1, 40),
            provisional_confidence_floor: env_f64(
                "PROPOSITION_PROVISIONAL_CONFIDENCE_FLOOR",
                0.35,
                0.0,
                0.70,
            ),
            chain_min_coverage: env_f64("PROPOSITION_CHAIN_MIN_COVERAGE", 1.0, 0.0, 1.0),
        };

        let guarantee = GuaranteeConfig {
            always_return: env_flag("ALWAYS_RETURN_V1", true),
            synthetic_fallback: env_flag("ALWAYS_RETURN_SYNTHETIC_FALLBACK", true),
            stale_fallback: env_flag("STALE_FALLBACK_ENABLED", true),
            min_results: env_usize("GUARANTEE_MIN_RESULTS", 3, 1, 10),
            extra_attempts: env_u64("GUARANTEE_EXTRA_ATTEMPTS", 4, 0, 20) as u32,
            min_remaining_ms: env_u64("GUARANTEE_MIN_REMAINING_MS", 1_200, 200, 10_000),
            stale_min_similarity: env_f64("STALE_FALLBACK_MIN_SIMILARITY", 0.35, 0.0, 1.0),
        };

        let api = ApiConfig {
            ip_rate_limit: env_u64("SEARCH_IP_RATE_LIMIT", 30, 1, 10_000) as i64,
            ip_rate_window_sec: env_u64("SEARCH_IP_RATE_WINDOW_SEC", 60, 1, 3_600),
        };

        Self {
            max_elapsed_ms: env_u64("PIPELINE_MAX_ELAPSED_MS", 9_000, 5_000, 60_000),
            verify_limit: env_usize("DEFAULT_VERIFY_LIMIT", 6, 4, 40),
            global_budget: env_u64("DEFAULT_GLOBAL_BUDGET", 14, 4, 100) as u32,
            extended_budget_bonus: 2,
            pass2_min_remaining_budget: 3,
            pass2_min_remaining_ms: 2_500,
            fetch_timeout_ms: env_u64("IK_FETCH_TIMEOUT_MS", 3_000, 500, 10_000),
            fetch_timeout_cap_ms: env_u64("ATTEMPT_FETCH_TIMEOUT_CAP_MS", 3_500, 500, 10_000),
            max_429_retries: env_u64("IK_MAX_429_RETRIES", 1, 0, 5) as u32,
            max_retry_after_ms: env_u64("IK_MAX_RETRY_AFTER_MS", 4_000, 500, 60_000),
            primary_max_pages: env_usize("PRIMARY_MAX_PAGES", 2, 1, 5),
            fallback_max_pages: env_usize("FALLBACK_MAX_PAGES", 2, 1, 5),
            other_max_pages: env_usize("OTHER_MAX_PAGES", 1, 1, 5),
            adaptive_scheduler: env_flag("ADAPTIVE_VARIANT_SCHEDULER", true),
            stop_on_raw_candidate_target: env_flag("SCHEDULER_STOP_ON_RAW_CANDIDATE_TARGET", true),
            prefer_supreme: true,
            upstream_search_url: defaults.upstream_search_url.clone(),
            reasoner,
            proposition,
            guarantee,
            api,
        }
    }

    /// Scheduler configuration for one run, with optional budget bonus.
    pub fn scheduler_config(&self, budget_bonus: u32, phase_bonus: usize) -> SchedulerConfig {
        let mut phase_limits = HashMap::new();
        phase_limits.insert(Phase::Primary, 6 + phase_bonus);
        phase_limits.insert(Phase::Fallback, 5 + phase_bonus);
        phase_limits.insert(Phase::Rescue, 4 + phase_bonus);
        phase_limits.insert(Phase::Micro, 4 + phase_bonus);
        phase_limits.insert(Phase::Revolving, 3 + phase_bonus);
        phase_limits.insert(Phase::Browse, 3 + phase_bonus);
        SchedulerConfig {
            strict_case_only: true,
            verify_limit: self.verify_limit,
            global_budget: self.global_budget + budget_bonus,
            phase_limits,
            blocked_threshold: 3,
            min_case_target: self.proposition.best_effort_stop_target.max(4),
            require_supreme_court: false,
            max_elapsed_ms: self.max_elapsed_ms,
            stop_on_candidate_target: self.stop_on_raw_candidate_target,
            fetch_timeout_ms: self.fetch_timeout_ms,
            fetch_timeout_cap_ms: self.fetch_timeout_cap_ms,
            max_429_retries: self.max_429_retries,
            max_retry_after_ms: self.max_retry_after_ms,
            max_pages_primary: self.primary_max_pages,
            max_pages_fallback: self.fallback_max_pages,
            max_pages_other: self.other_max_pages,
            adaptive_reorder: self.adaptive_scheduler,
            max_results_per_phrase: 10,
        }
    }
}
