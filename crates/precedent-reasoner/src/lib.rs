//! Precedent-Reasoner: LLM orchestration for Precedent-RS.
//!
//! Wraps the single reasoner call behind caching, a circuit breaker, a
//! global rate bucket, a per-fingerprint distributed lock and a local
//! in-flight semaphore. Callers always get an answer: a plan or a
//! structured deterministic-fallback telemetry.

mod model;
mod orchestrator;
mod plan_parse;
mod prompts;

pub use model::*;
pub use orchestrator::*;
pub use plan_parse::*;
pub use prompts::{user_prompt, SYSTEM_PROMPT};
