//! Precedent-Pipeline: the request engine.
//!
//! Owns one request from raw query to assembled [`SearchResponse`]:
//! profiling, reasoner passes, variant planning, up to four accumulating
//! scheduler runs, evaluation, and the always-return guarantee ladder
//! (live backfill, stale-cache recall, synthetic advisory).

mod config;
mod engine;
mod stale;

pub use config::*;
pub use engine::*;
pub use stale::*;
