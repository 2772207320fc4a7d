//! Precedent-Rank: verification, scoring, diversification and the
//! proposition gate.
//!
//! Candidates arrive from the scheduler already deduped; this crate
//! hydrates them with detail evidence, scores them against the request
//! context, collapses near-duplicates, and gates the survivors into the
//! strict / provisional / exploratory tiers with calibrated confidence.

mod diversity;
mod gate;
mod scorer;
mod verifier;

pub use diversity::*;
pub use gate::*;
pub use scorer::*;
pub use verifier::*;
