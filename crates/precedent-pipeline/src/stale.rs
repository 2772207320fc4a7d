//! Stale-fallback recall: similarity-indexed reuse of prior responses.
//!
//! Successful responses are written under four signature levels, from an
//! exact query hash down to a broad domain hash. Recall walks the levels
//! in order and accepts the first entry whose stored query is similar
//! enough to the live one.

use precedent_cache::{get_typed, set_typed, SharedCache};
use precedent_core::lexicon;
use precedent_core::{IntentProfile, ScoredCase};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

const STALE_TTL_SEC: u64 = 48 * 3600;

/// Signature granularity, most to least specific.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignatureLevel {
    Exact,
    Full,
    Medium,
    Broad,
}

impl SignatureLevel {
    /// Recall order.
    pub const ALL: [SignatureLevel; 4] = [
        SignatureLevel::Exact,
        SignatureLevel::Full,
        SignatureLevel::Medium,
        SignatureLevel::Broad,
    ];

    fn as_str(self) -> &'static str {
        match self {
            SignatureLevel::Exact => "exact",
            SignatureLevel::Full => "full",
            SignatureLevel::Medium => "medium",
            SignatureLevel::Broad => "broad",
        }
    }
}

/// A recalled prior response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaleEntry {
    /// The query the entry was stored under.
    pub query: String,
    pub cases: Vec<ScoredCase>,
}

/// A successful recall with its provenance.
#[derive(Debug, Clone)]
pub struct StaleRecall {
    pub entry: StaleEntry,
    pub level: SignatureLevel,
    pub similarity: f64,
}

fn hash(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    digest
        .iter()
        .take(10)
        .map(|b| format!("{b:02x}"))
        .collect()
}

fn signature(profile: &IntentProfile, level: SignatureLevel) -> String {
    let payload = match level {
        SignatureLevel::Exact => lexicon::normalize(&profile.cleaned_query),
        SignatureLevel::Full => {
            let mut parts: Vec<String> = Vec::new();
            for list in [
                &profile.domains,
                &profile.issues,
                &profile.statutes,
                &profile.procedures,
                &profile.actors,
            ] {
                let mut sorted = list.clone();
                sorted.sort();
                parts.push(sorted.join("|"));
            }
            parts.join("\n")
        }
        SignatureLevel::Medium => {
            let mut parts = profile.issues.clone();
            parts.extend(profile.statutes.iter().cloned());
            parts.sort();
            parts.join("|")
        }
        SignatureLevel::Broad => {
            let mut domains = profile.domains.clone();
            domains.sort();
            domains.join("|")
        }
    };
    format!("stale:v1:{}:{}", level.as_str(), hash(&payload))
}

/// Token-set Jaccard similarity between two queries.
pub fn query_similarity(left: &str, right: &str) -> f64 {
    let left: std::collections::HashSet<String> = lexicon::tokenize(left).into_iter().collect();
    let right: std::collections::HashSet<String> = lexicon::tokenize(right).into_iter().collect();
    if left.is_empty() || right.is_empty() {
        return 0.0;
    }
    let intersection = left.intersection(&right).count() as f64;
    let union = left.union(&right).count() as f64;
    intersection / union
}

/// Persists a successful response under every signature level.
pub async fn persist(cache: &dyn SharedCache, profile: &IntentProfile, cases: &[ScoredCase]) {
    if cases.is_empty() {
        return;
    }
    let entry = StaleEntry {
        query: profile.cleaned_query.clone(),
        cases: cases.to_vec(),
    };
    for level in SignatureLevel::ALL {
        set_typed(cache, &signature(profile, level), &entry, STALE_TTL_SEC).await;
    }
}

/// Recalls the most specific prior response similar enough to this query.
pub async fn recall(
    cache: &dyn SharedCache,
    profile: &IntentProfile,
    min_similarity: f64,
) -> Option<StaleRecall> {
    for level in SignatureLevel::ALL {
        let key = signature(profile, level);
        let Some(entry) = get_typed::<StaleEntry>(cache, &key).await else {
            continue;
        };
        let similarity = query_similarity(&entry.query, &profile.cleaned_query);
        if similarity >= min_similarity {
            tracing::debug!(?level, similarity, "stale fallback recalled");
            return Some(StaleRecall {
                entry,
                level,
                similarity,
            });
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use precedent_cache::MemoryCache;
    use precedent_core::{profile_query, CaseCandidate};

    fn cases() -> Vec<ScoredCase> {
        vec![ScoredCase::unscored(CaseCandidate::new(
            "https://k.example/doc/1/",
            "A vs B",
        ))]
    }

    #[tokio::test]
    async fn test_persist_and_exact_recall() {
        let cache = MemoryCache::new();
        let profile = profile_query("delay condonation refused appeal dismissed limitation act");
        persist(&cache, &profile, &cases()).await;
        let recalled = recall(&cache, &profile, 0.35).await.unwrap();
        assert_eq!(recalled.level, SignatureLevel::Exact);
        assert!(recalled.similarity > 0.99);
        assert_eq!(recalled.entry.cases.len(), 1);
    }

    #[tokio::test]
    async fn test_similar_query_recalls_at_coarser_level() {
        let cache = MemoryCache::new();
        let stored = profile_query("delay condonation refused appeal dismissed limitation act");
        persist(&cache, &stored, &cases()).await;
        let similar =
            profile_query("appeal dismissed because delay condonation refused under limitation act");
        let recalled = recall(&cache, &similar, 0.35).await;
        assert!(recalled.is_some());
    }

    #[tokio::test]
    async fn test_dissimilar_query_misses() {
        let cache = MemoryCache::new();
        let stored = profile_query("delay condonation refused appeal dismissed limitation act");
        persist(&cache, &stored, &cases()).await;
        let unrelated = profile_query("anticipatory bail granted section 438 crpc murder case");
        let recalled = recall(&cache, &unrelated, 0.35).await;
        assert!(recalled.is_none());
    }

    #[test]
    fn test_similarity_bounds() {
        assert!(query_similarity("", "anything") < f64::EPSILON);
        let same = query_similarity("condonation of delay", "condonation of delay");
        assert!((same - 1.0).abs() < f64::EPSILON);
    }
}
