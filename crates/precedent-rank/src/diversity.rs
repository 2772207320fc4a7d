//! Result diversification and the Supreme Court preference boost.

use precedent_core::{Court, ScoredCase};
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

static TITLE_DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bon\s+(\d{1,2}\s+[a-z]+,?\s+\d{4})\b").unwrap()
});

/// Maximum ranking boost applied to Supreme Court items.
pub const MAX_SC_BOOST: f64 = 0.08;

fn title_date(title: &str) -> Option<String> {
    TITLE_DATE_RE
        .captures(title)
        .map(|c| c[1].to_lowercase().replace(',', ""))
}

fn fingerprint(case: &ScoredCase) -> String {
    let title = precedent_core::lexicon::normalize(&case.candidate.title);
    let date = title_date(&case.candidate.title).unwrap_or_default();
    format!("{title}|{:?}|{date}", case.candidate.court)
}

fn court_day_key(case: &ScoredCase) -> Option<String> {
    title_date(&case.candidate.title).map(|date| format!("{:?}|{date}", case.candidate.court))
}

/// Output of a diversification pass.
#[derive(Debug)]
pub struct DiversityOutcome {
    pub kept: Vec<ScoredCase>,
    /// Rows removed as duplicates of a kept row.
    pub collapsed: usize,
}

/// Collapses near-duplicates: one row per title/court/date fingerprint
/// and one row per court-day. Input order is preserved, so rank the list
/// before diversifying.
pub fn diversify(cases: Vec<ScoredCase>) -> DiversityOutcome {
    let mut seen_fingerprints: HashSet<String> = HashSet::new();
    let mut seen_court_days: HashSet<String> = HashSet::new();
    let mut kept = Vec::new();
    let mut collapsed = 0usize;

    for case in cases {
        if !seen_fingerprints.insert(fingerprint(&case)) {
            collapsed += 1;
            continue;
        }
        if let Some(court_day) = court_day_key(&case) {
            if !seen_court_days.insert(court_day) {
                collapsed += 1;
                continue;
            }
        }
        kept.push(case);
    }
    DiversityOutcome { kept, collapsed }
}

/// Boosts Supreme Court rows when the list mixes SC and HC results.
///
/// Never applied to a homogeneous list. Returns the number of boosted
/// rows; each boosted row records the reason.
pub fn apply_supreme_preference(cases: &mut Vec<ScoredCase>, enabled: bool) -> usize {
    if !enabled {
        return 0;
    }
    let has_supreme = cases.iter().any(|c| c.candidate.court == Court::Supreme);
    let has_high = cases.iter().any(|c| c.candidate.court == Court::High);
    if !has_supreme || !has_high {
        return 0;
    }
    let mut boosted = 0;
    for case in cases.iter_mut() {
        if case.candidate.court == Court::Supreme {
            case.ranking_score = (case.ranking_score + MAX_SC_BOOST).min(1.0);
            case.reasons
                .push("supreme court preference boost".to_string());
            boosted += 1;
        }
    }
    cases.sort_by(|a, b| {
        b.ranking_score
            .partial_cmp(&a.ranking_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    boosted
}

#[cfg(test)]
mod tests {
    use super::*;
    use precedent_core::CaseCandidate;

    fn scored(url: &str, title: &str, court: Court, ranking: f64) -> ScoredCase {
        let mut case = ScoredCase::unscored(CaseCandidate {
            court,
            ..CaseCandidate::new(url, title)
        });
        case.ranking_score = ranking;
        case
    }

    #[test]
    fn test_fingerprint_collapse() {
        let cases = vec![
            scored("https://k/doc/1/", "A vs B on 19 February, 1987", Court::Supreme, 0.9),
            scored("https://k/doc/2/", "A vs B on 19 February, 1987", Court::Supreme, 0.8),
            scored("https://k/doc/3/", "C vs D", Court::High, 0.7),
        ];
        let outcome = diversify(cases);
        assert_eq!(outcome.kept.len(), 2);
        assert_eq!(outcome.collapsed, 1);
        assert_eq!(outcome.kept[0].candidate.url, "https://k/doc/1/");
    }

    #[test]
    fn test_court_day_collapse() {
        let cases = vec![
            scored("https://k/doc/1/", "A vs B on 1 March, 1990", Court::High, 0.9),
            scored("https://k/doc/2/", "E vs F on 1 March, 1990", Court::High, 0.8),
        ];
        let outcome = diversify(cases);
        assert_eq!(outcome.kept.len(), 1);
        assert_eq!(outcome.collapsed, 1);
    }

    #[test]
    fn test_sc_boost_only_on_mixed_lists() {
        let mut homogeneous = vec![
            scored("https://k/doc/1/", "A vs B", Court::Supreme, 0.5),
            scored("https://k/doc/2/", "C vs D", Court::Supreme, 0.6),
        ];
        assert_eq!(apply_supreme_preference(&mut homogeneous, true), 0);

        let mut mixed = vec![
            scored("https://k/doc/1/", "A vs B", Court::High, 0.60),
            scored("https://k/doc/2/", "C vs D", Court::Supreme, 0.55),
        ];
        let boosted = apply_supreme_preference(&mut mixed, true);
        assert_eq!(boosted, 1);
        assert_eq!(mixed[0].candidate.court, Court::Supreme);
        assert!(mixed[0].reasons.iter().any(|r| r.contains("preference")));
        assert!((mixed[0].ranking_score - 0.63).abs() < 1e-9);
    }

    #[test]
    fn test_sc_boost_disabled() {
        let mut mixed = vec![
            scored("https://k/doc/1/", "A vs B", Court::High, 0.60),
            scored("https://k/doc/2/", "C vs D", Court::Supreme, 0.55),
        ];
        assert_eq!(apply_supreme_preference(&mut mixed, false), 0);
    }
}
