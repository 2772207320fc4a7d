//! Intent profiler: turns a raw user query into an [`IntentProfile`].
//!
//! Every operation here is pure. Query length policing happens at the
//! HTTP boundary, not here.

use crate::checklist::HookGroup;
use crate::compiler::seed_hook_groups;
use crate::entities::{judge_hints, EnricherRegistry};
use crate::intent::{
    CourtHint, DateWindow, IntentProfile, OutcomePolarity, RetrievalIntent,
};
use crate::lexicon::{self, LexiconEntry, NOISE_PATTERNS};
use chrono::NaiveDate;
use regex::Regex;
use std::sync::LazyLock;

/// Minimum characters a query must have to be profiled at all.
pub const MIN_QUERY_CHARS: usize = 12;

/// Default document-type profile passed to providers.
pub const DEFAULT_DOCTYPE_PROFILE: &str = "judgments";

static YEAR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b(19|20)\d{2}\b").unwrap());

static MONTH_YEAR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(january|february|march|april|may|june|july|august|september|october|november|december)\s+((?:19|20)\d{2})\b",
    )
    .unwrap()
});

static CANNOT_WITHOUT_SANCTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:cannot|can not|could not)\b.{0,80}?\bwithout\b.{0,30}?\bsanction\b")
        .unwrap()
});

static UNLESS_SANCTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bunless\b.{0,30}?\b(?:prior |previous )?sanction\b").unwrap());

/// Strips conversational noise and normalizes whitespace, preserving case.
pub fn clean_query(raw: &str) -> String {
    let mut cleaned = raw.to_string();
    for pattern in NOISE_PATTERNS.iter() {
        cleaned = pattern.replace_all(&cleaned, " ").into_owned();
    }
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// The keyword/phrase portion of the profile.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextProfile {
    pub domains: Vec<String>,
    pub issues: Vec<String>,
    pub statutes: Vec<String>,
    pub procedures: Vec<String>,
    pub actors: Vec<String>,
    pub anchors: Vec<String>,
}

fn recognise(lowered: &str, table: &[LexiconEntry]) -> Vec<String> {
    let mut labels = Vec::new();
    for entry in table {
        if entry
            .cues
            .iter()
            .any(|cue| lexicon::contains_term(lowered, cue))
        {
            labels.push(entry.label.to_string());
        }
    }
    labels
}

/// Runs the curated recognisers over the cleaned query.
pub fn build_context_profile(cleaned: &str) -> ContextProfile {
    let lowered = cleaned.to_lowercase();
    ContextProfile {
        domains: recognise(&lowered, lexicon::DOMAINS),
        issues: recognise(&lowered, lexicon::ISSUES),
        statutes: lexicon::HOOK_FAMILIES
            .iter()
            .filter(|family| {
                family
                    .aliases
                    .iter()
                    .any(|alias| lexicon::contains_term(&lowered, alias))
            })
            .map(|family| family.aliases[0].to_string())
            .collect(),
        procedures: recognise(&lowered, lexicon::PROCEDURES),
        actors: recognise(&lowered, lexicon::ACTORS),
        anchors: recognise(&lowered, lexicon::ANCHORS),
    }
}

fn last_day_of_month(year: i32, month: u32) -> u32 {
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    };
    next.and_then(|d| d.pred_opt())
        .map(|d| chrono::Datelike::day(&d))
        .unwrap_or(28)
}

fn month_number(name: &str) -> u32 {
    match name.to_lowercase().as_str() {
        "january" => 1,
        "february" => 2,
        "march" => 3,
        "april" => 4,
        "may" => 5,
        "june" => 6,
        "july" => 7,
        "august" => 8,
        "september" => 9,
        "october" => 10,
        "november" => 11,
        _ => 12,
    }
}

/// Extracts an inclusive `D-M-YYYY` date window from the cleaned query.
///
/// A month plus year yields that month; a bare year yields the full year;
/// two bare years yield their span; no year yields an empty window.
pub fn extract_date_window(cleaned: &str) -> DateWindow {
    if let Some(capture) = MONTH_YEAR_RE.captures(cleaned) {
        let month = month_number(&capture[1]);
        let year: i32 = capture[2].parse().unwrap_or(2000);
        return DateWindow {
            from_date: Some(format!("1-{month}-{year}")),
            to_date: Some(format!("{}-{month}-{year}", last_day_of_month(year, month))),
        };
    }
    let mut years: Vec<i32> = YEAR_RE
        .find_iter(cleaned)
        .filter_map(|m| m.as_str().parse().ok())
        .collect();
    if years.is_empty() {
        return DateWindow::default();
    }
    years.sort_unstable();
    let first = years[0];
    let last = years[years.len() - 1];
    DateWindow {
        from_date: Some(format!("1-1-{first}")),
        to_date: Some(format!("31-12-{last}")),
    }
}

/// Infers the court preference.
///
/// A query naming only one of the two levels narrows the search; naming
/// both (or neither) leaves it open.
pub fn infer_court_hint(cleaned: &str) -> CourtHint {
    let lowered = cleaned.to_lowercase();
    let supreme = lowered.contains("supreme court") || lexicon::contains_term(&lowered, "sc");
    let high = lowered.contains("high court") || lexicon::contains_term(&lowered, "hc");
    match (supreme, high) {
        (true, false) => CourtHint::Supreme,
        (false, true) => CourtHint::High,
        _ => CourtHint::Any,
    }
}

const STRONG_OUTCOME_VERBS: &[&str] = &[
    "dismissed",
    "quashed",
    "refused",
    "rejected",
    "allowed",
    "granted",
    "condoned",
    "barred",
    "acquitted",
    "convicted",
];

/// Infers the required outcome polarity by ordered rules.
pub fn infer_outcome_polarity(cleaned: &str, issues: &[String]) -> OutcomePolarity {
    let lowered = cleaned.to_lowercase();
    let has_strong_verb = STRONG_OUTCOME_VERBS
        .iter()
        .any(|verb| lexicon::contains_term(&lowered, verb));

    // Open-ended questions carry no disposition unless a strong verb does.
    let open_ended = lowered.starts_with("whether")
        || lowered.starts_with("when ")
        || lowered.contains("when can")
        || lexicon::contains_term(&lowered, "whether");
    if open_ended && !has_strong_verb {
        return OutcomePolarity::Unknown;
    }

    if CANNOT_WITHOUT_SANCTION_RE.is_match(&lowered) || UNLESS_SANCTION_RE.is_match(&lowered) {
        return OutcomePolarity::Required;
    }
    if lowered.contains("sanction not required")
        || lowered.contains("no sanction")
        || lowered.contains("without sanction")
    {
        return OutcomePolarity::NotRequired;
    }

    // A refused condonation is the operative outcome even when the query
    // also narrates the consequent dismissal.
    let condonation_context = issues.iter().any(|i| i == "condonation of delay")
        || lexicon::contains_term(&lowered, "condonation")
        || lexicon::contains_term(&lowered, "condone");
    let refusal_cue = lowered.contains("not condoned")
        || lexicon::contains_term(&lowered, "refused")
        || lexicon::contains_term(&lowered, "rejected");
    if condonation_context && refusal_cue {
        return OutcomePolarity::Refused;
    }

    if lexicon::contains_term(&lowered, "dismissed")
        || lowered.contains("time barred")
        || lowered.contains("time-barred")
    {
        return OutcomePolarity::Dismissed;
    }
    if lexicon::contains_term(&lowered, "quashed") {
        return OutcomePolarity::Quashed;
    }
    if refusal_cue || lowered.contains("not condoned") {
        return OutcomePolarity::Refused;
    }
    if lexicon::contains_term(&lowered, "allowed")
        || lexicon::contains_term(&lowered, "granted")
        || lexicon::contains_term(&lowered, "condoned")
    {
        return OutcomePolarity::Allowed;
    }
    OutcomePolarity::Unknown
}

/// Profiles a raw query end to end.
pub fn profile_query(raw: &str) -> IntentProfile {
    let cleaned = clean_query(raw);
    let context = build_context_profile(&cleaned);
    let date_window = extract_date_window(&cleaned);
    let court_hint = infer_court_hint(&cleaned);
    let outcome_polarity = infer_outcome_polarity(&cleaned, &context.issues);
    let entities = EnricherRegistry::default().extract(&cleaned);
    let hook_groups: Vec<HookGroup> =
        seed_hook_groups(&context.statutes, &entities.sections, &cleaned);

    let retrieval_intent = RetrievalIntent {
        hook_groups,
        outcome_polarity,
        citation_hints: entities.citations.clone(),
        judge_hints: judge_hints(&cleaned),
        doctype_profile: DEFAULT_DOCTYPE_PROFILE.to_string(),
    };

    IntentProfile {
        cleaned_query: cleaned,
        domains: context.domains,
        issues: context.issues,
        statutes: context.statutes,
        procedures: context.procedures,
        actors: context.actors,
        anchors: context.anchors,
        court_hint,
        date_window,
        entities,
        retrieval_intent,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_query_strips_noise() {
        let cleaned = clean_query("Please find cases where the appeal was dismissed");
        assert_eq!(cleaned, "the appeal was dismissed");
    }

    #[test]
    fn test_date_window_bare_year() {
        let window = extract_date_window("appeals dismissed in 2015");
        assert_eq!(window.from_date.as_deref(), Some("1-1-2015"));
        assert_eq!(window.to_date.as_deref(), Some("31-12-2015"));
    }

    #[test]
    fn test_date_window_month_year() {
        let window = extract_date_window("orders passed in February 2016");
        assert_eq!(window.from_date.as_deref(), Some("1-2-2016"));
        assert_eq!(window.to_date.as_deref(), Some("29-2-2016"));
    }

    #[test]
    fn test_date_window_year_span() {
        let window = extract_date_window("between 2010 and 2014");
        assert_eq!(window.from_date.as_deref(), Some("1-1-2010"));
        assert_eq!(window.to_date.as_deref(), Some("31-12-2014"));
    }

    #[test]
    fn test_date_window_empty() {
        assert!(extract_date_window("no dates here").is_empty());
    }

    #[test]
    fn test_court_hint() {
        assert_eq!(infer_court_hint("supreme court cases on bail"), CourtHint::Supreme);
        assert_eq!(infer_court_hint("high court quashed the fir"), CourtHint::High);
        assert_eq!(
            infer_court_hint("sc and high court cases"),
            CourtHint::Any
        );
        assert_eq!(infer_court_hint("cases on bail"), CourtHint::Any);
    }

    #[test]
    fn test_polarity_open_question_unknown() {
        assert_eq!(
            infer_outcome_polarity("whether sanction is necessary for a trap case", &[]),
            OutcomePolarity::Unknown
        );
    }

    #[test]
    fn test_polarity_required() {
        assert_eq!(
            infer_outcome_polarity("public servant cannot be prosecuted without sanction", &[]),
            OutcomePolarity::Required
        );
        assert_eq!(
            infer_outcome_polarity("prosecution invalid unless prior sanction obtained", &[]),
            OutcomePolarity::Required
        );
    }

    #[test]
    fn test_polarity_not_required() {
        assert_eq!(
            infer_outcome_polarity("held that sanction not required for retired officers", &[]),
            OutcomePolarity::NotRequired
        );
    }

    #[test]
    fn test_polarity_condonation_refusal_wins_over_dismissal() {
        let query = "delay condonation application was refused and the appeal was dismissed as time-barred";
        let issues = vec!["condonation of delay".to_string()];
        assert_eq!(
            infer_outcome_polarity(query, &issues),
            OutcomePolarity::Refused
        );
    }

    #[test]
    fn test_polarity_dismissed() {
        assert_eq!(
            infer_outcome_polarity("suit dismissed as time barred", &[]),
            OutcomePolarity::Dismissed
        );
    }

    #[test]
    fn test_polarity_quashed() {
        assert_eq!(
            infer_outcome_polarity("fir quashed by the high court", &[]),
            OutcomePolarity::Quashed
        );
    }

    #[test]
    fn test_polarity_allowed() {
        assert_eq!(
            infer_outcome_polarity("delay condoned and appeal restored", &[]),
            OutcomePolarity::Allowed
        );
    }

    #[test]
    fn test_profile_end_to_end() {
        let profile = profile_query(
            "Find cases where State as appellant filed criminal appeal and delay condonation application was refused under section 5 of the Limitation Act",
        );
        assert!(profile.issues.contains(&"condonation of delay".to_string()));
        assert!(profile.actors.contains(&"state".to_string()));
        assert!(profile.procedures.contains(&"criminal appeal".to_string()));
        assert_eq!(
            profile.retrieval_intent.outcome_polarity,
            OutcomePolarity::Refused
        );
        assert!(profile
            .retrieval_intent
            .hook_groups
            .iter()
            .any(|g| g.group_id == "sec_5_limitation_act"));
    }
}
