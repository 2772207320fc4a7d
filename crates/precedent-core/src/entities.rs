//! Pluggable entity enrichers.
//!
//! Each enricher recognises one entity family in the cleaned query; the
//! registry composes them and dedupes the combined bag.

use crate::intent::EntityBag;
use regex::Regex;
use std::sync::LazyLock;

/// Recognises one entity family.
pub trait EntityEnricher: Send + Sync {
    /// Stable enricher name for diagnostics.
    fn name(&self) -> &'static str;

    /// Adds recognised entities to the bag.
    fn enrich(&self, text: &str, bag: &mut EntityBag);
}

static PERSON_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:Mr|Mrs|Ms|Dr|Shri|Smt|Justice)\.?\s+((?:[A-Z][a-zA-Z]+)(?:\s+[A-Z][a-zA-Z]+){0,2})")
        .unwrap()
});

static JUSTICE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bJustice\.?\s+((?:[A-Z][a-zA-Z]+)(?:\s+[A-Z][a-zA-Z]+){0,2})").unwrap()
});

static STATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bstate of [a-z]+(?: [a-z]+)?").unwrap());

static DEPARTMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b[a-z]+(?: [a-z]+)? department\b").unwrap());

static STATUTE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:[a-z]+ ){0,4}act(?:,? \d{4})?\b").unwrap());

static SECTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:section|sec\.?|s\.)\s*(\d+[a-z]?)\b").unwrap());

static ARTICLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\barticle\s*(\d+[a-z]?)\b").unwrap());

static AIR_CITATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bair\s+\d{4}\s+[a-z]+\s+\d+\b").unwrap());

static SCC_CITATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\(\d{4}\)\s*\d+\s*scc\s*\d+\b").unwrap());

/// Title-prefixed person names.
pub struct PersonEnricher;

impl EntityEnricher for PersonEnricher {
    fn name(&self) -> &'static str {
        "persons"
    }

    fn enrich(&self, text: &str, bag: &mut EntityBag) {
        for capture in PERSON_RE.captures_iter(text) {
            bag.persons.push(capture[1].to_string());
        }
    }
}

/// Government bodies and organisations.
pub struct OrgEnricher;

impl EntityEnricher for OrgEnricher {
    fn name(&self) -> &'static str {
        "orgs"
    }

    fn enrich(&self, text: &str, bag: &mut EntityBag) {
        let lowered = text.to_lowercase();
        for re in [&*STATE_RE, &*DEPARTMENT_RE] {
            for found in re.find_iter(&lowered) {
                bag.orgs.push(found.as_str().to_string());
            }
        }
        if lowered.contains("union of india") {
            bag.orgs.push("union of india".to_string());
        }
    }
}

/// Statute names ("... Act", optionally with a year).
pub struct StatuteEnricher;

impl EntityEnricher for StatuteEnricher {
    fn name(&self) -> &'static str {
        "statutes"
    }

    fn enrich(&self, text: &str, bag: &mut EntityBag) {
        let lowered = text.to_lowercase();
        for found in STATUTE_RE.find_iter(&lowered) {
            let statute = trim_leading_fillers(found.as_str());
            if statute != "act" && !statute.is_empty() {
                bag.statutes.push(statute);
            }
        }
    }
}

fn trim_leading_fillers(statute: &str) -> String {
    let fillers = ["the", "a", "an", "under", "said", "per"];
    let mut words: Vec<&str> = statute.split_whitespace().collect();
    while words.len() > 1 && fillers.contains(&words[0]) {
        words.remove(0);
    }
    words.join(" ")
}

/// Section and article references.
pub struct SectionEnricher;

impl EntityEnricher for SectionEnricher {
    fn name(&self) -> &'static str {
        "sections"
    }

    fn enrich(&self, text: &str, bag: &mut EntityBag) {
        for capture in SECTION_RE.captures_iter(text) {
            bag.sections.push(format!("section {}", capture[1].to_lowercase()));
        }
        for capture in ARTICLE_RE.captures_iter(text) {
            bag.sections.push(format!("article {}", capture[1].to_lowercase()));
        }
    }
}

/// Reporter citations (AIR / SCC patterns).
pub struct CitationEnricher;

impl EntityEnricher for CitationEnricher {
    fn name(&self) -> &'static str {
        "citations"
    }

    fn enrich(&self, text: &str, bag: &mut EntityBag) {
        for re in [&*AIR_CITATION_RE, &*SCC_CITATION_RE] {
            for found in re.find_iter(text) {
                bag.citations.push(found.as_str().to_string());
            }
        }
    }
}

/// Composes enrichers and dedupes the combined bag.
pub struct EnricherRegistry {
    enrichers: Vec<Box<dyn EntityEnricher>>,
}

impl Default for EnricherRegistry {
    fn default() -> Self {
        Self {
            enrichers: vec![
                Box::new(PersonEnricher),
                Box::new(OrgEnricher),
                Box::new(StatuteEnricher),
                Box::new(SectionEnricher),
                Box::new(CitationEnricher),
            ],
        }
    }
}

impl EnricherRegistry {
    /// Registers an additional enricher.
    pub fn register(&mut self, enricher: Box<dyn EntityEnricher>) {
        self.enrichers.push(enricher);
    }

    /// Runs every enricher and dedupes the result.
    pub fn extract(&self, text: &str) -> EntityBag {
        let mut bag = EntityBag::default();
        for enricher in &self.enrichers {
            enricher.enrich(text, &mut bag);
        }
        for list in [
            &mut bag.persons,
            &mut bag.orgs,
            &mut bag.statutes,
            &mut bag.sections,
            &mut bag.citations,
        ] {
            list.sort();
            list.dedup();
        }
        bag
    }
}

/// Judge names extracted from the person list.
pub fn judge_hints(text: &str) -> Vec<String> {
    let mut judges: Vec<String> = JUSTICE_RE
        .captures_iter(text)
        .map(|c| c[1].to_string())
        .collect();
    judges.sort();
    judges.dedup();
    judges
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_state_and_union() {
        let bag = EnricherRegistry::default().extract("State of Maharashtra and Union of India");
        assert!(bag.orgs.iter().any(|o| o.contains("state of maharashtra")));
        assert!(bag.orgs.iter().any(|o| o == "union of india"));
    }

    #[test]
    fn test_extracts_sections_and_articles() {
        let bag = EnricherRegistry::default().extract("petition under section 482 and Article 226");
        assert!(bag.sections.contains(&"section 482".to_string()));
        assert!(bag.sections.contains(&"article 226".to_string()));
    }

    #[test]
    fn test_extracts_statute() {
        let bag = EnricherRegistry::default().extract("under the Prevention of Corruption Act, 1988");
        assert!(bag.statutes.iter().any(|s| s.contains("prevention of corruption act")));
    }

    #[test]
    fn test_extracts_citations() {
        let bag = EnricherRegistry::default().extract("see AIR 1992 SC 604 and (2005) 8 SCC 89");
        assert_eq!(bag.citations.len(), 2);
    }

    #[test]
    fn test_person_and_judge_hints() {
        let text = "appeal argued before Justice Chandrachud by Mr Sharma";
        let bag = EnricherRegistry::default().extract(text);
        assert!(bag.persons.contains(&"Chandrachud".to_string()));
        assert!(bag.persons.contains(&"Sharma".to_string()));
        assert_eq!(judge_hints(text), vec!["Chandrachud".to_string()]);
    }

    #[test]
    fn test_dedupes() {
        let bag = EnricherRegistry::default().extract("section 5 and section 5 again");
        assert_eq!(bag.sections, vec!["section 5".to_string()]);
    }
}
