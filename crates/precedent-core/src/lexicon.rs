//! Curated legal lexicon for Indian case-law queries.
//!
//! Every matcher in the engine (profiler, planner, gate) goes through the
//! single tokenization pipeline defined here, so term matching never
//! drifts between components. All regexes are compiled once at first use.

use regex::Regex;
use std::sync::LazyLock;

/// Conversational filler stripped from raw queries before profiling.
pub static NOISE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)\b(?:please\s+)?(?:find|show|list|give)\s+(?:me\s+)?(?:all\s+)?(?:the\s+)?cases?\s+(?:where|in\s+which|about|on)\b",
        r"(?i)\b(?:please|kindly)\s+(?:find|show|list|search|give)\b",
        r"(?i)\bcan\s+you\s+(?:please\s+)?(?:find|show|list|search)\b",
        r"(?i)\bi\s+(?:am\s+)?(?:want|need|would\s+like)\s+(?:to\s+)?(?:find|see|know)\b",
        r"(?i)\b(?:search|looking)\s+for\b",
        r"(?i)\bshow\s+me\b",
        r"(?i)\bgive\s+me\b",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

static WORD_SPLIT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^a-z0-9]+").unwrap());

/// Tokens carrying no retrieval signal, removed by [`tokenize`].
///
/// Deliberately does not include negators ("not", "no"): outcome polarity
/// phrases like "not condoned" must survive tokenization intact.
pub const STOPWORDS: &[&str] = &[
    "a", "an", "the", "of", "in", "on", "at", "to", "for", "and", "or", "is", "was", "were", "be",
    "been", "by", "with", "as", "that", "this", "it", "its", "from",
];

/// Tokens that mark a phrase as legally meaningful.
///
/// Query variants without at least one of these are rejected during
/// normalization, and trace variants must carry one.
pub const LEGAL_SIGNAL_TOKENS: &[&str] = &[
    "act",
    "section",
    "article",
    "appeal",
    "court",
    "bail",
    "fir",
    "sanction",
    "limitation",
    "condonation",
    "condone",
    "condoned",
    "quash",
    "quashed",
    "quashing",
    "writ",
    "petition",
    "accused",
    "conviction",
    "acquittal",
    "acquitted",
    "prosecution",
    "delay",
    "offence",
    "complaint",
    "charge",
    "chargesheet",
    "decree",
    "suit",
    "arbitration",
    "barred",
    "dismissed",
    "refused",
    "allowed",
    "granted",
    "judgment",
    "convicted",
    "sentence",
];

/// One recogniser row: a canonical label plus the surface cues that map to it.
#[derive(Debug, Clone, Copy)]
pub struct LexiconEntry {
    /// Canonical label emitted into the profile.
    pub label: &'static str,
    /// Lowercase surface forms recognised in the cleaned query.
    pub cues: &'static [&'static str],
}

/// Broad legal domains.
pub const DOMAINS: &[LexiconEntry] = &[
    LexiconEntry {
        label: "criminal law",
        cues: &[
            "criminal", "fir", "accused", "offence", "prosecution", "bail", "chargesheet",
            "conviction", "acquittal", "ipc", "crpc",
        ],
    },
    LexiconEntry {
        label: "civil law",
        cues: &["civil", "suit", "decree", "injunction", "specific performance", "cpc"],
    },
    LexiconEntry {
        label: "constitutional law",
        cues: &["constitution", "article 226", "article 32", "fundamental right", "writ"],
    },
    LexiconEntry {
        label: "service law",
        cues: &["service", "departmental", "disciplinary", "government servant", "public servant"],
    },
    LexiconEntry {
        label: "limitation",
        cues: &["limitation", "time barred", "condonation", "delay"],
    },
    LexiconEntry {
        label: "anti-corruption",
        cues: &["corruption", "pc act", "prevention of corruption", "bribe", "trap case"],
    },
    LexiconEntry {
        label: "arbitration",
        cues: &["arbitration", "arbitral award", "arbitrator"],
    },
    LexiconEntry {
        label: "property law",
        cues: &["tenant", "landlord", "eviction", "possession", "land acquisition"],
    },
];

/// Recognised legal issues.
pub const ISSUES: &[LexiconEntry] = &[
    LexiconEntry {
        label: "sanction for prosecution",
        cues: &["sanction", "prior sanction", "previous sanction", "sanction for prosecution"],
    },
    LexiconEntry {
        label: "condonation of delay",
        cues: &["condonation", "condone the delay", "condoning delay", "delay condonation"],
    },
    LexiconEntry {
        label: "quashing of fir",
        cues: &["quash", "quashing", "quashed", "quashing of fir"],
    },
    LexiconEntry {
        label: "limitation bar",
        cues: &["time barred", "barred by limitation", "period of limitation", "limitation"],
    },
    LexiconEntry {
        label: "read with",
        cues: &["read with", "r/w"],
    },
    LexiconEntry {
        label: "interplay",
        cues: &["interplay", "interaction between", "interplay between"],
    },
    LexiconEntry {
        label: "anticipatory bail",
        cues: &["anticipatory bail", "pre-arrest bail"],
    },
    LexiconEntry {
        label: "civil dispute colour",
        cues: &["civil in nature", "civil dispute", "essentially civil"],
    },
    LexiconEntry {
        label: "abuse of process",
        cues: &["abuse of process", "abuse of the process"],
    },
    LexiconEntry {
        label: "compounding of offence",
        cues: &["compounding", "compoundable"],
    },
];

/// Procedural postures.
pub const PROCEDURES: &[LexiconEntry] = &[
    LexiconEntry {
        label: "criminal appeal",
        cues: &["criminal appeal"],
    },
    LexiconEntry {
        label: "civil appeal",
        cues: &["civil appeal"],
    },
    LexiconEntry {
        label: "appeal",
        cues: &["appeal", "appellate"],
    },
    LexiconEntry {
        label: "writ petition",
        cues: &["writ petition", "writ"],
    },
    LexiconEntry {
        label: "special leave petition",
        cues: &["special leave petition", "slp"],
    },
    LexiconEntry {
        label: "revision",
        cues: &["revision", "revisional"],
    },
    LexiconEntry {
        label: "review",
        cues: &["review petition"],
    },
    LexiconEntry {
        label: "bail application",
        cues: &["bail application", "bail plea"],
    },
    LexiconEntry {
        label: "quashing petition",
        cues: &["section 482", "482 crpc", "quashing petition", "inherent power"],
    },
    LexiconEntry {
        label: "condonation application",
        cues: &["condonation application", "application for condonation", "delay condonation application"],
    },
    LexiconEntry {
        label: "discharge application",
        cues: &["discharge application", "discharge of the accused"],
    },
];

/// Actor roles appearing in fact scenarios.
pub const ACTORS: &[LexiconEntry] = &[
    LexiconEntry {
        label: "state",
        cues: &["state", "state government", "government"],
    },
    LexiconEntry {
        label: "union of india",
        cues: &["union of india", "central government"],
    },
    LexiconEntry {
        label: "appellant",
        cues: &["appellant"],
    },
    LexiconEntry {
        label: "respondent",
        cues: &["respondent"],
    },
    LexiconEntry {
        label: "accused",
        cues: &["accused"],
    },
    LexiconEntry {
        label: "complainant",
        cues: &["complainant", "informant"],
    },
    LexiconEntry {
        label: "public servant",
        cues: &["public servant", "government servant", "government employee", "public official"],
    },
    LexiconEntry {
        label: "prosecution",
        cues: &["prosecution"],
    },
    LexiconEntry {
        label: "employer",
        cues: &["employer"],
    },
    LexiconEntry {
        label: "workman",
        cues: &["workman", "employee"],
    },
    LexiconEntry {
        label: "tenant",
        cues: &["tenant"],
    },
    LexiconEntry {
        label: "landlord",
        cues: &["landlord"],
    },
];

/// Doctrinal anchor phrases that survive into browse-phase variants.
pub const ANCHORS: &[LexiconEntry] = &[
    LexiconEntry {
        label: "sufficient cause",
        cues: &["sufficient cause"],
    },
    LexiconEntry {
        label: "abuse of process",
        cues: &["abuse of process"],
    },
    LexiconEntry {
        label: "miscarriage of justice",
        cues: &["miscarriage of justice"],
    },
    LexiconEntry {
        label: "inherent powers",
        cues: &["inherent power", "inherent powers", "inherent jurisdiction"],
    },
    LexiconEntry {
        label: "rarest of rare",
        cues: &["rarest of rare"],
    },
];

/// A statutory hook family: canonical id plus alias surface forms.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HookFamily {
    /// Canonical family id (stable across queries).
    pub id: &'static str,
    /// Alias forms expanded into hook-group terms.
    pub aliases: &'static [&'static str],
}

/// Known statute families with canonical aliases.
pub const HOOK_FAMILIES: &[HookFamily] = &[
    HookFamily {
        id: "pc_act",
        aliases: &["prevention of corruption act", "pc act", "p.c. act"],
    },
    HookFamily {
        id: "crpc",
        aliases: &["crpc", "cr.p.c", "code of criminal procedure", "criminal procedure code"],
    },
    HookFamily {
        id: "ipc",
        aliases: &["ipc", "indian penal code", "penal code"],
    },
    HookFamily {
        id: "cpc",
        aliases: &["cpc", "code of civil procedure", "civil procedure code"],
    },
    HookFamily {
        id: "limitation_act",
        aliases: &["limitation act", "law of limitation"],
    },
    HookFamily {
        id: "evidence_act",
        aliases: &["evidence act", "indian evidence act"],
    },
    HookFamily {
        id: "arbitration_act",
        aliases: &["arbitration act", "arbitration and conciliation act"],
    },
    HookFamily {
        id: "ni_act",
        aliases: &["negotiable instruments act", "ni act"],
    },
    HookFamily {
        id: "sarfaesi",
        aliases: &["sarfaesi", "sarfaesi act", "securitisation act"],
    },
    HookFamily {
        id: "constitution",
        aliases: &["constitution of india", "constitution"],
    },
];

/// Resolves a statute surface form to its hook family, if known.
pub fn hook_family(statute: &str) -> Option<&'static HookFamily> {
    let lowered = statute.to_lowercase();
    HOOK_FAMILIES
        .iter()
        .find(|family| family.aliases.iter().any(|alias| lowered.contains(alias)))
}

/// Outcome polarity phrase sets: affirmative cues and contradiction cues.
#[derive(Debug, Clone, Copy)]
pub struct PolarityCues {
    /// Phrases that evidence the polarity.
    pub positive: &'static [&'static str],
    /// Phrases that contradict the polarity outright.
    pub contradiction: &'static [&'static str],
}

/// Cues for the `required` polarity (sanction must exist).
pub const CUES_REQUIRED: PolarityCues = PolarityCues {
    positive: &[
        "sanction is required",
        "sanction required",
        "prior sanction",
        "previous sanction",
        "sanction is mandatory",
        "sanction mandatory",
        "cannot be prosecuted without sanction",
        "without prior sanction",
        "unless prior sanction",
    ],
    contradiction: &[
        "sanction not required",
        "no sanction is required",
        "no sanction required",
        "sanction is not necessary",
        "does not require sanction",
    ],
};

/// Cues for the `not_required` polarity.
pub const CUES_NOT_REQUIRED: PolarityCues = PolarityCues {
    positive: &[
        "sanction not required",
        "no sanction is required",
        "no sanction required",
        "sanction is not necessary",
        "without sanction",
        "does not require sanction",
    ],
    contradiction: &["sanction is required", "sanction is mandatory", "prior sanction necessary"],
};

/// Cues for the `allowed` polarity.
pub const CUES_ALLOWED: PolarityCues = PolarityCues {
    positive: &["allowed", "granted", "condoned", "delay condoned", "application allowed"],
    contradiction: &["not condoned", "not allowed", "refused", "rejected", "dismissed"],
};

/// Cues for the `refused` polarity.
pub const CUES_REFUSED: PolarityCues = PolarityCues {
    positive: &["refused", "rejected", "not condoned", "declined", "turned down"],
    contradiction: &["condoned", "allowed", "granted"],
};

/// Cues for the `dismissed` polarity.
pub const CUES_DISMISSED: PolarityCues = PolarityCues {
    positive: &[
        "dismissed",
        "time barred",
        "time-barred",
        "barred by limitation",
        "dismissed as barred",
        "appeal dismissed",
    ],
    contradiction: &["appeal allowed", "restored", "remanded for fresh"],
};

/// Cues for the `quashed` polarity.
pub const CUES_QUASHED: PolarityCues = PolarityCues {
    positive: &["quashed", "quashing", "set aside the fir", "proceedings quashed"],
    contradiction: &["refused to quash", "declined to quash", "quashing refused"],
};

/// Negator tokens that flip an outcome phrase when immediately preceding it.
pub const NEGATORS: &[&str] = &["not", "no", "never", "without"];

/// Expands a canonical label into its matchable surface forms.
///
/// Checklist entries are stored under canonical labels ("quashing of
/// fir"); judgments speak in surface forms ("the FIR was quashed"). All
/// matchers expand through here so the two vocabularies never drift.
pub fn expansion_terms(label: &str) -> Vec<String> {
    for table in [DOMAINS, ISSUES, PROCEDURES, ACTORS, ANCHORS] {
        if let Some(entry) = table.iter().find(|e| e.label == label) {
            let mut terms = vec![label.to_string()];
            for cue in entry.cues {
                let cue = cue.to_string();
                if !terms.contains(&cue) {
                    terms.push(cue);
                }
            }
            return terms;
        }
    }
    vec![label.to_string()]
}

/// Lowercases and collapses internal whitespace.
pub fn normalize(text: &str) -> String {
    text.to_lowercase().split_whitespace().collect::<Vec<_>>().join(" ")
}

/// The single tokenization pipeline: normalise, split, drop stopwords
/// and one-character fragments.
pub fn tokenize(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    WORD_SPLIT
        .split(&lowered)
        .filter(|t| t.len() > 1 && !STOPWORDS.contains(t))
        .map(|t| t.to_string())
        .collect()
}

/// True when the token carries legal signal.
pub fn is_legal_signal(token: &str) -> bool {
    LEGAL_SIGNAL_TOKENS.contains(&token)
}

/// Term containment over already-lowercased text.
///
/// Multi-word terms match as substrings; single words require word
/// boundaries so "act" does not fire inside "transaction".
pub fn contains_term(text: &str, term: &str) -> bool {
    let term = term.to_lowercase();
    if term.contains(' ') {
        return text.contains(&term);
    }
    !word_positions(text, &term).is_empty()
}

/// Byte offsets of every occurrence of `term` in lowercased `text`,
/// honouring the same boundary rules as [`contains_term`].
pub fn term_positions(text: &str, term: &str) -> Vec<usize> {
    let term = term.to_lowercase();
    if term.contains(' ') {
        let mut positions = Vec::new();
        let mut from = 0;
        while let Some(found) = text[from..].find(&term) {
            positions.push(from + found);
            from += found + 1;
        }
        positions
    } else {
        word_positions(text, &term)
    }
}

/// Affirmative containment: the term occurs at least once without a
/// negator token immediately before it. Guards against "not condoned"
/// triggering a "condoned" match.
pub fn contains_affirmative_term(text: &str, term: &str) -> bool {
    let lowered_term = term.to_lowercase();
    term_positions(text, &lowered_term).iter().any(|&pos| {
        let prefix = &text[..pos];
        let Some(prev) = prefix.split_whitespace().last() else {
            return true;
        };
        let prev = prev.trim_matches(|c: char| !c.is_alphanumeric());
        !NEGATORS.contains(&prev)
    })
}

fn word_positions(text: &str, word: &str) -> Vec<usize> {
    let mut positions = Vec::new();
    let mut from = 0;
    while let Some(found) = find_word(text, word, from) {
        positions.push(found);
        from = found + 1;
    }
    positions
}

fn find_word(text: &str, word: &str, from: usize) -> Option<usize> {
    if from > text.len() {
        return None;
    }
    let mut search_from = from;
    while let Some(found) = text[search_from..].find(word) {
        let start = search_from + found;
        let end = start + word.len();
        let left_ok = start == 0
            || !text[..start]
                .chars()
                .next_back()
                .is_some_and(|c| c.is_alphanumeric());
        let right_ok = end == text.len()
            || !text[end..].chars().next().is_some_and(|c| c.is_alphanumeric());
        if left_ok && right_ok {
            return Some(start);
        }
        search_from = start + 1;
        if search_from > text.len() {
            break;
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_drops_stopwords() {
        let tokens = tokenize("the appeal was dismissed by the court");
        assert_eq!(tokens, vec!["appeal", "dismissed", "court"]);
    }

    #[test]
    fn test_tokenize_keeps_negators() {
        let tokens = tokenize("delay not condoned");
        assert_eq!(tokens, vec!["delay", "not", "condoned"]);
    }

    #[test]
    fn test_contains_term_word_boundary() {
        assert!(contains_term("the pc act applies", "act"));
        assert!(!contains_term("the transaction failed", "act"));
    }

    #[test]
    fn test_contains_term_multiword_substring() {
        assert!(contains_term("prior sanction for prosecution obtained", "sanction for prosecution"));
    }

    #[test]
    fn test_affirmative_rejects_negated() {
        assert!(!contains_affirmative_term("delay was not condoned", "condoned"));
        assert!(contains_affirmative_term("delay was condoned", "condoned"));
    }

    #[test]
    fn test_affirmative_mixed_occurrences() {
        let text = "delay not condoned earlier but finally condoned on appeal";
        assert!(contains_affirmative_term(text, "condoned"));
    }

    #[test]
    fn test_hook_family_resolution() {
        assert_eq!(hook_family("Code of Criminal Procedure").map(|f| f.id), Some("crpc"));
        assert_eq!(hook_family("Limitation Act").map(|f| f.id), Some("limitation_act"));
        assert_eq!(hook_family("some municipal act"), None);
    }

    #[test]
    fn test_term_positions_multiword() {
        let text = "sanction refused. later sanction refused again";
        assert_eq!(term_positions(text, "sanction refused").len(), 2);
    }
}
