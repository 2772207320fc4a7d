//! Permissive parsing and whitelist validation of reasoner output.
//!
//! The model is asked for strict JSON but is not trusted to produce it:
//! the parser accepts a JSON object embedded in prose, drops unknown
//! fields into a warning list, and decides usability afterwards.

use precedent_core::ReasonerPlan;
use serde_json::Value;

/// Validation result: the plan (when parseable), collected warnings, and
/// whether the plan is usable at all.
#[derive(Debug, Default)]
pub struct PlanValidation {
    /// The parsed plan, if the payload had the required shape.
    pub plan: Option<ReasonerPlan>,
    /// Dropped fields and structural complaints.
    pub warnings: Vec<String>,
    /// False when the plan must be discarded.
    pub usable: bool,
}

const PLAN_FIELDS: &[&str] = &[
    "proposition",
    "must_have_terms",
    "must_not_have_terms",
    "query_variants_strict",
    "query_variants_broad",
    "case_anchors",
];

const PROPOSITION_FIELDS: &[&str] = &[
    "actors",
    "proceeding",
    "legal_hooks",
    "outcome_required",
    "outcome_negative",
    "jurisdiction_hint",
    "hook_groups",
    "relations",
    "outcome_constraint",
    "interaction_required",
];

/// Extracts the JSON object from a completion: the whole text when it is
/// plain JSON, otherwise the substring between the first `{` and the last
/// `}`.
pub fn extract_json(text: &str) -> Option<&str> {
    let trimmed = text.trim();
    if trimmed.starts_with('{') && trimmed.ends_with('}') {
        return Some(trimmed);
    }
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

fn prune_unknown(object: &mut serde_json::Map<String, Value>, allowed: &[&str], scope: &str, warnings: &mut Vec<String>) {
    let unknown: Vec<String> = object
        .keys()
        .filter(|key| !allowed.contains(&key.as_str()))
        .cloned()
        .collect();
    for key in unknown {
        object.remove(&key);
        warnings.push(format!("unknown field `{scope}{key}` dropped"));
    }
}

/// Parses and validates a raw completion against the plan whitelist.
///
/// `sparse_intent` relaxes the usability rule: a plan with no query
/// variants is still usable when the intent itself carried almost no
/// signal for the model to work with.
pub fn parse_plan(raw: &str, sparse_intent: bool) -> PlanValidation {
    let mut validation = PlanValidation::default();
    let Some(json_str) = extract_json(raw) else {
        validation.warnings.push("no JSON object in completion".to_string());
        return validation;
    };
    let mut value: Value = match serde_json::from_str(json_str) {
        Ok(value) => value,
        Err(error) => {
            validation.warnings.push(format!("completion is not valid JSON: {error}"));
            return validation;
        }
    };
    let Some(object) = value.as_object_mut() else {
        validation.warnings.push("completion JSON is not an object".to_string());
        return validation;
    };

    prune_unknown(object, PLAN_FIELDS, "", &mut validation.warnings);
    if let Some(proposition) = object.get_mut("proposition").and_then(Value::as_object_mut) {
        prune_unknown(
            proposition,
            PROPOSITION_FIELDS,
            "proposition.",
            &mut validation.warnings,
        );
    }

    let plan: ReasonerPlan = match serde_json::from_value(value) {
        Ok(plan) => plan,
        Err(error) => {
            validation.warnings.push(format!("plan shape invalid: {error}"));
            return validation;
        }
    };

    validation.usable = plan.has_variants() || sparse_intent;
    if !validation.usable {
        validation
            .warnings
            .push("plan has no query variants for a non-sparse intent".to_string());
    }
    validation.plan = Some(plan);
    validation
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_plain_json() {
        assert_eq!(extract_json(r#"{"a": 1}"#), Some(r#"{"a": 1}"#));
    }

    #[test]
    fn test_extract_embedded_json() {
        let text = "Here is the plan:\n{\"a\": 1}\nDone.";
        assert_eq!(extract_json(text), Some("{\"a\": 1}"));
    }

    #[test]
    fn test_extract_none() {
        assert_eq!(extract_json("no json here"), None);
    }

    #[test]
    fn test_unknown_fields_warned_and_dropped() {
        let raw = r#"{"query_variants_strict": ["a b c"], "confidence": 0.9,
                      "proposition": {"actors": ["state"], "vibe": "x"}}"#;
        let validation = parse_plan(raw, false);
        assert!(validation.usable);
        assert!(validation
            .warnings
            .iter()
            .any(|w| w.contains("`confidence`")));
        assert!(validation
            .warnings
            .iter()
            .any(|w| w.contains("`proposition.vibe`")));
        let plan = validation.plan.unwrap();
        assert_eq!(plan.query_variants_strict, vec!["a b c".to_string()]);
    }

    #[test]
    fn test_empty_variants_unusable_on_rich_intent() {
        let validation = parse_plan(r#"{"case_anchors": ["X v Y"]}"#, false);
        assert!(!validation.usable);
        assert!(validation.plan.is_some());
    }

    #[test]
    fn test_empty_variants_usable_on_sparse_intent() {
        let validation = parse_plan(r#"{"case_anchors": ["X v Y"]}"#, true);
        assert!(validation.usable);
    }

    #[test]
    fn test_garbage_is_unusable() {
        let validation = parse_plan("complete nonsense", false);
        assert!(!validation.usable);
        assert!(validation.plan.is_none());
    }
}
