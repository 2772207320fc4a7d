//! Prompt construction for the reasoner passes.

use crate::orchestrator::ReasonerPass;
use precedent_core::{IntentProfile, ReasonerPlan};

/// Strict-JSON system prompt; the schema is enumerated so permissive
/// parsing has something concrete to validate against.
pub const SYSTEM_PROMPT: &str = r#"You analyse Indian legal fact scenarios for case-law retrieval.
Respond with a single JSON object and nothing else. Schema:
{
  "proposition": {
    "actors": [string], "proceeding": [string], "legal_hooks": [string],
    "outcome_required": [string], "outcome_negative": [string],
    "jurisdiction_hint": "SC"|"HC"|"ANY",
    "hook_groups": [{"group_id": string, "terms": [string], "min_match": int, "required": bool}],
    "relations": [{"type": "requires"|"applies_to"|"interacts_with"|"excluded_by",
                   "left_group_id": string, "right_group_id": string, "required": bool}],
    "outcome_constraint": {"polarity": string, "modality": string,
                           "terms": [string], "contradiction_terms": [string]},
    "interaction_required": bool
  },
  "must_have_terms": [string], "must_not_have_terms": [string],
  "query_variants_strict": [string], "query_variants_broad": [string],
  "case_anchors": [string]
}
Rules: terms must be short lowercase phrases that could appear in a judgment.
Strict variants must combine actor, proceeding, statutory hook and outcome.
Never invent statutes that the scenario does not mention."#;

fn join_section(label: &str, items: &[String]) -> String {
    if items.is_empty() {
        String::new()
    } else {
        format!("{label}: {}\n", items.join("; "))
    }
}

/// Builds the user prompt for a pass.
pub fn user_prompt(
    pass: ReasonerPass,
    profile: &IntentProfile,
    base_plan: Option<&ReasonerPlan>,
    snippets: &[String],
) -> String {
    let mut prompt = String::new();
    prompt.push_str("Scenario: ");
    prompt.push_str(&profile.cleaned_query);
    prompt.push('\n');
    prompt.push_str(&join_section("Domains", &profile.domains));
    prompt.push_str(&join_section("Issues", &profile.issues));
    prompt.push_str(&join_section("Statutes", &profile.statutes));
    prompt.push_str(&join_section("Procedures", &profile.procedures));
    prompt.push_str(&join_section("Actors", &profile.actors));

    if pass == ReasonerPass::Pass2 {
        if let Some(base) = base_plan {
            prompt.push_str("\nPrior plan to refine:\n");
            prompt.push_str(&serde_json::to_string(base).unwrap_or_default());
            prompt.push('\n');
        }
        if !snippets.is_empty() {
            prompt.push_str("\nRetrieved snippets (use them to sharpen terms and variants):\n");
            for (index, snippet) in snippets.iter().take(10).enumerate() {
                prompt.push_str(&format!("{}. {}\n", index + 1, snippet));
            }
        }
        prompt.push_str("\nRefine the plan. Keep grounded hooks, fix wrong ones, improve variants.");
    } else {
        prompt.push_str("\nBuild the retrieval plan for this scenario.");
    }
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use precedent_core::profile_query;

    #[test]
    fn test_pass1_prompt_carries_context() {
        let profile = profile_query("fir quashed under section 482 crpc as civil in nature");
        let prompt = user_prompt(ReasonerPass::Pass1, &profile, None, &[]);
        assert!(prompt.contains("Scenario:"));
        assert!(prompt.contains("Statutes: crpc"));
        assert!(prompt.contains("Build the retrieval plan"));
    }

    #[test]
    fn test_pass2_prompt_limits_snippets() {
        let profile = profile_query("fir quashed under section 482 crpc as civil in nature");
        let base = ReasonerPlan::default();
        let snippets: Vec<String> = (0..14).map(|i| format!("snippet {i}")).collect();
        let prompt = user_prompt(ReasonerPass::Pass2, &profile, Some(&base), &snippets);
        assert!(prompt.contains("snippet 9"));
        assert!(!prompt.contains("snippet 10"));
    }
}
