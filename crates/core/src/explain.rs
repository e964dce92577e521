use crate::error::WalkError;
use crate::models::RouteSummary;

pub fn build_explanation_prompt(
    chosen: &RouteSummary,
    rejected: &[RouteSummary],
    selected_goal: &str,
) -> Result<String, WalkError> {
    let chosen = dump(chosen)?;
    let rejected = dump(&rejected)?;

    Ok(format!(
        r#"You are a friendly walking-route assistant.

The user's goal: "{selected_goal}"

You chose this route:
{chosen}

Other routes considered but not chosen:
{rejected}

Write a short, conversational explanation (2-3 sentences) of why you picked
this route over the others, referring to the user's goal. Do not mention
numeric scores or weights."#
    ))
}

/// Generated prose is untrusted; only emptiness is rejected.
pub fn clean_explanation(raw: &str) -> Result<String, WalkError> {
    let text = raw.trim();
    if text.is_empty() {
        return Err(WalkError::ExplanationGeneration(
            "generator returned an empty explanation".to_string(),
        ));
    }
    Ok(text.to_string())
}

fn dump<T: serde::Serialize + ?Sized>(value: &T) -> Result<String, WalkError> {
    serde_json::to_string_pretty(value)
        .map_err(|err| WalkError::ExplanationGeneration(format!("route dump failed: {err}")))
}
