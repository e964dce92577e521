use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::WalkError;
use crate::models::IntentWeights;

static CODE_FENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^```[A-Za-z]*\s*(.*?)\s*```$").expect("valid code fence regex")
});

// Whole words only: "chocolate" is not "late", "shortbread" is not "short".
static CALM_WORDS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(calm\w*|quiet\w*|peaceful|relax\w*|serene|crowd\w*|busy)\b")
        .expect("valid calm keyword regex")
});

static CAFE_WORDS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(caf[eé]s?|coffees?|espressos?|lattes?|bakery|bakeries)\b")
        .expect("valid cafe keyword regex")
});

static QUICK_WORDS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(quick\w*|fast\w*|short|shorter|shortest|hurry|hurried|late|direct\w*)\b")
        .expect("valid quick keyword regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WalkGoal {
    CalmWalk,
    CafeHopping,
    QuickWalk,
    Balanced,
}

impl WalkGoal {
    pub fn label(self) -> &'static str {
        match self {
            Self::CalmWalk => "calm walk",
            Self::CafeHopping => "cafe hopping",
            Self::QuickWalk => "quick walk",
            Self::Balanced => "balanced walk",
        }
    }
}

pub fn normalize_text(input: &str) -> String {
    input
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_string()
}

pub fn classify_goal(text: &str) -> WalkGoal {
    let lower = text.to_lowercase();

    if CALM_WORDS.is_match(&lower) {
        WalkGoal::CalmWalk
    } else if CAFE_WORDS.is_match(&lower) {
        WalkGoal::CafeHopping
    } else if QUICK_WORDS.is_match(&lower) {
        WalkGoal::QuickWalk
    } else {
        WalkGoal::Balanced
    }
}

/// An explicit, non-blank goal wins over the keyword rules.
pub fn resolve_goal(explicit: Option<&str>, user_text: &str) -> String {
    match explicit.map(normalize_text) {
        Some(goal) if !goal.is_empty() => goal,
        _ => classify_goal(user_text).label().to_string(),
    }
}

pub fn build_intent_prompt(user_text: &str, selected_goal: &str) -> String {
    format!(
        r#"You are part of a walking-route recommendation system.

The user said: "{user_text}"
Their selected goal is: "{selected_goal}"

Based on this, produce a JSON object with exactly three numeric weights
that sum to 1.0, representing how much the user cares about each factor:

  cafes_weight    - nearby cafes / points of interest
  crowd_weight    - avoiding crowded sidewalks
  distance_weight - shorter walking distance

Return ONLY the JSON object, no extra text.
Example: {{"cafes_weight": 0.4, "crowd_weight": 0.5, "distance_weight": 0.1}}"#
    )
}

/// Parses the generator's reply into validated weights. A single surrounding
/// Markdown code fence is tolerated; nothing else is.
pub fn parse_intent_weights(raw: &str) -> Result<IntentWeights, WalkError> {
    let trimmed = raw.trim();
    let body = CODE_FENCE
        .captures(trimmed)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .unwrap_or(trimmed);

    if body.is_empty() {
        return Err(WalkError::IntentParse("empty response".to_string()));
    }

    let weights: IntentWeights =
        serde_json::from_str(body).map_err(|err| WalkError::IntentParse(err.to_string()))?;
    weights.validate()?;
    Ok(weights)
}
