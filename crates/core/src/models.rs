use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::WalkError;

/// Allowed drift of the three intent weights away from a sum of 1.0.
pub const WEIGHT_SUM_TOLERANCE: f64 = 0.01;

const MAX_LOCATION_LEN: usize = 300;
const MAX_QUERY_LEN: usize = 1_000;
const MAX_ENRICHMENT_QUERIES: usize = 5;
const MAX_ENRICHMENT_QUERY_LEN: usize = 40;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CrowdLevel {
    Low,
    Medium,
    High,
    Unrecognized(String),
}

impl CrowdLevel {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "low" => Self::Low,
            "medium" => Self::Medium,
            "high" => Self::High,
            _ => Self::Unrecognized(value.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Unrecognized(raw) => raw.as_str(),
        }
    }
}

impl From<String> for CrowdLevel {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<CrowdLevel> for String {
    fn from(value: CrowdLevel) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for CrowdLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fixed-shape description of one walking alternative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteSummary {
    pub route_id: u32,
    pub name: String,
    pub distance_km: f64,
    pub crowd_level: CrowdLevel,
    pub cafe_count: u32,
    /// 0.0 to 1.0. Not part of the score.
    pub safety_score: f64,
}

/// Importance vector over cafe density, crowd avoidance and distance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IntentWeights {
    pub cafes_weight: f64,
    pub crowd_weight: f64,
    pub distance_weight: f64,
}

impl IntentWeights {
    pub fn new(cafes_weight: f64, crowd_weight: f64, distance_weight: f64) -> Result<Self, WalkError> {
        let weights = Self {
            cafes_weight,
            crowd_weight,
            distance_weight,
        };
        weights.validate()?;
        Ok(weights)
    }

    pub fn sum(&self) -> f64 {
        self.cafes_weight + self.crowd_weight + self.distance_weight
    }

    pub fn validate(&self) -> Result<(), WalkError> {
        for (key, value) in [
            ("cafes_weight", self.cafes_weight),
            ("crowd_weight", self.crowd_weight),
            ("distance_weight", self.distance_weight),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(WalkError::IntentParse(format!(
                    "{key} must be a non-negative number, got {value}"
                )));
            }
        }

        // Slack for binary rounding, so 0.33 * 3 still lands inside the band.
        let sum = self.sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE + 1e-9 {
            return Err(WalkError::IntentParse(format!(
                "weights must sum to 1.0 (within {WEIGHT_SUM_TOLERANCE}), got {sum:.6}"
            )));
        }

        Ok(())
    }

    /// Permissive lookup: absent keys contribute zero and nothing is validated.
    /// Accepts both `cafes` and `cafes_weight` style keys.
    pub fn from_lookup(values: &HashMap<String, f64>) -> Self {
        let get = |short: &str| {
            values
                .get(short)
                .or_else(|| values.get(&format!("{short}_weight")))
                .copied()
                .unwrap_or(0.0)
        };

        Self {
            cafes_weight: get("cafes"),
            crowd_weight: get("crowd"),
            distance_weight: get("distance"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

/// A place returned by a nearby search around one route waypoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceHit {
    pub place_id: String,
    pub user_ratings_total: u32,
}

/// Places found along a single route, across every enrichment query.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RouteEnrichment {
    pub places: Vec<PlaceHit>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteRequest {
    pub origin: String,
    pub destination: String,
    pub user_query: String,
    #[serde(default = "default_enrichment_queries")]
    pub enrichment_queries: Vec<String>,
    #[serde(default)]
    pub goal: Option<String>,
}

impl RouteRequest {
    pub fn validate(&self) -> Result<(), WalkError> {
        require_text("origin", &self.origin, MAX_LOCATION_LEN)?;
        require_text("destination", &self.destination, MAX_LOCATION_LEN)?;
        require_text("user_query", &self.user_query, MAX_QUERY_LEN)?;

        if self.enrichment_queries.len() > MAX_ENRICHMENT_QUERIES {
            return Err(WalkError::InvalidRequest(format!(
                "at most {MAX_ENRICHMENT_QUERIES} enrichment_queries are allowed"
            )));
        }
        for query in &self.enrichment_queries {
            require_text("enrichment_queries[]", query, MAX_ENRICHMENT_QUERY_LEN)?;
        }

        Ok(())
    }
}

pub fn default_enrichment_queries() -> Vec<String> {
    vec!["cafe".to_string()]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteResponse {
    pub route_id: u32,
    pub summary: String,
    pub explanation: String,
    /// Raw provider route, passed through for map rendering.
    pub route_data: Value,
}

fn require_text(field: &str, value: &str, max_len: usize) -> Result<(), WalkError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(WalkError::InvalidRequest(format!("{field} must not be blank")));
    }
    if trimmed.chars().count() > max_len {
        return Err(WalkError::InvalidRequest(format!(
            "{field} exceeds {max_len} characters"
        )));
    }
    Ok(())
}
