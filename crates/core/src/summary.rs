use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value;

use crate::error::WalkError;
use crate::models::{CrowdLevel, LatLng, RouteEnrichment, RouteSummary};

/// Upper bound on waypoints queried for nearby places per route.
pub const MAX_WAYPOINTS: usize = 5;
/// Place ratings per kilometer below which a route counts as quiet.
pub const LOW_CROWD_RATINGS_PER_KM: f64 = 400.0;
/// Place ratings per kilometer below which a route counts as moderately busy.
pub const MEDIUM_CROWD_RATINGS_PER_KM: f64 = 1_500.0;

const SAFETY_PENALTY_PER_WARNING: f64 = 0.1;

#[derive(Debug, Deserialize)]
struct RawRoute {
    #[serde(default)]
    summary: String,
    legs: Vec<RawLeg>,
    #[serde(default)]
    warnings: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawLeg {
    distance: RawDistance,
    start_location: LatLng,
    #[serde(default)]
    steps: Vec<RawStep>,
}

#[derive(Debug, Deserialize)]
struct RawDistance {
    value: f64,
}

#[derive(Debug, Deserialize)]
struct RawStep {
    end_location: LatLng,
}

/// Points along the route, evenly thinned to at most [`MAX_WAYPOINTS`].
pub fn route_waypoints(route_index: usize, raw: &Value) -> Result<Vec<LatLng>, WalkError> {
    let route = parse_route(route_index, raw)?;

    let mut points = Vec::new();
    if let Some(first) = route.legs.first() {
        points.push(first.start_location);
    }
    points.extend(
        route
            .legs
            .iter()
            .flat_map(|leg| leg.steps.iter().map(|step| step.end_location)),
    );

    Ok(thin_evenly(points, MAX_WAYPOINTS))
}

pub fn summarize_route(
    route_index: usize,
    raw: &Value,
    enrichment: &RouteEnrichment,
) -> Result<RouteSummary, WalkError> {
    let route = parse_route(route_index, raw)?;
    let route_id = u32::try_from(route_index).map_err(|_| WalkError::MalformedRoute {
        route_index,
        reason: "route index out of range".to_string(),
    })?;

    let meters = route.legs.iter().map(|leg| leg.distance.value).sum::<f64>();
    if !meters.is_finite() || meters < 0.0 {
        return Err(WalkError::MalformedRoute {
            route_index,
            reason: format!("invalid leg distance total {meters}"),
        });
    }
    let distance_km = meters / 1000.0;

    // Same place found from several waypoints or queries counts once.
    let mut distinct = HashMap::new();
    for place in &enrichment.places {
        distinct
            .entry(place.place_id.as_str())
            .or_insert(place.user_ratings_total);
    }
    let ratings_total = distinct.values().map(|v| u64::from(*v)).sum::<u64>();

    let name = route.summary.trim();
    let name = if name.is_empty() {
        format!("Route {}", route_index + 1)
    } else {
        name.to_string()
    };

    Ok(RouteSummary {
        route_id,
        name,
        distance_km,
        crowd_level: crowd_level_for(ratings_total, distance_km),
        cafe_count: distinct.len() as u32,
        safety_score: (1.0 - SAFETY_PENALTY_PER_WARNING * route.warnings.len() as f64)
            .clamp(0.0, 1.0),
    })
}

pub fn crowd_level_for(ratings_total: u64, distance_km: f64) -> CrowdLevel {
    let density = if distance_km > 0.0 {
        ratings_total as f64 / distance_km
    } else {
        ratings_total as f64
    };

    if density < LOW_CROWD_RATINGS_PER_KM {
        CrowdLevel::Low
    } else if density < MEDIUM_CROWD_RATINGS_PER_KM {
        CrowdLevel::Medium
    } else {
        CrowdLevel::High
    }
}

fn parse_route(route_index: usize, raw: &Value) -> Result<RawRoute, WalkError> {
    RawRoute::deserialize(raw).map_err(|err| WalkError::MalformedRoute {
        route_index,
        reason: err.to_string(),
    })
}

fn thin_evenly(points: Vec<LatLng>, max: usize) -> Vec<LatLng> {
    if points.len() <= max || max < 2 {
        return points.into_iter().take(max).collect();
    }

    let last = points.len() - 1;
    (0..max)
        .map(|i| points[i * last / (max - 1)])
        .collect()
}
