use serde::Serialize;

use crate::error::WalkError;
use crate::models::{CrowdLevel, IntentWeights, RouteSummary};
use crate::state::SelectionUpdate;

/// Cafe count that maps to a full cafe term.
pub const CAFE_REFERENCE_COUNT: f64 = 10.0;
/// Distance at which the distance term reaches zero.
pub const DISTANCE_REFERENCE_KM: f64 = 5.0;

#[derive(Debug, Clone, Serialize)]
pub struct ScoredRoute {
    pub score: f64,
    pub route: RouteSummary,
}

pub fn crowd_factor(level: &CrowdLevel) -> f64 {
    match level {
        CrowdLevel::Low => 1.0,
        CrowdLevel::Medium => 0.5,
        CrowdLevel::High => 0.0,
        CrowdLevel::Unrecognized(_) => 0.5,
    }
}

/// Terms are unclamped: more than ten cafes scores above 1.0 and
/// routes longer than five kilometers go negative on distance.
pub fn score_route(weights: &IntentWeights, route: &RouteSummary) -> f64 {
    weights.cafes_weight * (route.cafe_count as f64 / CAFE_REFERENCE_COUNT)
        + weights.crowd_weight * crowd_factor(&route.crowd_level)
        + weights.distance_weight * (1.0 - route.distance_km / DISTANCE_REFERENCE_KM)
}

/// Descending by score. The sort is stable, so equal scores keep provider order.
pub fn rank_routes(weights: &IntentWeights, routes: &[RouteSummary]) -> Vec<ScoredRoute> {
    let mut scored = routes
        .iter()
        .map(|route| ScoredRoute {
            score: score_route(weights, route),
            route: route.clone(),
        })
        .collect::<Vec<_>>();

    scored.sort_by(|a, b| b.score.total_cmp(&a.score));
    scored
}

pub fn select_route(
    weights: &IntentWeights,
    routes: &[RouteSummary],
) -> Result<SelectionUpdate, WalkError> {
    let mut ranked = rank_routes(weights, routes).into_iter();
    let best = ranked.next().ok_or(WalkError::NoRoutesAvailable)?;

    Ok(SelectionUpdate {
        chosen_route_id: best.route.route_id,
        chosen_route: best.route,
        rejected_routes: ranked.map(|scored| scored.route).collect(),
    })
}
