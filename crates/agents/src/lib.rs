mod pipeline;
#[cfg(test)]
mod testing;

use std::sync::Arc;
use std::time::Instant;

use futures::future::try_join_all;
use loopwalk_core::intent::normalize_text;
use loopwalk_core::{
    resolve_goal, route_waypoints, summarize_route, LatLng, PipelineOutcome, PipelineState,
    RouteEnrichment, RouteRequest, RouteResponse, RouteSummary, WalkError,
};
use loopwalk_observability::AppMetrics;
use loopwalk_providers::{MapsProvider, TextGenerator};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, instrument, warn};

pub use pipeline::{select_stage, ExplanationSynthesizer, IntentInterpreter, RoutePipeline};

/// Response for the caller plus the full pipeline outcome for diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct Recommendation {
    pub response: RouteResponse,
    pub outcome: PipelineOutcome,
}

pub struct WalkAgent<M, G> {
    maps: Arc<M>,
    pipeline: RoutePipeline<G>,
    metrics: Arc<AppMetrics>,
}

impl<M, G> WalkAgent<M, G>
where
    M: MapsProvider,
    G: TextGenerator,
{
    pub fn new(maps: Arc<M>, generator: Arc<G>, metrics: Arc<AppMetrics>) -> Self {
        Self {
            maps,
            pipeline: RoutePipeline::new(generator, metrics.clone()),
            metrics,
        }
    }

    #[instrument(skip_all, fields(origin = %request.origin, destination = %request.destination))]
    pub async fn recommend(&self, request: RouteRequest) -> Result<Recommendation, WalkError> {
        let started = Instant::now();
        self.metrics.inc_request();

        let result = self.recommend_inner(request).await;
        self.metrics.observe_latency(started.elapsed());

        match &result {
            Ok(recommendation) => info!(
                route_id = recommendation.response.route_id,
                goal = %recommendation.outcome.goal,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "route recommended"
            ),
            Err(err) => {
                self.metrics.inc_pipeline_failure();
                warn!(kind = err.kind(), error = %err, "route recommendation failed");
            }
        }

        result
    }

    async fn recommend_inner(&self, request: RouteRequest) -> Result<Recommendation, WalkError> {
        request.validate()?;

        let user_text = normalize_text(&request.user_query);
        let goal = resolve_goal(request.goal.as_deref(), &user_text);

        let raw_routes = self
            .maps
            .walking_routes(request.origin.trim(), request.destination.trim())
            .await
            .map_err(provider_error)?;
        if raw_routes.is_empty() {
            return Err(WalkError::NoRoutesAvailable);
        }

        let summaries = self
            .summarize_routes(&raw_routes, &request.enrichment_queries)
            .await?;
        let outcome = self
            .pipeline
            .run(PipelineState::new(user_text, goal, summaries))
            .await?;

        let route_index = outcome.chosen_route_id as usize;
        let route_data = raw_routes
            .get(route_index)
            .cloned()
            .ok_or_else(|| WalkError::MalformedRoute {
                route_index,
                reason: "chosen route missing from provider response".to_string(),
            })?;

        Ok(Recommendation {
            response: RouteResponse {
                route_id: outcome.chosen_route_id,
                summary: outcome.chosen_route.name.clone(),
                explanation: outcome.explanation.clone(),
                route_data,
            },
            outcome,
        })
    }

    async fn summarize_routes(
        &self,
        raw_routes: &[Value],
        queries: &[String],
    ) -> Result<Vec<RouteSummary>, WalkError> {
        let mut summaries = Vec::with_capacity(raw_routes.len());
        for (index, raw) in raw_routes.iter().enumerate() {
            let waypoints = route_waypoints(index, raw)?;
            let enrichment = self.enrich(&waypoints, queries).await?;
            summaries.push(summarize_route(index, raw, &enrichment)?);
        }
        Ok(summaries)
    }

    async fn enrich(
        &self,
        waypoints: &[LatLng],
        queries: &[String],
    ) -> Result<RouteEnrichment, WalkError> {
        let mut lookups = Vec::with_capacity(queries.len() * waypoints.len());
        for query in queries {
            for point in waypoints {
                lookups.push(self.maps.nearby_places(*point, query.trim()));
            }
        }

        let places = try_join_all(lookups)
            .await
            .map_err(provider_error)?
            .into_iter()
            .flatten()
            .collect();

        Ok(RouteEnrichment { places })
    }
}

fn provider_error(err: anyhow::Error) -> WalkError {
    WalkError::RouteProvider(format!("{err:#}"))
}
