use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::Result;
use loopwalk_core::{CrowdLevel, LatLng, PlaceHit, RouteSummary};
use loopwalk_providers::{MapsProvider, TextGenerator};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

/// Replays canned replies in order and records every prompt it was given.
pub struct ScriptedGenerator {
    replies: Mutex<VecDeque<Result<String, String>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    pub fn new(replies: impl IntoIterator<Item = Result<String, String>>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }
}

impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().push(prompt.to_string());
        match self.replies.lock().pop_front() {
            Some(Ok(text)) => Ok(text),
            Some(Err(message)) => Err(anyhow::anyhow!(message)),
            None => Err(anyhow::anyhow!("no scripted reply left")),
        }
    }
}

pub struct FakeMaps {
    routes: Result<Vec<Value>, String>,
    places: Vec<(f64, Vec<PlaceHit>)>,
    keywords: Mutex<Vec<String>>,
    route_calls: Mutex<usize>,
}

impl FakeMaps {
    pub fn with_routes(routes: Vec<Value>) -> Self {
        Self {
            routes: Ok(routes),
            places: Vec::new(),
            keywords: Mutex::new(Vec::new()),
            route_calls: Mutex::new(0),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            routes: Err(message.to_string()),
            ..Self::with_routes(Vec::new())
        }
    }

    /// Places returned for any waypoint at `lat`.
    pub fn with_places(mut self, lat: f64, places: &[(&str, u32)]) -> Self {
        let hits = places
            .iter()
            .map(|(id, ratings)| PlaceHit {
                place_id: id.to_string(),
                user_ratings_total: *ratings,
            })
            .collect();
        self.places.push((lat, hits));
        self
    }

    pub fn requested_keywords(&self) -> Vec<String> {
        self.keywords.lock().clone()
    }

    pub fn route_calls(&self) -> usize {
        *self.route_calls.lock()
    }
}

impl MapsProvider for FakeMaps {
    async fn walking_routes(&self, _origin: &str, _destination: &str) -> Result<Vec<Value>> {
        *self.route_calls.lock() += 1;
        self.routes.clone().map_err(|message| anyhow::anyhow!(message))
    }

    async fn nearby_places(&self, location: LatLng, keyword: &str) -> Result<Vec<PlaceHit>> {
        self.keywords.lock().push(keyword.to_string());
        Ok(self
            .places
            .iter()
            .find(|(lat, _)| *lat == location.lat)
            .map(|(_, hits)| hits.clone())
            .unwrap_or_default())
    }
}

/// Single-leg Directions route with no steps, starting at (`lat`, -87.63).
pub fn raw_route(summary: &str, meters: f64, lat: f64) -> Value {
    json!({
        "summary": summary,
        "warnings": [],
        "legs": [{
            "distance": { "text": "", "value": meters },
            "start_location": { "lat": lat, "lng": -87.63 },
            "steps": []
        }]
    })
}

pub fn route(route_id: u32, cafe_count: u32, crowd: &str, distance_km: f64) -> RouteSummary {
    RouteSummary {
        route_id,
        name: format!("Route {}", route_id + 1),
        distance_km,
        crowd_level: CrowdLevel::parse(crowd),
        cafe_count,
        safety_score: 1.0,
    }
}

/// Counts `WARN` events seen by the subscriber it is layered onto.
#[derive(Clone, Default)]
pub struct WarnCounter(Arc<AtomicUsize>);

impl WarnCounter {
    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

impl<S: Subscriber> Layer<S> for WarnCounter {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if *event.metadata().level() == Level::WARN {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }
}
