use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::body::{to_bytes, Body};
use axum::extract::ConnectInfo;
use axum::http::{Request, StatusCode};
use axum::Router;
use loopwalk_agents::WalkAgent;
use loopwalk_api::{build_router, ApiState, IpRateLimiter};
use loopwalk_core::{LatLng, PlaceHit};
use loopwalk_observability::AppMetrics;
use loopwalk_providers::{MapsProvider, TextGenerator};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tower::ServiceExt;

const WEIGHTS: &str = r#"{"cafes_weight": 0.4, "crowd_weight": 0.5, "distance_weight": 0.1}"#;

struct StubMaps {
    routes: Result<Vec<Value>, String>,
}

impl MapsProvider for StubMaps {
    async fn walking_routes(&self, _origin: &str, _destination: &str) -> Result<Vec<Value>> {
        self.routes.clone().map_err(|message| anyhow::anyhow!(message))
    }

    async fn nearby_places(&self, location: LatLng, _keyword: &str) -> Result<Vec<PlaceHit>> {
        // Waypoints north of 41.5 sit on the quiet, cafe-lined route.
        let hits = if location.lat > 41.5 {
            vec![
                PlaceHit { place_id: "north-1".into(), user_ratings_total: 40 },
                PlaceHit { place_id: "north-2".into(), user_ratings_total: 25 },
            ]
        } else {
            vec![PlaceHit { place_id: "south-1".into(), user_ratings_total: 9_000 }]
        };
        Ok(hits)
    }
}

struct StubGenerator {
    replies: Mutex<VecDeque<String>>,
}

impl StubGenerator {
    fn new(replies: &[&str]) -> Self {
        Self {
            replies: Mutex::new(replies.iter().map(|reply| reply.to_string()).collect()),
        }
    }
}

impl TextGenerator for StubGenerator {
    async fn generate(&self, _prompt: &str) -> Result<String> {
        self.replies
            .lock()
            .pop_front()
            .ok_or_else(|| anyhow::anyhow!("no reply left"))
    }
}

fn directions_route(summary: &str, meters: f64, lat: f64) -> Value {
    json!({
        "summary": summary,
        "warnings": [],
        "legs": [{
            "distance": { "text": "", "value": meters },
            "start_location": { "lat": lat, "lng": -87.62 },
            "steps": []
        }]
    })
}

fn app_with(maps: StubMaps, generator: StubGenerator, rate_limit_max: usize) -> Router {
    let metrics = AppMetrics::shared();
    build_router(ApiState {
        agent: Arc::new(WalkAgent::new(
            Arc::new(maps),
            Arc::new(generator),
            metrics.clone(),
        )),
        metrics,
        limiter: IpRateLimiter::new(Duration::from_secs(60), rate_limit_max),
        trust_forwarded_for: false,
    })
}

fn two_routes() -> StubMaps {
    StubMaps {
        routes: Ok(vec![
            directions_route("State St", 1_200.0, 41.0),
            directions_route("Lakefront Trail", 2_400.0, 42.0),
        ]),
    }
}

fn route_request(query: &str) -> Request<Body> {
    route_request_from("192.0.2.10:40000", query)
}

fn route_request_from(peer: &str, query: &str) -> Request<Body> {
    let peer: SocketAddr = peer.parse().unwrap();
    let mut request = Request::builder()
        .method("POST")
        .uri("/route")
        .header("content-type", "application/json")
        .body(Body::from(
            json!({
                "origin": "Navy Pier, Chicago",
                "destination": "Museum Campus, Chicago",
                "user_query": query
            })
            .to_string(),
        ))
        .unwrap();
    request.extensions_mut().insert(ConnectInfo(peer));
    request
}

async fn body_json(response: axum::response::Response) -> Value {
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn health_reports_metrics() {
    let app = app_with(two_routes(), StubGenerator::new(&[]), 30);

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get("x-request-id").is_some());
    let parsed = body_json(response).await;
    assert_eq!(parsed["status"], "ok");
    assert_eq!(parsed["metrics"]["requests_total"], 0);
}

#[tokio::test]
async fn route_returns_chosen_route_and_explanation() {
    let app = app_with(
        two_routes(),
        StubGenerator::new(&[WEIGHTS, "The lakefront is quieter and has two cafes."]),
        30,
    );

    let response = app
        .oneshot(route_request("a calm walk with coffee"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let parsed = body_json(response).await;
    assert_eq!(parsed["route_id"], 1);
    assert_eq!(parsed["summary"], "Lakefront Trail");
    assert_eq!(
        parsed["explanation"],
        "The lakefront is quieter and has two cafes."
    );
    assert_eq!(parsed["route_data"]["summary"], "Lakefront Trail");
    assert_eq!(parsed["route_data"]["legs"][0]["distance"]["value"], 2_400.0);
}

#[tokio::test]
async fn provider_failure_maps_to_bad_gateway() {
    let maps = StubMaps {
        routes: Err("Directions API error: REQUEST_DENIED".to_string()),
    };
    let app = app_with(maps, StubGenerator::new(&[]), 30);

    let response = app.oneshot(route_request("anything")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

    let parsed = body_json(response).await;
    assert_eq!(parsed["error"], "route_provider_failed");
    assert!(parsed["message"].as_str().unwrap().contains("REQUEST_DENIED"));
}

#[tokio::test]
async fn unparseable_intent_is_reported() {
    let app = app_with(
        two_routes(),
        StubGenerator::new(&["I think cafes matter most", "unused"]),
        30,
    );

    let response = app.oneshot(route_request("cafes please")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(body_json(response).await["error"], "intent_parse_failed");
}

#[tokio::test]
async fn blank_origin_is_a_bad_request() {
    let app = app_with(two_routes(), StubGenerator::new(&[]), 30);

    let request = Request::builder()
        .method("POST")
        .uri("/route")
        .header("content-type", "application/json")
        .body(Body::from(
            json!({
                "origin": "  ",
                "destination": "Museum Campus, Chicago",
                "user_query": "quick"
            })
            .to_string(),
        ))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "invalid_request");
}

#[tokio::test]
async fn empty_route_list_is_not_found() {
    let maps = StubMaps { routes: Ok(Vec::new()) };
    let app = app_with(maps, StubGenerator::new(&[]), 30);

    let response = app.oneshot(route_request("calm")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["error"], "no_routes_available");
}

#[tokio::test]
async fn rate_limit_applies_per_client() {
    let app = app_with(
        StubMaps { routes: Ok(Vec::new()) },
        StubGenerator::new(&[]),
        1,
    );

    let first = app.clone().oneshot(route_request("calm")).await.unwrap();
    assert_eq!(first.status(), StatusCode::NOT_FOUND);

    let second = app.clone().oneshot(route_request("calm")).await.unwrap();
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(second.headers().get("x-request-id").is_some());
    assert_eq!(body_json(second).await["error"], "rate_limited");

    let health = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(health.status(), StatusCode::OK);
}

#[tokio::test]
async fn peers_have_separate_buckets_and_cannot_spoof_forwarded_for() {
    let app = app_with(
        StubMaps { routes: Ok(Vec::new()) },
        StubGenerator::new(&[]),
        1,
    );

    let alice = app
        .clone()
        .oneshot(route_request_from("198.51.100.1:50001", "calm"))
        .await
        .unwrap();
    assert_eq!(alice.status(), StatusCode::NOT_FOUND);

    let bob = app
        .clone()
        .oneshot(route_request_from("198.51.100.2:50002", "calm"))
        .await
        .unwrap();
    assert_eq!(bob.status(), StatusCode::NOT_FOUND);

    // Same peer with a fresh forwarded-for value still hits its own bucket.
    let mut spoofed = route_request_from("198.51.100.1:50003", "calm");
    spoofed
        .headers_mut()
        .insert("x-forwarded-for", "203.0.113.77".parse().unwrap());
    let spoofed = app.oneshot(spoofed).await.unwrap();
    assert_eq!(spoofed.status(), StatusCode::TOO_MANY_REQUESTS);
}
