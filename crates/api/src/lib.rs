mod rate_limit;

use std::env;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::extract::{ConnectInfo, Json, State};
use axum::http::{Request, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{body::Body, Router};
use loopwalk_agents::WalkAgent;
use loopwalk_core::{RouteRequest, WalkError};
use loopwalk_observability::{AppMetrics, MetricsSnapshot};
use loopwalk_providers::{
    build_http_client, GoogleMapsClient, GoogleMapsConfig, MapsProvider, OpenAiConfig,
    OpenAiTextGenerator, TextGenerator,
};
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

pub use crate::rate_limit::IpRateLimiter;

const MAX_BODY_BYTES: usize = 32 * 1024;

pub struct ApiState<M, G> {
    pub agent: Arc<WalkAgent<M, G>>,
    pub metrics: Arc<AppMetrics>,
    pub limiter: IpRateLimiter,
    /// Key the limiter on the first `x-forwarded-for` hop instead of the peer
    /// address. Only safe behind a proxy that overwrites the header.
    pub trust_forwarded_for: bool,
}

impl<M, G> Clone for ApiState<M, G> {
    fn clone(&self) -> Self {
        Self {
            agent: self.agent.clone(),
            metrics: self.metrics.clone(),
            limiter: self.limiter.clone(),
            trust_forwarded_for: self.trust_forwarded_for,
        }
    }
}

/// Runtime settings, read once at startup.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub bind: String,
    pub maps: GoogleMapsConfig,
    pub openai: OpenAiConfig,
    pub http_timeout: Duration,
    pub rate_limit_window: Duration,
    pub rate_limit_max: usize,
    pub trust_forwarded_for: bool,
}

impl ApiConfig {
    pub fn from_env() -> Result<Self> {
        let maps_key = first_env(&["LOOPWALK_GOOGLE_MAPS_API_KEY", "GOOGLE_MAPS_API_KEY"])
            .context("LOOPWALK_GOOGLE_MAPS_API_KEY is not set")?;
        let openai_key = first_env(&["LOOPWALK_OPENAI_API_KEY", "OPENAI_API_KEY"])
            .context("LOOPWALK_OPENAI_API_KEY is not set")?;

        let mut maps = GoogleMapsConfig::new(maps_key);
        if let Some(radius) = parsed_env::<u32>("LOOPWALK_PLACES_RADIUS_METERS") {
            maps.places_radius_meters = radius;
        }

        let mut openai = OpenAiConfig::new(openai_key);
        if let Ok(model) = env::var("LOOPWALK_OPENAI_MODEL") {
            openai.model = model;
        }
        if let Ok(base_url) = env::var("LOOPWALK_OPENAI_BASE_URL") {
            openai.base_url = base_url;
        }

        Ok(Self {
            bind: env::var("LOOPWALK_BIND").unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
            maps,
            openai,
            http_timeout: Duration::from_secs(
                parsed_env("LOOPWALK_HTTP_TIMEOUT_SECONDS").unwrap_or(20),
            ),
            rate_limit_window: Duration::from_secs(
                parsed_env("LOOPWALK_RATE_LIMIT_WINDOW_SECONDS").unwrap_or(60),
            ),
            rate_limit_max: parsed_env("LOOPWALK_RATE_LIMIT_MAX").unwrap_or(30),
            trust_forwarded_for: parsed_env("LOOPWALK_TRUST_FORWARDED_FOR").unwrap_or(false),
        })
    }
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp_utc: String,
    metrics: MetricsSnapshot,
}

pub fn build_app(config: &ApiConfig) -> Result<Router> {
    let metrics = AppMetrics::shared();
    let http_client = build_http_client(config.http_timeout)?;

    let maps = Arc::new(GoogleMapsClient::new(http_client.clone(), config.maps.clone()));
    let generator = Arc::new(OpenAiTextGenerator::new(http_client, config.openai.clone()));
    info!(model = %generator.model(), "text generator configured");

    let state = ApiState {
        agent: Arc::new(WalkAgent::new(maps, generator, metrics.clone())),
        metrics,
        limiter: IpRateLimiter::new(config.rate_limit_window, config.rate_limit_max),
        trust_forwarded_for: config.trust_forwarded_for,
    };

    Ok(build_router(state))
}

pub fn build_router<M, G>(state: ApiState<M, G>) -> Router
where
    M: MapsProvider + 'static,
    G: TextGenerator + 'static,
{
    Router::new()
        .route("/health", get(health::<M, G>))
        .route("/route", post(recommend_route::<M, G>))
        // Outermost first: the id exists before tracing, and 429s carry it too.
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(TraceLayer::new_for_http())
                .layer(middleware::from_fn_with_state(
                    state.clone(),
                    rate_limit_middleware::<M, G>,
                ))
                .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES)),
        )
        .with_state(state)
}

async fn health<M, G>(State(state): State<ApiState<M, G>>) -> impl IntoResponse {
    let payload = HealthResponse {
        status: "ok",
        timestamp_utc: chrono::Utc::now().to_rfc3339(),
        metrics: state.metrics.snapshot(),
    };
    (StatusCode::OK, Json(payload))
}

async fn recommend_route<M, G>(
    State(state): State<ApiState<M, G>>,
    Json(input): Json<RouteRequest>,
) -> Response
where
    M: MapsProvider,
    G: TextGenerator,
{
    match state.agent.recommend(input).await {
        Ok(recommendation) => (StatusCode::OK, Json(recommendation.response)).into_response(),
        Err(error) => error_response(&error),
    }
}

fn error_response(error: &WalkError) -> Response {
    let status = match error {
        WalkError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        WalkError::NoRoutesAvailable => StatusCode::NOT_FOUND,
        WalkError::MissingStageOutput { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        WalkError::IntentParse(_)
        | WalkError::IntentGeneration(_)
        | WalkError::ExplanationGeneration(_)
        | WalkError::RouteProvider(_)
        | WalkError::MalformedRoute { .. } => StatusCode::BAD_GATEWAY,
    };

    (
        status,
        Json(serde_json::json!({
            "error": error.kind(),
            "message": error.to_string()
        })),
    )
        .into_response()
}

async fn rate_limit_middleware<M, G>(
    State(state): State<ApiState<M, G>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if request.uri().path() == "/health" {
        return next.run(request).await;
    }

    let ip = request_ip(&request, state.trust_forwarded_for);
    if !state.limiter.allow(&ip) {
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(serde_json::json!({
                "error": "rate_limited",
                "message": "rate limit exceeded for this IP"
            })),
        )
            .into_response();
    }

    next.run(request).await
}

fn request_ip(request: &Request<Body>, trust_forwarded_for: bool) -> String {
    let forwarded = trust_forwarded_for
        .then(|| request.headers().get("x-forwarded-for"))
        .flatten()
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|hop| !hop.is_empty());
    if let Some(hop) = forwarded {
        return hop.to_string();
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(peer)| peer.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn first_env(keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| env::var(key).ok())
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
}

fn parsed_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|value| value.trim().parse::<T>().ok())
}
