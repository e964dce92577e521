use anyhow::{Context, Result};
use loopwalk_core::{LatLng, PlaceHit};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::MapsProvider;

pub const DIRECTIONS_URL: &str = "https://maps.googleapis.com/maps/api/directions/json";
pub const PLACES_NEARBY_URL: &str =
    "https://maps.googleapis.com/maps/api/place/nearbysearch/json";
pub const DEFAULT_PLACES_RADIUS_METERS: u32 = 150;

/// Non-success `status` field in an otherwise well-formed Google response.
#[derive(Debug, Error)]
pub enum ProviderStatusError {
    #[error("Directions API error: {0}")]
    Directions(String),

    #[error("Places API error: {0}")]
    Places(String),
}

#[derive(Debug, Clone)]
pub struct GoogleMapsConfig {
    pub api_key: String,
    pub directions_url: String,
    pub places_url: String,
    pub places_radius_meters: u32,
}

impl GoogleMapsConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            directions_url: DIRECTIONS_URL.to_string(),
            places_url: PLACES_NEARBY_URL.to_string(),
            places_radius_meters: DEFAULT_PLACES_RADIUS_METERS,
        }
    }
}

#[derive(Debug, Deserialize)]
struct DirectionsResponse {
    status: String,
    #[serde(default)]
    routes: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct PlacesResponse {
    status: String,
    #[serde(default)]
    results: Vec<PlaceResult>,
}

#[derive(Debug, Deserialize)]
struct PlaceResult {
    place_id: String,
    #[serde(default)]
    user_ratings_total: u32,
}

#[derive(Clone)]
pub struct GoogleMapsClient {
    http: Client,
    config: GoogleMapsConfig,
}

impl GoogleMapsClient {
    pub fn new(http: Client, config: GoogleMapsConfig) -> Self {
        Self { http, config }
    }
}

impl MapsProvider for GoogleMapsClient {
    async fn walking_routes(&self, origin: &str, destination: &str) -> Result<Vec<Value>> {
        let response = self
            .http
            .get(self.config.directions_url.as_str())
            .query(&[
                ("origin", origin),
                ("destination", destination),
                ("mode", "walking"),
                ("alternatives", "true"),
                ("key", self.config.api_key.as_str()),
            ])
            .send()
            .await
            .context("Directions request failed")?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("Directions non-success status {}", status.as_u16());
        }

        let body: DirectionsResponse = response
            .json()
            .await
            .context("Directions parse failed")?;
        if body.status != "OK" {
            return Err(ProviderStatusError::Directions(body.status).into());
        }

        debug!(routes = body.routes.len(), "directions fetched");
        Ok(body.routes)
    }

    async fn nearby_places(&self, location: LatLng, keyword: &str) -> Result<Vec<PlaceHit>> {
        let location_param = format!("{},{}", location.lat, location.lng);
        let radius = self.config.places_radius_meters.to_string();

        let response = self
            .http
            .get(self.config.places_url.as_str())
            .query(&[
                ("location", location_param.as_str()),
                ("radius", radius.as_str()),
                ("keyword", keyword),
                ("key", self.config.api_key.as_str()),
            ])
            .send()
            .await
            .context("Places request failed")?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("Places non-success status {}", status.as_u16());
        }

        let body: PlacesResponse = response.json().await.context("Places parse failed")?;
        match body.status.as_str() {
            "OK" | "ZERO_RESULTS" => Ok(body
                .results
                .into_iter()
                .map(|place| PlaceHit {
                    place_id: place.place_id,
                    user_ratings_total: place.user_ratings_total,
                })
                .collect()),
            _ => Err(ProviderStatusError::Places(body.status).into()),
        }
    }
}
