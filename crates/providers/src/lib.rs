mod google;
mod openai;

use std::future::Future;
use std::time::Duration;

use anyhow::{Context, Result};
use loopwalk_core::{LatLng, PlaceHit};
use reqwest::Client;
use serde_json::Value;

pub use google::{GoogleMapsClient, GoogleMapsConfig, ProviderStatusError};
pub use openai::{extract_openai_output_text, OpenAiConfig, OpenAiTextGenerator};

/// Executes one prompt and returns the generated text.
pub trait TextGenerator: Send + Sync {
    fn generate(&self, prompt: &str) -> impl Future<Output = Result<String>> + Send;
}

pub trait MapsProvider: Send + Sync {
    /// Walking alternatives between two free-form locations, in provider order.
    fn walking_routes(
        &self,
        origin: &str,
        destination: &str,
    ) -> impl Future<Output = Result<Vec<Value>>> + Send;

    fn nearby_places(
        &self,
        location: LatLng,
        keyword: &str,
    ) -> impl Future<Output = Result<Vec<PlaceHit>>> + Send;
}

pub fn build_http_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .connect_timeout(Duration::from_secs(6))
        .timeout(timeout)
        .build()
        .context("failed to build HTTP client")
}
