use thiserror::Error;

use crate::state::PipelineStage;

/// Every way a route recommendation can fail. None of these are recovered
/// inside the pipeline; the request is aborted and the error surfaced.
#[derive(Debug, Error)]
pub enum WalkError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("intent weights could not be parsed: {0}")]
    IntentParse(String),

    #[error("intent generation failed: {0}")]
    IntentGeneration(String),

    #[error("no routes available to score")]
    NoRoutesAvailable,

    #[error("explanation generation failed: {0}")]
    ExplanationGeneration(String),

    #[error("route provider error: {0}")]
    RouteProvider(String),

    #[error("malformed route {route_index}: {reason}")]
    MalformedRoute { route_index: usize, reason: String },

    #[error("{stage} stage read `{field}` before it was populated")]
    MissingStageOutput {
        stage: PipelineStage,
        field: &'static str,
    },
}

impl WalkError {
    /// Stable machine-readable slug for error payloads and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "invalid_request",
            Self::IntentParse(_) => "intent_parse_failed",
            Self::IntentGeneration(_) => "intent_generation_failed",
            Self::NoRoutesAvailable => "no_routes_available",
            Self::ExplanationGeneration(_) => "explanation_failed",
            Self::RouteProvider(_) => "route_provider_failed",
            Self::MalformedRoute { .. } => "malformed_route",
            Self::MissingStageOutput { .. } => "pipeline_state_error",
        }
    }
}
