pub mod error;
pub mod explain;
pub mod intent;
pub mod models;
pub mod selector;
pub mod state;
pub mod summary;

pub use error::WalkError;
pub use explain::{build_explanation_prompt, clean_explanation};
pub use intent::{build_intent_prompt, classify_goal, parse_intent_weights, resolve_goal, WalkGoal};
pub use models::*;
pub use selector::{crowd_factor, rank_routes, score_route, select_route, ScoredRoute};
pub use state::{
    ExplanationUpdate, IntentUpdate, PipelineOutcome, PipelineStage, PipelineState,
    SelectionUpdate,
};
pub use summary::{route_waypoints, summarize_route};
