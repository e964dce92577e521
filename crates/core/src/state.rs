use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::WalkError;
use crate::models::{IntentWeights, RouteSummary};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Interpreting,
    Selecting,
    Explaining,
    Done,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Interpreting => "interpreting",
            Self::Selecting => "selecting",
            Self::Explaining => "explaining",
            Self::Done => "done",
        })
    }
}

#[derive(Debug, Clone)]
pub struct IntentUpdate {
    pub intent: IntentWeights,
}

#[derive(Debug, Clone)]
pub struct SelectionUpdate {
    pub chosen_route_id: u32,
    pub chosen_route: RouteSummary,
    pub rejected_routes: Vec<RouteSummary>,
}

#[derive(Debug, Clone)]
pub struct ExplanationUpdate {
    pub explanation: String,
}

/// Inputs plus the incremental output of each stage for one request.
///
/// Stage outputs stay `None` until the orchestrator merges the matching update,
/// and each merge advances `stage` by exactly one step.
#[derive(Debug, Clone)]
pub struct PipelineState {
    pub user_text: String,
    pub selected_goal: String,
    pub route_summaries: Vec<RouteSummary>,
    pub stage: PipelineStage,
    pub intent: Option<IntentWeights>,
    pub chosen_route_id: Option<u32>,
    pub chosen_route: Option<RouteSummary>,
    pub rejected_routes: Option<Vec<RouteSummary>>,
    pub explanation: Option<String>,
}

impl PipelineState {
    pub fn new(
        user_text: impl Into<String>,
        selected_goal: impl Into<String>,
        route_summaries: Vec<RouteSummary>,
    ) -> Self {
        Self {
            user_text: user_text.into(),
            selected_goal: selected_goal.into(),
            route_summaries,
            stage: PipelineStage::Interpreting,
            intent: None,
            chosen_route_id: None,
            chosen_route: None,
            rejected_routes: None,
            explanation: None,
        }
    }

    pub fn merge_intent(&mut self, update: IntentUpdate) {
        self.intent = Some(update.intent);
        self.stage = PipelineStage::Selecting;
    }

    pub fn merge_selection(&mut self, update: SelectionUpdate) {
        self.chosen_route_id = Some(update.chosen_route_id);
        self.chosen_route = Some(update.chosen_route);
        self.rejected_routes = Some(update.rejected_routes);
        self.stage = PipelineStage::Explaining;
    }

    pub fn merge_explanation(&mut self, update: ExplanationUpdate) {
        self.explanation = Some(update.explanation);
        self.stage = PipelineStage::Done;
    }

    pub fn require_intent(&self) -> Result<IntentWeights, WalkError> {
        self.intent.ok_or(WalkError::MissingStageOutput {
            stage: self.stage,
            field: "intent",
        })
    }

    pub fn require_chosen_route(&self) -> Result<&RouteSummary, WalkError> {
        self.chosen_route.as_ref().ok_or(WalkError::MissingStageOutput {
            stage: self.stage,
            field: "chosen_route",
        })
    }

    pub fn require_rejected_routes(&self) -> Result<&[RouteSummary], WalkError> {
        self.rejected_routes
            .as_deref()
            .ok_or(WalkError::MissingStageOutput {
                stage: self.stage,
                field: "rejected_routes",
            })
    }

    /// Consumes a finished state. Fails if any stage output is still missing.
    pub fn into_outcome(self) -> Result<PipelineOutcome, WalkError> {
        let stage = self.stage;
        let missing = |field: &'static str| WalkError::MissingStageOutput { stage, field };

        Ok(PipelineOutcome {
            goal: self.selected_goal,
            intent: self.intent.ok_or_else(|| missing("intent"))?,
            chosen_route_id: self.chosen_route_id.ok_or_else(|| missing("chosen_route_id"))?,
            chosen_route: self.chosen_route.ok_or_else(|| missing("chosen_route"))?,
            rejected_routes: self.rejected_routes.ok_or_else(|| missing("rejected_routes"))?,
            explanation: self.explanation.ok_or_else(|| missing("explanation"))?,
        })
    }
}

/// Terminal view of a completed pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineOutcome {
    pub goal: String,
    pub intent: IntentWeights,
    pub chosen_route_id: u32,
    pub chosen_route: RouteSummary,
    pub rejected_routes: Vec<RouteSummary>,
    pub explanation: String,
}
