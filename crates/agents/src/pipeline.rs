use std::sync::Arc;

use loopwalk_core::{
    build_explanation_prompt, build_intent_prompt, clean_explanation, parse_intent_weights,
    select_route, ExplanationUpdate, IntentUpdate, PipelineOutcome, PipelineState,
    SelectionUpdate, WalkError,
};
use loopwalk_observability::AppMetrics;
use loopwalk_providers::TextGenerator;
use tracing::{debug, info, instrument};
use uuid::Uuid;

/// Stage one: free text and goal label to intent weights.
pub struct IntentInterpreter<G> {
    generator: Arc<G>,
}

impl<G: TextGenerator> IntentInterpreter<G> {
    pub fn new(generator: Arc<G>) -> Self {
        Self { generator }
    }

    pub async fn interpret(&self, state: &PipelineState) -> Result<IntentUpdate, WalkError> {
        let prompt = build_intent_prompt(&state.user_text, &state.selected_goal);
        let raw = self
            .generator
            .generate(&prompt)
            .await
            .map_err(|err| WalkError::IntentGeneration(format!("{err:#}")))?;

        let intent = parse_intent_weights(&raw)?;
        Ok(IntentUpdate { intent })
    }
}

/// Stage two. Pure.
pub fn select_stage(state: &PipelineState) -> Result<SelectionUpdate, WalkError> {
    let intent = state.require_intent()?;
    select_route(&intent, &state.route_summaries)
}

/// Stage three: chosen and rejected routes to prose.
pub struct ExplanationSynthesizer<G> {
    generator: Arc<G>,
}

impl<G: TextGenerator> ExplanationSynthesizer<G> {
    pub fn new(generator: Arc<G>) -> Self {
        Self { generator }
    }

    pub async fn explain(&self, state: &PipelineState) -> Result<ExplanationUpdate, WalkError> {
        let prompt = build_explanation_prompt(
            state.require_chosen_route()?,
            state.require_rejected_routes()?,
            &state.selected_goal,
        )?;
        let raw = self
            .generator
            .generate(&prompt)
            .await
            .map_err(|err| WalkError::ExplanationGeneration(format!("{err:#}")))?;

        Ok(ExplanationUpdate {
            explanation: clean_explanation(&raw)?,
        })
    }
}

/// Runs interpret, select and explain once, in that order, over one state.
pub struct RoutePipeline<G> {
    interpreter: IntentInterpreter<G>,
    synthesizer: ExplanationSynthesizer<G>,
    metrics: Arc<AppMetrics>,
}

impl<G: TextGenerator> RoutePipeline<G> {
    pub fn new(generator: Arc<G>, metrics: Arc<AppMetrics>) -> Self {
        Self {
            interpreter: IntentInterpreter::new(generator.clone()),
            synthesizer: ExplanationSynthesizer::new(generator),
            metrics,
        }
    }

    #[instrument(
        skip_all,
        fields(
            run_id = %Uuid::new_v4(),
            goal = %state.selected_goal,
            routes = state.route_summaries.len()
        )
    )]
    pub async fn run(&self, mut state: PipelineState) -> Result<PipelineOutcome, WalkError> {
        // The caller reports the failure; this only records where it stopped.
        if let Err(err) = self.execute(&mut state).await {
            debug!(
                stage = %state.stage,
                kind = err.kind(),
                error = %err,
                "pipeline aborted"
            );
            return Err(err);
        }

        let outcome = state.into_outcome()?;
        info!(
            chosen_route_id = outcome.chosen_route_id,
            rejected = ?outcome
                .rejected_routes
                .iter()
                .map(|route| route.route_id)
                .collect::<Vec<_>>(),
            "pipeline completed"
        );
        Ok(outcome)
    }

    async fn execute(&self, state: &mut PipelineState) -> Result<(), WalkError> {
        debug!(stage = %state.stage, "stage started");
        self.metrics.inc_generator_call();
        let update = self.interpreter.interpret(state).await?;
        debug!(intent = ?update.intent, "intent interpreted");
        state.merge_intent(update);

        debug!(stage = %state.stage, "stage started");
        let update = select_stage(state)?;
        self.metrics.add_routes_scored(state.route_summaries.len());
        state.merge_selection(update);

        debug!(stage = %state.stage, "stage started");
        self.metrics.inc_generator_call();
        let update = self.synthesizer.explain(state).await?;
        state.merge_explanation(update);

        Ok(())
    }
}
