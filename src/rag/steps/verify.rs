// SPDX-License-Identifier: MIT

//! Grounding and usefulness checks on the generated answer

use async_trait::async_trait;

use super::{prompts, verdict, Step, StepContext};
use crate::adk::error::RagError;
use crate::rag::graph::StepName;
use crate::rag::state::{GroundingVerdict, Route, StateDelta, UsefulnessVerdict, WorkflowState};

/// Asks whether the answer states facts missing from the context
#[derive(Debug, Default)]
pub struct VerifyGroundingStep;

#[async_trait]
impl Step for VerifyGroundingStep {
    fn name(&self) -> StepName {
        StepName::VerifyGrounding
    }

    async fn run(&self, state: &WorkflowState, ctx: &StepContext) -> Result<StateDelta, RagError> {
        let verdict = if state.route == Some(Route::Conversational) {
            GroundingVerdict::Grounded
        } else {
            let raw = ctx
                .complete(&prompts::grounding(&state.context_text(), &state.answer))
                .await?;
            log::debug!("Grounding check raw output: {:?}", raw);
            if verdict::says_yes(&raw) {
                GroundingVerdict::Hallucinated
            } else {
                GroundingVerdict::Grounded
            }
        };
        log::info!("Grounding verdict: {:?}", verdict);

        Ok(StateDelta {
            grounding_verdict: Some(verdict),
            ..Default::default()
        })
    }
}

/// Asks whether the answer addresses the question
#[derive(Debug, Default)]
pub struct VerifyUsefulnessStep;

#[async_trait]
impl Step for VerifyUsefulnessStep {
    fn name(&self) -> StepName {
        StepName::VerifyUsefulness
    }

    async fn run(&self, state: &WorkflowState, ctx: &StepContext) -> Result<StateDelta, RagError> {
        let verdict = if state.route == Some(Route::Conversational) {
            UsefulnessVerdict::Useful
        } else {
            let raw = ctx
                .complete(&prompts::usefulness(&state.current_question, &state.answer))
                .await?;
            log::debug!("Usefulness check raw output: {:?}", raw);
            if verdict::says_yes(&raw) {
                UsefulnessVerdict::Useful
            } else {
                UsefulnessVerdict::NotUseful
            }
        };
        log::info!("Usefulness verdict: {:?}", verdict);

        Ok(StateDelta {
            usefulness_verdict: Some(verdict),
            ..Default::default()
        })
    }
}
