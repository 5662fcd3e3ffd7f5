// SPDX-License-Identifier: MIT

use async_trait::async_trait;

use super::{prompts, verdict, Step, StepContext};
use crate::adk::error::RagError;
use crate::rag::graph::StepName;
use crate::rag::state::{StateDelta, WorkflowState};

/// Classifies the turn as conversational or research
#[derive(Debug, Default)]
pub struct RouteStep;

#[async_trait]
impl Step for RouteStep {
    fn name(&self) -> StepName {
        StepName::Route
    }

    async fn run(&self, state: &WorkflowState, ctx: &StepContext) -> Result<StateDelta, RagError> {
        let raw = ctx
            .complete(&prompts::route(&state.current_question, &state.user_profile))
            .await?;
        let route = verdict::parse_route(&raw);
        log::info!("Route: {} (model said {:?})", route, raw.trim());

        Ok(StateDelta {
            route: Some(route),
            ..Default::default()
        })
    }
}
