// SPDX-License-Identifier: MIT

use async_trait::async_trait;

use super::{prompts, Step, StepContext};
use crate::adk::error::RagError;
use crate::rag::graph::StepName;
use crate::rag::state::{StateDelta, WorkflowState};

/// Rephrases the question for another retrieval attempt
#[derive(Debug, Default)]
pub struct RewriteStep;

#[async_trait]
impl Step for RewriteStep {
    fn name(&self) -> StepName {
        StepName::Rewrite
    }

    async fn run(&self, state: &WorkflowState, ctx: &StepContext) -> Result<StateDelta, RagError> {
        let raw = ctx.complete(&prompts::rewrite(&state.current_question)).await?;
        let rewritten = raw.trim().trim_matches('"').trim();
        let retry_count = state.retry_count + 1;

        let current_question = if rewritten.is_empty() {
            log::warn!("Empty rewrite, keeping {:?}", state.current_question);
            None
        } else {
            log::info!("Rewrite #{}: {:?}", retry_count, rewritten);
            Some(rewritten.to_string())
        };

        Ok(StateDelta {
            current_question,
            retry_count: Some(retry_count),
            ..Default::default()
        })
    }
}
