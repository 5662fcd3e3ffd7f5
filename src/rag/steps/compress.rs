// SPDX-License-Identifier: MIT

use async_trait::async_trait;

use super::{prompts, Step, StepContext};
use crate::adk::error::RagError;
use crate::rag::graph::StepName;
use crate::rag::state::{StateDelta, WorkflowState};

/// Keeps only the sentences relevant to the question
#[derive(Debug, Default)]
pub struct CompressStep;

#[async_trait]
impl Step for CompressStep {
    fn name(&self) -> StepName {
        StepName::Compress
    }

    async fn run(&self, state: &WorkflowState, ctx: &StepContext) -> Result<StateDelta, RagError> {
        if state.candidate_passages.is_empty() {
            log::info!("No candidates to compress");
            return Ok(StateDelta {
                compressed_context: Some(String::new()),
                ..Default::default()
            });
        }

        let documents = state
            .candidate_passages
            .iter()
            .enumerate()
            .map(|(i, p)| format!("[{}] {}", i + 1, p.content))
            .collect::<Vec<_>>()
            .join("\n\n");

        let compressed = ctx
            .complete(&prompts::compression(&state.current_question, &documents))
            .await?;
        log::info!(
            "Compressed context from {} to {} chars",
            documents.len(),
            compressed.len()
        );

        Ok(StateDelta {
            compressed_context: Some(compressed.trim().to_string()),
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adk::retrieval::Passage;
    use crate::rag::state::PassageUpdate;
    use crate::rag::steps::testing::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_empty_candidates_skip_model() {
        let model = Arc::new(ScriptedModel::new(&[]));
        let ctx = context(model.clone(), Arc::new(FixedRetriever::new(vec![])));

        let delta = CompressStep.run(&WorkflowState::new(), &ctx).await.unwrap();
        assert_eq!(delta.compressed_context, Some(String::new()));
        assert_eq!(model.calls(), 0);
    }

    #[tokio::test]
    async fn test_passages_are_numbered_in_prompt() {
        let model = Arc::new(ScriptedModel::new(&[("Extract ONLY", " Miners find nonces. \n")]));
        let ctx = context(model.clone(), Arc::new(FixedRetriever::new(vec![])));
        let mut state = WorkflowState::new();
        state.begin_turn("What do miners do?");
        state.apply(StateDelta {
            passages: Some(PassageUpdate::Append(vec![
                Passage::new("Miners find nonces.", 0.9),
                Passage::new("Coins have 8 decimals.", 0.4),
            ])),
            ..Default::default()
        });

        let delta = CompressStep.run(&state, &ctx).await.unwrap();
        assert_eq!(delta.compressed_context.as_deref(), Some("Miners find nonces."));

        let prompts = model.prompts.lock().unwrap();
        assert!(prompts[0].contains("[1] Miners find nonces."));
        assert!(prompts[0].contains("[2] Coins have 8 decimals."));
    }
}
