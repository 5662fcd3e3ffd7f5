// SPDX-License-Identifier: MIT

//! Citation-aware answer generation

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::{prompts, Step, StepContext, StepSettings};
use crate::adk::error::RagError;
use crate::adk::retrieval::Passage;
use crate::rag::graph::StepName;
use crate::rag::profile::detect_introduction;
use crate::rag::state::{Citation, Role, StateDelta, UserProfile, WorkflowState};

const DEFAULT_SOURCE: &str = "PDF";

pub struct GenerateStep {
    settings: StepSettings,
}

impl GenerateStep {
    pub fn new(settings: StepSettings) -> Self {
        Self { settings }
    }
}

impl Default for GenerateStep {
    fn default() -> Self {
        Self::new(StepSettings::default())
    }
}

/// Numbered citations for the leading passages
pub fn build_citations(passages: &[Passage], limit: usize, excerpt_chars: usize) -> Vec<Citation> {
    passages
        .iter()
        .take(limit)
        .enumerate()
        .map(|(i, p)| Citation {
            index: i + 1,
            source: p.source().unwrap_or(DEFAULT_SOURCE).to_string(),
            excerpt: format!("{}...", p.content.chars().take(excerpt_chars).collect::<String>()),
        })
        .collect()
}

#[async_trait]
impl Step for GenerateStep {
    fn name(&self) -> StepName {
        StepName::Generate
    }

    async fn run(&self, state: &WorkflowState, ctx: &StepContext) -> Result<StateDelta, RagError> {
        let prompt = prompts::generation(
            &state.user_profile,
            &state.render_history(),
            &state.context_text(),
            &state.current_question,
        );
        let answer = ctx.complete(&prompt).await?.trim().to_string();

        let citations = build_citations(
            &state.candidate_passages,
            self.settings.citation_limit,
            self.settings.excerpt_chars,
        );
        let markers = answer.matches('[').count();
        log::info!(
            "Generated answer ({} chars, {} citation markers, {} citations)",
            answer.len(),
            markers,
            citations.len()
        );

        // the user's own words, not a rewritten search query
        let profile_update = state
            .conversation_history
            .iter()
            .rev()
            .find(|turn| turn.role == Role::User)
            .and_then(|turn| detect_introduction(&turn.text))
            .map(|name| {
                log::info!("User introduced themselves as {}", name);
                let mut facts = Map::new();
                facts.insert("name".to_string(), Value::String(name));
                UserProfile(facts)
            });

        Ok(StateDelta {
            answer: Some(answer),
            citations: Some(citations),
            profile_update,
            ..Default::default()
        })
    }
}
