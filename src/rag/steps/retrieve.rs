// SPDX-License-Identifier: MIT

//! Query expansion and hybrid retrieval fan-out

use async_trait::async_trait;
use futures::future::join_all;
use serde_json::Value;

use super::{prompts, Step, StepContext, StepSettings};
use crate::adk::error::RagError;
use crate::adk::retrieval::{HybridQuery, Passage};
use crate::rag::graph::StepName;
use crate::rag::state::{dedup_by_content, PassageUpdate, StateDelta, WorkflowState};

pub struct RetrieveStep {
    settings: StepSettings,
}

impl RetrieveStep {
    pub fn new(settings: StepSettings) -> Self {
        Self { settings }
    }

    async fn search_one(&self, ctx: &StepContext, text: &str) -> Result<Vec<Passage>, RagError> {
        let embedding = ctx.embed(text).await?;
        let query = HybridQuery {
            text: text.to_string(),
            embedding,
            top_k: self.settings.top_k,
            lexical_weight: self.settings.lexical_weight,
            vector_weight: self.settings.vector_weight,
        };
        let passages = ctx.search(&query).await?;
        Ok(passages
            .into_iter()
            .map(|p| {
                let similarity = p.similarity;
                p.with_metadata("similarity", Value::from(similarity))
            })
            .collect())
    }
}

impl Default for RetrieveStep {
    fn default() -> Self {
        Self::new(StepSettings::default())
    }
}

/// One phrasing per line, with list markers and quotes removed
fn parse_expansions(raw: &str, limit: usize) -> Vec<String> {
    raw.lines()
        .map(|line| strip_list_marker(line).trim_matches('"').trim().to_string())
        .filter(|line| !line.is_empty())
        .take(limit)
        .collect()
}

fn strip_list_marker(line: &str) -> &str {
    let line = line.trim();
    let after_digits = line.trim_start_matches(|c: char| c.is_ascii_digit());
    let line = match after_digits.strip_prefix(['.', ')']) {
        Some(rest) if after_digits.len() < line.len() => rest,
        _ => line,
    };
    line.trim_start_matches(['-', '*', '•']).trim()
}

#[async_trait]
impl Step for RetrieveStep {
    fn name(&self) -> StepName {
        StepName::Retrieve
    }

    async fn run(&self, state: &WorkflowState, ctx: &StepContext) -> Result<StateDelta, RagError> {
        let question = state.current_question.as_str();
        let raw = ctx
            .complete(&prompts::expansion(question, self.settings.expansion_count))
            .await?;

        let mut phrasings = parse_expansions(&raw, self.settings.expansion_count);
        phrasings.push(question.to_string());
        log::debug!("Search phrasings: {:?}", phrasings);

        let results = join_all(phrasings.iter().map(|text| self.search_one(ctx, text))).await;

        let mut found = Vec::new();
        let mut failures = 0;
        let mut last_error = None;
        for (text, result) in phrasings.iter().zip(results) {
            match result {
                Ok(passages) => found.extend(passages),
                Err(e) => {
                    log::warn!("Skipping phrasing {:?}: {}", text, e);
                    failures += 1;
                    last_error = Some(e);
                }
            }
        }

        if failures == phrasings.len() {
            let detail = last_error.map(|e| e.to_string()).unwrap_or_default();
            return Err(RagError::retrieval(
                ctx.retrieval_provider(),
                format!("all {} search phrasings failed: {}", failures, detail),
            ));
        }

        let passages = dedup_by_content(found);
        log::info!(
            "Retrieved {} candidates from {} phrasings",
            passages.len(),
            phrasings.len() - failures
        );

        Ok(StateDelta {
            passages: Some(PassageUpdate::Append(passages)),
            ..Default::default()
        })
    }
}
