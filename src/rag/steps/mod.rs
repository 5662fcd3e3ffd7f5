// SPDX-License-Identifier: MIT

//! Workflow steps
//!
//! Each step reads the current [`WorkflowState`] and returns a [`StateDelta`];
//! the engine owns the state and merges the delta. Gateways are reached only
//! through the [`StepContext`] handed to `run`.

mod compress;
mod generate;
pub mod prompts;
mod retrieve;
mod rewrite;
mod route;
mod verdict;
mod verify;

pub use compress::CompressStep;
pub use generate::GenerateStep;
pub use retrieve::RetrieveStep;
pub use rewrite::RewriteStep;
pub use route::RouteStep;
pub use verify::{VerifyGroundingStep, VerifyUsefulnessStep};

use crate::adk::error::RagError;
use crate::adk::model::Model;
use crate::adk::retrieval::{HybridQuery, Passage, Retriever};
use crate::rag::graph::StepName;
use crate::rag::state::{StateDelta, WorkflowState};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// A unit of work in the RAG graph
#[async_trait]
pub trait Step: Send + Sync {
    fn name(&self) -> StepName;

    async fn run(&self, state: &WorkflowState, ctx: &StepContext) -> Result<StateDelta, RagError>;
}

/// Tunables for the built-in steps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StepSettings {
    /// Alternative phrasings requested from the model before retrieval
    pub expansion_count: usize,
    /// Passages requested per phrasing
    pub top_k: usize,
    pub lexical_weight: f32,
    pub vector_weight: f32,
    /// Passages turned into citations
    pub citation_limit: usize,
    /// Characters of passage text shown in a citation
    pub excerpt_chars: usize,
}

impl Default for StepSettings {
    fn default() -> Self {
        Self {
            expansion_count: 3,
            top_k: 5,
            lexical_weight: 0.3,
            vector_weight: 0.7,
            citation_limit: 5,
            excerpt_chars: 100,
        }
    }
}

/// Gateways available to steps, with every call bounded by `call_timeout`
#[derive(Clone)]
pub struct StepContext {
    model: Arc<dyn Model>,
    retriever: Arc<dyn Retriever>,
    call_timeout: Duration,
}

impl StepContext {
    pub fn new(model: Arc<dyn Model>, retriever: Arc<dyn Retriever>, call_timeout: Duration) -> Self {
        Self {
            model,
            retriever,
            call_timeout,
        }
    }

    pub async fn complete(&self, prompt: &str) -> Result<String, RagError> {
        log::debug!("Prompt to {}:\n{}", self.model.provider(), prompt);
        match tokio::time::timeout(self.call_timeout, self.model.complete(prompt)).await {
            Ok(result) => result,
            Err(_) => Err(RagError::model(
                self.model.provider(),
                format!("completion timed out after {:?}", self.call_timeout),
            )),
        }
    }

    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, RagError> {
        match tokio::time::timeout(self.call_timeout, self.model.embed(text)).await {
            Ok(result) => result,
            Err(_) => Err(RagError::model(
                self.model.provider(),
                format!("embedding timed out after {:?}", self.call_timeout),
            )),
        }
    }

    pub async fn search(&self, query: &HybridQuery) -> Result<Vec<Passage>, RagError> {
        match tokio::time::timeout(self.call_timeout, self.retriever.hybrid_search(query)).await {
            Ok(result) => result,
            Err(_) => Err(RagError::retrieval(
                self.retriever.provider(),
                format!("search timed out after {:?}", self.call_timeout),
            )),
        }
    }

    pub fn retrieval_provider(&self) -> &str {
        self.retriever.provider()
    }

    pub fn call_timeout(&self) -> Duration {
        self.call_timeout
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted gateways shared by the step tests

    use super::*;
    use std::sync::Mutex;

    /// Answers prompts by the first registered marker they contain
    pub struct ScriptedModel {
        rules: Vec<(String, String)>,
        pub prompts: Mutex<Vec<String>>,
        pub fail_embeddings: bool,
    }

    impl ScriptedModel {
        pub fn new(rules: &[(&str, &str)]) -> Self {
            Self {
                rules: rules
                    .iter()
                    .map(|(m, r)| (m.to_string(), r.to_string()))
                    .collect(),
                prompts: Mutex::new(Vec::new()),
                fail_embeddings: false,
            }
        }

        pub fn calls(&self) -> usize {
            self.prompts.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Model for ScriptedModel {
        fn provider(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, prompt: &str) -> Result<String, RagError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.rules
                .iter()
                .find(|(marker, _)| prompt.contains(marker.as_str()))
                .map(|(_, reply)| reply.clone())
                .ok_or_else(|| RagError::model("scripted", "no scripted reply"))
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
            if self.fail_embeddings {
                return Err(RagError::model("scripted", "embedding backend down"));
            }
            Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
        }
    }

    /// Returns the same passages for any query, or fails on request
    pub struct FixedRetriever {
        pub passages: Vec<Passage>,
        pub fail_on: Vec<String>,
        pub queries: Mutex<Vec<String>>,
    }

    impl FixedRetriever {
        pub fn new(passages: Vec<Passage>) -> Self {
            Self {
                passages,
                fail_on: Vec::new(),
                queries: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Retriever for FixedRetriever {
        fn provider(&self) -> &str {
            "fixed"
        }

        async fn hybrid_search(&self, query: &HybridQuery) -> Result<Vec<Passage>, RagError> {
            self.queries.lock().unwrap().push(query.text.clone());
            if self.fail_on.iter().any(|q| q == "*" || *q == query.text) {
                return Err(RagError::retrieval("fixed", "index offline"));
            }
            Ok(self.passages.iter().take(query.top_k).cloned().collect())
        }
    }

    pub fn context(model: Arc<ScriptedModel>, retriever: Arc<FixedRetriever>) -> StepContext {
        StepContext::new(model, retriever, Duration::from_secs(5))
    }
}
