// SPDX-License-Identifier: MIT

//! Retrieval module - hybrid lexical + vector search over a document store
//!
//! - [supabase] - PostgREST RPC against a `hybrid_search` SQL function
//! - [memory] - in-process index for development and tests

pub mod memory;
pub mod supabase;

use crate::adk::error::RagError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A ranked passage returned by the document store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    pub content: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    #[serde(default)]
    pub similarity: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lexical_score: Option<f64>,
}

impl Passage {
    pub fn new(content: impl Into<String>, similarity: f64) -> Self {
        Self {
            content: content.into(),
            metadata: Map::new(),
            similarity,
            lexical_score: None,
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// The `source` metadata entry, if it is a string
    pub fn source(&self) -> Option<&str> {
        self.metadata.get("source").and_then(|v| v.as_str())
    }
}

/// Parameters for a single hybrid search
#[derive(Debug, Clone, PartialEq)]
pub struct HybridQuery {
    pub text: String,
    pub embedding: Vec<f32>,
    pub top_k: usize,
    pub lexical_weight: f32,
    pub vector_weight: f32,
}

/// Document store able to combine keyword and vector similarity
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Short provider label used in errors and logs
    fn provider(&self) -> &str;

    /// Return up to `query.top_k` passages, best first
    async fn hybrid_search(&self, query: &HybridQuery) -> Result<Vec<Passage>, RagError>;
}
