// SPDX-License-Identifier: MIT

//! Model module - defines the completion/embedding gateway and implementations
//!
//! Model implementations are in their own submodules:
//! - [ollama] - local Ollama runtime
//! - [openai] - OpenAI-compatible chat and embedding endpoints

pub mod ollama;
pub mod openai;

use crate::adk::error::RagError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Configuration for model generation
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GenerationConfig {
    pub temperature: Option<f32>,
    pub max_output_tokens: Option<u32>,
    pub top_p: Option<f32>,
}

/// Uniform call surface for a text-generation and embedding runtime
#[async_trait]
pub trait Model: Send + Sync {
    /// Short provider label used in errors and logs
    fn provider(&self) -> &str;

    /// Complete a fully rendered prompt and return the raw text
    async fn complete(&self, prompt: &str) -> Result<String, RagError>;

    /// Embed a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>, RagError> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        if vectors.is_empty() {
            return Err(RagError::model(self.provider(), "empty embedding response"));
        }
        Ok(vectors.swap_remove(0))
    }

    /// Embed several texts in one request, preserving order
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError>;
}
