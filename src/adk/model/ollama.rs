// SPDX-License-Identifier: MIT

//! Ollama Model - local runtime via `/api/generate` and `/api/embed`

use super::{GenerationConfig, Model};
use crate::adk::error::RagError;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;

const PROVIDER: &str = "ollama";

/// Ollama completion + embedding model
pub struct OllamaModel {
    client: Client,
    base_url: String,
    chat_model: String,
    embedding_model: String,
    config: GenerationConfig,
}

impl OllamaModel {
    pub fn new(
        base_url: impl Into<String>,
        chat_model: impl Into<String>,
        embedding_model: impl Into<String>,
        config: GenerationConfig,
    ) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            chat_model: chat_model.into(),
            embedding_model: embedding_model.into(),
            config,
        }
    }

    fn generate_body(&self, prompt: &str) -> serde_json::Value {
        let mut options = serde_json::Map::new();
        if let Some(temp) = self.config.temperature {
            options.insert("temperature".into(), json!(temp));
        }
        if let Some(top_p) = self.config.top_p {
            options.insert("top_p".into(), json!(top_p));
        }
        if let Some(max) = self.config.max_output_tokens {
            options.insert("num_predict".into(), json!(max));
        }

        json!({
            "model": self.chat_model,
            "prompt": prompt,
            "stream": false,
            "options": options
        })
    }

    fn parse_generate_response(body: &serde_json::Value) -> Result<String, RagError> {
        body["response"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| RagError::model(PROVIDER, "missing 'response' in generate reply"))
    }

    fn parse_embed_response(
        body: &serde_json::Value,
        expected: usize,
    ) -> Result<Vec<Vec<f32>>, RagError> {
        let rows = body["embeddings"]
            .as_array()
            .ok_or_else(|| RagError::model(PROVIDER, "missing 'embeddings' in embed reply"))?;

        let vectors: Vec<Vec<f32>> = rows
            .iter()
            .map(|row| {
                row.as_array()
                    .map(|xs| xs.iter().filter_map(|x| x.as_f64()).map(|x| x as f32).collect())
                    .unwrap_or_default()
            })
            .collect();

        if vectors.len() != expected {
            return Err(RagError::model(
                PROVIDER,
                format!("expected {} embeddings, got {}", expected, vectors.len()),
            ));
        }
        Ok(vectors)
    }

    async fn post(&self, path: &str, body: &serde_json::Value) -> Result<serde_json::Value, RagError> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| RagError::model(PROVIDER, e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(RagError::model(
                PROVIDER,
                format!("{} returned {}: {}", path, status, text),
            ));
        }

        resp.json()
            .await
            .map_err(|e| RagError::model(PROVIDER, e.to_string()))
    }
}

#[async_trait]
impl Model for OllamaModel {
    fn provider(&self) -> &str {
        PROVIDER
    }

    async fn complete(&self, prompt: &str) -> Result<String, RagError> {
        let body = self.generate_body(prompt);
        log::debug!("Ollama generate with model {}", self.chat_model);
        let reply = self.post("/api/generate", &body).await?;
        Self::parse_generate_response(&reply)
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
        if texts.is_empty() {
            return Ok(vec![]);
        }
        let body = json!({ "model": self.embedding_model, "input": texts });
        let reply = self.post("/api/embed", &body).await?;
        Self::parse_embed_response(&reply, texts.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> OllamaModel {
        OllamaModel::new(
            "http://localhost:11434/",
            "llama3",
            "nomic-embed-text",
            GenerationConfig {
                temperature: Some(0.0),
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        assert_eq!(model().base_url, "http://localhost:11434");
    }

    #[test]
    fn test_generate_body() {
        let body = model().generate_body("hello");
        assert_eq!(body["model"], "llama3");
        assert_eq!(body["prompt"], "hello");
        assert_eq!(body["stream"], false);
        assert_eq!(body["options"]["temperature"], 0.0);
        assert!(body["options"].get("num_predict").is_none());
    }

    #[test]
    fn test_parse_generate_response() {
        let body = json!({ "model": "llama3", "response": "research", "done": true });
        assert_eq!(OllamaModel::parse_generate_response(&body).unwrap(), "research");

        let missing = json!({ "done": true });
        assert!(OllamaModel::parse_generate_response(&missing).is_err());
    }

    #[test]
    fn test_parse_embed_response() {
        let body = json!({ "embeddings": [[0.1, 0.2], [0.3, 0.4]] });
        let vectors = OllamaModel::parse_embed_response(&body, 2).unwrap();
        assert_eq!(vectors.len(), 2);
        assert_eq!(vectors[1], vec![0.3_f32, 0.4_f32]);

        assert!(OllamaModel::parse_embed_response(&body, 3).is_err());
    }
}
