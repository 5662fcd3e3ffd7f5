// SPDX-License-Identifier: MIT

//! OpenAI Model - chat completions and embeddings API implementation

use super::{GenerationConfig, Model};
use crate::adk::error::RagError;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;

const PROVIDER: &str = "openai";

/// OpenAI-compatible completion + embedding model
pub struct OpenAIModel {
    client: Client,
    api_key: String,
    chat_model: String,
    embedding_model: String,
    base_url: String,
    config: GenerationConfig,
}

impl OpenAIModel {
    /// Create a new OpenAIModel
    ///
    /// `base_url` defaults to the public endpoint when `None`, which allows pointing at
    /// any OpenAI-compatible server.
    pub fn new(
        api_key: impl Into<String>,
        base_url: Option<String>,
        chat_model: impl Into<String>,
        embedding_model: impl Into<String>,
        config: GenerationConfig,
    ) -> Result<Self, RagError> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(RagError::config("OPENAI_API_KEY must be set"));
        }
        let base_url = base_url
            .unwrap_or_else(|| "https://api.openai.com/v1".to_string())
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            client: Client::new(),
            api_key,
            chat_model: chat_model.into(),
            embedding_model: embedding_model.into(),
            base_url,
            config,
        })
    }

    fn chat_body(&self, prompt: &str) -> serde_json::Value {
        let mut body = json!({
            "model": self.chat_model,
            "messages": [{ "role": "user", "content": prompt }]
        });

        if let Some(temp) = self.config.temperature {
            body["temperature"] = json!(temp);
        }
        if let Some(max_tokens) = self.config.max_output_tokens {
            body["max_tokens"] = json!(max_tokens);
        }
        if let Some(top_p) = self.config.top_p {
            body["top_p"] = json!(top_p);
        }
        body
    }

    /// Parse OpenAI chat response into plain text
    fn parse_chat_response(response: &serde_json::Value) -> Result<String, RagError> {
        let choice = response["choices"]
            .as_array()
            .and_then(|c| c.first())
            .ok_or_else(|| RagError::model(PROVIDER, "no choices in response"))?;

        Ok(choice["message"]["content"]
            .as_str()
            .unwrap_or_default()
            .to_string())
    }

    /// Parse embeddings, ordering by the `index` field the API returns
    fn parse_embedding_response(
        response: &serde_json::Value,
        expected: usize,
    ) -> Result<Vec<Vec<f32>>, RagError> {
        let data = response["data"]
            .as_array()
            .ok_or_else(|| RagError::model(PROVIDER, "no data in embeddings response"))?;

        let mut indexed: Vec<(u64, Vec<f32>)> = data
            .iter()
            .enumerate()
            .map(|(i, item)| {
                let index = item["index"].as_u64().unwrap_or(i as u64);
                let vector = item["embedding"]
                    .as_array()
                    .map(|xs| xs.iter().filter_map(|x| x.as_f64()).map(|x| x as f32).collect())
                    .unwrap_or_default();
                (index, vector)
            })
            .collect();
        indexed.sort_by_key(|(index, _)| *index);

        if indexed.len() != expected {
            return Err(RagError::model(
                PROVIDER,
                format!("expected {} embeddings, got {}", expected, indexed.len()),
            ));
        }
        Ok(indexed.into_iter().map(|(_, v)| v).collect())
    }

    async fn post(&self, path: &str, body: &serde_json::Value) -> Result<serde_json::Value, RagError> {
        let url = format!("{}{}", self.base_url, path);

        log::debug!(
            "OpenAI request body: {}",
            serde_json::to_string_pretty(body).unwrap_or_default()
        );

        let resp = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| RagError::model(PROVIDER, e.to_string()))?;

        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(RagError::model(PROVIDER, format!("API error: {}", text)));
        }

        resp.json()
            .await
            .map_err(|e| RagError::model(PROVIDER, e.to_string()))
    }
}

#[async_trait]
impl Model for OpenAIModel {
    fn provider(&self) -> &str {
        PROVIDER
    }

    async fn complete(&self, prompt: &str) -> Result<String, RagError> {
        let body = self.chat_body(prompt);
        let reply = self.post("/chat/completions", &body).await?;
        Self::parse_chat_response(&reply)
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
        if texts.is_empty() {
            return Ok(vec![]);
        }
        let body = json!({ "model": self.embedding_model, "input": texts });
        let reply = self.post("/embeddings", &body).await?;
        Self::parse_embedding_response(&reply, texts.len())
    }
}
