// SPDX-License-Identifier: MIT

//! Supabase retriever - calls the `hybrid_search` Postgres function over PostgREST

use super::{HybridQuery, Passage, Retriever};
use crate::adk::error::RagError;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Map, Value};

const SEARCH_FUNCTION: &str = "hybrid_search";

const PROVIDER: &str = "supabase";

/// Row shape returned by the `hybrid_search` RPC
#[derive(Debug, Deserialize)]
struct HybridRow {
    content: String,
    #[serde(default)]
    metadata: Option<Map<String, Value>>,
    #[serde(default)]
    similarity: Option<f64>,
    #[serde(default, alias = "full_text_rank", alias = "fts_rank")]
    lexical_score: Option<f64>,
}

impl From<HybridRow> for Passage {
    fn from(row: HybridRow) -> Self {
        let similarity = row.similarity.unwrap_or_default();
        let mut metadata = row.metadata.unwrap_or_default();
        metadata.insert("similarity".to_string(), json!(similarity));
        Passage {
            content: row.content,
            metadata,
            similarity,
            lexical_score: row.lexical_score,
        }
    }
}

pub struct SupabaseRetriever {
    client: Client,
    url: String,
    api_key: String,
}

impl SupabaseRetriever {
    pub fn new(url: impl Into<String>, api_key: impl Into<String>) -> Result<Self, RagError> {
        let url = url.into();
        let api_key = api_key.into();
        if url.is_empty() || api_key.is_empty() {
            return Err(RagError::config(
                "SUPABASE_URL and SUPABASE_PRIVATE_KEY must be set for the supabase retriever",
            ));
        }
        Ok(Self {
            client: Client::new(),
            url: url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn rpc_body(query: &HybridQuery) -> Value {
        json!({
            "query_text": query.text,
            "query_embedding": query.embedding,
            "match_count": query.top_k,
            "full_text_weight": query.lexical_weight,
            "vector_weight": query.vector_weight
        })
    }

    fn parse_rows(body: Value, top_k: usize) -> Result<Vec<Passage>, RagError> {
        let rows: Vec<HybridRow> =
            serde_json::from_value(body).map_err(|e| RagError::retrieval(PROVIDER, e.to_string()))?;
        Ok(rows.into_iter().take(top_k).map(Passage::from).collect())
    }
}

#[async_trait]
impl Retriever for SupabaseRetriever {
    fn provider(&self) -> &str {
        PROVIDER
    }

    async fn hybrid_search(&self, query: &HybridQuery) -> Result<Vec<Passage>, RagError> {
        let url = format!("{}/rest/v1/rpc/{}", self.url, SEARCH_FUNCTION);

        let resp = self
            .client
            .post(&url)
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&Self::rpc_body(query))
            .send()
            .await
            .map_err(|e| RagError::retrieval(PROVIDER, e.to_string()))?;

        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(RagError::retrieval(PROVIDER, format!("RPC error: {}", text)));
        }

        let body: Value = resp
            .json()
            .await
            .map_err(|e| RagError::retrieval(PROVIDER, e.to_string()))?;
        Self::parse_rows(body, query.top_k)
    }
}
