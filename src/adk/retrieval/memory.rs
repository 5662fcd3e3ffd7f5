// SPDX-License-Identifier: MIT

//! In-memory hybrid retriever for development without a database

use super::{HybridQuery, Passage, Retriever};
use crate::adk::error::RagError;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
struct StoredPassage {
    content: String,
    metadata: Map<String, Value>,
    embedding: Vec<f32>,
    terms: HashSet<String>,
}

/// Keeps passages with precomputed embeddings and scores them with a weighted sum of
/// term overlap and cosine similarity.
#[derive(Clone, Default)]
pub struct MemoryRetriever {
    passages: Arc<RwLock<Vec<StoredPassage>>>,
}

impl MemoryRetriever {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a passage with its embedding
    pub async fn insert(&self, content: impl Into<String>, metadata: Map<String, Value>, embedding: Vec<f32>) {
        let content = content.into();
        let terms = tokenize(&content);
        self.passages.write().await.push(StoredPassage {
            content,
            metadata,
            embedding,
            terms,
        });
    }

    pub async fn len(&self) -> usize {
        self.passages.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

fn tokenize(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() > 2)
        .map(|t| t.to_lowercase())
        .collect()
}

/// Fraction of query terms that appear in the passage
fn lexical_score(query_terms: &HashSet<String>, passage_terms: &HashSet<String>) -> f64 {
    if query_terms.is_empty() {
        return 0.0;
    }
    let hits = query_terms.intersection(passage_terms).count();
    hits as f64 / query_terms.len() as f64
}

fn cosine(a: &[f32], b: &[f32]) -> f64 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let (mut dot, mut na, mut nb) = (0.0_f64, 0.0_f64, 0.0_f64);
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (*x as f64, *y as f64);
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    dot / (na.sqrt() * nb.sqrt())
}

#[async_trait]
impl Retriever for MemoryRetriever {
    fn provider(&self) -> &str {
        "memory"
    }

    async fn hybrid_search(&self, query: &HybridQuery) -> Result<Vec<Passage>, RagError> {
        let query_terms = tokenize(&query.text);
        let passages = self.passages.read().await;

        let mut scored: Vec<Passage> = passages
            .iter()
            .filter_map(|p| {
                let lexical = lexical_score(&query_terms, &p.terms);
                let vector = cosine(&query.embedding, &p.embedding).max(0.0);
                let combined =
                    query.lexical_weight as f64 * lexical + query.vector_weight as f64 * vector;
                (combined > 0.0).then(|| Passage {
                    content: p.content.clone(),
                    metadata: p.metadata.clone(),
                    similarity: combined,
                    lexical_score: Some(lexical),
                })
            })
            .collect();

        scored.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(query.top_k);
        Ok(scored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn query(text: &str, embedding: Vec<f32>) -> HybridQuery {
        HybridQuery {
            text: text.to_string(),
            embedding,
            top_k: 5,
            lexical_weight: 0.3,
            vector_weight: 0.7,
        }
    }

    #[test]
    fn test_cosine() {
        assert!((cosine(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-9);
        assert_eq!(cosine(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
        assert_eq!(cosine(&[1.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine(&[0.0, 0.0], &[1.0, 2.0]), 0.0);
    }

    #[tokio::test]
    async fn test_hybrid_ranking() {
        let store = MemoryRetriever::new();
        let mut meta = Map::new();
        meta.insert("source".into(), json!("whitepaper"));
        store
            .insert("Proof-of-work secures the chain.", meta, vec![1.0, 0.0])
            .await;
        store
            .insert("Lightning channels settle off-chain.", Map::new(), vec![0.0, 1.0])
            .await;

        let results = store
            .hybrid_search(&query("proof work", vec![1.0, 0.0]))
            .await
            .unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].source(), Some("whitepaper"));
        assert!((results[0].similarity - 1.0).abs() < 1e-6);
        assert_eq!(results[0].lexical_score, Some(1.0));
    }

    #[tokio::test]
    async fn test_respects_top_k() {
        let store = MemoryRetriever::new();
        for i in 0..8 {
            store
                .insert(format!("block number {}", i), Map::new(), vec![1.0, i as f32])
                .await;
        }
        let mut q = query("block", vec![1.0, 0.0]);
        q.top_k = 3;
        let results = store.hybrid_search(&q).await.unwrap();
        assert_eq!(results.len(), 3);
        assert!(results[0].similarity >= results[1].similarity);
    }

    #[tokio::test]
    async fn test_no_match_is_empty() {
        let store = MemoryRetriever::new();
        assert!(store.is_empty().await);
        store.insert("unrelated text", Map::new(), vec![0.0, 1.0]).await;
        let results = store
            .hybrid_search(&query("xyzzy plugh", vec![1.0, 0.0]))
            .await
            .unwrap();
        assert!(results.is_empty());
    }
}
