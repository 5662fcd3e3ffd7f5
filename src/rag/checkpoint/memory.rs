// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::ConversationStore;
use crate::adk::error::RagError;
use crate::rag::state::WorkflowState;

/// Process-local checkpoints, lost on exit
#[derive(Clone, Default)]
pub struct MemoryConversationStore {
    states: Arc<RwLock<HashMap<String, WorkflowState>>>,
}

impl MemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.states.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.states.read().await.is_empty()
    }
}

#[async_trait]
impl ConversationStore for MemoryConversationStore {
    async fn load(&self, conversation_id: &str) -> Result<Option<WorkflowState>, RagError> {
        Ok(self.states.read().await.get(conversation_id).cloned())
    }

    async fn save(&self, conversation_id: &str, state: &WorkflowState) -> Result<(), RagError> {
        self.states
            .write()
            .await
            .insert(conversation_id.to_string(), state.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_load_missing_is_none() {
        let store = MemoryConversationStore::new();
        assert!(store.load("c1").await.unwrap().is_none());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_save_overwrites() {
        let store = MemoryConversationStore::new();
        let mut state = WorkflowState::new();
        state.begin_turn("first");
        store.save("c1", &state).await.unwrap();

        state.begin_turn("second");
        store.save("c1", &state).await.unwrap();

        let loaded = store.load("c1").await.unwrap().unwrap();
        assert_eq!(loaded.conversation_history.len(), 2);
        assert_eq!(store.len().await, 1);
    }
}
