// SPDX-License-Identifier: MIT

//! Conversation checkpoints
//!
//! The engine loads a conversation's latest [`WorkflowState`] at the start of a
//! turn and saves it once the turn reaches END. Nothing is written mid-turn.

pub mod file;
mod locks;
pub mod memory;

use async_trait::async_trait;

use crate::adk::error::RagError;
use crate::rag::state::WorkflowState;

pub use file::FileConversationStore;
pub use locks::ConversationLocks;
pub use memory::MemoryConversationStore;

/// Durable key-value store of conversation states
#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn load(&self, conversation_id: &str) -> Result<Option<WorkflowState>, RagError>;

    async fn save(&self, conversation_id: &str, state: &WorkflowState) -> Result<(), RagError>;
}
