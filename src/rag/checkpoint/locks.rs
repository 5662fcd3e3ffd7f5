// SPDX-License-Identifier: MIT

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::OwnedMutexGuard;

/// One async mutex per conversation id, so turns on the same conversation
/// run one at a time while different conversations proceed in parallel.
#[derive(Clone, Default)]
pub struct ConversationLocks {
    handles: Arc<Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>>,
}

impl ConversationLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `conversation_id`
    pub async fn acquire(&self, conversation_id: &str) -> OwnedMutexGuard<()> {
        let handle = {
            let mut handles = self
                .handles
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            // drop handles nobody holds or waits on
            handles.retain(|id, h| id == conversation_id || Arc::strong_count(h) > 1);
            handles
                .entry(conversation_id.to_string())
                .or_default()
                .clone()
        };
        handle.lock_owned().await
    }

    /// Number of conversations with a live handle
    pub fn tracked(&self) -> usize {
        self.handles
            .lock()
            .map(|h| h.len())
            .unwrap_or_else(|poisoned| poisoned.into_inner().len())
    }
}
