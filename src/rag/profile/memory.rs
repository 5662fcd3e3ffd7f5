// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::ProfileStore;
use crate::adk::error::RagError;
use crate::rag::state::UserProfile;

#[derive(Clone, Default)]
pub struct MemoryProfileStore {
    profiles: Arc<RwLock<HashMap<String, UserProfile>>>,
}

impl MemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProfileStore for MemoryProfileStore {
    async fn load(&self, user_id: &str) -> Result<UserProfile, RagError> {
        let profiles = self.profiles.read().await;
        Ok(profiles.get(user_id).cloned().unwrap_or_default())
    }

    async fn save(&self, user_id: &str, profile: &UserProfile) -> Result<(), RagError> {
        let mut profiles = self.profiles.write().await;
        profiles.insert(user_id.to_string(), profile.clone());
        Ok(())
    }
}
