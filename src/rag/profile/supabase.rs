// SPDX-License-Identifier: MIT

//! Profiles in the `user_personas` table, one row per user with a JSON `persona_data` column

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::ProfileStore;
use crate::adk::error::RagError;
use crate::rag::state::UserProfile;

#[derive(Debug, Deserialize)]
struct PersonaRow {
    #[serde(default)]
    persona_data: Option<Map<String, Value>>,
}

pub struct SupabaseProfileStore {
    client: Client,
    url: String,
    api_key: String,
    table: String,
}

impl SupabaseProfileStore {
    pub fn new(url: impl Into<String>, api_key: impl Into<String>) -> Result<Self, RagError> {
        let url = url.into();
        let api_key = api_key.into();
        if url.is_empty() || api_key.is_empty() {
            return Err(RagError::config(
                "SUPABASE_URL and SUPABASE_PRIVATE_KEY must be set for the supabase profile store",
            ));
        }
        Ok(Self {
            client: Client::new(),
            url: url.trim_end_matches('/').to_string(),
            api_key,
            table: "user_personas".to_string(),
        })
    }

    fn table_url(&self) -> String {
        format!("{}/rest/v1/{}", self.url, self.table)
    }

    fn upsert_body(user_id: &str, profile: &UserProfile) -> Value {
        json!({
            "user_id": user_id,
            "persona_data": profile,
            "updated_at": Utc::now().to_rfc3339()
        })
    }

    fn parse_rows(body: Value) -> Result<UserProfile, RagError> {
        let rows: Vec<PersonaRow> =
            serde_json::from_value(body).map_err(|e| RagError::store(e.to_string()))?;
        Ok(rows
            .into_iter()
            .next()
            .and_then(|row| row.persona_data)
            .map(UserProfile)
            .unwrap_or_default())
    }
}

#[async_trait]
impl ProfileStore for SupabaseProfileStore {
    async fn load(&self, user_id: &str) -> Result<UserProfile, RagError> {
        let resp = self
            .client
            .get(self.table_url())
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .query(&[
                ("select", "persona_data".to_string()),
                ("user_id", format!("eq.{}", user_id)),
                ("limit", "1".to_string()),
            ])
            .send()
            .await
            .map_err(|e| RagError::store(e.to_string()))?;

        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(RagError::store(format!("profile load failed: {}", text)));
        }

        let body: Value = resp.json().await.map_err(|e| RagError::store(e.to_string()))?;
        Self::parse_rows(body)
    }

    async fn save(&self, user_id: &str, profile: &UserProfile) -> Result<(), RagError> {
        let resp = self
            .client
            .post(self.table_url())
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Prefer", "resolution=merge-duplicates")
            .json(&Self::upsert_body(user_id, profile))
            .send()
            .await
            .map_err(|e| RagError::store(e.to_string()))?;

        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(RagError::store(format!("profile save failed: {}", text)));
        }
        Ok(())
    }
}
