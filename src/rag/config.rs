// SPDX-License-Identifier: MIT

//! Runtime configuration
//!
//! Read from YAML, then overridden by environment variables (a `.env` file is
//! loaded by the binary before this runs).

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::adk::error::RagError;
use crate::rag::graph::{RunLimits, DEFAULT_USER};
use crate::rag::steps::StepSettings;

/// Config file picked up from the working directory when `--config` is not given
pub const DEFAULT_CONFIG_FILE: &str = "crag.yaml";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelProvider {
    Ollama,
    #[serde(rename = "openai")]
    OpenAI,
}

/// Where a backing store lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Memory,
    File,
    Supabase,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    pub provider: ModelProvider,
    pub ollama_base_url: String,
    #[serde(skip_serializing)]
    pub openai_api_key: Option<String>,
    pub openai_base_url: Option<String>,
    pub chat_model: String,
    pub embedding_model: String,
    pub temperature: f32,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            provider: ModelProvider::Ollama,
            ollama_base_url: "http://localhost:11434".to_string(),
            openai_api_key: None,
            openai_base_url: None,
            chat_model: "llama3".to_string(),
            embedding_model: "nomic-embed-text".to_string(),
            temperature: 0.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupabaseSettings {
    pub url: String,
    #[serde(skip_serializing)]
    pub private_key: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    /// Document store behind retrieval: `supabase` or `memory`
    pub retrieval: Backend,
    /// Conversation checkpoints: `file` or `memory`
    pub checkpoints: Backend,
    /// User profiles: `supabase` or `memory`
    pub profiles: Backend,
    pub state_dir: PathBuf,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            retrieval: Backend::Supabase,
            checkpoints: Backend::File,
            profiles: Backend::Supabase,
            state_dir: PathBuf::from(".crag/conversations"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    pub model: ModelSettings,
    pub supabase: SupabaseSettings,
    pub stores: StoreSettings,
    pub steps: StepSettings,
    pub limits: RunLimits,
    /// Bound on every model and retrieval call
    pub call_timeout_secs: u64,
    pub default_user: String,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            model: ModelSettings::default(),
            supabase: SupabaseSettings::default(),
            stores: StoreSettings::default(),
            steps: StepSettings::default(),
            limits: RunLimits::default(),
            call_timeout_secs: 60,
            default_user: DEFAULT_USER.to_string(),
        }
    }
}

impl RagConfig {
    /// Load from `path`, or from `crag.yaml` if present, then apply the environment
    pub fn load(path: Option<&Path>) -> Result<Self, RagError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, RagError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| RagError::config(format!("reading {}: {}", path.display(), e)))?;
        Self::parse_yaml(&content)
    }

    pub fn parse_yaml(content: &str) -> Result<Self, RagError> {
        let config: RagConfig = serde_yaml::from_str(content)?;
        Ok(config)
    }

    /// Apply environment-style overrides; empty values are ignored
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(provider) = get("MODEL_PROVIDER") {
            match provider.to_lowercase().as_str() {
                "ollama" => self.model.provider = ModelProvider::Ollama,
                "openai" => self.model.provider = ModelProvider::OpenAI,
                other => log::warn!("Ignoring unknown MODEL_PROVIDER {:?}", other),
            }
        }
        if let Some(url) = get("OLLAMA_BASE_URL") {
            self.model.ollama_base_url = url;
        }
        if let Some(key) = get("OPENAI_API_KEY") {
            self.model.openai_api_key = Some(key);
        }
        if let Some(url) = get("OPENAI_BASE_URL") {
            self.model.openai_base_url = Some(url);
        }
        if let Some(model) = get("LLM_MODEL") {
            self.model.chat_model = model;
        }
        if let Some(model) = get("EMBEDDING_MODEL") {
            self.model.embedding_model = model;
        }
        if let Some(url) = get("SUPABASE_URL") {
            self.supabase.url = url;
        }
        if let Some(key) = get("SUPABASE_PRIVATE_KEY") {
            self.supabase.private_key = key;
        }
        if let Some(dir) = get("CRAG_STATE_DIR") {
            self.stores.state_dir = PathBuf::from(dir);
        }
    }

    pub fn validate(&self) -> Result<(), RagError> {
        let steps = &self.steps;
        if steps.top_k == 0 {
            return Err(RagError::config("steps.top_k must be at least 1"));
        }
        if steps.lexical_weight < 0.0 || steps.vector_weight < 0.0 {
            return Err(RagError::config("search weights must not be negative"));
        }
        if steps.lexical_weight + steps.vector_weight == 0.0 {
            return Err(RagError::config("search weights must not both be zero"));
        }
        if self.call_timeout_secs == 0 {
            return Err(RagError::config("call_timeout_secs must be positive"));
        }
        if self.limits.max_steps == 0 {
            return Err(RagError::config("limits.max_steps must be positive"));
        }
        if self.default_user.trim().is_empty() {
            return Err(RagError::config("default_user must not be empty"));
        }
        match self.stores.retrieval {
            Backend::Supabase | Backend::Memory => {}
            Backend::File => return Err(RagError::config("retrieval cannot use the file backend")),
        }
        match self.stores.profiles {
            Backend::Supabase | Backend::Memory => {}
            Backend::File => return Err(RagError::config("profiles cannot use the file backend")),
        }
        if self.stores.checkpoints == Backend::Supabase {
            return Err(RagError::config("checkpoints support the file or memory backend"));
        }
        Ok(())
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }
}
