// SPDX-License-Identifier: MIT

//! Engine builder - wires gateways, stores and steps from configuration
//!
//! Anything not injected explicitly is constructed from the [`RagConfig`].

use std::sync::Arc;

use crate::adk::error::RagError;
use crate::adk::model::ollama::OllamaModel;
use crate::adk::model::openai::OpenAIModel;
use crate::adk::model::{GenerationConfig, Model};
use crate::adk::retrieval::memory::MemoryRetriever;
use crate::adk::retrieval::supabase::SupabaseRetriever;
use crate::adk::retrieval::Retriever;
use crate::rag::checkpoint::{ConversationStore, FileConversationStore, MemoryConversationStore};
use crate::rag::config::{Backend, ModelProvider, RagConfig};
use crate::rag::graph::{EdgeDef, Engine, StepName, TransitionTable};
use crate::rag::profile::{MemoryProfileStore, ProfileStore, SupabaseProfileStore};
use crate::rag::registry::StepRegistry;
use crate::rag::steps::{Step, StepContext};

pub struct Builder {
    config: RagConfig,
    model: Option<Arc<dyn Model>>,
    retriever: Option<Arc<dyn Retriever>>,
    conversations: Option<Arc<dyn ConversationStore>>,
    profiles: Option<Arc<dyn ProfileStore>>,
    steps: Vec<Arc<dyn Step>>,
    edges: Option<(StepName, Vec<EdgeDef>)>,
}

impl Builder {
    pub fn new(config: RagConfig) -> Self {
        Self {
            config,
            model: None,
            retriever: None,
            conversations: None,
            profiles: None,
            steps: Vec::new(),
            edges: None,
        }
    }

    pub fn with_model(mut self, model: Arc<dyn Model>) -> Self {
        self.model = Some(model);
        self
    }

    pub fn with_retriever(mut self, retriever: Arc<dyn Retriever>) -> Self {
        self.retriever = Some(retriever);
        self
    }

    pub fn with_conversation_store(mut self, store: Arc<dyn ConversationStore>) -> Self {
        self.conversations = Some(store);
        self
    }

    pub fn with_profile_store(mut self, store: Arc<dyn ProfileStore>) -> Self {
        self.profiles = Some(store);
        self
    }

    /// Replace the built-in step of the same name
    pub fn with_step(mut self, step: Arc<dyn Step>) -> Self {
        self.steps.push(step);
        self
    }

    /// Use a custom transition table instead of the standard graph
    pub fn with_edges(mut self, entry: StepName, edges: Vec<EdgeDef>) -> Self {
        self.edges = Some((entry, edges));
        self
    }

    pub async fn build(self) -> Result<Engine, RagError> {
        let config = self.config;
        config.validate()?;

        let model = match self.model {
            Some(model) => model,
            None => build_model(&config)?,
        };
        let retriever = match self.retriever {
            Some(retriever) => retriever,
            None => build_retriever(&config)?,
        };
        let conversations = match self.conversations {
            Some(store) => store,
            None => build_conversation_store(&config),
        };
        let profiles = match self.profiles {
            Some(store) => store,
            None => build_profile_store(&config)?,
        };

        let registry = StepRegistry::standard(&config.steps).await;
        for step in self.steps {
            log::info!("Overriding step: {}", step.name());
            registry.register(step).await;
        }

        let transitions = match self.edges {
            Some((entry, edges)) => TransitionTable::from_defs(entry, edges)?,
            None => TransitionTable::standard(&config.limits)?,
        };

        log::info!(
            "Built engine: model={} retriever={} max_rewrites={} max_regenerations={}",
            model.provider(),
            retriever.provider(),
            config.limits.max_rewrites,
            config.limits.max_regenerations
        );

        let context = StepContext::new(model, retriever, config.call_timeout());
        let engine = Engine::new(
            registry,
            transitions,
            context,
            conversations,
            profiles,
            config.limits,
        )
        .await?;
        Ok(engine.with_default_user(config.default_user))
    }
}

fn build_model(config: &RagConfig) -> Result<Arc<dyn Model>, RagError> {
    let settings = &config.model;
    let generation = GenerationConfig {
        temperature: Some(settings.temperature),
        ..Default::default()
    };
    let model: Arc<dyn Model> = match settings.provider {
        ModelProvider::Ollama => Arc::new(OllamaModel::new(
            settings.ollama_base_url.clone(),
            settings.chat_model.clone(),
            settings.embedding_model.clone(),
            generation,
        )),
        ModelProvider::OpenAI => Arc::new(OpenAIModel::new(
            settings.openai_api_key.clone().unwrap_or_default(),
            settings.openai_base_url.clone(),
            settings.chat_model.clone(),
            settings.embedding_model.clone(),
            generation,
        )?),
    };
    Ok(model)
}

fn build_retriever(config: &RagConfig) -> Result<Arc<dyn Retriever>, RagError> {
    match config.stores.retrieval {
        Backend::Supabase => Ok(Arc::new(SupabaseRetriever::new(
            config.supabase.url.clone(),
            config.supabase.private_key.clone(),
        )?)),
        Backend::Memory => {
            log::warn!("Using an empty in-memory document store");
            Ok(Arc::new(MemoryRetriever::new()))
        }
        Backend::File => Err(RagError::config("retrieval cannot use the file backend")),
    }
}

fn build_conversation_store(config: &RagConfig) -> Arc<dyn ConversationStore> {
    match config.stores.checkpoints {
        Backend::Memory => Arc::new(MemoryConversationStore::new()),
        _ => Arc::new(FileConversationStore::new(config.stores.state_dir.clone())),
    }
}

fn build_profile_store(config: &RagConfig) -> Result<Arc<dyn ProfileStore>, RagError> {
    match config.stores.profiles {
        Backend::Supabase => Ok(Arc::new(SupabaseProfileStore::new(
            config.supabase.url.clone(),
            config.supabase.private_key.clone(),
        )?)),
        _ => Ok(Arc::new(MemoryProfileStore::new())),
    }
}
