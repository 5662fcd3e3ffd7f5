// SPDX-License-Identifier: MIT

use crate::rag::graph::StepName;
use crate::rag::steps::{
    CompressStep, GenerateStep, RetrieveStep, RewriteStep, RouteStep, Step, StepSettings,
    VerifyGroundingStep, VerifyUsefulnessStep,
};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Clone)]
pub struct StepRegistry {
    steps: Arc<RwLock<HashMap<StepName, Arc<dyn Step>>>>,
}

impl StepRegistry {
    pub fn new() -> Self {
        Self {
            steps: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Registry holding the built-in implementation of every step
    pub async fn standard(settings: &StepSettings) -> Self {
        let registry = Self::new();
        registry.register(Arc::new(RouteStep)).await;
        registry
            .register(Arc::new(RetrieveStep::new(settings.clone())))
            .await;
        registry.register(Arc::new(CompressStep)).await;
        registry
            .register(Arc::new(GenerateStep::new(settings.clone())))
            .await;
        registry.register(Arc::new(VerifyGroundingStep)).await;
        registry.register(Arc::new(VerifyUsefulnessStep)).await;
        registry.register(Arc::new(RewriteStep)).await;
        registry
    }

    /// Register a step, replacing any step with the same name
    pub async fn register(&self, step: Arc<dyn Step>) {
        let mut steps = self.steps.write().await;
        steps.insert(step.name(), step);
    }

    pub async fn get(&self, name: StepName) -> Option<Arc<dyn Step>> {
        let steps = self.steps.read().await;
        steps.get(&name).cloned()
    }

    pub async fn names(&self) -> HashSet<StepName> {
        let steps = self.steps.read().await;
        steps.keys().copied().collect()
    }
}

impl Default for StepRegistry {
    fn default() -> Self {
        Self::new()
    }
}
