//! Processor Registry
//!
//! Maps an agent type tag to the factory that builds its processor.

use super::TaskProcessor;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

pub type ProcessorFactory = Arc<dyn Fn(&Value) -> Arc<dyn TaskProcessor> + Send + Sync>;

#[derive(Clone)]
pub struct ProcessorRegistry {
    factories: HashMap<String, ProcessorFactory>,
}

impl ProcessorRegistry {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Register a factory for `agent_type`, replacing any previous one
    pub fn register<F>(&mut self, agent_type: impl Into<String>, factory: F)
    where
        F: Fn(&Value) -> Arc<dyn TaskProcessor> + Send + Sync + 'static,
    {
        let agent_type = agent_type.into();
        tracing::info!("Registering processor for agent type: {}", agent_type);
        self.factories.insert(agent_type, Arc::new(factory));
    }

    /// Build a processor for `agent_type` with its per-agent config
    pub fn create(&self, agent_type: &str, config: &Value) -> Option<Arc<dyn TaskProcessor>> {
        self.factories.get(agent_type).map(|factory| factory(config))
    }

    pub fn has_type(&self, agent_type: &str) -> bool {
        self.factories.contains_key(agent_type)
    }

    pub fn agent_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.factories.keys().cloned().collect();
        types.sort();
        types
    }

    /// Registry with the built-in processors
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(super::data_processing::AGENT_TYPE, |config| {
            Arc::new(super::DataProcessingProcessor::from_config(config))
        });
        registry
    }
}

impl Default for ProcessorRegistry {
    fn default() -> Self {
        Self::new()
    }
}
