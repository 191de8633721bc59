//! Agent framework - creates, starts, stops and removes agents
//!
//! Information Hiding:
//! - Router and coordinator wiring hidden from callers
//! - Processor selection by type tag hidden behind the registry

use crate::actors::agent_actor::Agent;
use crate::actors::agent_builder::AgentBuilder;
use crate::actors::coordinator::CoordinatorHandle;
use crate::actors::message_router::MessageRouter;
use crate::actors::status::AgentStatusReport;
use crate::config::Settings;
use crate::error::{AgentError, Result};
use crate::processors::ProcessorRegistry;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

pub struct AgentFramework {
    settings: Settings,
    router: MessageRouter,
    coordinator: CoordinatorHandle,
    registry: ProcessorRegistry,
    agents: RwLock<HashMap<String, Agent>>,
}

impl AgentFramework {
    /// Must be called from within a Tokio runtime (spawns the coordinator)
    pub fn new(settings: Settings) -> Self {
        Self::with_registry(settings, ProcessorRegistry::with_defaults())
    }

    pub fn with_registry(settings: Settings, registry: ProcessorRegistry) -> Self {
        let router = MessageRouter::new();
        let coordinator = CoordinatorHandle::spawn(&router, settings.coordinator.clone());

        Self {
            settings,
            router,
            coordinator,
            registry,
            agents: RwLock::new(HashMap::new()),
        }
    }

    /// Create and start every agent listed in `settings.agents`.
    ///
    /// An agent that cannot be created is logged and skipped.
    pub async fn from_settings(settings: Settings) -> Self {
        let definitions = settings.agents.clone();
        let framework = Self::new(settings);

        for definition in definitions {
            let created = framework
                .create_agent(&definition.agent_type, &definition.id, &definition.config)
                .await;
            match created {
                Ok(_) => {
                    if let Err(e) = framework.start_agent(&definition.id).await {
                        tracing::error!("Failed to start agent {}: {}", definition.id, e);
                    }
                }
                Err(e) => tracing::error!("Failed to create agent {}: {}", definition.id, e),
            }
        }

        framework
    }

    pub fn router(&self) -> &MessageRouter {
        &self.router
    }

    pub fn coordinator(&self) -> &CoordinatorHandle {
        &self.coordinator
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub async fn create_agent(
        &self,
        agent_type: &str,
        agent_id: &str,
        config: &Value,
    ) -> Result<Agent> {
        let mut agents = self.agents.write().await;
        if agents.contains_key(agent_id) || self.router.is_registered(agent_id) {
            return Err(AgentError::DuplicateAgent(agent_id.to_string()));
        }

        let processor = self
            .registry
            .create(agent_type, config)
            .ok_or_else(|| AgentError::UnknownAgentType(agent_type.to_string()))?;

        let agent = AgentBuilder::from_shared(agent_id, processor, Arc::new(self.router.clone()))
            .config(self.settings.agent.with_overrides(config))
            .coordinator_id(self.coordinator.id())
            .build();

        self.router.register(agent_id, agent.mailbox());
        agents.insert(agent_id.to_string(), agent.clone());
        tracing::info!("Created agent {} of type {}", agent_id, agent_type);
        Ok(agent)
    }

    pub async fn start_agent(&self, agent_id: &str) -> Result<()> {
        self.agent_or_err(agent_id).await?.start()?;
        tracing::info!("Started agent {}", agent_id);
        Ok(())
    }

    pub async fn stop_agent(&self, agent_id: &str) -> Result<()> {
        self.agent_or_err(agent_id).await?.stop();
        tracing::info!("Stopped agent {}", agent_id);
        Ok(())
    }

    pub async fn remove_agent(&self, agent_id: &str) -> Result<()> {
        let agent = self
            .agents
            .write()
            .await
            .remove(agent_id)
            .ok_or_else(|| AgentError::AgentNotFound(agent_id.to_string()))?;

        agent.stop();
        self.router.unregister(agent_id);
        tracing::info!("Removed agent {}", agent_id);
        Ok(())
    }

    pub async fn agent(&self, agent_id: &str) -> Option<Agent> {
        self.agents.read().await.get(agent_id).cloned()
    }

    pub async fn agent_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.agents.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub async fn agent_status(&self, agent_id: &str) -> Result<AgentStatusReport> {
        Ok(self.agent_or_err(agent_id).await?.get_status())
    }

    pub async fn all_agents_status(&self) -> HashMap<String, AgentStatusReport> {
        self.agents
            .read()
            .await
            .iter()
            .map(|(id, agent)| (id.clone(), agent.get_status()))
            .collect()
    }

    /// Stop every agent and the coordinator
    pub async fn shutdown(&self) -> Result<()> {
        for agent in self.agents.read().await.values() {
            agent.stop();
        }
        self.coordinator.shutdown().await?;
        tracing::info!("Agent framework stopped");
        Ok(())
    }

    async fn agent_or_err(&self, agent_id: &str) -> Result<Agent> {
        self.agent(agent_id)
            .await
            .ok_or_else(|| AgentError::AgentNotFound(agent_id.to_string()))
    }
}

impl Drop for AgentFramework {
    /// Stop owned agents; their loops do not end with the last handle
    fn drop(&mut self) {
        for agent in self.agents.get_mut().values() {
            agent.stop();
        }
    }
}
