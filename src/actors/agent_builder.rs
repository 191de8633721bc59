//! Agent Builder - fluent construction of agents
//!
//! Information Hiding:
//! - Hides Arc wrapping of processor and transport
//! - Supplies default timings, coordinator id and logging span

use crate::actors::agent_actor::Agent;
use crate::actors::message_router::Transport;
use crate::config::{AgentConfig, COORDINATOR_ID};
use crate::processors::TaskProcessor;
use std::sync::Arc;
use tracing::Span;

/// Builder for an [`Agent`]
///
/// # Example
/// ```no_run
/// use taskmesh::{AgentBuilder, MessageRouter, DataProcessingProcessor};
///
/// # async fn demo() {
/// let router = MessageRouter::new();
/// let agent = AgentBuilder::new("dp-1", DataProcessingProcessor::new(), router.clone())
///     .heartbeat_interval_ms(5_000)
///     .build();
/// router.register(agent.id(), agent.mailbox());
/// agent.start().unwrap();
/// # }
/// ```
pub struct AgentBuilder {
    id: String,
    processor: Arc<dyn TaskProcessor>,
    transport: Arc<dyn Transport>,
    config: AgentConfig,
    coordinator_id: String,
    span: Option<Span>,
}

impl AgentBuilder {
    pub fn new<P, T>(id: impl Into<String>, processor: P, transport: T) -> Self
    where
        P: TaskProcessor + 'static,
        T: Transport + 'static,
    {
        Self::from_shared(id, Arc::new(processor), Arc::new(transport))
    }

    /// Same as `new` for an already shared processor and transport
    pub fn from_shared(
        id: impl Into<String>,
        processor: Arc<dyn TaskProcessor>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            id: id.into(),
            processor,
            transport,
            config: AgentConfig::default(),
            coordinator_id: COORDINATOR_ID.to_string(),
            span: None,
        }
    }

    pub fn config(mut self, config: AgentConfig) -> Self {
        self.config = config;
        self
    }

    pub fn heartbeat_interval_ms(mut self, millis: u64) -> Self {
        self.config.heartbeat_interval_ms = millis;
        self
    }

    pub fn poll_interval_ms(mut self, millis: u64) -> Self {
        self.config.poll_interval_ms = millis;
        self
    }

    pub fn request_timeout_ms(mut self, millis: u64) -> Self {
        self.config.request_timeout_ms = millis;
        self
    }

    /// Recipient of this agent's heartbeats
    pub fn coordinator_id(mut self, id: impl Into<String>) -> Self {
        self.coordinator_id = id.into();
        self
    }

    /// Span every log line of this agent is recorded under.
    ///
    /// Defaults to `agent{agent_id, agent_type}`.
    pub fn span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn build(self) -> Agent {
        Agent::new(
            self.id,
            self.config,
            self.coordinator_id,
            self.processor,
            self.transport,
            self.span,
        )
    }
}
