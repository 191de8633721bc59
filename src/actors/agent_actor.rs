//! Agent Actor - mailbox, dispatch loop, task lifecycle and heartbeats
//!
//! Information Hiding:
//! - Mailbox and dispatch loop are private to the agent
//! - Status and current task are only written by dispatch and execution
//! - Correlation table hidden behind `send_request`
//! - Processor internals never inspected; only result or failure

use crate::actors::correlation::CorrelationTable;
use crate::actors::message_router::{Mailbox, Transport};
use crate::actors::messages::*;
use crate::actors::status::{AgentStats, AgentStatusReport, PerformanceMetrics};
use crate::config::AgentConfig;
use crate::error::{AgentError, Result};
use crate::processors::TaskProcessor;
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
use tokio::time::{interval, timeout, Duration, Instant, MissedTickBehavior};
use tracing::{Instrument, Span};

/// Handle to one agent. Cloning shares the same agent.
///
/// The loops spawned by `start` hold their own reference, so dropping every
/// handle does not stop a running agent; call `stop` first.
#[derive(Clone)]
pub struct Agent {
    inner: Arc<AgentInner>,
}

struct AgentState {
    status: AgentStatus,
    current_task: Option<Task>,
    stats: AgentStats,
}

struct AgentInner {
    id: String,
    agent_type: String,
    capabilities: Vec<String>,
    config: AgentConfig,
    coordinator_id: String,
    processor: Arc<dyn TaskProcessor>,
    transport: Arc<dyn Transport>,
    span: Span,
    state: Mutex<AgentState>,
    correlations: CorrelationTable,
    mailbox: Mailbox,
    // Held by the dispatch loop for its whole lifetime, so a restarted loop
    // waits for the previous one to let go.
    inbox: tokio::sync::Mutex<UnboundedReceiver<Message>>,
    running: AtomicBool,
    generation: AtomicU64,
}

impl Agent {
    pub(crate) fn new(
        id: String,
        config: AgentConfig,
        coordinator_id: String,
        processor: Arc<dyn TaskProcessor>,
        transport: Arc<dyn Transport>,
        span: Option<Span>,
    ) -> Self {
        let agent_type = processor.agent_type().to_string();
        let mut capabilities: Vec<String> = Vec::new();
        for capability in processor.capabilities() {
            if !capabilities.contains(&capability) {
                capabilities.push(capability);
            }
        }
        let span = span.unwrap_or_else(
            || tracing::info_span!("agent", agent_id = %id, agent_type = %agent_type),
        );
        let (mailbox, inbox) = unbounded_channel();

        Self {
            inner: Arc::new(AgentInner {
                correlations: CorrelationTable::new(id.clone()),
                id,
                agent_type,
                capabilities,
                config,
                coordinator_id,
                processor,
                transport,
                span,
                state: Mutex::new(AgentState {
                    status: AgentStatus::Idle,
                    current_task: None,
                    stats: AgentStats::default(),
                }),
                mailbox,
                inbox: tokio::sync::Mutex::new(inbox),
                running: AtomicBool::new(false),
                generation: AtomicU64::new(0),
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn agent_type(&self) -> &str {
        &self.inner.agent_type
    }

    pub fn capabilities(&self) -> &[String] {
        &self.inner.capabilities
    }

    pub fn config(&self) -> &AgentConfig {
        &self.inner.config
    }

    /// Sending half of this agent's mailbox, for registration with a router
    pub fn mailbox(&self) -> Mailbox {
        self.inner.mailbox.clone()
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    pub fn status(&self) -> AgentStatus {
        self.inner.state().status
    }

    pub fn current_task_id(&self) -> Option<String> {
        self.inner
            .state()
            .current_task
            .as_ref()
            .map(|task| task.task_id.clone())
    }

    pub fn stats(&self) -> AgentStats {
        self.inner.state().stats.clone()
    }

    /// Number of requests still waiting for a response
    pub fn pending_requests(&self) -> usize {
        self.inner.correlations.len()
    }

    pub fn get_status(&self) -> AgentStatusReport {
        let state = self.inner.state();
        AgentStatusReport {
            agent_id: self.inner.id.clone(),
            agent_type: self.inner.agent_type.clone(),
            status: state.status,
            capabilities: self.inner.capabilities.clone(),
            current_task: state.current_task.as_ref().map(|t| t.task_id.clone()),
            stats: state.stats.clone(),
        }
    }

    pub fn get_performance_metrics(&self) -> PerformanceMetrics {
        PerformanceMetrics::from_stats(&self.inner.id, &self.inner.state().stats)
    }

    /// Activate the dispatch and heartbeat loops.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&self) -> Result<()> {
        let inner = &self.inner;
        if inner.running.swap(true, Ordering::SeqCst) {
            return Err(AgentError::AlreadyRunning(inner.id.clone()));
        }
        let generation = inner.generation.fetch_add(1, Ordering::SeqCst) + 1;

        {
            let mut state = inner.state();
            state.status = if state.current_task.is_some() {
                AgentStatus::Busy
            } else {
                AgentStatus::Idle
            };
        }

        inner.span.in_scope(|| {
            tracing::info!("Starting agent {} of type {}", inner.id, inner.agent_type);
        });

        tokio::spawn(
            Arc::clone(inner)
                .dispatch_loop(generation)
                .instrument(inner.span.clone()),
        );
        tokio::spawn(
            Arc::clone(inner)
                .heartbeat_loop(generation)
                .instrument(inner.span.clone()),
        );

        Ok(())
    }

    /// Deactivate both loops; they exit at their next polling point.
    ///
    /// An in-flight task is not cancelled. It finishes, reports, and moves
    /// the agent to Maintenance instead of Idle.
    pub fn stop(&self) {
        let inner = &self.inner;
        if !inner.running.swap(false, Ordering::SeqCst) {
            return;
        }
        inner.span.in_scope(|| tracing::info!("Stopping agent {}", inner.id));

        let mut state = inner.state();
        if state.status != AgentStatus::Busy {
            state.status = AgentStatus::Maintenance;
        }
    }

    /// Send a message through the transport; returns what was sent
    pub async fn send_message(
        &self,
        to_agent_id: &str,
        message_type: MessageType,
        content: Value,
        correlation_id: Option<String>,
    ) -> Result<Message> {
        self.inner
            .send(to_agent_id, message_type, content, correlation_id)
            .await
    }

    /// Send a message and wait up to `limit` for the reply correlated to it.
    ///
    /// `Ok(None)` means no reply arrived in time; the correlation entry is
    /// gone by the time this returns on every path.
    pub async fn send_request(
        &self,
        to_agent_id: &str,
        message_type: MessageType,
        content: Value,
        limit: Duration,
    ) -> Result<Option<Message>> {
        let inner = &self.inner;
        let pending = inner.correlations.register();
        let correlation_id = pending.id().to_string();

        inner
            .send(to_agent_id, message_type, content, Some(correlation_id.clone()))
            .instrument(inner.span.clone())
            .await?;

        let response = pending.wait(limit).await;
        if response.is_none() {
            inner.span.in_scope(|| {
                tracing::warn!(
                    "Request {} to {} timed out after {:?}",
                    correlation_id,
                    to_agent_id,
                    limit
                );
            });
        }
        Ok(response)
    }

    /// `send_request` with the configured default timeout
    pub async fn request(
        &self,
        to_agent_id: &str,
        message_type: MessageType,
        content: Value,
    ) -> Result<Option<Message>> {
        let limit = self.inner.config.request_timeout();
        self.send_request(to_agent_id, message_type, content, limit)
            .await
    }
}

impl AgentInner {
    fn state(&self) -> MutexGuard<'_, AgentState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_active(&self, generation: u64) -> bool {
        self.running.load(Ordering::SeqCst) && self.generation.load(Ordering::SeqCst) == generation
    }

    async fn dispatch_loop(self: Arc<Self>, generation: u64) {
        let mut inbox = self.inbox.lock().await;
        let poll_interval = self.config.poll_interval();
        tracing::debug!("Dispatch loop started");

        while self.is_active(generation) {
            match timeout(poll_interval, inbox.recv()).await {
                Ok(Some(message)) => self.process_message(message).await,
                Ok(None) => {
                    tracing::info!("Mailbox closed, dispatch loop exiting");
                    break;
                }
                Err(_) => continue,
            }
        }

        tracing::debug!("Dispatch loop stopped");
    }

    async fn heartbeat_loop(self: Arc<Self>, generation: u64) {
        let mut ticker = interval(self.config.heartbeat_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            if !self.is_active(generation) {
                break;
            }
            if let Err(e) = self.send_heartbeat().await {
                tracing::error!("Error sending heartbeat: {}", e);
            }
        }

        tracing::debug!("Heartbeat loop stopped");
    }

    async fn send_heartbeat(&self) -> Result<()> {
        let report = {
            let state = self.state();
            HeartbeatReport {
                agent_id: self.id.clone(),
                status: state.status,
                capabilities: self.capabilities.clone(),
                stats: state.stats.clone(),
            }
        };
        let coordinator = self.coordinator_id.clone();

        self.send(&coordinator, MessageType::Heartbeat, report.encode()?, None)
            .await?;
        self.state().stats.last_heartbeat = Some(Utc::now());
        tracing::trace!("Heartbeat sent to {}", coordinator);
        Ok(())
    }

    async fn process_message(self: &Arc<Self>, message: Message) {
        self.state().stats.messages_received += 1;
        tracing::debug!(
            "Received {} message {} from {}",
            message.message_type(),
            message.message_id(),
            message.from_agent_id()
        );

        let sender = message.from_agent_id().to_string();
        let correlation_id = message.correlation_id().map(str::to_string);
        let message_type = message.message_type();

        let outcome = match message_type {
            MessageType::TaskAssignment => self.handle_task_assignment(message).await,
            MessageType::TaskStatus => self.handle_task_status(message),
            MessageType::CollaborationRequest => self.handle_collaboration_request(message).await,
            MessageType::CollaborationResponse => self.handle_collaboration_response(message),
            MessageType::Heartbeat => self.handle_heartbeat(message),
            MessageType::Error => self.handle_error(message),
            MessageType::Unknown => {
                tracing::warn!("No handler for message type from {}, dropping", sender);
                Ok(())
            }
        };

        if let Err(e) = outcome {
            tracing::error!("Error handling {} message: {}", message_type, e);
            if let Err(send_err) = self.send_error(&sender, &e.to_string(), correlation_id).await {
                tracing::error!("Failed to report error to {}: {}", sender, send_err);
            }
        }
    }

    async fn handle_task_assignment(self: &Arc<Self>, message: Message) -> Result<()> {
        let assignment: TaskAssignment = message.decode()?;
        let requester = message.from_agent_id().to_string();
        let correlation_id = message.correlation_id().map(str::to_string);

        let rejection = {
            let mut state = self.state();
            if state.status == AgentStatus::Idle && self.running.load(Ordering::SeqCst) {
                let task = Task::from_assignment(assignment.clone(), message.timestamp());
                state.current_task = Some(task.clone());
                state.status = AgentStatus::Busy;
                drop(state);

                tracing::info!("Accepted task {} ({})", task.task_id, task.task_type);
                tokio::spawn(
                    Arc::clone(self)
                        .execute_task(requester, task, correlation_id)
                        .instrument(self.span.clone()),
                );
                return Ok(());
            }
            match state.status {
                AgentStatus::Busy => "Agent is busy".to_string(),
                other => format!("Agent is {}", other),
            }
        };

        tracing::info!("Rejecting task {}: {}", assignment.task_id, rejection);
        self.send_task_status(
            &requester,
            &assignment.task_id,
            TaskState::Rejected,
            json!({ "reason": rejection }),
            correlation_id,
        )
        .await
    }

    async fn execute_task(
        self: Arc<Self>,
        requester: String,
        task: Task,
        correlation_id: Option<String>,
    ) {
        let _active = ActiveTask {
            agent: Arc::clone(&self),
        };
        let started_at = Instant::now();
        let task_id = task.task_id.clone();

        if let Err(e) = self
            .send_task_status(
                &requester,
                &task_id,
                TaskState::Started,
                json!({}),
                correlation_id.clone(),
            )
            .await
        {
            tracing::warn!("Could not report start of task {}: {}", task_id, e);
        }

        // Run the processor in its own task so a panic surfaces as a JoinError
        let processor = Arc::clone(&self.processor);
        let outcome = tokio::spawn(async move { processor.process_task(&task).await }).await;

        let (state, result) = match outcome {
            Ok(Ok(result)) => {
                let elapsed = started_at.elapsed().as_secs_f64();
                {
                    let mut state = self.state();
                    state.stats.tasks_completed += 1;
                    state.stats.total_processing_time += elapsed;
                }
                tracing::info!("Task {} completed in {:.3}s", task_id, elapsed);
                (TaskState::Completed, result)
            }
            Ok(Err(e)) => {
                self.state().stats.tasks_failed += 1;
                tracing::error!("Error executing task {}: {:#}", task_id, e);
                (TaskState::Failed, json!({ "error": format!("{:#}", e) }))
            }
            Err(join_error) => {
                self.state().stats.tasks_failed += 1;
                tracing::error!("Task {} processor aborted: {}", task_id, join_error);
                (
                    TaskState::Failed,
                    json!({ "error": format!("task processor aborted: {}", join_error) }),
                )
            }
        };

        if let Err(e) = self
            .send_task_status(&requester, &task_id, state, result, correlation_id)
            .await
        {
            tracing::warn!("Could not report {} for task {}: {}", state, task_id, e);
        }
    }

    fn handle_task_status(&self, message: Message) -> Result<()> {
        self.resolve_or_drop(message);
        Ok(())
    }

    async fn handle_collaboration_request(&self, message: Message) -> Result<()> {
        let request: CollaborationRequest = message.decode()?;
        let available = self.state().status == AgentStatus::Idle
            && self.capabilities.contains(&request.required_capability);

        let response = if available {
            CollaborationResponse {
                task_id: request.task_id,
                can_collaborate: true,
                response_data: json!({
                    "agentId": self.id,
                    "capability": request.required_capability,
                }),
            }
        } else {
            CollaborationResponse {
                task_id: request.task_id,
                can_collaborate: false,
                response_data: json!({ "reason": "Capability not available or agent busy" }),
            }
        };

        self.send(
            message.from_agent_id(),
            MessageType::CollaborationResponse,
            response.encode()?,
            message.correlation_id().map(str::to_string),
        )
        .await?;
        Ok(())
    }

    fn handle_collaboration_response(&self, message: Message) -> Result<()> {
        self.resolve_or_drop(message);
        Ok(())
    }

    fn handle_heartbeat(&self, message: Message) -> Result<()> {
        tracing::debug!("Heartbeat from {}: {}", message.from_agent_id(), message.content());
        Ok(())
    }

    fn handle_error(&self, message: Message) -> Result<()> {
        tracing::error!(
            "Received error from {}: {}",
            message.from_agent_id(),
            message.content()
        );
        if message.correlation_id().is_some() {
            self.correlations.resolve(message);
        }
        Ok(())
    }

    /// Deliver a reply to its waiter; uncorrelated or expired replies are dropped
    fn resolve_or_drop(&self, message: Message) {
        match message.correlation_id().map(str::to_string) {
            Some(id) => {
                if !self.correlations.resolve(message) {
                    tracing::debug!("No pending request for correlation id {}, dropping", id);
                }
            }
            None => tracing::debug!(
                "Uncorrelated {} from {}: {}",
                message.message_type(),
                message.from_agent_id(),
                message.content()
            ),
        }
    }

    async fn send(
        &self,
        to_agent_id: &str,
        message_type: MessageType,
        content: Value,
        correlation_id: Option<String>,
    ) -> Result<Message> {
        let message = Message::new(&self.id, to_agent_id, message_type, content)
            .with_correlation_id(correlation_id);

        self.transport.deliver(message.clone()).await?;
        self.state().stats.messages_sent += 1;
        Ok(message)
    }

    async fn send_task_status(
        &self,
        to_agent_id: &str,
        task_id: &str,
        status: TaskState,
        result: Value,
        correlation_id: Option<String>,
    ) -> Result<()> {
        let update = TaskStatusUpdate {
            task_id: task_id.to_string(),
            status,
            result,
        };
        self.send(to_agent_id, MessageType::TaskStatus, update.encode()?, correlation_id)
            .await?;
        Ok(())
    }

    async fn send_error(
        &self,
        to_agent_id: &str,
        error: &str,
        correlation_id: Option<String>,
    ) -> Result<()> {
        let report = ErrorReport {
            error: error.to_string(),
            agent_id: self.id.clone(),
        };
        self.send(to_agent_id, MessageType::Error, report.encode()?, correlation_id)
            .await?;
        Ok(())
    }
}

/// Clears the current task when execution ends, on every exit path
struct ActiveTask {
    agent: Arc<AgentInner>,
}

impl Drop for ActiveTask {
    fn drop(&mut self) {
        let mut state = self.agent.state();
        state.current_task = None;
        state.status = if self.agent.running.load(Ordering::SeqCst) {
            AgentStatus::Idle
        } else {
            AgentStatus::Maintenance
        };
    }
}
