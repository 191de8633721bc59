//! Coordinator - the well-known heartbeat sink
//!
//! Records the latest heartbeat of every agent, warns about agents that
//! went quiet, and answers snapshot queries.

use crate::actors::message_router::MessageRouter;
use crate::actors::messages::{AgentStatus, HeartbeatReport, Message, MessageType};
use crate::actors::status::AgentStats;
use crate::config::CoordinatorConfig;
use crate::error::{AgentError, Result};
use std::collections::HashMap;
use tokio::sync::mpsc::{channel, Receiver, Sender, UnboundedReceiver};
use tokio::sync::oneshot;
use tokio::time::{interval, Duration, Instant, MissedTickBehavior};

#[derive(Debug)]
enum CoordinatorCommand {
    Snapshot(oneshot::Sender<ClusterSnapshot>),
    Shutdown,
}

/// Latest known state of one agent
#[derive(Debug, Clone)]
pub struct AgentLiveness {
    pub status: AgentStatus,
    pub capabilities: Vec<String>,
    pub stats: AgentStats,
    pub last_seen: Instant,
    pub alive: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ClusterSnapshot {
    pub agents: HashMap<String, AgentLiveness>,
}

impl ClusterSnapshot {
    pub fn alive_count(&self) -> usize {
        self.agents.values().filter(|a| a.alive).count()
    }
}

pub struct CoordinatorHandle {
    id: String,
    sender: Sender<CoordinatorCommand>,
}

impl CoordinatorHandle {
    /// Register the coordinator's mailbox with `router` and spawn its actor
    pub fn spawn(router: &MessageRouter, config: CoordinatorConfig) -> Self {
        let inbox = router.mailbox(config.id.clone());
        let (sender, receiver) = channel(16);
        let id = config.id.clone();
        tokio::spawn(coordinator_actor(inbox, receiver, router.clone(), config));
        Self { id, sender }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub async fn snapshot(&self) -> Result<ClusterSnapshot> {
        let (response_tx, response_rx) = oneshot::channel();
        self.sender
            .send(CoordinatorCommand::Snapshot(response_tx))
            .await
            .map_err(|_| AgentError::CoordinatorUnavailable)?;
        response_rx
            .await
            .map_err(|_| AgentError::CoordinatorUnavailable)
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.sender
            .send(CoordinatorCommand::Shutdown)
            .await
            .map_err(|_| AgentError::CoordinatorUnavailable)
    }
}

async fn coordinator_actor(
    mut inbox: UnboundedReceiver<Message>,
    mut commands: Receiver<CoordinatorCommand>,
    router: MessageRouter,
    config: CoordinatorConfig,
) {
    let mut heartbeats: HashMap<String, AgentLiveness> = HashMap::new();
    let stale_after = config.stale_after();
    let mut check_timer = interval(config.check_interval());
    check_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

    tracing::info!("Coordinator '{}' started", config.id);

    loop {
        tokio::select! {
            Some(message) = inbox.recv() => record_message(&mut heartbeats, message),
            command = commands.recv() => match command {
                Some(CoordinatorCommand::Snapshot(response_tx)) => {
                    let _ = response_tx.send(create_snapshot(&heartbeats, stale_after));
                }
                Some(CoordinatorCommand::Shutdown) | None => {
                    tracing::info!("Coordinator received shutdown signal");
                    break;
                }
            },
            _ = check_timer.tick() => check_agent_health(&heartbeats, stale_after),
        }
    }

    router.unregister(&config.id);
    tracing::info!("Coordinator '{}' stopped", config.id);
}

fn record_message(heartbeats: &mut HashMap<String, AgentLiveness>, message: Message) {
    if message.message_type() != MessageType::Heartbeat {
        tracing::debug!(
            "Coordinator ignoring {} message from {}",
            message.message_type(),
            message.from_agent_id()
        );
        return;
    }

    match message.decode::<HeartbeatReport>() {
        Ok(report) => {
            tracing::debug!("Heartbeat received from {} ({})", report.agent_id, report.status);
            heartbeats.insert(
                report.agent_id,
                AgentLiveness {
                    status: report.status,
                    capabilities: report.capabilities,
                    stats: report.stats,
                    last_seen: Instant::now(),
                    alive: true,
                },
            );
        }
        Err(e) => {
            tracing::warn!("Bad heartbeat from {}: {}", message.from_agent_id(), e);
        }
    }
}

fn create_snapshot(
    heartbeats: &HashMap<String, AgentLiveness>,
    stale_after: Duration,
) -> ClusterSnapshot {
    let now = Instant::now();
    let agents = heartbeats
        .iter()
        .map(|(agent_id, liveness)| {
            let mut liveness = liveness.clone();
            liveness.alive = now.duration_since(liveness.last_seen) <= stale_after;
            (agent_id.clone(), liveness)
        })
        .collect();

    ClusterSnapshot { agents }
}

fn check_agent_health(heartbeats: &HashMap<String, AgentLiveness>, stale_after: Duration) {
    let now = Instant::now();
    for (agent_id, liveness) in heartbeats.iter() {
        let elapsed = now.duration_since(liveness.last_seen);
        if elapsed > stale_after {
            tracing::warn!(
                "Agent {} has not sent a heartbeat in {:?} (last status: {})",
                agent_id,
                elapsed,
                liveness.status
            );
        }
    }
}
