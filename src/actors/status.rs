//! Status & metrics views over an agent's counters

use crate::actors::messages::AgentStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Counters accumulated by dispatch, task execution and heartbeats
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentStats {
    pub tasks_completed: u64,
    pub tasks_failed: u64,
    /// Seconds spent in successful task executions
    pub total_processing_time: f64,
    pub messages_sent: u64,
    pub messages_received: u64,
    pub last_heartbeat: Option<DateTime<Utc>>,
}

impl AgentStats {
    /// Mean seconds per completed task, zero when nothing completed
    pub fn avg_processing_time(&self) -> f64 {
        if self.tasks_completed == 0 {
            return 0.0;
        }
        self.total_processing_time / self.tasks_completed as f64
    }

    /// Fraction of terminal executions that completed, zero when none finished
    pub fn success_rate(&self) -> f64 {
        let finished = self.tasks_completed + self.tasks_failed;
        if finished == 0 {
            return 0.0;
        }
        self.tasks_completed as f64 / finished as f64
    }

    pub fn tasks_finished(&self) -> u64 {
        self.tasks_completed + self.tasks_failed
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentStatusReport {
    pub agent_id: String,
    pub agent_type: String,
    pub status: AgentStatus,
    pub capabilities: Vec<String>,
    pub current_task: Option<String>,
    pub stats: AgentStats,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceMetrics {
    pub agent_id: String,
    pub tasks_completed: u64,
    pub tasks_failed: u64,
    pub avg_processing_time: f64,
    pub success_rate: f64,
    pub messages_sent: u64,
    pub messages_received: u64,
    pub last_heartbeat: Option<DateTime<Utc>>,
}

impl PerformanceMetrics {
    pub fn from_stats(agent_id: impl Into<String>, stats: &AgentStats) -> Self {
        Self {
            agent_id: agent_id.into(),
            tasks_completed: stats.tasks_completed,
            tasks_failed: stats.tasks_failed,
            avg_processing_time: stats.avg_processing_time(),
            success_rate: stats.success_rate(),
            messages_sent: stats.messages_sent,
            messages_received: stats.messages_received,
            last_heartbeat: stats.last_heartbeat,
        }
    }
}
