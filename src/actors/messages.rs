use crate::actors::status::AgentStats;
use crate::error::{AgentError, Result};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

/// Message type tag carried on the wire as a snake_case string
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    TaskAssignment,
    TaskStatus,
    CollaborationRequest,
    CollaborationResponse,
    Heartbeat,
    Error,
    /// Any tag this runtime does not understand. Dispatch logs and drops it.
    #[serde(other)]
    Unknown,
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            MessageType::TaskAssignment => "task_assignment",
            MessageType::TaskStatus => "task_status",
            MessageType::CollaborationRequest => "collaboration_request",
            MessageType::CollaborationResponse => "collaboration_response",
            MessageType::Heartbeat => "heartbeat",
            MessageType::Error => "error",
            MessageType::Unknown => "unknown",
        };
        f.write_str(tag)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Idle,
    Busy,
    Error,
    Maintenance,
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = match self {
            AgentStatus::Idle => "idle",
            AgentStatus::Busy => "busy",
            AgentStatus::Error => "error",
            AgentStatus::Maintenance => "maintenance",
        };
        f.write_str(status)
    }
}

/// A message exchanged between agents.
///
/// Fields are only readable after construction; the builder-style
/// `with_correlation_id` consumes the value, so a delivered message can
/// never be changed in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    message_id: String,
    from_agent_id: String,
    to_agent_id: String,
    message_type: MessageType,
    content: Value,
    timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    correlation_id: Option<String>,
}

impl Message {
    pub fn new(
        from_agent_id: impl Into<String>,
        to_agent_id: impl Into<String>,
        message_type: MessageType,
        content: Value,
    ) -> Self {
        Self {
            message_id: Uuid::new_v4().to_string(),
            from_agent_id: from_agent_id.into(),
            to_agent_id: to_agent_id.into(),
            message_type,
            content,
            timestamp: Utc::now(),
            correlation_id: None,
        }
    }

    pub fn with_correlation_id(mut self, correlation_id: Option<String>) -> Self {
        self.correlation_id = correlation_id;
        self
    }

    pub fn message_id(&self) -> &str {
        &self.message_id
    }

    pub fn from_agent_id(&self) -> &str {
        &self.from_agent_id
    }

    pub fn to_agent_id(&self) -> &str {
        &self.to_agent_id
    }

    pub fn message_type(&self) -> MessageType {
        self.message_type
    }

    pub fn content(&self) -> &Value {
        &self.content
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn correlation_id(&self) -> Option<&str> {
        self.correlation_id.as_deref()
    }

    /// Decode the payload into the content record its message type carries
    pub fn decode<T: MessageContent>(&self) -> Result<T> {
        if self.message_type != T::MESSAGE_TYPE {
            return Err(AgentError::UnexpectedMessageType {
                expected: T::MESSAGE_TYPE,
                actual: self.message_type,
            });
        }
        serde_json::from_value(self.content.clone())
            .map_err(|e| AgentError::invalid_content(T::KIND, e))
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }
}

/// Typed payload bound to the message type that carries it
pub trait MessageContent: Serialize + DeserializeOwned {
    const MESSAGE_TYPE: MessageType;
    const KIND: &'static str;

    fn encode(&self) -> Result<Value> {
        serde_json::to_value(self).map_err(|e| AgentError::invalid_content(Self::KIND, e))
    }
}

fn default_priority() -> i64 {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskAssignment {
    pub task_id: String,
    pub task_type: String,
    #[serde(default)]
    pub task_data: Value,
    #[serde(default = "default_priority")]
    pub priority: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,
}

impl TaskAssignment {
    pub fn new(task_id: impl Into<String>, task_type: impl Into<String>, task_data: Value) -> Self {
        Self {
            task_id: task_id.into(),
            task_type: task_type.into(),
            task_data,
            priority: default_priority(),
            deadline: None,
            dependencies: Vec::new(),
        }
    }

    pub fn with_priority(mut self, priority: i64) -> Self {
        self.priority = priority;
        self
    }
}

impl MessageContent for TaskAssignment {
    const MESSAGE_TYPE: MessageType = MessageType::TaskAssignment;
    const KIND: &'static str = "task assignment";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    Started,
    Rejected,
    Completed,
    Failed,
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TaskState::Started)
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self {
            TaskState::Started => "started",
            TaskState::Rejected => "rejected",
            TaskState::Completed => "completed",
            TaskState::Failed => "failed",
        };
        f.write_str(state)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStatusUpdate {
    pub task_id: String,
    pub status: TaskState,
    #[serde(default)]
    pub result: Value,
}

impl MessageContent for TaskStatusUpdate {
    const MESSAGE_TYPE: MessageType = MessageType::TaskStatus;
    const KIND: &'static str = "task status";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollaborationRequest {
    pub task_id: String,
    pub required_capability: String,
}

impl MessageContent for CollaborationRequest {
    const MESSAGE_TYPE: MessageType = MessageType::CollaborationRequest;
    const KIND: &'static str = "collaboration request";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollaborationResponse {
    pub task_id: String,
    pub can_collaborate: bool,
    #[serde(default)]
    pub response_data: Value,
}

impl MessageContent for CollaborationResponse {
    const MESSAGE_TYPE: MessageType = MessageType::CollaborationResponse;
    const KIND: &'static str = "collaboration response";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartbeatReport {
    pub agent_id: String,
    pub status: AgentStatus,
    pub capabilities: Vec<String>,
    pub stats: AgentStats,
}

impl MessageContent for HeartbeatReport {
    const MESSAGE_TYPE: MessageType = MessageType::Heartbeat;
    const KIND: &'static str = "heartbeat";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorReport {
    pub error: String,
    pub agent_id: String,
}

impl MessageContent for ErrorReport {
    const MESSAGE_TYPE: MessageType = MessageType::Error;
    const KIND: &'static str = "error";
}

/// A unit of work owned by the agent executing it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub task_id: String,
    pub task_type: String,
    pub task_data: Value,
    pub priority: i64,
    pub created_at: DateTime<Utc>,
    pub deadline: Option<DateTime<Utc>>,
    pub dependencies: Vec<String>,
}

impl Task {
    /// Build the task described by an assignment; creation time is the
    /// timestamp of the message that carried it.
    pub fn from_assignment(assignment: TaskAssignment, created_at: DateTime<Utc>) -> Self {
        Self {
            task_id: assignment.task_id,
            task_type: assignment.task_type,
            task_data: assignment.task_data,
            priority: assignment.priority,
            created_at,
            deadline: assignment.deadline,
            dependencies: assignment.dependencies,
        }
    }
}
