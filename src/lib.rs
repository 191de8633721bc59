//! Taskmesh - actor-based multi-agent task execution runtime
//!
//! Agents own a mailbox, run one task at a time through a pluggable
//! processor, answer collaboration requests, correlate request/response
//! pairs and report liveness to a coordinator.

pub mod actors;
pub mod cli;
pub mod config;
pub mod error;
pub mod framework;
pub mod processors;
pub mod utils;

pub use actors::messages::{
    AgentStatus, CollaborationRequest, CollaborationResponse, ErrorReport, HeartbeatReport,
    Message, MessageContent, MessageType, Task, TaskAssignment, TaskState, TaskStatusUpdate,
};
pub use actors::status::{AgentStats, AgentStatusReport, PerformanceMetrics};
pub use actors::{Agent, AgentBuilder, ClusterSnapshot, CoordinatorHandle, MessageRouter, Transport};
pub use config::Settings;
pub use error::AgentError;
pub use framework::AgentFramework;
pub use processors::{DataProcessingProcessor, ProcessorRegistry, TaskProcessor};
