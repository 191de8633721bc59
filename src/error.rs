//! Error types for the agent runtime

use crate::actors::messages::MessageType;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("no mailbox registered for agent '{0}'")]
    UnknownRecipient(String),

    #[error("mailbox of agent '{0}' is closed")]
    MailboxClosed(String),

    #[error("malformed {kind} content: {source}")]
    InvalidContent {
        kind: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("expected a {expected} message, got {actual}")]
    UnexpectedMessageType {
        expected: MessageType,
        actual: MessageType,
    },

    #[error("agent '{0}' is already running")]
    AlreadyRunning(String),

    #[error("agent '{0}' already exists")]
    DuplicateAgent(String),

    #[error("unknown agent type: {0}")]
    UnknownAgentType(String),

    #[error("agent '{0}' not found")]
    AgentNotFound(String),

    #[error("coordinator is not running")]
    CoordinatorUnavailable,

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

impl AgentError {
    pub fn invalid_content(kind: &'static str, source: serde_json::Error) -> Self {
        Self::InvalidContent { kind, source }
    }
}

pub type Result<T, E = AgentError> = std::result::Result<T, E>;
