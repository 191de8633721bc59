//! Message transport
//!
//! The agent core only needs "deliver this message to agent X". The
//! in-process `MessageRouter` provides that over unbounded mailboxes; a
//! broker-backed transport would implement the same trait.

use crate::actors::messages::Message;
use crate::error::{AgentError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

/// Sending half of an agent's inbound queue
pub type Mailbox = UnboundedSender<Message>;

#[async_trait]
pub trait Transport: Send + Sync {
    /// Enqueue `message` into the mailbox of its recipient
    async fn deliver(&self, message: Message) -> Result<()>;
}

/// In-process transport: a registry of mailboxes keyed by agent id
#[derive(Clone, Default)]
pub struct MessageRouter {
    mailboxes: Arc<RwLock<HashMap<String, Mailbox>>>,
}

impl MessageRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route messages for `agent_id` into `mailbox`, replacing any previous one
    pub fn register(&self, agent_id: impl Into<String>, mailbox: Mailbox) {
        let agent_id = agent_id.into();
        tracing::debug!("Registering mailbox for '{}'", agent_id);
        self.mailboxes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(agent_id, mailbox);
    }

    /// Create a fresh mailbox for `agent_id` and return its receiving half
    pub fn mailbox(&self, agent_id: impl Into<String>) -> UnboundedReceiver<Message> {
        let (tx, rx) = unbounded_channel();
        self.register(agent_id, tx);
        rx
    }

    pub fn unregister(&self, agent_id: &str) -> bool {
        let removed = self
            .mailboxes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(agent_id)
            .is_some();
        if removed {
            tracing::debug!("Unregistered mailbox for '{}'", agent_id);
        }
        removed
    }

    pub fn is_registered(&self, agent_id: &str) -> bool {
        self.mailboxes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(agent_id)
    }

    pub fn registered_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .mailboxes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        ids.sort();
        ids
    }
}

#[async_trait]
impl Transport for MessageRouter {
    async fn deliver(&self, message: Message) -> Result<()> {
        let recipient = message.to_agent_id().to_string();
        let mailbox = self
            .mailboxes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&recipient)
            .cloned()
            .ok_or_else(|| AgentError::UnknownRecipient(recipient.clone()))?;

        tracing::trace!(
            "Routing {} message {} from '{}' to '{}'",
            message.message_type(),
            message.message_id(),
            message.from_agent_id(),
            recipient
        );

        mailbox
            .send(message)
            .map_err(|_| AgentError::MailboxClosed(recipient))
    }
}
