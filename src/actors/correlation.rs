//! Correlation table for request/response
//!
//! Each pending request owns a oneshot channel keyed by its correlation id.
//! Resolution removes the entry before sending, so an id can be delivered
//! at most once; the `PendingResponse` guard removes the entry on every
//! other exit path (timeout, send failure, caller dropping the future).

use crate::actors::messages::Message;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::oneshot;
use tokio::time::{timeout, Duration};

pub struct CorrelationTable {
    owner: String,
    counter: AtomicU64,
    pending: Mutex<HashMap<String, oneshot::Sender<Message>>>,
}

impl CorrelationTable {
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            counter: AtomicU64::new(0),
            pending: Mutex::new(HashMap::new()),
        }
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, oneshot::Sender<Message>>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Allocate a fresh correlation id and a waiter for it
    pub fn register(&self) -> PendingResponse<'_> {
        let sequence = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        let id = format!("{}-{}", self.owner, sequence);
        let (tx, rx) = oneshot::channel();
        self.entries().insert(id.clone(), tx);

        PendingResponse {
            table: self,
            id,
            receiver: Some(rx),
        }
    }

    /// Hand `message` to the waiter registered under its correlation id.
    ///
    /// Returns false when the message has no correlation id, when nothing
    /// is waiting (never registered, expired, or already resolved), or
    /// when the waiter went away between removal and delivery.
    pub fn resolve(&self, message: Message) -> bool {
        let Some(id) = message.correlation_id() else {
            return false;
        };
        let waiter = self.entries().remove(id);
        match waiter {
            Some(tx) => tx.send(message).is_ok(),
            None => false,
        }
    }

    pub fn cancel(&self, id: &str) -> bool {
        self.entries().remove(id).is_some()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}

/// A registered waiter. Dropping it removes its table entry.
pub struct PendingResponse<'a> {
    table: &'a CorrelationTable,
    id: String,
    receiver: Option<oneshot::Receiver<Message>>,
}

impl PendingResponse<'_> {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Wait up to `limit` for the response. `None` on timeout.
    pub async fn wait(mut self, limit: Duration) -> Option<Message> {
        let mut receiver = self.receiver.take()?;
        match timeout(limit, &mut receiver).await {
            Ok(Ok(message)) => Some(message),
            Ok(Err(_)) => None,
            Err(_) => {
                self.table.cancel(&self.id);
                // A resolve that won the race against the timer already
                // removed the entry; its message is still in the channel.
                receiver.try_recv().ok()
            }
        }
    }
}

impl Drop for PendingResponse<'_> {
    fn drop(&mut self) {
        self.table.cancel(&self.id);
    }
}
