//! Task processors - the domain logic an agent runs for each task
//!
//! Information Hiding:
//! - Processing details hidden behind a single trait
//! - The agent core only sees capabilities and a result/failure
//! - Concrete variants are created by type tag through the registry

pub mod data_processing;
pub mod registry;

use crate::actors::messages::Task;
use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

/// Capability interface implemented by every agent variant
#[async_trait]
pub trait TaskProcessor: Send + Sync {
    /// Type tag of agents built around this processor
    fn agent_type(&self) -> &str;

    /// Capability names advertised for collaboration, fixed for the
    /// lifetime of the agent
    fn capabilities(&self) -> Vec<String>;

    /// Run one task to completion
    ///
    /// # Returns
    /// * `Ok(Value)` - result carried by the `completed` status
    /// * `Err(_)` - description carried by the `failed` status
    async fn process_task(&self, task: &Task) -> Result<Value>;
}

pub use data_processing::DataProcessingProcessor;
pub use registry::ProcessorRegistry;
