pub mod agent_actor;
pub mod agent_builder;
pub mod coordinator;
pub mod correlation;
pub mod message_router;
pub mod messages;
pub mod status;

pub use agent_actor::Agent;
pub use agent_builder::AgentBuilder;
pub use coordinator::{AgentLiveness, ClusterSnapshot, CoordinatorHandle};
pub use message_router::{Mailbox, MessageRouter, Transport};
