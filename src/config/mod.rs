mod settings;

pub use settings::{
    AgentConfig, AgentDefinition, CoordinatorConfig, LoggingConfig, Settings, COORDINATOR_ID,
};
