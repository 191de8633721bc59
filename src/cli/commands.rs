use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "taskmesh")]
#[command(author, version, about = "Multi-agent task execution runtime", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start every agent defined in a config file and run until Ctrl+C
    Run {
        /// JSON/TOML file with an `agents` list and optional timing overrides
        config: PathBuf,

        /// Print the cluster view every N seconds
        #[arg(short, long)]
        watch: Option<u64>,
    },

    /// Run a single task on a fresh in-process agent and print its statuses
    Submit {
        #[arg(short = 'a', long, default_value = "data_processing")]
        agent_type: String,

        #[arg(short = 't', long)]
        task_type: String,

        /// Task data as JSON, e.g. '{"data": [1, 2, 3]}'
        #[arg(short, long, default_value = "{}")]
        data: String,

        #[arg(long, default_value = "30")]
        timeout_secs: u64,
    },
}
