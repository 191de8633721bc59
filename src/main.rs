use anyhow::{Context, Result};
use clap::Parser;
use serde_json::Value;
use taskmesh::cli::{Cli, Commands};
use taskmesh::{utils, AgentFramework, Message, MessageContent, MessageType, Settings};
use taskmesh::{TaskAssignment, TaskStatusUpdate, Transport};
use tokio::time::{timeout, Duration};
use tracing_subscriber::EnvFilter;

const SUBMIT_CLIENT_ID: &str = "cli";
const SUBMIT_AGENT_ID: &str = "worker-1";

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let settings = match &cli.command {
        Commands::Run { config, .. } => Settings::from_file(config)
            .with_context(|| format!("Failed to load config file {}", config.display()))?,
        Commands::Submit { .. } => Settings::new()?,
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Run { watch, .. } => handle_run(settings, watch).await,
        Commands::Submit {
            agent_type,
            task_type,
            data,
            timeout_secs,
        } => handle_submit(settings, agent_type, task_type, data, timeout_secs).await,
    }
}

async fn handle_run(settings: Settings, watch: Option<u64>) -> Result<()> {
    let framework = AgentFramework::from_settings(settings).await;

    utils::print_header("Agents");
    let mut statuses: Vec<_> = framework.all_agents_status().await.into_values().collect();
    statuses.sort_by(|a, b| a.agent_id.cmp(&b.agent_id));
    for report in &statuses {
        utils::print_agent_status(report);
    }
    utils::print_info("Running (Ctrl+C to exit)");

    match watch {
        Some(secs) => {
            let mut ticker = tokio::time::interval(Duration::from_secs(secs.max(1)));
            loop {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => break,
                    _ = ticker.tick() => {
                        let snapshot = framework.coordinator().snapshot().await?;
                        utils::print_header("Cluster");
                        utils::print_cluster(&snapshot);
                    }
                }
            }
        }
        None => tokio::signal::ctrl_c().await?,
    }

    utils::print_info("Shutting down");
    framework.shutdown().await?;
    Ok(())
}

async fn handle_submit(
    settings: Settings,
    agent_type: String,
    task_type: String,
    data: String,
    timeout_secs: u64,
) -> Result<()> {
    let task_data: Value = serde_json::from_str(&data).context("--data must be valid JSON")?;

    let framework = AgentFramework::new(settings);
    framework
        .create_agent(&agent_type, SUBMIT_AGENT_ID, &Value::Null)
        .await?;
    framework.start_agent(SUBMIT_AGENT_ID).await?;
    let mut inbox = framework.router().mailbox(SUBMIT_CLIENT_ID);

    let assignment = TaskAssignment::new("cli-task-1", task_type, task_data);
    let message = Message::new(
        SUBMIT_CLIENT_ID,
        SUBMIT_AGENT_ID,
        MessageType::TaskAssignment,
        assignment.encode()?,
    );
    framework.router().deliver(message).await?;

    utils::print_header("Task");
    let deadline = Duration::from_secs(timeout_secs);
    loop {
        let message = match timeout(deadline, inbox.recv()).await {
            Ok(Some(message)) => message,
            Ok(None) => break,
            Err(_) => {
                utils::print_error("Timed out waiting for the agent");
                break;
            }
        };
        if message.message_type() != MessageType::TaskStatus {
            continue;
        }

        let update: TaskStatusUpdate = message.decode()?;
        utils::print_task_update(&update);
        if update.status.is_terminal() {
            println!("{}", serde_json::to_string_pretty(&update.result)?);
            break;
        }
    }

    if let Some(agent) = framework.agent(SUBMIT_AGENT_ID).await {
        utils::print_header("Metrics");
        utils::print_metrics(&agent.get_performance_metrics());
    }

    framework.shutdown().await?;
    Ok(())
}
