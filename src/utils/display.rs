use crate::actors::coordinator::ClusterSnapshot;
use crate::actors::messages::{AgentStatus, TaskState, TaskStatusUpdate};
use crate::actors::status::{AgentStatusReport, PerformanceMetrics};
use colored::*;

pub fn print_header(text: &str) {
    println!("\n{}", text.bright_cyan().bold());
    println!("{}", "=".repeat(text.len()).bright_cyan());
}

pub fn print_success(text: &str) {
    println!("{}", text.green());
}

pub fn print_error(text: &str) {
    eprintln!("{}", text.red().bold());
}

pub fn print_info(text: &str) {
    println!("{}", text.blue());
}

fn colored_status(status: AgentStatus) -> ColoredString {
    let label = status.to_string();
    match status {
        AgentStatus::Idle => label.green(),
        AgentStatus::Busy => label.yellow(),
        AgentStatus::Error => label.red(),
        AgentStatus::Maintenance => label.bright_black(),
    }
}

pub fn print_agent_status(report: &AgentStatusReport) {
    println!(
        "  {} [{}] {} tasks: {}/{} capabilities: {}",
        report.agent_id.bold(),
        report.agent_type,
        colored_status(report.status),
        report.stats.tasks_completed,
        report.stats.tasks_completed + report.stats.tasks_failed,
        report.capabilities.join(", ")
    );
    if let Some(task) = &report.current_task {
        println!("    working on {}", task.yellow());
    }
}

pub fn print_task_update(update: &TaskStatusUpdate) {
    let line = format!("  {} -> {}", update.task_id, update.status);
    match update.status {
        TaskState::Started => print_info(&line),
        TaskState::Completed => print_success(&line),
        TaskState::Rejected | TaskState::Failed => print_error(&line),
    }
}

pub fn print_metrics(metrics: &PerformanceMetrics) {
    println!(
        "  {}: completed {}, failed {}, avg {:.3}s, success {:.0}%, sent {}, received {}",
        metrics.agent_id.bold(),
        metrics.tasks_completed,
        metrics.tasks_failed,
        metrics.avg_processing_time,
        metrics.success_rate * 100.0,
        metrics.messages_sent,
        metrics.messages_received
    );
}

pub fn print_cluster(snapshot: &ClusterSnapshot) {
    if snapshot.agents.is_empty() {
        println!("  No agents have sent heartbeats yet.");
        return;
    }

    let mut ids: Vec<&String> = snapshot.agents.keys().collect();
    ids.sort();
    for id in ids {
        let liveness = &snapshot.agents[id];
        let alive = if liveness.alive {
            "alive".green()
        } else {
            "stale".red()
        };
        let elapsed = liveness.last_seen.elapsed();
        println!(
            "  {}: {} {} (last seen {:.1}s ago)",
            id,
            alive,
            colored_status(liveness.status),
            elapsed.as_secs_f64()
        );
    }
}
