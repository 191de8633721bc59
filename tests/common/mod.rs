//! Shared processors and helpers for the integration tests

#![allow(dead_code)]

use anyhow::bail;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use taskmesh::{Agent, AgentBuilder, Message, MessageRouter, Task, TaskProcessor, Transport};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::Notify;
use tokio::time::{sleep, timeout, Duration};

/// Echoes the task data back; fails when `task_data.fail` is true
pub struct EchoProcessor {
    pub capabilities: Vec<String>,
}

impl EchoProcessor {
    pub fn new(capabilities: &[&str]) -> Self {
        Self {
            capabilities: capabilities.iter().map(|c| c.to_string()).collect(),
        }
    }
}

#[async_trait]
impl TaskProcessor for EchoProcessor {
    fn agent_type(&self) -> &str {
        "echo"
    }

    fn capabilities(&self) -> Vec<String> {
        self.capabilities.clone()
    }

    async fn process_task(&self, task: &Task) -> anyhow::Result<Value> {
        if task.task_data.get("fail").and_then(Value::as_bool) == Some(true) {
            bail!("boom: {}", task.task_id);
        }
        Ok(json!({ "echo": task.task_data }))
    }
}

/// Blocks each task until the gate is opened
pub struct GatedProcessor {
    pub gate: Arc<Notify>,
    pub capabilities: Vec<String>,
}

#[async_trait]
impl TaskProcessor for GatedProcessor {
    fn agent_type(&self) -> &str {
        "gated"
    }

    fn capabilities(&self) -> Vec<String> {
        self.capabilities.clone()
    }

    async fn process_task(&self, task: &Task) -> anyhow::Result<Value> {
        self.gate.notified().await;
        Ok(json!({ "released": task.task_id }))
    }
}

/// Returns the task it was given
pub struct RecordingProcessor;

#[async_trait]
impl TaskProcessor for RecordingProcessor {
    fn agent_type(&self) -> &str {
        "recording"
    }

    fn capabilities(&self) -> Vec<String> {
        vec![]
    }

    async fn process_task(&self, task: &Task) -> anyhow::Result<Value> {
        Ok(serde_json::to_value(task)?)
    }
}

pub struct PanickingProcessor;

#[async_trait]
impl TaskProcessor for PanickingProcessor {
    fn agent_type(&self) -> &str {
        "panicking"
    }

    fn capabilities(&self) -> Vec<String> {
        vec![]
    }

    async fn process_task(&self, _task: &Task) -> anyhow::Result<Value> {
        panic!("processor exploded");
    }
}

/// Register `processor` as agent `id` on `router` with test-friendly timings and start it
pub fn spawn_agent<P>(router: &MessageRouter, id: &str, processor: P) -> Agent
where
    P: TaskProcessor + 'static,
{
    let agent = AgentBuilder::new(id, processor, router.clone())
        .poll_interval_ms(10)
        .heartbeat_interval_ms(60_000)
        .build();
    router.register(id, agent.mailbox());
    agent.start().unwrap();
    agent
}

pub async fn deliver(router: &MessageRouter, message: Message) {
    router.deliver(message).await.unwrap();
}

pub async fn next_message(inbox: &mut UnboundedReceiver<Message>) -> Message {
    timeout(Duration::from_secs(2), inbox.recv())
        .await
        .expect("timed out waiting for a message")
        .expect("mailbox closed")
}

/// Assert nothing arrives within `millis`
pub async fn assert_silent(inbox: &mut UnboundedReceiver<Message>, millis: u64) {
    if let Ok(Some(message)) = timeout(Duration::from_millis(millis), inbox.recv()).await {
        panic!("unexpected message: {:?}", message);
    }
}

pub async fn wait_until(condition: impl Fn() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached within 2s");
}
