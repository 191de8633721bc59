//! Agent runtime scenarios: task lifecycle, collaboration, request/response
//! correlation and heartbeats, driven through the in-process router.

mod common;

use async_trait::async_trait;
use common::*;
use futures::future::join_all;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use taskmesh::{
    AgentBuilder, AgentError, AgentStatus, CollaborationRequest, CollaborationResponse,
    ErrorReport, HeartbeatReport, Message, MessageContent, MessageRouter, MessageType, Task,
    TaskAssignment, TaskState, TaskStatusUpdate, Transport,
};
use tokio::sync::Notify;
use tokio::time::{Duration, Instant};

fn assignment(to: &str, task_id: &str, task_data: Value) -> Message {
    let content = TaskAssignment::new(task_id, "x", task_data).encode().unwrap();
    Message::new("client", to, MessageType::TaskAssignment, content)
}

fn collaboration_request(to: &str, task_id: &str, capability: &str) -> Message {
    let content = CollaborationRequest {
        task_id: task_id.to_string(),
        required_capability: capability.to_string(),
    }
    .encode()
    .unwrap();
    Message::new("client", to, MessageType::CollaborationRequest, content)
}

fn status_of(message: &Message) -> TaskStatusUpdate {
    assert_eq!(message.message_type(), MessageType::TaskStatus);
    message.decode().unwrap()
}

#[tokio::test]
async fn test_idle_agent_runs_assigned_task() {
    let router = MessageRouter::new();
    let mut client = router.mailbox("client");
    let agent = spawn_agent(&router, "worker", EchoProcessor::new(&[]));

    deliver(&router, assignment("worker", "t1", json!({}))).await;

    let started = status_of(&next_message(&mut client).await);
    assert_eq!(started.task_id, "t1");
    assert_eq!(started.status, TaskState::Started);

    let completed = status_of(&next_message(&mut client).await);
    assert_eq!(completed.status, TaskState::Completed);
    assert_eq!(completed.result, json!({"echo": {}}));

    wait_until(|| agent.status() == AgentStatus::Idle).await;
    let stats = agent.stats();
    assert_eq!(stats.tasks_completed, 1);
    assert_eq!(stats.tasks_failed, 0);
    assert_eq!(stats.messages_received, 1);
    assert_eq!(stats.messages_sent, 2);
    assert!(agent.current_task_id().is_none());
}

#[tokio::test]
async fn test_busy_agent_rejects_second_assignment() {
    let router = MessageRouter::new();
    let mut client = router.mailbox("client");
    let gate = Arc::new(Notify::new());
    let agent = spawn_agent(
        &router,
        "worker",
        GatedProcessor {
            gate: gate.clone(),
            capabilities: vec![],
        },
    );

    deliver(&router, assignment("worker", "t1", json!({}))).await;
    assert_eq!(status_of(&next_message(&mut client).await).status, TaskState::Started);
    assert_eq!(agent.status(), AgentStatus::Busy);
    assert_eq!(agent.current_task_id().as_deref(), Some("t1"));

    deliver(&router, assignment("worker", "t2", json!({}))).await;
    let rejected = status_of(&next_message(&mut client).await);
    assert_eq!(rejected.task_id, "t2");
    assert_eq!(rejected.status, TaskState::Rejected);
    assert_eq!(rejected.result["reason"], "Agent is busy");
    assert_eq!(agent.current_task_id().as_deref(), Some("t1"));

    gate.notify_one();
    let completed = status_of(&next_message(&mut client).await);
    assert_eq!(completed.task_id, "t1");
    assert_eq!(completed.status, TaskState::Completed);

    // The rejected task is never queued for later
    assert_silent(&mut client, 100).await;
    assert_eq!(agent.stats().tasks_completed, 1);
}

#[tokio::test]
async fn test_processor_failure_reports_failed_and_resets() {
    let router = MessageRouter::new();
    let mut client = router.mailbox("client");
    let agent = spawn_agent(&router, "worker", EchoProcessor::new(&[]));

    deliver(&router, assignment("worker", "bad", json!({"fail": true}))).await;

    assert_eq!(status_of(&next_message(&mut client).await).status, TaskState::Started);
    let failed = status_of(&next_message(&mut client).await);
    assert_eq!(failed.status, TaskState::Failed);
    assert!(failed.result["error"].as_str().unwrap().contains("boom: bad"));

    wait_until(|| agent.status() == AgentStatus::Idle).await;
    assert_eq!(agent.stats().tasks_failed, 1);
    assert!(agent.current_task_id().is_none());
}

#[tokio::test]
async fn test_processor_panic_is_contained() {
    let router = MessageRouter::new();
    let mut client = router.mailbox("client");
    let agent = spawn_agent(&router, "worker", PanickingProcessor);

    deliver(&router, assignment("worker", "t1", json!({}))).await;

    assert_eq!(status_of(&next_message(&mut client).await).status, TaskState::Started);
    let failed = status_of(&next_message(&mut client).await);
    assert_eq!(failed.status, TaskState::Failed);

    wait_until(|| agent.status() == AgentStatus::Idle).await;
    assert!(agent.current_task_id().is_none());

    // Still serving
    deliver(&router, collaboration_request("worker", "c1", "x")).await;
    assert_eq!(
        next_message(&mut client).await.message_type(),
        MessageType::CollaborationResponse
    );
}

#[tokio::test]
async fn test_terminal_counts_match_finished_executions() {
    let router = MessageRouter::new();
    let mut client = router.mailbox("client");
    let agent = spawn_agent(&router, "worker", EchoProcessor::new(&[]));

    for (i, fail) in [false, true, false, true].into_iter().enumerate() {
        wait_until(|| agent.status() == AgentStatus::Idle).await;
        deliver(&router, assignment("worker", &format!("t{}", i), json!({"fail": fail}))).await;

        let mut started = 0;
        loop {
            let update = status_of(&next_message(&mut client).await);
            match update.status {
                TaskState::Started => started += 1,
                TaskState::Completed | TaskState::Failed => break,
                TaskState::Rejected => panic!("idle agent rejected a task"),
            }
        }
        assert_eq!(started, 1);
        assert_eq!(agent.stats().tasks_finished(), i as u64 + 1);
    }

    let metrics = agent.get_performance_metrics();
    assert_eq!(metrics.tasks_completed, 2);
    assert_eq!(metrics.tasks_failed, 2);
    assert_eq!(metrics.success_rate, 0.5);
}

#[tokio::test]
async fn test_collaboration_depends_on_capability_and_status() {
    let router = MessageRouter::new();
    let mut client = router.mailbox("client");
    let gate = Arc::new(Notify::new());
    let _agent = spawn_agent(
        &router,
        "worker",
        GatedProcessor {
            gate: gate.clone(),
            capabilities: vec!["x".to_string()],
        },
    );

    deliver(&router, collaboration_request("worker", "c1", "x")).await;
    let yes: CollaborationResponse = next_message(&mut client).await.decode().unwrap();
    assert!(yes.can_collaborate);
    assert_eq!(yes.task_id, "c1");
    assert_eq!(yes.response_data["agentId"], "worker");
    assert_eq!(yes.response_data["capability"], "x");

    deliver(&router, collaboration_request("worker", "c2", "y")).await;
    let missing: CollaborationResponse = next_message(&mut client).await.decode().unwrap();
    assert!(!missing.can_collaborate);
    assert!(missing.response_data["reason"].is_string());

    deliver(&router, assignment("worker", "t1", json!({}))).await;
    assert_eq!(status_of(&next_message(&mut client).await).status, TaskState::Started);

    deliver(&router, collaboration_request("worker", "c3", "x")).await;
    let busy: CollaborationResponse = next_message(&mut client).await.decode().unwrap();
    assert!(!busy.can_collaborate);

    gate.notify_one();
}

#[tokio::test]
async fn test_concurrent_requests_resolve_to_their_own_replies() {
    let router = MessageRouter::new();
    let requester = spawn_agent(&router, "requester", EchoProcessor::new(&[]));
    let _responder = spawn_agent(&router, "responder", EchoProcessor::new(&["x"]));

    let requests = (0..8).map(|i| {
        let requester = requester.clone();
        async move {
            let content = CollaborationRequest {
                task_id: format!("c{}", i),
                required_capability: "x".to_string(),
            }
            .encode()
            .unwrap();
            let reply = requester
                .send_request(
                    "responder",
                    MessageType::CollaborationRequest,
                    content,
                    Duration::from_secs(2),
                )
                .await
                .unwrap()
                .expect("reply within timeout");
            (i, reply)
        }
    });

    for (i, reply) in join_all(requests).await {
        let response: CollaborationResponse = reply.decode().unwrap();
        assert_eq!(response.task_id, format!("c{}", i));
        assert!(response.can_collaborate);
    }
    assert_eq!(requester.pending_requests(), 0);
}

#[tokio::test]
async fn test_reordered_replies_match_by_correlation_id() {
    let router = MessageRouter::new();
    let requester = spawn_agent(&router, "requester", EchoProcessor::new(&[]));
    let mut mirror = router.mailbox("mirror");

    // Answer all requests at once, newest first
    let reply_router = router.clone();
    tokio::spawn(async move {
        let mut received = Vec::new();
        for _ in 0..5 {
            received.push(next_message(&mut mirror).await);
        }
        for request in received.into_iter().rev() {
            let echoed: CollaborationRequest = request.decode().unwrap();
            let content = CollaborationResponse {
                task_id: echoed.task_id,
                can_collaborate: true,
                response_data: json!({}),
            }
            .encode()
            .unwrap();
            let correlation_id = request.correlation_id().map(str::to_string);
            let reply = Message::new(
                "mirror",
                "requester",
                MessageType::CollaborationResponse,
                content,
            )
            .with_correlation_id(correlation_id);
            reply_router.deliver(reply).await.unwrap();
        }
    });

    let requests = (0..5).map(|i| {
        let requester = requester.clone();
        async move {
            let content = CollaborationRequest {
                task_id: format!("r{}", i),
                required_capability: "x".to_string(),
            }
            .encode()
            .unwrap();
            let reply = requester
                .send_request(
                    "mirror",
                    MessageType::CollaborationRequest,
                    content,
                    Duration::from_secs(2),
                )
                .await
                .unwrap()
                .expect("reply within timeout");
            (i, reply)
        }
    });

    for (i, reply) in join_all(requests).await {
        let response: CollaborationResponse = reply.decode().unwrap();
        assert_eq!(response.task_id, format!("r{}", i));
    }
    assert_eq!(requester.pending_requests(), 0);
}

#[tokio::test]
async fn test_request_times_out_and_late_reply_is_dropped() {
    let router = MessageRouter::new();
    let requester = spawn_agent(&router, "requester", EchoProcessor::new(&[]));
    let mut silent = router.mailbox("silent");

    let started = Instant::now();
    let reply = requester
        .send_request(
            "silent",
            MessageType::CollaborationRequest,
            json!({"taskId": "c1", "requiredCapability": "x"}),
            Duration::from_millis(100),
        )
        .await
        .unwrap();

    assert!(reply.is_none());
    assert!(started.elapsed() >= Duration::from_millis(100));
    assert_eq!(requester.pending_requests(), 0);

    let request = next_message(&mut silent).await;
    let late = Message::new(
        "silent",
        "requester",
        MessageType::CollaborationResponse,
        json!({"taskId": "c1", "canCollaborate": true, "responseData": {}}),
    )
    .with_correlation_id(request.correlation_id().map(str::to_string));
    deliver(&router, late).await;

    wait_until(|| requester.stats().messages_received == 1).await;
    assert_eq!(requester.pending_requests(), 0);
}

#[tokio::test]
async fn test_request_to_unknown_recipient_fails_fast() {
    let router = MessageRouter::new();
    let requester = spawn_agent(&router, "requester", EchoProcessor::new(&[]));

    let err = requester
        .send_request("nobody", MessageType::Heartbeat, json!({}), Duration::from_secs(5))
        .await
        .unwrap_err();

    assert!(matches!(err, AgentError::UnknownRecipient(_)));
    assert_eq!(requester.pending_requests(), 0);
}

#[tokio::test]
async fn test_assignment_request_resolves_with_first_status() {
    let router = MessageRouter::new();
    let requester = spawn_agent(&router, "requester", EchoProcessor::new(&[]));
    let _worker = spawn_agent(&router, "worker", EchoProcessor::new(&[]));

    let content = TaskAssignment::new("t1", "x", json!({})).encode().unwrap();
    let reply = requester
        .request("worker", MessageType::TaskAssignment, content)
        .await
        .unwrap()
        .expect("status reply");

    let update = status_of(&reply);
    assert_eq!(update.status, TaskState::Started);
    assert_eq!(update.task_id, "t1");
}

#[tokio::test]
async fn test_handler_failure_returns_correlated_error() {
    let router = MessageRouter::new();
    let mut client = router.mailbox("client");
    let agent = spawn_agent(&router, "worker", EchoProcessor::new(&[]));

    let malformed = Message::new(
        "client",
        "worker",
        MessageType::TaskAssignment,
        json!({"taskType": "x"}),
    )
    .with_correlation_id(Some("client-1".to_string()));
    deliver(&router, malformed).await;

    let error = next_message(&mut client).await;
    assert_eq!(error.message_type(), MessageType::Error);
    assert_eq!(error.correlation_id(), Some("client-1"));
    let report: ErrorReport = error.decode().unwrap();
    assert_eq!(report.agent_id, "worker");
    assert!(report.error.contains("task assignment"));
    assert_eq!(agent.status(), AgentStatus::Idle);

    // The loop keeps going
    deliver(&router, assignment("worker", "t1", json!({}))).await;
    assert_eq!(status_of(&next_message(&mut client).await).status, TaskState::Started);
}

#[tokio::test]
async fn test_error_reply_resolves_pending_request() {
    let router = MessageRouter::new();
    let requester = spawn_agent(&router, "requester", EchoProcessor::new(&[]));
    let _responder = spawn_agent(&router, "responder", EchoProcessor::new(&["x"]));

    let reply = requester
        .send_request(
            "responder",
            MessageType::CollaborationRequest,
            json!({"wrong": "shape"}),
            Duration::from_secs(2),
        )
        .await
        .unwrap()
        .expect("error reply");

    assert_eq!(reply.message_type(), MessageType::Error);
    assert_eq!(requester.pending_requests(), 0);
}

#[tokio::test]
async fn test_unknown_message_type_is_dropped() {
    let router = MessageRouter::new();
    let mut client = router.mailbox("client");
    let agent = spawn_agent(&router, "worker", EchoProcessor::new(&["x"]));

    let raw = json!({
        "message_id": "m-1",
        "from_agent_id": "client",
        "to_agent_id": "worker",
        "message_type": "gossip",
        "content": {},
        "timestamp": "2024-01-01T00:00:00Z"
    });
    let unknown = Message::from_json(&raw.to_string()).unwrap();
    assert_eq!(unknown.message_type(), MessageType::Unknown);
    deliver(&router, unknown).await;

    assert_silent(&mut client, 100).await;
    assert_eq!(agent.stats().messages_received, 1);

    deliver(&router, collaboration_request("worker", "c1", "x")).await;
    let response: CollaborationResponse = next_message(&mut client).await.decode().unwrap();
    assert!(response.can_collaborate);
}

#[tokio::test]
async fn test_stopped_agent_keeps_mail_until_restarted() {
    let router = MessageRouter::new();
    let mut client = router.mailbox("client");
    let agent = spawn_agent(&router, "worker", EchoProcessor::new(&[]));

    agent.stop();
    assert_eq!(agent.status(), AgentStatus::Maintenance);
    tokio::time::sleep(Duration::from_millis(50)).await;

    deliver(&router, collaboration_request("worker", "c1", "x")).await;
    assert_silent(&mut client, 100).await;

    agent.start().unwrap();
    assert_eq!(agent.status(), AgentStatus::Idle);
    let response = next_message(&mut client).await;
    assert_eq!(response.message_type(), MessageType::CollaborationResponse);
}

#[tokio::test]
async fn test_stop_does_not_cancel_in_flight_task() {
    let router = MessageRouter::new();
    let mut client = router.mailbox("client");
    let gate = Arc::new(Notify::new());
    let agent = spawn_agent(
        &router,
        "worker",
        GatedProcessor {
            gate: gate.clone(),
            capabilities: vec![],
        },
    );

    deliver(&router, assignment("worker", "t1", json!({}))).await;
    assert_eq!(status_of(&next_message(&mut client).await).status, TaskState::Started);

    agent.stop();
    assert_eq!(agent.status(), AgentStatus::Busy);

    gate.notify_one();
    assert_eq!(status_of(&next_message(&mut client).await).status, TaskState::Completed);

    wait_until(|| agent.status() == AgentStatus::Maintenance).await;
    assert!(agent.current_task_id().is_none());
}

#[tokio::test]
async fn test_final_status_into_the_void_still_cleans_up() {
    let router = MessageRouter::new();
    let requester_inbox = router.mailbox("client");
    let gate = Arc::new(Notify::new());
    let agent = spawn_agent(
        &router,
        "worker",
        GatedProcessor {
            gate: gate.clone(),
            capabilities: vec![],
        },
    );

    deliver(&router, assignment("worker", "t1", json!({}))).await;
    wait_until(|| agent.status() == AgentStatus::Busy).await;

    // Requester disappears before the task finishes
    drop(requester_inbox);
    router.unregister("client");
    gate.notify_one();

    wait_until(|| agent.status() == AgentStatus::Idle).await;
    assert!(agent.current_task_id().is_none());
    assert_eq!(agent.stats().tasks_completed, 1);
}

/// Fails heartbeat deliveries while `failing` is set, then forwards to the router
struct FlakyTransport {
    router: MessageRouter,
    failing: AtomicBool,
    attempts: AtomicUsize,
}

#[async_trait]
impl Transport for FlakyTransport {
    async fn deliver(&self, message: Message) -> taskmesh::error::Result<()> {
        if message.message_type() == MessageType::Heartbeat {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            if self.failing.load(Ordering::SeqCst) {
                let recipient = message.to_agent_id().to_string();
                return Err(AgentError::UnknownRecipient(recipient));
            }
        }
        self.router.deliver(message).await
    }
}

#[tokio::test]
async fn test_heartbeat_survives_transport_failures() {
    const INTERVAL_MS: u64 = 40;

    let router = MessageRouter::new();
    let mut coordinator = router.mailbox("coordinator");
    let transport = Arc::new(FlakyTransport {
        router: router.clone(),
        failing: AtomicBool::new(true),
        attempts: AtomicUsize::new(0),
    });

    let processor = Arc::new(EchoProcessor::new(&["x"]));
    let agent = AgentBuilder::from_shared("worker", processor, transport.clone())
        .heartbeat_interval_ms(INTERVAL_MS)
        .poll_interval_ms(10)
        .build();
    router.register("worker", agent.mailbox());
    agent.start().unwrap();

    // Two failed ticks: nothing delivered, nothing recorded
    wait_until(|| transport.attempts.load(Ordering::SeqCst) >= 2).await;
    assert!(agent.stats().last_heartbeat.is_none());
    assert_eq!(agent.stats().messages_sent, 0);
    assert!(coordinator.try_recv().is_err());
    assert!(agent.is_running());

    transport.failing.store(false, Ordering::SeqCst);
    let first = next_message(&mut coordinator).await;
    wait_until(|| agent.stats().last_heartbeat.is_some()).await;
    let second = next_message(&mut coordinator).await;

    let report: HeartbeatReport = first.decode().unwrap();
    assert_eq!(report.agent_id, "worker");
    assert_eq!(report.status, AgentStatus::Idle);
    assert_eq!(report.capabilities, vec!["x".to_string()]);

    // Successive heartbeats are paced by the interval, not retried back to back
    let gap = (second.timestamp() - first.timestamp()).num_milliseconds();
    assert!(gap >= INTERVAL_MS as i64 - 10, "heartbeats {}ms apart", gap);

    agent.stop();
}

#[tokio::test]
async fn test_assignment_fields_reach_the_processor() {
    let router = MessageRouter::new();
    let mut client = router.mailbox("client");
    let _agent = spawn_agent(&router, "worker", RecordingProcessor);

    let mut content = TaskAssignment::new("t9", "report", json!({"rows": 3})).with_priority(5);
    content.deadline = Some("2030-06-01T00:00:00Z".parse().unwrap());
    content.dependencies = vec!["t7".to_string(), "t8".to_string()];
    let message = Message::new(
        "client",
        "worker",
        MessageType::TaskAssignment,
        content.encode().unwrap(),
    );
    let sent_at = message.timestamp();
    deliver(&router, message).await;

    assert_eq!(status_of(&next_message(&mut client).await).status, TaskState::Started);
    let completed = status_of(&next_message(&mut client).await);
    assert_eq!(completed.status, TaskState::Completed);

    let task: Task = serde_json::from_value(completed.result).unwrap();
    assert_eq!(task.task_id, "t9");
    assert_eq!(task.task_type, "report");
    assert_eq!(task.priority, 5);
    assert_eq!(task.deadline, Some("2030-06-01T00:00:00Z".parse().unwrap()));
    assert_eq!(task.dependencies, vec!["t7".to_string(), "t8".to_string()]);
    assert_eq!(task.task_data, json!({"rows": 3}));
    assert_eq!(task.created_at, sent_at);
}
