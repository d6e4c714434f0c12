//! End-to-end tests for the turn orchestration loop.
//!
//! These drive full turns against scripted providers and stub tools:
//! tool-decision rounds, sequential dispatch, the round budget, stream
//! delivery order, cancellation, and the atomic-commit contract.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use nimbus_agent::{ChatAgent, ChatStreamEvent, ToolExecutor};
use nimbus_core::error::{ProviderError, ToolError};
use nimbus_core::event::EventBus;
use nimbus_core::message::{Message, MessageToolCall, Role, SessionKey};
use nimbus_core::provider::{
    FinishReason, Provider, ProviderRequest, ProviderResponse, StreamChunk,
};
use nimbus_core::session::SessionHandle;
use nimbus_core::tool::{Tool, ToolRegistry, ToolResult};
use tokio::sync::mpsc;

// ── Scripted provider ────────────────────────────────────────────────────

/// Returns scripted `complete()` responses in sequence and streams a
/// fixed chunk script for the final answer turn.
struct ScriptedProvider {
    responses: Mutex<VecDeque<ProviderResponse>>,
    /// When the script runs dry, keep replaying the last response.
    repeat_last: bool,
    stream_chunks: Vec<String>,
    /// Pause between streamed chunks (for cancellation tests).
    chunk_delay: Option<Duration>,
    complete_calls: AtomicUsize,
    /// Largest message count seen in any request.
    max_request_messages: AtomicUsize,
}

impl ScriptedProvider {
    fn new(responses: Vec<ProviderResponse>, stream_chunks: Vec<&str>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            repeat_last: false,
            stream_chunks: stream_chunks.into_iter().map(String::from).collect(),
            chunk_delay: None,
            complete_calls: AtomicUsize::new(0),
            max_request_messages: AtomicUsize::new(0),
        }
    }

    fn repeating(response: ProviderResponse) -> Self {
        let mut provider = Self::new(vec![response], vec![]);
        provider.repeat_last = true;
        provider
    }

    fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = Some(delay);
        self
    }

    fn complete_calls(&self) -> usize {
        self.complete_calls.load(Ordering::SeqCst)
    }

    fn max_request_messages(&self) -> usize {
        self.max_request_messages.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        self.complete_calls.fetch_add(1, Ordering::SeqCst);
        self.max_request_messages
            .fetch_max(request.messages.len(), Ordering::SeqCst);

        let mut responses = self.responses.lock().unwrap();
        if responses.len() > 1 || !self.repeat_last {
            responses.pop_front().ok_or_else(|| {
                ProviderError::NotConfigured("scripted provider exhausted".into())
            })
        } else {
            Ok(responses
                .front()
                .expect("repeating provider needs one response")
                .clone())
        }
    }

    async fn stream(
        &self,
        _request: ProviderRequest,
    ) -> Result<mpsc::Receiver<Result<StreamChunk, ProviderError>>, ProviderError> {
        let (tx, rx) = mpsc::channel(8);
        let chunks = self.stream_chunks.clone();
        let delay = self.chunk_delay;

        tokio::spawn(async move {
            for chunk in chunks {
                if let Some(delay) = delay {
                    tokio::time::sleep(delay).await;
                }
                if tx
                    .send(Ok(StreamChunk {
                        content: Some(chunk),
                        done: false,
                        usage: None,
                    }))
                    .await
                    .is_err()
                {
                    return;
                }
            }
            let _ = tx
                .send(Ok(StreamChunk {
                    content: None,
                    done: true,
                    usage: None,
                }))
                .await;
        });

        Ok(rx)
    }
}

fn text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant(text),
        finish_reason: FinishReason::Stop,
        model: "scripted-model".into(),
        usage: None,
    }
}

fn tool_response(calls: Vec<(&str, &str)>) -> ProviderResponse {
    let tool_calls = calls
        .into_iter()
        .enumerate()
        .map(|(i, (name, arguments))| MessageToolCall {
            id: format!("call_{i}"),
            name: name.into(),
            arguments: arguments.into(),
        })
        .collect();
    ProviderResponse {
        message: Message::assistant_with_calls("", tool_calls),
        finish_reason: FinishReason::ToolCalls,
        model: "scripted-model".into(),
        usage: None,
    }
}

// ── Recording tool ───────────────────────────────────────────────────────

/// A tool that records its invocations in a shared ordered log.
struct RecordingTool {
    name: &'static str,
    output: &'static str,
    log: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl Tool for RecordingTool {
    fn name(&self) -> &str {
        self.name
    }
    fn description(&self) -> &str {
        "Test tool"
    }
    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({"type": "object", "properties": {}})
    }
    async fn execute(&self, _arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        self.log.lock().unwrap().push(self.name.to_string());
        Ok(ToolResult {
            call_id: String::new(),
            success: true,
            output: self.output.into(),
            data: None,
        })
    }
}

// ── Harness ──────────────────────────────────────────────────────────────

struct Harness {
    agent: Arc<ChatAgent>,
    provider: Arc<ScriptedProvider>,
    session: Arc<SessionHandle>,
    tool_log: Arc<Mutex<Vec<String>>>,
}

fn harness(provider: ScriptedProvider) -> Harness {
    let tool_log = Arc::new(Mutex::new(Vec::new()));
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(RecordingTool {
        name: "list_compute_instances",
        output: "Found 2 compute instance(s) in project acme-prod",
        log: tool_log.clone(),
    }));
    registry.register(Box::new(RecordingTool {
        name: "get_project_info",
        output: "Project: acme-prod",
        log: tool_log.clone(),
    }));

    let bus = Arc::new(EventBus::default());
    let executor = Arc::new(ToolExecutor::new(Arc::new(registry), bus.clone()));
    let provider = Arc::new(provider);
    let agent = Arc::new(ChatAgent::new(
        provider.clone(),
        "scripted-model",
        executor,
        bus,
    ));

    Harness {
        agent,
        provider,
        session: Arc::new(SessionHandle::new(SessionKey::generate())),
        tool_log,
    }
}

async fn collect(mut rx: mpsc::Receiver<ChatStreamEvent>) -> Vec<ChatStreamEvent> {
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    events
}

fn concatenated_content(events: &[ChatStreamEvent]) -> String {
    events
        .iter()
        .filter_map(|e| match e {
            ChatStreamEvent::Content { content } => Some(content.as_str()),
            _ => None,
        })
        .collect()
}

// ── Scenarios ────────────────────────────────────────────────────────────

#[tokio::test]
async fn capability_question_answers_without_tools() {
    let h = harness(ScriptedProvider::new(
        vec![text_response("I can list your cloud resources.")],
        vec!["I can list ", "your cloud resources."],
    ));

    let events = collect(h.agent.run_turn(h.session.clone(), "What can you do?")).await;

    // No tool ran.
    assert!(h.tool_log.lock().unwrap().is_empty());

    // status (empty) → content* → done
    assert!(matches!(
        &events[0],
        ChatStreamEvent::Status { status } if status.is_empty()
    ));
    assert_eq!(
        concatenated_content(&events),
        "I can list your cloud resources."
    );
    assert!(matches!(events.last(), Some(ChatStreamEvent::Done { .. })));

    // Conversation gains exactly 2 messages.
    let conv = h.session.conversation().lock().await;
    assert_eq!(conv.len(), 2);
    assert_eq!(conv.messages[0].role, Role::User);
    assert_eq!(conv.messages[1].role, Role::Assistant);
}

#[tokio::test]
async fn list_vms_runs_tool_then_streams_answer() {
    let h = harness(ScriptedProvider::new(
        vec![
            tool_response(vec![("list_compute_instances", "{}")]),
            text_response("You have 2 instances."),
        ],
        vec!["You have ", "2 instances."],
    ));

    let events = collect(h.agent.run_turn(h.session.clone(), "List my VMs")).await;

    // The tool ran exactly once.
    assert_eq!(*h.tool_log.lock().unwrap(), vec!["list_compute_instances"]);

    // Status names the tool and precedes all content.
    assert!(matches!(
        &events[0],
        ChatStreamEvent::Status { status } if status == "list_compute_instances"
    ));
    assert_eq!(concatenated_content(&events), "You have 2 instances.");
    assert!(matches!(events.last(), Some(ChatStreamEvent::Done { .. })));

    // user, assistant(toolCalls), tool(result), assistant(final) — in order.
    let conv = h.session.conversation().lock().await;
    assert_eq!(conv.len(), 4);
    assert_eq!(conv.messages[0].role, Role::User);
    assert_eq!(conv.messages[1].role, Role::Assistant);
    assert_eq!(conv.messages[1].tool_calls.len(), 1);
    assert_eq!(conv.messages[2].role, Role::Tool);
    assert!(conv.messages[2].content.contains("Found 2 compute instance(s)"));
    assert_eq!(conv.messages[3].role, Role::Assistant);
    assert_eq!(conv.messages[3].content, "You have 2 instances.");
}

#[tokio::test]
async fn tool_calls_execute_sequentially_in_emission_order() {
    let h = harness(ScriptedProvider::new(
        vec![
            tool_response(vec![
                ("list_compute_instances", "{}"),
                ("get_project_info", "{}"),
            ]),
            text_response("Done."),
        ],
        vec!["Done."],
    ));

    let events = collect(h.agent.run_turn(h.session.clone(), "VMs and project?")).await;
    assert!(matches!(events.last(), Some(ChatStreamEvent::Done { .. })));

    // Executor invoked A strictly before B.
    assert_eq!(
        *h.tool_log.lock().unwrap(),
        vec!["list_compute_instances", "get_project_info"]
    );

    // Both tool messages appear in the conversation in that order.
    let conv = h.session.conversation().lock().await;
    let tool_messages: Vec<&Message> = conv
        .messages
        .iter()
        .filter(|m| m.role == Role::Tool)
        .collect();
    assert_eq!(tool_messages.len(), 2);
    assert_eq!(tool_messages[0].tool_call_id.as_deref(), Some("call_0"));
    assert_eq!(tool_messages[1].tool_call_id.as_deref(), Some("call_1"));
}

#[tokio::test]
async fn unknown_tool_folds_to_notice_and_continues() {
    let h = harness(ScriptedProvider::new(
        vec![
            tool_response(vec![("delete_everything", "{}")]),
            text_response("That tool does not exist."),
        ],
        vec!["That tool does not exist."],
    ));

    let events = collect(h.agent.run_turn(h.session.clone(), "Run it")).await;

    // The loop did not abort.
    assert!(matches!(events.last(), Some(ChatStreamEvent::Done { .. })));

    let conv = h.session.conversation().lock().await;
    let tool_msg = conv
        .messages
        .iter()
        .find(|m| m.role == Role::Tool)
        .expect("tool message committed");
    assert!(tool_msg.content.contains("Unknown tool: delete_everything"));
}

#[tokio::test]
async fn iteration_budget_terminates_at_exactly_max_rounds() {
    let h = harness(ScriptedProvider::repeating(tool_response(vec![(
        "list_compute_instances",
        "{}",
    )])));

    let events = collect(h.agent.run_turn(h.session.clone(), "Loop forever")).await;

    // Exactly 5 model rounds, then the distinguished soft failure.
    assert_eq!(h.provider.complete_calls(), 5);
    assert_eq!(events.len(), 1);
    match &events[0] {
        ChatStreamEvent::Error { kind, message } => {
            assert_eq!(kind, "iteration_budget");
            assert!(message.contains("5"));
            assert!(message.contains("list_compute_instances"));
        }
        other => panic!("Expected iteration budget error, got {other:?}"),
    }

    // Nothing committed.
    assert!(h.session.conversation().lock().await.is_empty());
}

#[tokio::test]
async fn history_window_caps_model_input() {
    let h = harness(ScriptedProvider::new(
        vec![text_response("ok")],
        vec!["ok"],
    ));

    // Retain far more than the window.
    {
        let mut conv = h.session.conversation().lock().await;
        for i in 0..18 {
            conv.push(Message::user(format!("old {i}")));
            conv.push(Message::assistant(format!("reply {i}")));
        }
        conv.evict_to(20);
        assert_eq!(conv.len(), 20);
    }

    let events = collect(h.agent.run_turn(h.session.clone(), "latest")).await;
    assert!(matches!(events.last(), Some(ChatStreamEvent::Done { .. })));

    // system + window(10) + current user = 12 max.
    assert!(h.provider.max_request_messages() <= 12);
}

#[tokio::test]
async fn retention_limit_evicts_after_commit() {
    let h = harness(ScriptedProvider::new(
        vec![text_response("ok")],
        vec!["ok"],
    ));

    {
        let mut conv = h.session.conversation().lock().await;
        for i in 0..10 {
            conv.push(Message::user(format!("old {i}")));
            conv.push(Message::assistant(format!("reply {i}")));
        }
        assert_eq!(conv.len(), 20);
    }

    let events = collect(h.agent.run_turn(h.session.clone(), "one more")).await;
    assert!(matches!(events.last(), Some(ChatStreamEvent::Done { .. })));

    let conv = h.session.conversation().lock().await;
    assert_eq!(conv.len(), 20);
    // Oldest pair evicted; the new turn is at the tail.
    assert_eq!(conv.messages[0].content, "old 1");
    assert_eq!(conv.messages[19].content, "ok");
}

#[tokio::test]
async fn cancellation_discards_partial_answer() {
    let h = harness(
        ScriptedProvider::new(
            vec![text_response("a long answer")],
            vec!["part one, ", "part two, ", "part three"],
        )
        .with_chunk_delay(Duration::from_millis(20)),
    );

    let mut rx = h.agent.run_turn(h.session.clone(), "Tell me everything");

    // Read the status event and the first delta, then disconnect.
    let first = rx.recv().await.expect("status event");
    assert_eq!(first.event_type(), "status");
    let second = rx.recv().await.expect("first content delta");
    assert_eq!(second.event_type(), "content");
    drop(rx);

    // Give the turn task time to observe the disconnect and finish.
    tokio::time::sleep(Duration::from_millis(150)).await;

    // Round-trip: state before == state after.
    assert!(h.session.conversation().lock().await.is_empty());
}

#[tokio::test]
async fn same_session_turns_serialize() {
    /// Echoes the latest user utterance so commits are attributable.
    struct EchoProvider;

    #[async_trait]
    impl Provider for EchoProvider {
        fn name(&self) -> &str {
            "echo"
        }

        async fn complete(
            &self,
            request: ProviderRequest,
        ) -> Result<ProviderResponse, ProviderError> {
            // Small delay widens the race window if locking is broken.
            tokio::time::sleep(Duration::from_millis(20)).await;
            let last_user = request
                .messages
                .iter()
                .rev()
                .find(|m| m.role == Role::User)
                .map(|m| m.content.clone())
                .unwrap_or_default();
            Ok(ProviderResponse {
                message: Message::assistant(format!("echo: {last_user}")),
                finish_reason: FinishReason::Stop,
                model: "echo".into(),
                usage: None,
            })
        }

        async fn stream(
            &self,
            request: ProviderRequest,
        ) -> Result<mpsc::Receiver<Result<StreamChunk, ProviderError>>, ProviderError> {
            let response = self.complete(request).await?;
            let (tx, rx) = mpsc::channel(2);
            let _ = tx
                .send(Ok(StreamChunk {
                    content: Some(response.message.content),
                    done: false,
                    usage: None,
                }))
                .await;
            let _ = tx
                .send(Ok(StreamChunk {
                    content: None,
                    done: true,
                    usage: None,
                }))
                .await;
            Ok(rx)
        }
    }

    let bus = Arc::new(EventBus::default());
    let executor = Arc::new(ToolExecutor::new(Arc::new(ToolRegistry::new()), bus.clone()));
    let agent = Arc::new(ChatAgent::new(
        Arc::new(EchoProvider),
        "echo",
        executor,
        bus,
    ));
    let session = Arc::new(SessionHandle::new(SessionKey::generate()));

    let rx_a = agent.run_turn(session.clone(), "first");
    let rx_b = agent.run_turn(session.clone(), "second");

    let (events_a, events_b) = tokio::join!(collect(rx_a), collect(rx_b));
    assert!(matches!(events_a.last(), Some(ChatStreamEvent::Done { .. })));
    assert!(matches!(events_b.last(), Some(ChatStreamEvent::Done { .. })));

    // Four messages, committed as two uninterleaved (user, answer) pairs.
    let conv = session.conversation().lock().await;
    assert_eq!(conv.len(), 4);
    for pair in conv.messages.chunks(2) {
        assert_eq!(pair[0].role, Role::User);
        assert_eq!(pair[1].role, Role::Assistant);
        assert_eq!(pair[1].content, format!("echo: {}", pair[0].content));
    }
}

#[tokio::test]
async fn ambiguous_turn_counts_against_budget_and_continues() {
    // No tool calls, non-terminal finish reason: the message is kept
    // as an intermediate and the loop queries the model again.
    let ambiguous = ProviderResponse {
        message: Message::assistant("thinking out loud"),
        finish_reason: FinishReason::Other("unspecified".into()),
        model: "scripted-model".into(),
        usage: None,
    };
    let h = harness(ScriptedProvider::new(
        vec![ambiguous, text_response("Final answer.")],
        vec!["Final answer."],
    ));

    let events = collect(h.agent.run_turn(h.session.clone(), "hmm")).await;
    assert!(matches!(events.last(), Some(ChatStreamEvent::Done { .. })));
    assert_eq!(h.provider.complete_calls(), 2);

    // user, intermediate assistant, final assistant
    let conv = h.session.conversation().lock().await;
    assert_eq!(conv.len(), 3);
    assert_eq!(conv.messages[1].content, "thinking out loud");
    assert_eq!(conv.messages[2].content, "Final answer.");
}
