//! The orchestration loop — one turn from user utterance to committed
//! answer.
//!
//! A turn runs as a spawned task that holds its session's conversation
//! lock for the whole duration, including every outbound network call.
//! The task drives a bounded resolve-then-respond loop: ask the model
//! whether tools are needed, execute them sequentially, repeat until a
//! terminal answer, then stream that answer out and commit the turn's
//! messages atomically. Nothing touches the conversation until the
//! commit — a cancelled or failed turn leaves it exactly as it was.

use crate::executor::ToolExecutor;
use crate::stream_event::ChatStreamEvent;
use nimbus_core::error::AgentError;
use nimbus_core::event::{DomainEvent, EventBus};
use nimbus_core::message::Message;
use nimbus_core::provider::{Provider, ProviderRequest};
use nimbus_core::session::SessionHandle;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Built-in system prompt: assistant purpose plus the tool-usage policy.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful cloud operations assistant with \
access to tools for querying the project's cloud resources. Only use tools when the user asks \
for concrete resource information; for greetings, casual conversation, or questions about what \
you can do, respond directly without calling any tools. When you receive tool results, read \
them carefully and report exactly the information provided — never infer details that are not \
explicitly stated. Machine types like e2-standard-4 and n2-standard-4 are different and must \
be reported exactly as shown.";

/// The tool-augmented dialogue orchestrator.
pub struct ChatAgent {
    provider: Arc<dyn Provider>,
    model: String,
    decision_temperature: f32,
    answer_temperature: f32,
    max_tokens: Option<u32>,
    executor: Arc<ToolExecutor>,
    system_prompt: String,
    history_window: usize,
    retention_limit: usize,
    max_tool_rounds: u32,
    event_bus: Arc<EventBus>,
}

impl ChatAgent {
    /// Create an agent with default policy values.
    pub fn new(
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        executor: Arc<ToolExecutor>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            decision_temperature: 0.0,
            answer_temperature: 0.0,
            max_tokens: None,
            executor,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            history_window: 10,
            retention_limit: 20,
            max_tool_rounds: 5,
            event_bus,
        }
    }

    /// Build an agent wired from the application config.
    pub fn from_config(
        provider: Arc<dyn Provider>,
        executor: Arc<ToolExecutor>,
        event_bus: Arc<EventBus>,
        config: &nimbus_config::AppConfig,
    ) -> Self {
        let mut agent = Self::new(provider, &config.llm.model, executor, event_bus)
            .with_temperatures(
                config.llm.decision_temperature,
                config.llm.answer_temperature,
            )
            .with_max_tokens(config.llm.max_tokens)
            .with_history_window(config.agent.history_window)
            .with_retention_limit(config.agent.retention_limit)
            .with_max_tool_rounds(config.agent.max_tool_rounds);
        if let Some(prompt) = &config.agent.system_prompt_override {
            agent = agent.with_system_prompt(prompt);
        }
        agent
    }

    /// Set the per-call-site decoding temperatures.
    pub fn with_temperatures(mut self, decision: f32, answer: f32) -> Self {
        self.decision_temperature = decision;
        self.answer_temperature = answer;
        self
    }

    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    pub fn with_history_window(mut self, window: usize) -> Self {
        self.history_window = window;
        self
    }

    pub fn with_retention_limit(mut self, limit: usize) -> Self {
        self.retention_limit = limit;
        self
    }

    pub fn with_max_tool_rounds(mut self, rounds: u32) -> Self {
        self.max_tool_rounds = rounds;
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    /// Run one turn against a session.
    ///
    /// Returns the turn's event stream immediately; the turn itself
    /// runs in a background task. Dropping the receiver cancels
    /// delivery and the turn commits nothing.
    pub fn run_turn(
        self: &Arc<Self>,
        session: Arc<SessionHandle>,
        utterance: impl Into<String>,
    ) -> mpsc::Receiver<ChatStreamEvent> {
        let (tx, rx) = mpsc::channel::<ChatStreamEvent>(128);
        let agent = self.clone();
        let utterance = utterance.into();

        tokio::spawn(async move {
            agent.drive_turn(session, utterance, tx).await;
        });

        rx
    }

    async fn drive_turn(
        &self,
        session: Arc<SessionHandle>,
        utterance: String,
        tx: mpsc::Sender<ChatStreamEvent>,
    ) {
        // Per-session mutual exclusion: held until the turn ends.
        let mut conversation = session.conversation().lock().await;

        info!(
            session = %session.key(),
            retained = conversation.len(),
            "Turn started"
        );

        let user_msg = Message::user(&utterance);

        // Working history for the model: system prompt + retained
        // window + the new utterance. The conversation itself stays
        // untouched until commit.
        let mut working = vec![Message::system(&self.system_prompt)];
        working.extend(conversation.recent(self.history_window).iter().cloned());
        working.push(user_msg.clone());

        // Messages this turn will commit, in order.
        let mut turn_block = vec![user_msg];

        let tool_definitions = self.executor.registry().definitions();
        let mut invoked_tools: Vec<String> = Vec::new();
        let mut rounds: u32 = 0;

        loop {
            if rounds >= self.max_tool_rounds {
                let err = AgentError::IterationBudget { rounds };
                warn!(session = %session.key(), rounds, "Turn aborted: {err}");
                self.event_bus.publish(DomainEvent::ErrorOccurred {
                    context: "turn".into(),
                    error_message: err.to_string(),
                    timestamp: chrono::Utc::now(),
                });
                let _ = tx
                    .send(ChatStreamEvent::Error {
                        kind: "iteration_budget".into(),
                        message: format!(
                            "{err}; tools invoked: [{}]",
                            invoked_tools.join(", ")
                        ),
                    })
                    .await;
                return;
            }
            rounds += 1;

            debug!(session = %session.key(), round = rounds, "Tool-decision round");

            let request = ProviderRequest {
                model: self.model.clone(),
                messages: working.clone(),
                temperature: self.decision_temperature,
                max_tokens: self.max_tokens,
                tools: tool_definitions.clone(),
                stream: false,
            };

            let response = match self.provider.complete(request).await {
                Ok(response) => response,
                Err(e) => {
                    warn!(session = %session.key(), error = %e, "Model call failed");
                    self.event_bus.publish(DomainEvent::ErrorOccurred {
                        context: "turn".into(),
                        error_message: e.to_string(),
                        timestamp: chrono::Utc::now(),
                    });
                    let _ = tx
                        .send(ChatStreamEvent::Error {
                            kind: "model_unavailable".into(),
                            message: e.to_string(),
                        })
                        .await;
                    return;
                }
            };

            if response.message.tool_calls.is_empty() {
                if response.finish_reason.is_terminal() {
                    // Terminal answer — switch to the streaming path.
                    break;
                }
                // Ambiguous: no tool calls, no terminal finish reason.
                // Record it as an intermediate assistant turn and keep
                // looping.
                debug!(
                    session = %session.key(),
                    finish_reason = ?response.finish_reason,
                    "Intermediate assistant turn"
                );
                working.push(response.message.clone());
                turn_block.push(response.message);
                continue;
            }

            // Tool dispatch: record the assistant's intent, then run
            // each call sequentially in emission order — later calls
            // may depend on earlier results being present.
            let calls = response.message.tool_calls.clone();
            debug!(session = %session.key(), tool_count = calls.len(), "Executing tool calls");
            working.push(response.message.clone());
            turn_block.push(response.message);

            for tc in &calls {
                let result = self.executor.invoke(tc).await;
                invoked_tools.push(tc.name.clone());
                let tool_msg = Message::tool_result(&tc.id, &result.output);
                working.push(tool_msg.clone());
                turn_block.push(tool_msg);
            }
        }

        // Streaming path: final answer, no tools attached.
        let request = ProviderRequest {
            model: self.model.clone(),
            messages: working,
            temperature: self.answer_temperature,
            max_tokens: self.max_tokens,
            tools: Vec::new(),
            stream: true,
        };

        let mut stream_rx = match self.provider.stream(request).await {
            Ok(rx) => rx,
            Err(e) => {
                warn!(session = %session.key(), error = %e, "Answer stream failed to start");
                self.event_bus.publish(DomainEvent::ErrorOccurred {
                    context: "turn".into(),
                    error_message: e.to_string(),
                    timestamp: chrono::Utc::now(),
                });
                let _ = tx
                    .send(ChatStreamEvent::Error {
                        kind: "model_unavailable".into(),
                        message: e.to_string(),
                    })
                    .await;
                return;
            }
        };

        // Status first, content deltas after, done last.
        if tx
            .send(ChatStreamEvent::status_for(&invoked_tools))
            .await
            .is_err()
        {
            debug!(session = %session.key(), "Client gone before stream start; nothing committed");
            return;
        }

        let mut answer = String::new();
        while let Some(chunk_result) = stream_rx.recv().await {
            match chunk_result {
                Ok(chunk) => {
                    if let Some(text) = chunk.content
                        && !text.is_empty()
                    {
                        answer.push_str(&text);
                        if tx
                            .send(ChatStreamEvent::Content { content: text })
                            .await
                            .is_err()
                        {
                            debug!(
                                session = %session.key(),
                                "Client disconnected mid-stream; partial answer discarded"
                            );
                            return;
                        }
                    }
                    if chunk.done {
                        break;
                    }
                }
                Err(e) => {
                    warn!(session = %session.key(), error = %e, "Answer stream interrupted");
                    let _ = tx
                        .send(ChatStreamEvent::Error {
                            kind: "model_unavailable".into(),
                            message: e.to_string(),
                        })
                        .await;
                    return;
                }
            }
        }

        // The client must still be listening when `done` is about to
        // be emitted — otherwise the turn counts as cancelled and the
        // commit is skipped.
        if tx.is_closed() {
            debug!(session = %session.key(), "Client disconnected before done; nothing committed");
            return;
        }

        // Commit the whole turn block atomically, evict, then signal.
        turn_block.push(Message::assistant(&answer));
        for msg in turn_block {
            conversation.push(msg);
        }
        conversation.evict_to(self.retention_limit);

        self.event_bus.publish(DomainEvent::ResponseGenerated {
            session_key: session.key().to_string(),
            model: self.model.clone(),
            rounds,
            timestamp: chrono::Utc::now(),
        });

        info!(
            session = %session.key(),
            rounds,
            tools = invoked_tools.len(),
            answer_len = answer.len(),
            "Turn committed"
        );

        let _ = tx.send(ChatStreamEvent::done()).await;
    }
}
