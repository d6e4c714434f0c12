//! Provider trait — the abstraction over the LLM backend.
//!
//! A Provider knows how to send a conversation to an LLM and get a
//! response back, either as a complete message or as a stream of
//! content deltas. The orchestration loop calls `complete()` for
//! tool-decision rounds and `stream()` for the final answer turn
//! without knowing which backend is behind the trait.

use crate::error::ProviderError;
use crate::message::Message;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Configuration for a provider request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRequest {
    /// The model to use (e.g., "meta-llama/Llama-3.1-8B-Instruct")
    pub model: String,

    /// The conversation messages, most recent window only
    pub messages: Vec<Message>,

    /// Temperature (0.0 = deterministic decoding)
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Available tools the model can call; empty for the final answer turn
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,

    /// Whether to stream the response
    #[serde(default)]
    pub stream: bool,
}

/// A tool definition sent to the LLM so it knows what it can call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// The tool name
    pub name: String,

    /// Description of what the tool does
    pub description: String,

    /// JSON Schema describing the tool's parameters
    pub parameters: serde_json::Value,
}

/// Why the backend stopped generating.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// Natural end of a text answer — terminal.
    Stop,
    /// The model requests tool execution.
    ToolCalls,
    /// Generation hit the token limit — treated as terminal.
    Length,
    /// Anything else the backend reports (or nothing at all).
    Other(String),
}

impl FinishReason {
    /// Map the backend's raw `finish_reason` string.
    pub fn from_api(raw: Option<&str>) -> Self {
        match raw {
            Some("stop") => Self::Stop,
            Some("tool_calls") => Self::ToolCalls,
            Some("length") => Self::Length,
            Some(other) => Self::Other(other.to_string()),
            None => Self::Other("unspecified".to_string()),
        }
    }

    /// Whether this response is a terminal answer (no further rounds).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Stop | Self::Length)
    }
}

/// A complete (non-streaming) response from a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderResponse {
    /// The generated assistant message (content and/or tool calls)
    pub message: Message,

    /// Why generation stopped
    pub finish_reason: FinishReason,

    /// Which model actually responded (may differ from requested)
    pub model: String,

    /// Token usage statistics
    pub usage: Option<Usage>,
}

/// Token usage information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// A single chunk in a streaming response.
///
/// The streaming call is only used for the final, tool-free answer
/// turn, so chunks carry text deltas and a completion flag — nothing
/// else. The sequence is finite and not restartable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamChunk {
    /// Partial content delta
    #[serde(default)]
    pub content: Option<String>,

    /// Whether this is the final chunk
    #[serde(default)]
    pub done: bool,

    /// Usage info (typically only in the final chunk)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

/// The core Provider trait.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider (e.g., "vllm").
    fn name(&self) -> &str;

    /// Send a request and get a complete response.
    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError>;

    /// Send a request and get a stream of content deltas.
    ///
    /// Default implementation calls `complete()` and wraps the result
    /// as a single chunk followed by the done marker.
    async fn stream(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<
        tokio::sync::mpsc::Receiver<std::result::Result<StreamChunk, ProviderError>>,
        ProviderError,
    > {
        let response = self.complete(request).await?;
        let (tx, rx) = tokio::sync::mpsc::channel(2);
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
                usage: response.usage,
            }))
            .await;
        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finish_reason_mapping() {
        assert_eq!(FinishReason::from_api(Some("stop")), FinishReason::Stop);
        assert_eq!(
            FinishReason::from_api(Some("tool_calls")),
            FinishReason::ToolCalls
        );
        assert_eq!(FinishReason::from_api(Some("length")), FinishReason::Length);
        assert_eq!(
            FinishReason::from_api(Some("content_filter")),
            FinishReason::Other("content_filter".into())
        );
        assert_eq!(
            FinishReason::from_api(None),
            FinishReason::Other("unspecified".into())
        );
    }

    #[test]
    fn terminal_reasons() {
        assert!(FinishReason::Stop.is_terminal());
        assert!(FinishReason::Length.is_terminal());
        assert!(!FinishReason::ToolCalls.is_terminal());
        assert!(!FinishReason::Other("unspecified".into()).is_terminal());
    }

    #[test]
    fn tool_definition_serialization() {
        let tool = ToolDefinition {
            name: "list_compute_instances".into(),
            description: "List compute instances in the project".into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {}
            }),
        };
        let json = serde_json::to_string(&tool).unwrap();
        assert!(json.contains("list_compute_instances"));
    }

    #[tokio::test]
    async fn default_stream_wraps_complete() {
        struct OneShot;

        #[async_trait]
        impl Provider for OneShot {
            fn name(&self) -> &str {
                "oneshot"
            }

            async fn complete(
                &self,
                _request: ProviderRequest,
            ) -> Result<ProviderResponse, ProviderError> {
                Ok(ProviderResponse {
                    message: Message::assistant("hello"),
                    finish_reason: FinishReason::Stop,
                    model: "test".into(),
                    usage: None,
                })
            }
        }

        let provider = OneShot;
        let mut rx = provider
            .stream(ProviderRequest {
                model: "test".into(),
                messages: vec![],
                temperature: 0.0,
                max_tokens: None,
                tools: vec![],
                stream: true,
            })
            .await
            .unwrap();

        let first = rx.recv().await.unwrap().unwrap();
        assert_eq!(first.content.as_deref(), Some("hello"));
        assert!(!first.done);
        let last = rx.recv().await.unwrap().unwrap();
        assert!(last.done);
    }
}
