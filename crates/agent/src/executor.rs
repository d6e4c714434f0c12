//! Tool executor — dispatches model-issued tool calls.
//!
//! `invoke` is total: every tool call yields a `ToolResult`, failures
//! included. Unknown tool names, malformed argument payloads, and
//! handler errors all fold into a failure result whose output explains
//! what went wrong, so the model can react and the turn stays alive.

use nimbus_core::event::{DomainEvent, EventBus};
use nimbus_core::message::MessageToolCall;
use nimbus_core::tool::{ToolCall, ToolRegistry, ToolResult};
use std::sync::Arc;
use tracing::{debug, warn};

pub struct ToolExecutor {
    registry: Arc<ToolRegistry>,
    event_bus: Arc<EventBus>,
}

impl ToolExecutor {
    pub fn new(registry: Arc<ToolRegistry>, event_bus: Arc<EventBus>) -> Self {
        Self {
            registry,
            event_bus,
        }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Execute one tool call. Always returns a result — soft failures
    /// are reported back to the model, never to the caller.
    pub async fn invoke(&self, call: &MessageToolCall) -> ToolResult {
        let start = std::time::Instant::now();

        let result = self.dispatch(call).await;

        let duration_ms = start.elapsed().as_millis() as u64;
        debug!(
            tool = %call.name,
            success = result.success,
            duration_ms,
            "Tool call finished"
        );
        self.event_bus.publish(DomainEvent::ToolExecuted {
            tool_name: call.name.clone(),
            success: result.success,
            duration_ms,
            timestamp: chrono::Utc::now(),
        });

        result
    }

    async fn dispatch(&self, call: &MessageToolCall) -> ToolResult {
        let Some(tool) = self.registry.get(&call.name) else {
            warn!(tool = %call.name, "Unknown tool requested");
            return failure(
                &call.id,
                format!(
                    "Unknown tool: {}. Available tools: {}",
                    call.name,
                    self.registry.names().join(", ")
                ),
            );
        };

        let arguments = match parse_arguments(&call.arguments) {
            Ok(args) => args,
            Err(reason) => {
                warn!(tool = %call.name, %reason, "Malformed tool arguments");
                return failure(
                    &call.id,
                    format!("Invalid arguments for {}: {reason}", call.name),
                );
            }
        };

        let tool_call = ToolCall {
            id: call.id.clone(),
            name: call.name.clone(),
            arguments,
        };

        match tool.execute(tool_call.arguments).await {
            Ok(mut result) => {
                result.call_id = call.id.clone();
                result
            }
            Err(e) => {
                warn!(tool = %call.name, error = %e, "Tool execution failed");
                failure(&call.id, format!("Error: {e}"))
            }
        }
    }
}

/// Parse the model's raw argument string. An empty string means "no
/// arguments" — some backends emit that instead of `{}`.
fn parse_arguments(raw: &str) -> Result<serde_json::Value, String> {
    if raw.trim().is_empty() {
        return Ok(serde_json::json!({}));
    }
    let value: serde_json::Value = serde_json::from_str(raw).map_err(|e| e.to_string())?;
    if !value.is_object() {
        return Err(format!("expected a JSON object, got: {value}"));
    }
    Ok(value)
}

fn failure(call_id: &str, output: String) -> ToolResult {
    ToolResult {
        call_id: call_id.to_string(),
        success: false,
        output,
        data: None,
    }
}
