//! Compute instance listing tool.
//!
//! Queries the helper's aggregated instance list and renders it as the
//! text block the model reports from: one bullet per instance with
//! zone, status, machine type, and IPs.

use crate::client::{ClientError, HelperClient};
use async_trait::async_trait;
use nimbus_core::error::ToolError;
use nimbus_core::tool::{Tool, ToolResult};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

const TIMEOUT: Duration = Duration::from_secs(10);

pub struct ListComputeInstancesTool {
    client: Arc<HelperClient>,
}

impl ListComputeInstancesTool {
    pub fn new(client: Arc<HelperClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for ListComputeInstancesTool {
    fn name(&self) -> &str {
        "list_compute_instances"
    }

    fn description(&self) -> &str {
        "List the compute instances (VMs) in the current cloud project. \
         Use this when the user asks about their instances, VMs, or compute resources. \
         Returns name, zone, status, machine type, and IP addresses for each instance."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {}
        })
    }

    async fn execute(&self, _arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let payload: InstancesPayload = self
            .client
            .get("/api/compute/instances", TIMEOUT)
            .await
            .map_err(|e| map_client_error(self.name(), e))?;

        let output = format_instances(&payload);
        let data = serde_json::to_value(&payload).ok();

        Ok(ToolResult {
            call_id: String::new(),
            success: true,
            output,
            data,
        })
    }
}

/// Map a helper failure onto the tool error taxonomy.
pub(crate) fn map_client_error(tool_name: &str, err: ClientError) -> ToolError {
    match err {
        ClientError::Timeout(timeout_secs) => ToolError::Timeout {
            tool_name: tool_name.to_string(),
            timeout_secs,
        },
        other => ToolError::ExecutionFailed {
            tool_name: tool_name.to_string(),
            reason: other.to_string(),
        },
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct InstancesPayload {
    #[serde(default)]
    pub project_id: String,
    #[serde(default)]
    pub instances: Vec<InstanceSummary>,
    #[serde(default)]
    pub count: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct InstanceSummary {
    pub name: String,
    pub zone: String,
    #[serde(default)]
    pub machine_type: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub internal_ip: Option<String>,
    #[serde(default)]
    pub external_ip: Option<String>,
    #[serde(default)]
    pub creation_timestamp: Option<String>,
}

fn format_instances(payload: &InstancesPayload) -> String {
    if payload.count == 0 {
        return format!(
            "No compute instances found in project {}.",
            payload.project_id
        );
    }

    let mut out = format!(
        "Found {} compute instance(s) in project {}:\n\n",
        payload.count, payload.project_id
    );
    for instance in &payload.instances {
        out.push_str(&format!("- Name: {}\n", instance.name));
        out.push_str(&format!("  Zone: {}\n", instance.zone));
        out.push_str(&format!("  Status: {}\n", instance.status));
        out.push_str(&format!("  Machine Type: {}\n", instance.machine_type));
        if let Some(ip) = &instance.internal_ip {
            out.push_str(&format!("  Internal IP: {ip}\n"));
        }
        if let Some(ip) = &instance.external_ip {
            out.push_str(&format!("  External IP: {ip}\n"));
        }
        out.push('\n');
    }
    out
}
