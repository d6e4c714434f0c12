//! Single-instance detail tool.
//!
//! Fetches one instance by zone and name, including CPU platform,
//! attached disks, and labels.

use crate::client::HelperClient;
use crate::compute_instances::map_client_error;
use async_trait::async_trait;
use nimbus_core::error::ToolError;
use nimbus_core::tool::{Tool, ToolResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

const TIMEOUT: Duration = Duration::from_secs(10);

pub struct GetInstanceDetailsTool {
    client: Arc<HelperClient>,
}

impl GetInstanceDetailsTool {
    pub fn new(client: Arc<HelperClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for GetInstanceDetailsTool {
    fn name(&self) -> &str {
        "get_instance_details"
    }

    fn description(&self) -> &str {
        "Get full details of one compute instance by zone and name: status, machine type, \
         IP addresses, CPU platform, attached disks, and labels. Use this when the user \
         asks about a specific instance."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "zone": {
                    "type": "string",
                    "description": "The zone the instance runs in (e.g. us-central1-a)"
                },
                "name": {
                    "type": "string",
                    "description": "The instance name"
                }
            },
            "required": ["zone", "name"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let zone = arguments["zone"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'zone' argument".into()))?;
        let name = arguments["name"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'name' argument".into()))?;

        let detail: InstanceDetail = self
            .client
            .get(&format!("/api/compute/instance/{zone}/{name}"), TIMEOUT)
            .await
            .map_err(|e| map_client_error(self.name(), e))?;

        let output = format_instance_detail(&detail);
        let data = serde_json::to_value(&detail).ok();

        Ok(ToolResult {
            call_id: String::new(),
            success: true,
            output,
            data,
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct InstanceDetail {
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
    #[serde(default)]
    pub cpu_platform: Option<String>,
    #[serde(default)]
    pub disks: Vec<DiskInfo>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DiskInfo {
    pub name: String,
    #[serde(default)]
    pub boot: bool,
}

fn format_instance_detail(detail: &InstanceDetail) -> String {
    let mut out = format!("Instance {} (zone {}):\n", detail.name, detail.zone);
    out.push_str(&format!("  Status: {}\n", detail.status));
    out.push_str(&format!("  Machine Type: {}\n", detail.machine_type));
    if let Some(platform) = &detail.cpu_platform {
        out.push_str(&format!("  CPU Platform: {platform}\n"));
    }
    if let Some(ip) = &detail.internal_ip {
        out.push_str(&format!("  Internal IP: {ip}\n"));
    }
    if let Some(ip) = &detail.external_ip {
        out.push_str(&format!("  External IP: {ip}\n"));
    }
    if let Some(ts) = &detail.creation_timestamp {
        out.push_str(&format!("  Created: {ts}\n"));
    }
    if !detail.disks.is_empty() {
        out.push_str("  Disks:\n");
        for disk in &detail.disks {
            let boot = if disk.boot { " (boot)" } else { "" };
            out.push_str(&format!("    - {}{boot}\n", disk.name));
        }
    }
    if !detail.labels.is_empty() {
        out.push_str("  Labels:\n");
        for (key, value) in &detail.labels {
            out.push_str(&format!("    {key}: {value}\n"));
        }
    }
    out
}
