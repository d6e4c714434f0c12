//! GKE cluster listing tool.
//!
//! The helper shells out to `gcloud container clusters list` with a
//! 30 second budget, so this tool's timeout matches it rather than
//! the 10s used for the direct compute API calls.

use crate::client::HelperClient;
use crate::compute_instances::map_client_error;
use async_trait::async_trait;
use nimbus_core::error::ToolError;
use nimbus_core::tool::{Tool, ToolResult};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

const TIMEOUT: Duration = Duration::from_secs(30);

pub struct ListGkeClustersTool {
    client: Arc<HelperClient>,
}

impl ListGkeClustersTool {
    pub fn new(client: Arc<HelperClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for ListGkeClustersTool {
    fn name(&self) -> &str {
        "list_gke_clusters"
    }

    fn description(&self) -> &str {
        "List the GKE (Kubernetes) clusters in the current cloud project. \
         Use this when the user asks about their clusters or Kubernetes workload capacity. \
         Returns name, location, status, and node count for each cluster."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {}
        })
    }

    async fn execute(&self, _arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let payload: ClustersPayload = self
            .client
            .get("/api/gke/clusters", TIMEOUT)
            .await
            .map_err(|e| map_client_error(self.name(), e))?;

        let output = format_clusters(&payload);
        let data = serde_json::to_value(&payload).ok();

        Ok(ToolResult {
            call_id: String::new(),
            success: true,
            output,
            data,
        })
    }
}

/// The helper relays gcloud's JSON verbatim, so clusters stay loosely
/// typed and the formatter reads the fields it knows about.
#[derive(Debug, Serialize, Deserialize)]
pub struct ClustersPayload {
    #[serde(default)]
    pub project_id: String,
    #[serde(default)]
    pub clusters: Vec<serde_json::Value>,
    #[serde(default)]
    pub count: usize,
}

fn format_clusters(payload: &ClustersPayload) -> String {
    if payload.count == 0 {
        return format!("No GKE clusters found in project {}.", payload.project_id);
    }

    let mut out = format!(
        "Found {} GKE cluster(s) in project {}:\n\n",
        payload.count, payload.project_id
    );
    for cluster in &payload.clusters {
        let name = cluster["name"].as_str().unwrap_or("unknown");
        let location = cluster["location"]
            .as_str()
            .or_else(|| cluster["zone"].as_str())
            .unwrap_or("unknown");
        let status = cluster["status"].as_str().unwrap_or("unknown");

        out.push_str(&format!("- Name: {name}\n"));
        out.push_str(&format!("  Location: {location}\n"));
        out.push_str(&format!("  Status: {status}\n"));
        if let Some(nodes) = cluster["currentNodeCount"].as_u64() {
            out.push_str(&format!("  Nodes: {nodes}\n"));
        }
        if let Some(version) = cluster["currentMasterVersion"].as_str() {
            out.push_str(&format!("  Version: {version}\n"));
        }
        out.push('\n');
    }
    out
}
