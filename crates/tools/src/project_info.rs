//! Project information tool.

use crate::client::HelperClient;
use crate::compute_instances::map_client_error;
use async_trait::async_trait;
use nimbus_core::error::ToolError;
use nimbus_core::tool::{Tool, ToolResult};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

const TIMEOUT: Duration = Duration::from_secs(10);

pub struct GetProjectInfoTool {
    client: Arc<HelperClient>,
}

impl GetProjectInfoTool {
    pub fn new(client: Arc<HelperClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for GetProjectInfoTool {
    fn name(&self) -> &str {
        "get_project_info"
    }

    fn description(&self) -> &str {
        "Get basic information about the current cloud project: project id and the \
         service account in use. Use this when the user asks which project or account \
         they are working with."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {}
        })
    }

    async fn execute(&self, _arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let info: ProjectInfo = self
            .client
            .get("/api/project/info", TIMEOUT)
            .await
            .map_err(|e| map_client_error(self.name(), e))?;

        let output = format_project_info(&info);
        let data = serde_json::to_value(&info).ok();

        Ok(ToolResult {
            call_id: String::new(),
            success: true,
            output,
            data,
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProjectInfo {
    #[serde(default)]
    pub project_id: String,
    #[serde(default)]
    pub detected_project: Option<String>,
    #[serde(default)]
    pub service_account: Option<String>,
}

fn format_project_info(info: &ProjectInfo) -> String {
    let mut out = format!("Project: {}\n", info.project_id);
    if let Some(account) = &info.service_account {
        out.push_str(&format!("Service account: {account}\n"));
    }
    if let Some(detected) = &info.detected_project
        && detected != &info.project_id
    {
        out.push_str(&format!("Detected project (credentials): {detected}\n"));
    }
    out
}
