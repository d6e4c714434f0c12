//! Cloud inventory tool implementations for Nimbus.
//!
//! Each tool wraps one endpoint of the cloud-helper service. The
//! catalog is fixed: it is assembled once at startup by
//! `default_registry` and never mutated at runtime. Every tool makes
//! a single attempt with its own timeout; failures come back as
//! values for the model to react to, not as retries or crashes.

pub mod client;
pub mod compute_instances;
pub mod gke_clusters;
pub mod instance_details;
pub mod project_info;

pub use client::HelperClient;

use nimbus_core::tool::ToolRegistry;
use std::sync::Arc;

/// Create the default tool registry with the full cloud catalog.
///
/// Registration order is the order the model sees the catalog in, so
/// the most commonly requested tool comes first.
pub fn default_registry(config: &nimbus_config::CloudConfig) -> ToolRegistry {
    let client = Arc::new(HelperClient::from_config(config));

    let mut registry = ToolRegistry::new();
    registry.register(Box::new(compute_instances::ListComputeInstancesTool::new(
        client.clone(),
    )));
    registry.register(Box::new(instance_details::GetInstanceDetailsTool::new(
        client.clone(),
    )));
    registry.register(Box::new(gke_clusters::ListGkeClustersTool::new(
        client.clone(),
    )));
    registry.register(Box::new(project_info::GetProjectInfoTool::new(client)));
    registry
}
