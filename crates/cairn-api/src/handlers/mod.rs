//! HTTP API handlers — exposes resolver state as JSON.

pub mod cache;
pub mod resolve;
pub mod status;

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::http::StatusCode;
use serde::Serialize;

use cairn_core::{AgentId, NodeId, ServiceVersion};
use cairn_services::{Resolver, ServiceInstance};

#[derive(Clone)]
pub struct ApiState {
    pub resolver: Arc<Resolver>,
    /// When the daemon started, for the uptime readout.
    pub started_at: Instant,
    /// Agent that API-triggered discovery rounds are sent on behalf of.
    pub agent_id: AgentId,
}

/// One instance as the API shows it.
#[derive(Debug, Serialize)]
pub struct InstanceInfo {
    pub name: String,
    pub version: String,
    pub local: bool,
    pub agent_id: String,
    /// None for local instances.
    pub node_id: Option<String>,
    pub response_time_ms: u64,
}

impl From<&ServiceInstance> for InstanceInfo {
    fn from(instance: &ServiceInstance) -> Self {
        Self {
            name: instance.identity().name.clone(),
            version: instance.identity().version.to_string(),
            local: instance.is_local(),
            agent_id: instance.agent_id().to_string(),
            node_id: instance.node_id().map(|n| n.to_string()),
            response_time_ms: instance.response_time_ms(),
        }
    }
}

// ── Shared helpers ────────────────────────────────────────────────────────────

fn parse_version(s: &str) -> Result<ServiceVersion, (StatusCode, String)> {
    s.parse()
        .map_err(|e| (StatusCode::BAD_REQUEST, format!("invalid version {s:?}: {e}")))
}

/// Parse a hex-encoded 32-byte node id.
fn parse_node_id(hex_str: &str) -> Result<NodeId, (StatusCode, String)> {
    hex_str
        .parse()
        .map_err(|_| (StatusCode::BAD_REQUEST, "node_id must be 32 hex-encoded bytes".to_string()))
}

/// h:mm:ss
fn format_uptime(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
}

pub use cache::{handle_cache, handle_cache_clear, handle_cache_remove};
pub use resolve::handle_resolve;
pub use status::{handle_services, handle_status};
