//! /status and /services handlers.

use std::collections::BTreeMap;

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use super::{format_uptime, ApiState};

// ── /status ──────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub node_id: String,
    pub busy: bool,
    pub uptime: String,
    pub local_services: Vec<LocalServiceInfo>,
    pub remote_instances: usize,
}

#[derive(Debug, Serialize)]
pub struct LocalServiceInfo {
    pub name: String,
    pub version: String,
    pub agent_id: String,
}

pub async fn handle_status(State(state): State<ApiState>) -> Json<StatusResponse> {
    let resolver = &state.resolver;

    let mut local = resolver.local().snapshot();
    local.sort_by(|a, b| a.identity().cmp(b.identity()));
    let local_services = local
        .iter()
        .map(|i| LocalServiceInfo {
            name: i.identity().name.clone(),
            version: i.identity().version.to_string(),
            agent_id: i.agent_id().to_string(),
        })
        .collect();

    Json(StatusResponse {
        node_id: resolver.node_id().to_string(),
        busy: resolver.is_busy(),
        uptime: format_uptime(state.started_at.elapsed()),
        local_services,
        remote_instances: resolver.remote().len(),
    })
}

// ── /services ─────────────────────────────────────────────────────────────────

/// Local service names mapped to their versions, newest first.
#[derive(Debug, Serialize)]
pub struct ServicesResponse {
    pub services: BTreeMap<String, Vec<String>>,
}

pub async fn handle_services(State(state): State<ApiState>) -> Json<ServicesResponse> {
    let local = state.resolver.local();
    let services = local
        .list_names()
        .into_iter()
        .map(|name| {
            let versions = local.list_versions(&name).iter().map(|v| v.to_string()).collect();
            (name, versions)
        })
        .collect();

    Json(ServicesResponse { services })
}
