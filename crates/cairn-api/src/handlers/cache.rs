//! /cache handlers — inspect and invalidate the remote instance cache.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use cairn_core::ServiceIdentity;
use cairn_services::ServiceInstance;

use super::{parse_node_id, parse_version, ApiState};

// ── /cache (GET) ──────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct CacheResponse {
    pub ttl_secs: u64,
    pub instances: Vec<CachedInstance>,
}

#[derive(Debug, Serialize)]
pub struct CachedInstance {
    pub name: String,
    pub version: String,
    pub agent_id: String,
    pub node_id: String,
    pub response_time_ms: u64,
    pub last_seen_secs: u64,
}

pub async fn handle_cache(State(state): State<ApiState>) -> Json<CacheResponse> {
    let remote = state.resolver.remote();
    let mut snapshot = remote.snapshot();
    snapshot.sort_by(|a, b| {
        a.identity()
            .cmp(b.identity())
            .then(a.response_time_ms().cmp(&b.response_time_ms()))
    });

    let instances = snapshot
        .iter()
        .map(|i| CachedInstance {
            name: i.identity().name.clone(),
            version: i.identity().version.to_string(),
            agent_id: i.agent_id().to_string(),
            node_id: i.node_id().map(|n| n.to_string()).unwrap_or_default(),
            response_time_ms: i.response_time_ms(),
            last_seen_secs: i.last_seen().elapsed().as_secs(),
        })
        .collect();

    Json(CacheResponse {
        ttl_secs: remote.ttl().as_secs(),
        instances,
    })
}

// ── /cache/remove (POST) ──────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CacheRemoveRequest {
    pub name: String,
    pub version: String,
    pub agent_id: String,
    pub node_id: String,
}

#[derive(Debug, Serialize)]
pub struct CacheRemoveResponse {
    pub removed: bool,
}

pub async fn handle_cache_remove(
    State(state): State<ApiState>,
    Json(req): Json<CacheRemoveRequest>,
) -> Result<Json<CacheRemoveResponse>, (StatusCode, String)> {
    let version = parse_version(&req.version)?;
    let node_id = parse_node_id(&req.node_id)?;

    let instance = ServiceInstance::remote(ServiceIdentity::new(req.name, version), req.agent_id, node_id);
    let removed = state.resolver.remove_remote_instance(&instance);
    tracing::info!(instance = %instance, removed, "cache entry removal via API");

    Ok(Json(CacheRemoveResponse { removed }))
}

// ── /cache/clear (POST) ───────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct ClearResponse {
    pub cleared: usize,
}

pub async fn handle_cache_clear(State(state): State<ApiState>) -> Json<ClearResponse> {
    let cleared = state.resolver.remote().len();
    state.resolver.clear_remote_cache();
    tracing::info!(cleared, "cache cleared via API");
    Json(ClearResponse { cleared })
}
