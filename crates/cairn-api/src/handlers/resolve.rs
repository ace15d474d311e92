//! /resolve — run the resolver on behalf of an HTTP caller.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use cairn_services::DiscoveryError;

use super::{ApiState, InstanceInfo};
use cairn_core::ServiceRequest;

#[derive(Debug, Deserialize)]
pub struct ResolveRequest {
    pub name: String,
    /// Constraint string; "*" when omitted.
    #[serde(default = "any_version")]
    pub version: String,
    #[serde(default)]
    pub exact: bool,
    #[serde(default)]
    pub local_only: bool,
}

fn any_version() -> String {
    "*".to_string()
}

pub async fn handle_resolve(
    State(state): State<ApiState>,
    Json(req): Json<ResolveRequest>,
) -> Result<Json<InstanceInfo>, (StatusCode, String)> {
    let request = ServiceRequest::parse(req.name, &req.version)
        .map_err(|e| (StatusCode::BAD_REQUEST, format!("invalid version {:?}: {e}", req.version)))?;

    match state
        .resolver
        .resolve(&request, req.exact, req.local_only, &state.agent_id)
        .await
    {
        Ok(instance) => Ok(Json(InstanceInfo::from(&instance))),
        Err(e @ DiscoveryError::NotFound { .. }) => Err((StatusCode::NOT_FOUND, e.to_string())),
        Err(e) => {
            tracing::warn!(%request, error = %e, "resolve failed");
            Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
        }
    }
}
