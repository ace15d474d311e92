//! Services hosted by the daemon itself, declared in the config file.

use std::sync::Arc;

use anyhow::{Context, Result};

use cairn_core::config::HostedService;
use cairn_core::{NodeId, ServiceIdentity};
use cairn_services::{LocalService, Resolver};

/// A configured service with nothing behind it but an answering agent.
#[derive(Debug)]
pub struct StaticService {
    agent_id: String,
}

impl StaticService {
    pub fn new(node_id: &NodeId, identity: &ServiceIdentity) -> Arc<Self> {
        Arc::new(Self {
            agent_id: agent_id_for(node_id, identity),
        })
    }
}

impl LocalService for StaticService {
    fn agent_id(&self) -> &str {
        &self.agent_id
    }
}

/// Stable per (node, service, version): the same node always answers for
/// a service under the same agent id.
fn agent_id_for(node_id: &NodeId, identity: &ServiceIdentity) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(node_id.as_bytes());
    hasher.update(identity.name.as_bytes());
    hasher.update(identity.version.to_string().as_bytes());
    hex::encode(&hasher.finalize().as_bytes()[..16])
}

/// Register every configured service. Returns the registered identities.
pub fn register_configured(resolver: &Resolver, hosted: &[HostedService]) -> Result<Vec<ServiceIdentity>> {
    let node_id = resolver.node_id();
    let mut registered = Vec::with_capacity(hosted.len());

    for service in hosted {
        let identity = ServiceIdentity::parse(service.name.clone(), &service.version)
            .with_context(|| format!("invalid version for service '{}'", service.name))?;
        let handle = StaticService::new(&node_id, &identity);
        resolver
            .register_local_service(identity.clone(), handle)
            .with_context(|| format!("failed to register {identity}"))?;
        registered.push(identity);
    }
    Ok(registered)
}
