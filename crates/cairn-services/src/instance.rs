//! Service instances — one runnable occurrence of a service, here or elsewhere.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use cairn_core::{AgentId, NodeId, ServiceIdentity};

/// A service running in-process on this node.
///
/// The registry holds an `Arc` handle to it. Two registrations are the same
/// service only if they share that handle.
pub trait LocalService: Send + Sync {
    /// The agent that answers discovery requests on behalf of this service.
    fn agent_id(&self) -> &str;
}

/// Where an instance runs.
#[derive(Clone)]
pub enum Locality {
    /// Owned by this node's registry.
    Local(Arc<dyn LocalService>),
    /// Known by identity only. We do not own the remote process.
    Remote { agent_id: AgentId, node_id: NodeId },
}

impl fmt::Debug for Locality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locality::Local(handle) => f
                .debug_tuple("Local")
                .field(&handle.agent_id())
                .finish(),
            Locality::Remote { agent_id, node_id } => f
                .debug_struct("Remote")
                .field("agent_id", agent_id)
                .field("node_id", node_id)
                .finish(),
        }
    }
}

/// Pointer identity, ignoring vtables.
fn same_handle(a: &Arc<dyn LocalService>, b: &Arc<dyn LocalService>) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}

/// One occurrence of a service, with the metadata used to rank and expire it.
#[derive(Debug, Clone)]
pub struct ServiceInstance {
    identity: ServiceIdentity,
    locality: Locality,
    /// Set at creation, refreshed by `touch`.
    last_seen: Instant,
    /// Only ranks Remote instances. Lower is better.
    response_time_ms: u64,
}

impl ServiceInstance {
    pub fn local(identity: ServiceIdentity, handle: Arc<dyn LocalService>) -> Self {
        Self {
            identity,
            locality: Locality::Local(handle),
            last_seen: Instant::now(),
            response_time_ms: 0,
        }
    }

    pub fn remote(identity: ServiceIdentity, agent_id: impl Into<AgentId>, node_id: NodeId) -> Self {
        Self {
            identity,
            locality: Locality::Remote {
                agent_id: agent_id.into(),
                node_id,
            },
            last_seen: Instant::now(),
            response_time_ms: 0,
        }
    }

    pub fn with_response_time(mut self, ms: u64) -> Self {
        self.response_time_ms = ms;
        self
    }

    pub fn identity(&self) -> &ServiceIdentity {
        &self.identity
    }

    pub fn locality(&self) -> &Locality {
        &self.locality
    }

    pub fn is_local(&self) -> bool {
        matches!(self.locality, Locality::Local(_))
    }

    pub fn local_handle(&self) -> Option<&Arc<dyn LocalService>> {
        match &self.locality {
            Locality::Local(handle) => Some(handle),
            Locality::Remote { .. } => None,
        }
    }

    /// Does this instance wrap exactly this local handle?
    pub fn has_handle(&self, handle: &Arc<dyn LocalService>) -> bool {
        self.local_handle().is_some_and(|h| same_handle(h, handle))
    }

    pub fn agent_id(&self) -> &str {
        match &self.locality {
            Locality::Local(handle) => handle.agent_id(),
            Locality::Remote { agent_id, .. } => agent_id,
        }
    }

    /// The remote node, or None for a local instance.
    pub fn node_id(&self) -> Option<NodeId> {
        match &self.locality {
            Locality::Local(_) => None,
            Locality::Remote { node_id, .. } => Some(*node_id),
        }
    }

    pub fn response_time_ms(&self) -> u64 {
        self.response_time_ms
    }

    pub fn last_seen(&self) -> Instant {
        self.last_seen
    }

    /// Mark as observed now.
    pub fn touch(&mut self) {
        self.last_seen = Instant::now();
    }

    /// Not seen for longer than `ttl`. A ttl past the end of the clock
    /// never expires.
    pub fn is_outdated(&self, ttl: Duration) -> bool {
        match self.last_seen.checked_add(ttl) {
            Some(expiry) => expiry < Instant::now(),
            None => false,
        }
    }
}

/// Local instances are equal when they share a handle; remote ones when they
/// share (agent, node). A local never equals a remote.
impl PartialEq for ServiceInstance {
    fn eq(&self, other: &Self) -> bool {
        match (&self.locality, &other.locality) {
            (Locality::Local(a), Locality::Local(b)) => same_handle(a, b),
            (
                Locality::Remote { agent_id, node_id },
                Locality::Remote {
                    agent_id: other_agent,
                    node_id: other_node,
                },
            ) => agent_id == other_agent && node_id == other_node,
            _ => false,
        }
    }
}

impl Eq for ServiceInstance {}

impl fmt::Display for ServiceInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.locality {
            Locality::Local(handle) => write!(f, "{} (local, {})", self.identity, handle.agent_id()),
            Locality::Remote { agent_id, node_id } => {
                write!(f, "{} ({} on {})", self.identity, agent_id, node_id.short())
            }
        }
    }
}
