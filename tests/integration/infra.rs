//! In-memory network of Cairn nodes.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use cairn_core::config::DiscoveryConfig;
use cairn_core::wire::{self, Content, DiscoveryReply, Envelope};
use cairn_core::{NodeId, ServiceIdentity, ServiceRequest};
use cairn_services::testing::TestService;
use cairn_services::{LocalService, LocalServiceRegistry, NodeTransport, Resolver, TransportError};

pub use anyhow::Result;

struct Member {
    node_id: NodeId,
    registry: LocalServiceRegistry,
    /// A partitioned member hears nothing and answers nothing.
    partitioned: Arc<AtomicBool>,
}

#[derive(Default)]
struct Shared {
    members: Vec<Member>,
    /// Extra raw datagrams appended to every round, after the real replies.
    injected: Vec<Bytes>,
    /// When set, every round fails with this error instead.
    failure: Option<TransportError>,
}

/// The shared medium. Cheap to clone.
#[derive(Clone, Default)]
pub struct MemoryNetwork {
    shared: Arc<Mutex<Shared>>,
}

impl MemoryNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node with default discovery settings.
    pub fn node(&self, seed: u8) -> TestNode {
        self.node_with(seed, DiscoveryConfig::default())
    }

    pub fn node_with(&self, seed: u8, config: DiscoveryConfig) -> TestNode {
        let node_id = NodeId([seed; 32]);
        let partitioned = Arc::new(AtomicBool::new(false));
        let transport = Arc::new(MemoryTransport {
            node_id,
            network: self.clone(),
            busy: AtomicBool::new(false),
            partitioned: partitioned.clone(),
            rounds: AtomicUsize::new(0),
        });
        let resolver = Arc::new(Resolver::new(transport.clone(), &config));

        self.shared.lock().unwrap().members.push(Member {
            node_id,
            registry: resolver.local().clone(),
            partitioned,
        });

        TestNode { resolver, transport }
    }

    /// Append a raw datagram to every subsequent round.
    pub fn inject(&self, raw: Bytes) {
        self.shared.lock().unwrap().injected.push(raw);
    }

    pub fn fail_rounds_with(&self, error: TransportError) {
        self.shared.lock().unwrap().failure = Some(error);
    }

    /// Everything that would answer `request`, in membership order.
    fn deliver(&self, request: &Envelope) -> std::result::Result<Vec<Bytes>, TransportError> {
        let shared = self.shared.lock().unwrap();
        if let Some(e) = &shared.failure {
            return Err(e.clone());
        }

        let mut replies: Vec<Bytes> = shared
            .members
            .iter()
            .filter(|m| m.node_id != request.sending_node && !m.partitioned.load(Ordering::Relaxed))
            .filter_map(|m| answer(m, request))
            .collect();
        replies.extend(shared.injected.iter().cloned());
        Ok(replies)
    }
}

/// What one member's responder sends back, if anything.
fn answer(member: &Member, request: &Envelope) -> Option<Bytes> {
    let Content::DiscoveryRequest(req) = &request.content else {
        return None;
    };
    if request.topic != wire::topic_for(&req.service_name) {
        return None;
    }

    let wanted = ServiceRequest::new(req.service_name.clone(), req.version_constraint.clone());
    let instance = member.registry.serves(&wanted, req.exact)?;

    let reply = Envelope {
        sender: instance.agent_id().to_string(),
        sending_node: member.node_id,
        topic: request.topic,
        content: Content::DiscoveryReply(DiscoveryReply {
            service_name: instance.identity().name.clone(),
            version: instance.identity().version,
        }),
    };
    wire::encode(&reply).ok().map(Bytes::from)
}

pub struct MemoryTransport {
    node_id: NodeId,
    network: MemoryNetwork,
    busy: AtomicBool,
    partitioned: Arc<AtomicBool>,
    rounds: AtomicUsize,
}

#[async_trait]
impl NodeTransport for MemoryTransport {
    async fn send_and_collect(
        &self,
        envelope: Envelope,
        max_replies: usize,
        _timeout: Duration,
    ) -> std::result::Result<Vec<Bytes>, TransportError> {
        self.rounds.fetch_add(1, Ordering::SeqCst);
        if self.partitioned.load(Ordering::Relaxed) {
            return Ok(Vec::new());
        }

        // Let concurrent rounds interleave.
        tokio::task::yield_now().await;

        let mut replies = self.network.deliver(&envelope)?;
        replies.truncate(max_replies);
        Ok(replies)
    }

    fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Relaxed)
    }

    fn node_id(&self) -> NodeId {
        self.node_id
    }
}

/// One node on the in-memory network.
#[derive(Clone)]
pub struct TestNode {
    pub resolver: Arc<Resolver>,
    pub transport: Arc<MemoryTransport>,
}

impl TestNode {
    pub fn id(&self) -> NodeId {
        self.transport.node_id
    }

    /// Host `name@version` under a fresh handle. Returns the handle.
    pub fn host(&self, name: &str, version: &str) -> Arc<dyn LocalService> {
        let handle: Arc<dyn LocalService> = TestService::new(format!("{name}-{version}-on-{}", self.id().short()));
        self.resolver
            .register_local_service(identity(name, version), handle.clone())
            .unwrap();
        handle
    }

    pub fn set_busy(&self, busy: bool) {
        self.transport.busy.store(busy, Ordering::Relaxed);
    }

    pub fn set_partitioned(&self, partitioned: bool) {
        self.transport.partitioned.store(partitioned, Ordering::Relaxed);
    }

    /// Discovery rounds this node has started.
    pub fn rounds(&self) -> usize {
        self.transport.rounds.load(Ordering::SeqCst)
    }

    pub async fn resolve(
        &self,
        name: &str,
        constraint: &str,
        exact: bool,
        local_only: bool,
    ) -> cairn_services::Result<cairn_services::ServiceInstance> {
        self.resolver
            .resolve(&request(name, constraint), exact, local_only, "tester")
            .await
    }
}

pub fn identity(name: &str, version: &str) -> ServiceIdentity {
    ServiceIdentity::parse(name, version).unwrap()
}

pub fn request(name: &str, constraint: &str) -> ServiceRequest {
    ServiceRequest::parse(name, constraint).unwrap()
}
