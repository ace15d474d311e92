//! In-memory doubles for tests: a dummy local service, an announcer that
//! records calls, and a transport that replays scripted reply rounds.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use cairn_core::wire::{self, Content, DiscoveryReply, Envelope};
use cairn_core::{NodeId, ServiceIdentity};

use crate::announce::Announcer;
use crate::error::TransportError;
use crate::instance::{LocalService, ServiceInstance};
use crate::transport::NodeTransport;

/// A local service that does nothing but carry an agent id.
#[derive(Debug)]
pub struct TestService {
    agent_id: String,
}

impl TestService {
    pub fn new(agent_id: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            agent_id: agent_id.into(),
        })
    }
}

impl LocalService for TestService {
    fn agent_id(&self) -> &str {
        &self.agent_id
    }
}

#[derive(Default)]
pub struct RecordingAnnouncer {
    deployed: Mutex<Vec<ServiceIdentity>>,
    ended: Mutex<Vec<ServiceIdentity>>,
}

impl RecordingAnnouncer {
    pub fn deployed(&self) -> Vec<ServiceIdentity> {
        self.deployed.lock().unwrap().clone()
    }

    pub fn ended(&self) -> Vec<ServiceIdentity> {
        self.ended.lock().unwrap().clone()
    }
}

impl Announcer for RecordingAnnouncer {
    fn announce_deployment(&self, instance: &ServiceInstance) {
        self.deployed.lock().unwrap().push(instance.identity().clone());
    }

    fn announce_deployment_end(&self, instance: &ServiceInstance) {
        self.ended.lock().unwrap().push(instance.identity().clone());
    }
}

type Round = Result<Vec<Bytes>, TransportError>;

/// Replays queued reply rounds, one per `send_and_collect`. An empty queue
/// answers with silence. Every sent envelope is kept for inspection.
pub struct ScriptedTransport {
    node_id: NodeId,
    busy: AtomicBool,
    rounds: Mutex<VecDeque<Round>>,
    sent: Mutex<Vec<Envelope>>,
    calls: AtomicUsize,
}

impl ScriptedTransport {
    pub fn new(node_id: NodeId) -> Self {
        Self {
            node_id,
            busy: AtomicBool::new(false),
            rounds: Mutex::new(VecDeque::new()),
            sent: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn set_busy(&self, busy: bool) {
        self.busy.store(busy, Ordering::Relaxed);
    }

    pub fn push_replies(&self, replies: Vec<Bytes>) {
        self.push_round(Ok(replies));
    }

    pub fn push_round(&self, round: Round) {
        self.rounds.lock().unwrap().push_back(round);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }

    pub fn sent(&self) -> Vec<Envelope> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl NodeTransport for ScriptedTransport {
    async fn send_and_collect(
        &self,
        envelope: Envelope,
        max_replies: usize,
        _timeout: Duration,
    ) -> Result<Vec<Bytes>, TransportError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        self.sent.lock().unwrap().push(envelope);
        let round = self.rounds.lock().unwrap().pop_front();
        match round {
            Some(Ok(mut replies)) => {
                replies.truncate(max_replies);
                Ok(replies)
            }
            Some(Err(e)) => Err(e),
            None => Ok(Vec::new()),
        }
    }

    fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Relaxed)
    }

    fn node_id(&self) -> NodeId {
        self.node_id
    }
}

/// An encoded reply from `agent` on `node`, announcing `name@version`.
pub fn reply_bytes(name: &str, version: &str, agent: &str, node: NodeId) -> Bytes {
    let envelope = Envelope {
        sender: agent.to_string(),
        sending_node: node,
        topic: wire::topic_for(name),
        content: Content::DiscoveryReply(DiscoveryReply {
            service_name: name.to_string(),
            version: version.parse().expect("valid version"),
        }),
    };
    Bytes::from(wire::encode(&envelope).expect("reply fits in a datagram"))
}
