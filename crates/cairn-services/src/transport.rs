//! The node layer the discovery core runs on.
//!
//! Routing, encryption and datagram plumbing live behind this trait. The
//! daemon implements it over UDP multicast; tests script it in memory.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use cairn_core::wire::Envelope;
use cairn_core::NodeId;

use crate::error::TransportError;

#[async_trait]
pub trait NodeTransport: Send + Sync {
    /// Send a request to its topic and collect raw replies.
    ///
    /// Returns after `max_replies` replies or once `timeout` elapses,
    /// whichever comes first. No replies is `Ok(vec![])`, not an error.
    /// Err is reserved for failures to transmit, or a transport that
    /// reports its deadline as `TransportError::Timeout`.
    async fn send_and_collect(
        &self,
        envelope: Envelope,
        max_replies: usize,
        timeout: Duration,
    ) -> Result<Vec<Bytes>, TransportError>;

    /// Instantaneous load signal. A busy node prefers remote instances.
    fn is_busy(&self) -> bool;

    /// Identity of this node, stamped on outgoing requests.
    fn node_id(&self) -> NodeId;
}
