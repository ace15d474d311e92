//! UDP transport for discovery rounds.
//!
//! Requests go out once to ff02::1 on the discovery port. Responders answer
//! unicast to the request's source address, so each round uses a fresh
//! ephemeral socket and whatever arrives on it belongs to that round.

use std::future::Future;
use std::io;
use std::net::SocketAddrV6;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::time::Instant;

use cairn_core::wire::{self, Envelope, MAX_DATAGRAM};
use cairn_core::NodeId;
use cairn_services::{NodeTransport, TransportError};

use crate::load::LoadMonitor;
use crate::net;

pub struct UdpTransport {
    node_id: NodeId,
    interface_index: u32,
    dest: SocketAddrV6,
    load: LoadMonitor,
}

impl UdpTransport {
    pub fn new(node_id: NodeId, interface_index: u32, discovery_port: u16, load: LoadMonitor) -> anyhow::Result<Self> {
        Ok(Self {
            node_id,
            interface_index,
            dest: net::multicast_dest(discovery_port, interface_index)?,
            load,
        })
    }
}

#[async_trait]
impl NodeTransport for UdpTransport {
    async fn send_and_collect(
        &self,
        envelope: Envelope,
        max_replies: usize,
        timeout: Duration,
    ) -> Result<Vec<Bytes>, TransportError> {
        let bytes = wire::encode(&envelope).map_err(|e| TransportError::Send(e.to_string()))?;
        let socket = net::request_socket(self.interface_index).map_err(|e| TransportError::Send(format!("{e:#}")))?;

        socket
            .send_to(&bytes, self.dest)
            .await
            .map_err(|e| TransportError::Send(e.to_string()))?;
        tracing::trace!(bytes = bytes.len(), dest = %self.dest, "discovery request sent");

        let socket = &socket;
        let replies = collect_replies(
            move || async move {
                let mut buf = vec![0u8; MAX_DATAGRAM];
                let (len, from) = socket.recv_from(&mut buf).await?;
                tracing::trace!(bytes = len, %from, "discovery reply received");
                buf.truncate(len);
                Ok::<_, io::Error>(Bytes::from(buf))
            },
            max_replies,
            timeout,
        )
        .await;
        Ok(replies)
    }

    fn is_busy(&self) -> bool {
        self.load.is_busy()
    }

    fn node_id(&self) -> NodeId {
        self.node_id
    }
}

/// Pull datagrams from `recv` until `max_replies` arrive, the deadline
/// passes or a receive fails. A timeout past the end of the clock means no
/// deadline.
async fn collect_replies<F, Fut>(mut recv: F, max_replies: usize, timeout: Duration) -> Vec<Bytes>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = io::Result<Bytes>>,
{
    let deadline = Instant::now().checked_add(timeout);
    let mut replies = Vec::new();

    while replies.len() < max_replies {
        let received = match deadline {
            Some(deadline) => match tokio::time::timeout_at(deadline, recv()).await {
                Ok(r) => r,
                // Deadline. Whatever arrived is the answer.
                Err(_) => break,
            },
            None => recv().await,
        };

        match received {
            Ok(datagram) => replies.push(datagram),
            Err(e) => {
                tracing::warn!(error = %e, collected = replies.len(), "recv_from failed, ending discovery round");
                break;
            }
        }
    }
    replies
}
