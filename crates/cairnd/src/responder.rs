//! Discovery responder.
//!
//! Listens on the discovery port for multicast requests and answers, unicast,
//! for every request this node's registry can serve.

use anyhow::{Context, Result};
use tokio::sync::broadcast;

use cairn_core::wire::{self, Content, DiscoveryReply, Envelope, MAX_DATAGRAM};
use cairn_core::{NodeId, ServiceRequest};
use cairn_services::LocalServiceRegistry;

use crate::net;

/// Answer discovery requests until shutdown.
pub async fn responder_loop(
    registry: LocalServiceRegistry,
    node_id: NodeId,
    port: u16,
    interface_index: u32,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    let socket = net::responder_socket(port, interface_index)
        .context("failed to create discovery responder socket")?;

    let mut buf = vec![0u8; MAX_DATAGRAM];

    tracing::info!(port, "discovery responder starting");

    loop {
        let (len, peer_addr) = tokio::select! {
            _ = shutdown.recv() => {
                tracing::info!("discovery responder stopping");
                return Ok(());
            }
            r = socket.recv_from(&mut buf) => match r {
                Ok(r) => r,
                Err(e) => {
                    tracing::warn!(error = %e, "recv_from failed");
                    continue;
                }
            },
        };

        let request = match wire::decode(&buf[..len]) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::trace!(error = %e, from = %peer_addr, "ignoring undecodable datagram");
                continue;
            }
        };

        let Some(reply) = answer(&registry, node_id, &request) else {
            continue;
        };

        let bytes = match wire::encode(&reply) {
            Ok(b) => b,
            Err(e) => {
                tracing::warn!(error = %e, "failed to encode discovery reply");
                continue;
            }
        };

        match socket.send_to(&bytes, peer_addr).await {
            Ok(n) => tracing::trace!(bytes = n, to = %peer_addr, agent = %reply.sender, "discovery reply sent"),
            Err(e) => tracing::warn!(error = %e, to = %peer_addr, "discovery reply send failed"),
        }
    }
}

/// The reply this node owes `envelope`, if any.
///
/// Our own requests, replies, requests whose topic does not match the
/// service they name, and services we do not run all get silence.
fn answer(registry: &LocalServiceRegistry, node_id: NodeId, envelope: &Envelope) -> Option<Envelope> {
    if envelope.sending_node == node_id {
        tracing::trace!("ignoring own discovery request");
        return None;
    }

    let Content::DiscoveryRequest(req) = &envelope.content else {
        return None;
    };

    if envelope.topic != wire::topic_for(&req.service_name) {
        tracing::debug!(service = %req.service_name, "discovery request topic mismatch");
        return None;
    }

    let request = ServiceRequest::new(req.service_name.clone(), req.version_constraint.clone());
    let instance = registry.serves(&request, req.exact)?;

    tracing::debug!(%request, exact = req.exact, requester = %envelope.sender, instance = %instance, "answering discovery request");

    Some(Envelope {
        sender: instance.agent_id().to_string(),
        sending_node: node_id,
        topic: envelope.topic,
        content: Content::DiscoveryReply(DiscoveryReply {
            service_name: instance.identity().name.clone(),
            version: instance.identity().version,
        }),
    })
}
