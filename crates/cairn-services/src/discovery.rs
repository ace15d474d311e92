//! Discovery rounds — ask the network who runs a service, fold the answers
//! into the remote cache.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;

use cairn_core::config::DiscoveryConfig;
use cairn_core::wire::{self, Content, DiscoveryRequest, Envelope};
use cairn_core::{ServiceIdentity, ServiceRequest};

use crate::error::{DiscoveryError, Result};
use crate::instance::ServiceInstance;
use crate::remote::RemoteServiceCache;
use crate::transport::NodeTransport;

pub struct DiscoveryProtocol {
    transport: Arc<dyn NodeTransport>,
    cache: RemoteServiceCache,
    wait_for_results: usize,
    timeout: Duration,
}

impl DiscoveryProtocol {
    pub fn new(transport: Arc<dyn NodeTransport>, cache: RemoteServiceCache, config: &DiscoveryConfig) -> Self {
        Self {
            transport,
            cache,
            wait_for_results: config.wait_for_results,
            timeout: config.timeout(),
        }
    }

    /// Run one discovery round for `request` on behalf of `requester`.
    ///
    /// Ok(true) if at least one reply made it into the cache. Silence is
    /// Ok(false). Only the transport itself failing is an error.
    pub async fn update(&self, request: &ServiceRequest, exact: bool, requester: &str) -> Result<bool> {
        let envelope = Envelope {
            sender: requester.to_string(),
            sending_node: self.transport.node_id(),
            topic: wire::topic_for(&request.name),
            content: Content::DiscoveryRequest(DiscoveryRequest {
                service_name: request.name.clone(),
                version_constraint: request.constraint.clone(),
                exact,
            }),
        };

        tracing::debug!(%request, exact, "discovery round starting");

        let replies = self
            .transport
            .send_and_collect(envelope, self.wait_for_results, self.timeout)
            .await?;

        if replies.is_empty() {
            tracing::debug!(%request, "discovery round got no replies");
            return Ok(false);
        }

        let folded = self.fold_replies(&replies);
        tracing::debug!(%request, received = replies.len(), folded, "discovery round complete");
        Ok(folded > 0)
    }

    /// Add every well-formed reply to the cache, ranked by arrival.
    /// Returns how many were accepted.
    fn fold_replies(&self, replies: &[Bytes]) -> usize {
        let mut rank = 0;
        for raw in replies {
            match parse_reply(raw) {
                Ok(instance) => {
                    rank += 1;
                    self.cache.add(instance.with_response_time(rank));
                }
                Err(e) => {
                    tracing::warn!(error = %e, len = raw.len(), "skipping discovery reply");
                }
            }
        }
        rank as usize
    }
}

/// Turn one raw reply into a remote instance.
fn parse_reply(raw: &[u8]) -> Result<ServiceInstance> {
    let envelope = wire::decode(raw)?;
    match envelope.content {
        Content::DiscoveryReply(reply) => Ok(ServiceInstance::remote(
            ServiceIdentity::new(reply.service_name, reply.version),
            envelope.sender,
            envelope.sending_node,
        )),
        other => Err(DiscoveryError::UnexpectedReply { kind: other.kind() }),
    }
}
