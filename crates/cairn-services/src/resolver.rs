//! Resolver — turn a symbolic request into one concrete instance.
//!
//! Local instances win unless the node is busy. A busy node, or one with no
//! local match, looks at the remote cache and runs a discovery round when the
//! cache has nothing fresh.

use std::sync::Arc;

use cairn_core::config::DiscoveryConfig;
use cairn_core::{NodeId, ServiceIdentity, ServiceRequest, ServiceVersion};

use crate::announce::{Announcer, NoopAnnouncer};
use crate::discovery::DiscoveryProtocol;
use crate::error::{DiscoveryError, Result};
use crate::instance::{LocalService, ServiceInstance};
use crate::local::LocalServiceRegistry;
use crate::remote::RemoteServiceCache;
use crate::transport::NodeTransport;

pub struct Resolver {
    local: LocalServiceRegistry,
    remote: RemoteServiceCache,
    discovery: DiscoveryProtocol,
    transport: Arc<dyn NodeTransport>,
}

impl Resolver {
    pub fn new(transport: Arc<dyn NodeTransport>, config: &DiscoveryConfig) -> Self {
        Self::with_announcer(transport, config, Arc::new(NoopAnnouncer))
    }

    pub fn with_announcer(
        transport: Arc<dyn NodeTransport>,
        config: &DiscoveryConfig,
        announcer: Arc<dyn Announcer>,
    ) -> Self {
        let remote = RemoteServiceCache::new(config.ttl());
        Self {
            local: LocalServiceRegistry::with_announcer(announcer),
            discovery: DiscoveryProtocol::new(transport.clone(), remote.clone(), config),
            remote,
            transport,
        }
    }

    /// Find an instance for `request`.
    ///
    /// `exact` addresses the single version the constraint pins. `local_only`
    /// never touches the cache or the network. `requester` is the agent the
    /// discovery request is sent on behalf of.
    pub async fn resolve(
        &self,
        request: &ServiceRequest,
        exact: bool,
        local_only: bool,
        requester: &str,
    ) -> Result<ServiceInstance> {
        let pinned = if exact {
            match request.constraint.pinned() {
                Some(version) => Some(version),
                None => return Err(DiscoveryError::not_found(request, None)),
            }
        } else {
            None
        };

        let local = match &pinned {
            Some(version) => self.local.lookup_exact(&request.name, version),
            None => self.local.lookup_compatible(&request.name, &request.constraint),
        };

        if local_only {
            return local.ok_or_else(|| DiscoveryError::not_found(request, None));
        }

        let busy = self.transport.is_busy();
        let mut remote = None;
        let mut cause = None;

        if local.is_none() || busy {
            remote = self.best_remote(request, pinned.as_ref());

            if remote.is_none() {
                tracing::debug!(%request, "remote cache miss");
                if let Err(e) = self.discovery.update(request, exact, requester).await {
                    tracing::info!(%request, error = %e, "discovery round failed");
                    if local.is_none() {
                        cause = Some(e);
                    }
                }
                remote = self.best_remote(request, pinned.as_ref());
            }
        }

        match (local, remote) {
            (Some(local), remote) if !busy || remote.is_none() => {
                tracing::debug!(%request, instance = %local, "resolved locally");
                Ok(local)
            }
            (_, Some(remote)) => {
                tracing::debug!(%request, instance = %remote, busy, "resolved remotely");
                Ok(remote)
            }
            _ => Err(DiscoveryError::not_found(request, cause)),
        }
    }

    fn best_remote(&self, request: &ServiceRequest, pinned: Option<&ServiceVersion>) -> Option<ServiceInstance> {
        match pinned {
            Some(version) => self.remote.best_exact(&request.name, version),
            None => self.remote.best_compatible(&request.name, &request.constraint),
        }
    }

    pub fn register_local_service(&self, identity: ServiceIdentity, handle: Arc<dyn LocalService>) -> Result<()> {
        self.local.register(identity, handle)
    }

    pub fn unregister_local_service(&self, identity: &ServiceIdentity, handle: &Arc<dyn LocalService>) -> Result<()> {
        self.local.unregister(identity, handle)
    }

    /// Forget a remote instance, e.g. one that turned out unreachable.
    pub fn remove_remote_instance(&self, instance: &ServiceInstance) -> bool {
        self.remote.remove(instance)
    }

    pub fn clear_remote_cache(&self) {
        self.remote.clear();
        tracing::info!("remote cache cleared");
    }

    pub fn local(&self) -> &LocalServiceRegistry {
        &self.local
    }

    pub fn remote(&self) -> &RemoteServiceCache {
        &self.remote
    }

    pub fn node_id(&self) -> NodeId {
        self.transport.node_id()
    }

    pub fn is_busy(&self) -> bool {
        self.transport.is_busy()
    }
}
