//! Local service registry — the services hosted on this node.
//!
//! A concurrent map from service name to that name's versions. Each
//! (name, version) holds at most one local instance. Register and unregister
//! check and mutate inside one entry guard, so a conflicting registration
//! can never slip in between the check and the insert.

use std::collections::BTreeMap;
use std::sync::Arc;

use dashmap::DashMap;

use cairn_core::{ServiceIdentity, ServiceRequest, ServiceVersion, VersionConstraint};

use crate::announce::{Announcer, NoopAnnouncer};
use crate::error::{DiscoveryError, Result};
use crate::instance::{LocalService, ServiceInstance};

type VersionMap = BTreeMap<ServiceVersion, ServiceInstance>;

/// The services this node runs. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct LocalServiceRegistry {
    services: Arc<DashMap<String, VersionMap>>,
    announcer: Arc<dyn Announcer>,
}

impl Default for LocalServiceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalServiceRegistry {
    pub fn new() -> Self {
        Self::with_announcer(Arc::new(NoopAnnouncer))
    }

    /// A registry that reports (un)registrations to `announcer`.
    pub fn with_announcer(announcer: Arc<dyn Announcer>) -> Self {
        Self {
            services: Arc::new(DashMap::new()),
            announcer,
        }
    }

    /// Register `handle` as the local instance of `identity`.
    ///
    /// Registering the same handle twice is a no-op. A different handle under
    /// an occupied identity is a `RegistryConflict`.
    pub fn register(&self, identity: ServiceIdentity, handle: Arc<dyn LocalService>) -> Result<()> {
        let instance = {
            let mut versions = self.services.entry(identity.name.clone()).or_default();
            match versions.get(&identity.version) {
                Some(existing) if existing.has_handle(&handle) => return Ok(()),
                Some(_) => return Err(DiscoveryError::RegistryConflict { identity }),
                None => {}
            }
            let instance = ServiceInstance::local(identity.clone(), handle);
            versions.insert(identity.version, instance.clone());
            instance
        };

        tracing::info!(service = %identity, agent = instance.agent_id(), "local service registered");
        self.announcer.announce_deployment(&instance);
        Ok(())
    }

    /// Remove the local instance of `identity`.
    ///
    /// Absent identities are a no-op. A handle other than the registered one
    /// is a `RegistryConflict` and leaves the registry untouched.
    pub fn unregister(&self, identity: &ServiceIdentity, handle: &Arc<dyn LocalService>) -> Result<()> {
        let removed = {
            let Some(mut versions) = self.services.get_mut(&identity.name) else {
                return Ok(());
            };
            match versions.get(&identity.version) {
                None => return Ok(()),
                Some(existing) if !existing.has_handle(handle) => {
                    return Err(DiscoveryError::RegistryConflict {
                        identity: identity.clone(),
                    })
                }
                Some(_) => {}
            }
            versions.remove(&identity.version)
        };
        self.services
            .remove_if(&identity.name, |_, versions| versions.is_empty());

        if let Some(instance) = removed {
            tracing::info!(service = %identity, "local service unregistered");
            self.announcer.announce_deployment_end(&instance);
        }
        Ok(())
    }

    /// The instance registered under exactly this name and version.
    pub fn lookup_exact(&self, name: &str, version: &ServiceVersion) -> Option<ServiceInstance> {
        self.services
            .get(name)
            .and_then(|versions| versions.get(version).cloned())
    }

    /// The newest registered version of `name` that fits `constraint`.
    pub fn lookup_compatible(&self, name: &str, constraint: &VersionConstraint) -> Option<ServiceInstance> {
        self.services.get(name).and_then(|versions| {
            versions
                .iter()
                .rev()
                .find(|(version, _)| version.fits(constraint))
                .map(|(_, instance)| instance.clone())
        })
    }

    /// The handle behind an exact identity.
    pub fn local_service(&self, identity: &ServiceIdentity) -> Result<Arc<dyn LocalService>> {
        self.lookup_exact(&identity.name, &identity.version)
            .and_then(|instance| instance.local_handle().cloned())
            .ok_or_else(|| DiscoveryError::not_found(&identity.as_request(), None))
    }

    /// Names with at least one local version, sorted.
    pub fn list_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.services.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Local versions of `name`, newest first.
    pub fn list_versions(&self, name: &str) -> Vec<ServiceVersion> {
        self.services
            .get(name)
            .map(|versions| versions.keys().rev().copied().collect())
            .unwrap_or_default()
    }

    /// Copy of every local instance, for walks that must not hold locks.
    pub fn snapshot(&self) -> Vec<ServiceInstance> {
        self.services
            .iter()
            .flat_map(|e| e.value().values().cloned().collect::<Vec<_>>())
            .collect()
    }

    /// Would `request` be served locally?
    pub fn serves(&self, request: &ServiceRequest, exact: bool) -> Option<ServiceInstance> {
        if exact {
            let version = request.constraint.pinned()?;
            self.lookup_exact(&request.name, &version)
        } else {
            self.lookup_compatible(&request.name, &request.constraint)
        }
    }

    /// Total number of local instances.
    pub fn len(&self) -> usize {
        self.services.iter().map(|e| e.value().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}
