//! Remote service cache — instances learned from discovery replies.
//!
//! name → version → instances, versions visited newest first. Entries are
//! never swept by a timer. Every lookup drops the outdated instances it walks
//! past and prunes containers left empty, so stale knowledge disappears as a
//! side effect of being asked about.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;

use cairn_core::{ServiceVersion, VersionConstraint};

use crate::instance::ServiceInstance;

/// Instances of one (name, version), in insertion order.
/// Ranking is by response time; the first inserted wins ties.
type InstanceSet = Vec<ServiceInstance>;
type VersionMap = BTreeMap<ServiceVersion, InstanceSet>;

/// Cache of remote instances. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct RemoteServiceCache {
    services: Arc<DashMap<String, VersionMap>>,
    ttl: Duration,
}

impl RemoteServiceCache {
    /// A cache whose entries expire `ttl` after they were last seen.
    pub fn new(ttl: Duration) -> Self {
        Self {
            services: Arc::new(DashMap::new()),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Insert a remote instance. Returns true if it was new.
    ///
    /// An equal instance already present is touched instead; its rank is
    /// left as it was.
    pub fn add(&self, instance: ServiceInstance) -> bool {
        if instance.is_local() {
            tracing::warn!(service = %instance.identity(), "refusing to cache a local instance");
            return false;
        }

        let identity = instance.identity().clone();
        let mut versions = self.services.entry(identity.name.clone()).or_default();
        let set = versions.entry(identity.version).or_default();

        if let Some(existing) = set.iter_mut().find(|i| **i == instance) {
            existing.touch();
            tracing::trace!(service = %identity, agent = instance.agent_id(), "remote instance refreshed");
            false
        } else {
            tracing::debug!(
                service = %identity,
                agent = instance.agent_id(),
                response_time_ms = instance.response_time_ms(),
                "remote instance cached"
            );
            set.push(instance);
            true
        }
    }

    /// Drop an instance, e.g. after finding it unreachable.
    /// Returns true if it was present.
    pub fn remove(&self, instance: &ServiceInstance) -> bool {
        let identity = instance.identity();
        let removed = {
            let Some(mut versions) = self.services.get_mut(&identity.name) else {
                return false;
            };
            let Some(set) = versions.get_mut(&identity.version) else {
                return false;
            };
            let before = set.len();
            set.retain(|i| i != instance);
            let removed = set.len() < before;
            if set.is_empty() {
                versions.remove(&identity.version);
            }
            removed
        };
        self.services
            .remove_if(&identity.name, |_, versions| versions.is_empty());

        if removed {
            tracing::debug!(service = %identity, agent = instance.agent_id(), "remote instance removed");
        }
        removed
    }

    /// Best fresh instance of exactly (name, version).
    pub fn best_exact(&self, name: &str, version: &ServiceVersion) -> Option<ServiceInstance> {
        let best = {
            let mut versions = self.services.get_mut(name)?;
            let best = versions
                .get_mut(version)
                .and_then(|set| evict_and_pick(set, self.ttl));
            if versions.get(version).is_some_and(|set| set.is_empty()) {
                versions.remove(version);
            }
            best
        };
        self.services.remove_if(name, |_, versions| versions.is_empty());
        best
    }

    /// Best fresh instance of the newest version of `name` that fits and
    /// still has one. Not a global minimum across versions: a newer version
    /// beats a faster older one.
    pub fn best_compatible(&self, name: &str, constraint: &VersionConstraint) -> Option<ServiceInstance> {
        let best = {
            let mut versions = self.services.get_mut(name)?;
            let mut best = None;
            for (version, set) in versions.iter_mut().rev() {
                if !version.fits(constraint) {
                    continue;
                }
                // Keep walking after a hit so stale siblings get evicted too.
                let candidate = evict_and_pick(set, self.ttl);
                if best.is_none() {
                    best = candidate;
                }
            }
            versions.retain(|_, set| !set.is_empty());
            best
        };
        self.services.remove_if(name, |_, versions| versions.is_empty());
        best
    }

    /// Is anything (fresh or not) stored under (name, version)?
    pub fn contains_key(&self, name: &str, version: &ServiceVersion) -> bool {
        self.services
            .get(name)
            .is_some_and(|versions| versions.contains_key(version))
    }

    /// Number of cached instances, stale ones included.
    pub fn len(&self) -> usize {
        self.services
            .iter()
            .map(|e| e.value().values().map(Vec::len).sum::<usize>())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// Copy of every cached instance. Does not evict.
    pub fn snapshot(&self) -> Vec<ServiceInstance> {
        self.services
            .iter()
            .flat_map(|e| {
                e.value()
                    .values()
                    .flat_map(|set| set.iter().cloned())
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    /// Forget everything.
    pub fn clear(&self) {
        self.services.clear();
    }
}

/// Drop outdated instances from `set`, then return the best survivor.
fn evict_and_pick(set: &mut InstanceSet, ttl: Duration) -> Option<ServiceInstance> {
    let before = set.len();
    set.retain(|i| !i.is_outdated(ttl));
    if set.len() < before {
        tracing::debug!(evicted = before - set.len(), "outdated remote instances evicted");
    }
    set.iter().min_by_key(|i| i.response_time_ms()).cloned()
}
