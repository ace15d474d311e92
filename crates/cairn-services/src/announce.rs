//! Deployment announcements.
//!
//! Some deployments publish which services a node runs to an external
//! directory. That directory sits behind `Announcer`; nodes without one use
//! `NoopAnnouncer`.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{self, Instant};

use crate::instance::ServiceInstance;
use crate::local::LocalServiceRegistry;

pub trait Announcer: Send + Sync {
    /// A local service started, or is still running (periodic refresh).
    fn announce_deployment(&self, instance: &ServiceInstance);

    /// A local service stopped.
    fn announce_deployment_end(&self, instance: &ServiceInstance);
}

/// Announces nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopAnnouncer;

impl Announcer for NoopAnnouncer {
    fn announce_deployment(&self, _instance: &ServiceInstance) {}

    fn announce_deployment_end(&self, _instance: &ServiceInstance) {}
}

/// Re-announce every local service once per `period`.
///
/// Each tick works on a snapshot taken at its start, so services that
/// unregister mid-tick get one redundant announcement and nothing worse.
/// The first tick fires one period after start. A period past the end of
/// the clock never ticks.
///
/// Runs forever — cancel by dropping the task handle.
pub async fn announce_loop(
    registry: LocalServiceRegistry,
    announcer: Arc<dyn Announcer>,
    period: Duration,
) {
    let Some(start) = Instant::now().checked_add(period) else {
        tracing::info!("announce period unbounded, deployment announcer idle");
        return std::future::pending().await;
    };
    let mut interval = time::interval_at(start, period);

    tracing::info!(period_secs = period.as_secs(), "deployment announcer starting");

    loop {
        interval.tick().await;

        let snapshot = registry.snapshot();
        for instance in &snapshot {
            announcer.announce_deployment(instance);
        }
        tracing::trace!(count = snapshot.len(), "deployments re-announced");
    }
}
