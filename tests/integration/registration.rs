use std::sync::Arc;

use cairn_services::testing::TestService;
use cairn_services::{DiscoveryError, LocalService};

use crate::*;

// ══════════════════════════════════════════════════════════════════════════════
//  Local registration
// ══════════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_idempotent_reregistration() -> Result<()> {
    let net = MemoryNetwork::new();
    let a = net.node(1);
    let handle: Arc<dyn LocalService> = TestService::new("calc-agent");

    a.resolver.register_local_service(identity("calc", "1.0"), handle.clone())?;
    a.resolver.register_local_service(identity("calc", "1.0"), handle)?;
    assert_eq!(a.resolver.local().len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_conflicting_registration_is_rejected() {
    let net = MemoryNetwork::new();
    let a = net.node(1);
    a.host("calc", "1.0");

    let err = a
        .resolver
        .register_local_service(identity("calc", "1.0"), TestService::new("impostor"))
        .unwrap_err();
    assert!(matches!(err, DiscoveryError::RegistryConflict { .. }));
}

/// Once unregistered, a node stops answering for the service.
#[tokio::test]
async fn test_unregistered_service_is_no_longer_offered() -> Result<()> {
    let net = MemoryNetwork::new();
    let a = net.node(1);
    let b = net.node(2);
    let handle = b.host("calc", "1.0");

    a.resolve("calc", "1.0", false, false).await?;
    b.resolver.unregister_local_service(&identity("calc", "1.0"), &handle)?;
    a.resolver.clear_remote_cache();

    let err = a.resolve("calc", "1.0", false, false).await.unwrap_err();
    assert!(err.is_not_found());
    Ok(())
}
