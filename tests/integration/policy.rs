use crate::*;

// ══════════════════════════════════════════════════════════════════════════════
//  Local-versus-remote policy
// ══════════════════════════════════════════════════════════════════════════════

/// Not busy → local wins even when a remote is known. Busy → remote.
#[tokio::test]
async fn test_local_preferred_unless_busy() -> Result<()> {
    let net = MemoryNetwork::new();
    let a = net.node(1);
    let b = net.node(2);
    a.host("calc", "1.0");
    b.host("calc", "1.0");

    let found = a.resolve("calc", "1.0", false, false).await?;
    assert!(found.is_local());
    assert_eq!(a.rounds(), 0, "idle node with a local match never asks");

    a.set_busy(true);
    let found = a.resolve("calc", "1.0", false, false).await?;
    assert!(!found.is_local());
    assert_eq!(found.node_id(), Some(b.id()));
    Ok(())
}

/// Busy, but nobody else runs it: fall back to local.
#[tokio::test]
async fn test_busy_falls_back_to_local() -> Result<()> {
    let net = MemoryNetwork::new();
    let a = net.node(1);
    let _b = net.node(2);
    a.host("calc", "1.0");
    a.set_busy(true);

    let found = a.resolve("calc", "1.0", false, false).await?;
    assert!(found.is_local());
    assert_eq!(a.rounds(), 1);
    Ok(())
}

/// local_only never reaches the network, hit or miss.
#[tokio::test]
async fn test_local_only_stays_local() -> Result<()> {
    let net = MemoryNetwork::new();
    let a = net.node(1);
    let b = net.node(2);
    a.host("calc", "2.3");
    b.host("calc", "3.0");

    let found = a.resolve("calc", "^2.0", false, true).await?;
    assert!(found.is_local());

    let err = a.resolve("calc", "^3.0", false, true).await.unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(a.rounds(), 0);
    Ok(())
}

/// An exact request for "*" names no version and fails without asking.
#[tokio::test]
async fn test_exact_wildcard_is_not_found() {
    let net = MemoryNetwork::new();
    let a = net.node(1);
    let b = net.node(2);
    b.host("calc", "1.0");

    let err = a.resolve("calc", "*", true, false).await.unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(a.rounds(), 0);
}

/// Among cached instances of one version the lowest response time wins.
#[tokio::test]
async fn test_best_of_many_ranking() -> Result<()> {
    let net = MemoryNetwork::new();
    let a = net.node(1);
    let remote = a.resolver.remote();
    for (agent, rank) in [("five", 5), ("one", 1), ("three", 3)] {
        remote.add(
            cairn_services::ServiceInstance::remote(
                identity("calc", "1.0"),
                agent,
                cairn_core::NodeId([rank as u8; 32]),
            )
            .with_response_time(rank),
        );
    }

    let found = a.resolve("calc", "1.0", true, false).await?;
    assert_eq!(found.agent_id(), "one");
    assert_eq!(a.rounds(), 0, "served from cache");
    Ok(())
}

/// A removed remote instance is rediscovered on the next resolve.
#[tokio::test]
async fn test_remove_remote_instance_forces_rediscovery() -> Result<()> {
    let net = MemoryNetwork::new();
    let a = net.node(1);
    let b = net.node(2);
    b.host("calc", "1.0");

    let found = a.resolve("calc", "1.0", false, false).await?;
    assert!(a.resolver.remove_remote_instance(&found));
    assert!(a.resolver.remote().is_empty());

    let again = a.resolve("calc", "1.0", false, false).await?;
    assert_eq!(again, found);
    assert_eq!(a.rounds(), 2);
    Ok(())
}

/// Exact, local-only: the registered version resolves, its neighbour does not.
#[tokio::test]
async fn test_exact_local_round_trip() -> Result<()> {
    let net = MemoryNetwork::new();
    let a = net.node(1);
    a.host("Calc", "1.0");

    let found = a.resolve("Calc", "1.0", true, true).await?;
    assert!(found.is_local());
    assert_eq!(found.identity(), &identity("Calc", "1.0"));

    let err = a.resolve("Calc", "2.0", true, false).await.unwrap_err();
    assert!(err.is_not_found());
    Ok(())
}
