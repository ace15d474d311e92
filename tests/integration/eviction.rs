use std::time::Duration;

use cairn_core::config::DiscoveryConfig;

use crate::*;

// ══════════════════════════════════════════════════════════════════════════════
//  TTL eviction
// ══════════════════════════════════════════════════════════════════════════════

fn short_ttl() -> DiscoveryConfig {
    DiscoveryConfig {
        ttl_secs: 5,
        ..Default::default()
    }
}

/// Found immediately; six simulated seconds later it is gone and the key pruned.
#[tokio::test(start_paused = true)]
async fn test_ttl_eviction() -> Result<()> {
    let net = MemoryNetwork::new();
    let a = net.node_with(1, short_ttl());
    let b = net.node(2);
    b.host("calc", "1.0");

    a.resolve("calc", "1.0", true, false).await?;
    let version: cairn_core::ServiceVersion = "1.0".parse()?;
    assert!(a.resolver.remote().contains_key("calc", &version));

    // B drops off the network; nothing refreshes the entry.
    b.set_partitioned(true);
    tokio::time::advance(Duration::from_secs(6)).await;

    let err = a.resolve("calc", "1.0", true, false).await.unwrap_err();
    assert!(err.is_not_found());
    assert!(!a.resolver.remote().contains_key("calc", &version));
    assert!(a.resolver.remote().is_empty());
    Ok(())
}

/// Within the TTL the cache answers without another round.
#[tokio::test(start_paused = true)]
async fn test_fresh_entries_are_served_from_cache() -> Result<()> {
    let net = MemoryNetwork::new();
    let a = net.node_with(1, short_ttl());
    let b = net.node(2);
    b.host("calc", "1.0");

    a.resolve("calc", "1.0", true, false).await?;
    tokio::time::advance(Duration::from_secs(4)).await;
    a.resolve("calc", "1.0", true, false).await?;
    assert_eq!(a.rounds(), 1);
    Ok(())
}

/// Once stale, the next resolve rediscovers and refreshes the same instance.
#[tokio::test(start_paused = true)]
async fn test_stale_entry_is_rediscovered() -> Result<()> {
    let net = MemoryNetwork::new();
    let a = net.node_with(1, short_ttl());
    let b = net.node(2);
    b.host("calc", "1.0");

    let first = a.resolve("calc", "1.0", true, false).await?;
    tokio::time::advance(Duration::from_secs(6)).await;

    let second = a.resolve("calc", "1.0", true, false).await?;
    assert_eq!(first, second);
    assert_eq!(a.rounds(), 2);
    assert_eq!(a.resolver.remote().len(), 1);
    Ok(())
}
