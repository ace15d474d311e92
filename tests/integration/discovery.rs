use std::time::Duration;

use bytes::Bytes;
use cairn_core::config::DiscoveryConfig;
use cairn_services::testing::reply_bytes;
use cairn_core::NodeId;

use crate::*;

// ══════════════════════════════════════════════════════════════════════════════
//  Discovery across nodes
// ══════════════════════════════════════════════════════════════════════════════

/// A registers calc@1.0, B resolves it exactly and gets A's instance.
#[tokio::test]
async fn test_exact_match_round_trip() -> Result<()> {
    let net = MemoryNetwork::new();
    let a = net.node(1);
    let b = net.node(2);
    a.host("calc", "1.0");

    let found = b.resolve("calc", "1.0", true, false).await?;
    assert!(!found.is_local());
    assert_eq!(found.node_id(), Some(a.id()));
    assert_eq!(found.identity(), &identity("calc", "1.0"));
    assert!(found.agent_id().starts_with("calc-1.0-on-"));

    // Now cached.
    assert!(b.resolver.remote().contains_key("calc", &"1.0".parse()?));
    b.resolve("calc", "1.0", true, false).await?;
    assert_eq!(b.rounds(), 1);
    Ok(())
}

/// Compatible requests pick the newest fitting version on offer.
#[tokio::test]
async fn test_compatibility_match() -> Result<()> {
    let net = MemoryNetwork::new();
    let a = net.node(1);
    let b = net.node(2);
    let c = net.node(3);
    a.host("calc", "2.1");
    b.host("calc", "2.4");
    b.host("calc", "3.0");

    let found = c.resolve("calc", "^2.0", false, false).await?;
    assert_eq!(found.identity().version.to_string(), "2.4.0");
    assert_eq!(found.node_id(), Some(b.id()));
    Ok(())
}

/// Exact requests are answered only by nodes running that very version.
#[tokio::test]
async fn test_exact_ignores_near_misses() {
    let net = MemoryNetwork::new();
    let a = net.node(1);
    let b = net.node(2);
    a.host("calc", "1.1");

    let err = b.resolve("calc", "1.0", true, false).await.unwrap_err();
    assert!(err.is_not_found());
    assert!(b.resolver.remote().is_empty());
}

/// Three replies, one malformed: the round still succeeds with two.
#[tokio::test]
async fn test_partial_failure_discovery() -> Result<()> {
    let net = MemoryNetwork::new();
    let a = net.node(1);
    let b = net.node(2);
    let c = net.node(3);
    a.host("calc", "1.0");
    b.host("calc", "1.0");
    net.inject(Bytes::from_static(b"CAIR\x01\x02\x05\x00oops!"));

    let found = c.resolve("calc", "1.0", false, false).await?;
    assert_eq!(found.node_id(), Some(a.id()), "first accepted reply ranks best");
    assert_eq!(found.response_time_ms(), 1);
    assert_eq!(c.resolver.remote().len(), 2);
    Ok(())
}

/// A malformed reply ahead of a good one does not consume a rank.
#[tokio::test]
async fn test_ranks_count_accepted_replies_only() -> Result<()> {
    let net = MemoryNetwork::new();
    let c = net.node(3);
    net.inject(Bytes::from_static(b"garbage"));
    net.inject(reply_bytes("calc", "1.0", "late", NodeId([9; 32])));

    let found = c.resolve("calc", "1.0", false, false).await?;
    assert_eq!(found.agent_id(), "late");
    assert_eq!(found.response_time_ms(), 1);
    Ok(())
}

/// wait_for_results caps how many replies a round folds in.
#[tokio::test]
async fn test_reply_cap() -> Result<()> {
    let net = MemoryNetwork::new();
    for seed in 1..=5 {
        net.node(seed).host("calc", "1.0");
    }
    let asker = net.node_with(
        9,
        DiscoveryConfig {
            wait_for_results: 2,
            ..Default::default()
        },
    );

    asker.resolve("calc", "1.0", false, false).await?;
    assert_eq!(asker.resolver.remote().len(), 2);
    Ok(())
}

/// A failed round with no local fallback carries the transport error as cause.
#[tokio::test]
async fn test_timeout_is_reported_as_cause() {
    let net = MemoryNetwork::new();
    let a = net.node(1);
    net.fail_rounds_with(cairn_services::TransportError::Timeout(Duration::from_millis(2000)));

    let err = a.resolve("calc", "1.0", false, false).await.unwrap_err();
    assert!(err.is_not_found());
    let cause = std::error::Error::source(&err).expect("cause");
    assert!(cause.to_string().contains("timed out"), "{cause}");
    assert!(err.to_string().contains("calc@1.0"), "{err}");
}
