use std::sync::Arc;

use crate::*;

// ══════════════════════════════════════════════════════════════════════════════
//  Concurrent resolution
// ══════════════════════════════════════════════════════════════════════════════

/// Many tasks resolving the same service at once all succeed, and the
/// overlapping discovery rounds leave exactly one entry per remote instance.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_resolves_deduplicate() -> Result<()> {
    let net = MemoryNetwork::new();
    let asker = net.node(1);
    let b = net.node(2);
    let c = net.node(3);
    b.host("calc", "1.0");
    c.host("calc", "1.0");

    let tasks: Vec<_> = (0..32)
        .map(|_| {
            let asker = asker.clone();
            tokio::spawn(async move { asker.resolve("calc", "1.0", false, false).await })
        })
        .collect();

    for task in tasks {
        let found = task.await??;
        assert!(!found.is_local());
    }
    assert_eq!(asker.resolver.remote().len(), 2);
    Ok(())
}

/// Registering while others resolve never yields a half-registered state.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_register_while_resolving() -> Result<()> {
    let net = MemoryNetwork::new();
    let a = net.node(1);
    let a = Arc::new(a);

    let writer = {
        let a = a.clone();
        tokio::spawn(async move {
            for minor in 0..50 {
                a.host("calc", &format!("1.{minor}"));
                tokio::task::yield_now().await;
            }
        })
    };

    let reader = {
        let a = a.clone();
        tokio::spawn(async move {
            let mut seen = 0;
            for _ in 0..200 {
                if let Ok(found) = a.resolve("calc", "1", false, true).await {
                    assert!(found.is_local());
                    assert_eq!(found.identity().name, "calc");
                    seen += 1;
                }
                tokio::task::yield_now().await;
            }
            seen
        })
    };

    writer.await?;
    reader.await?;
    assert_eq!(a.resolver.local().list_versions("calc").len(), 50);
    Ok(())
}
