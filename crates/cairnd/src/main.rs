//! cairnd — Cairn service discovery daemon.

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;

use cairn_core::config::CairnConfig;
use cairn_core::NodeId;
use cairn_services::{NodeTransport, Resolver};

mod load;
mod net;
mod responder;
mod services;
mod transport;

use load::LoadMonitor;
use transport::UdpTransport;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Load config
    if let Err(e) = CairnConfig::write_default_if_missing() {
        tracing::warn!(error = %e, "failed to write default config");
    }
    let config = CairnConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to load config, using defaults");
        CairnConfig::default()
    });

    let interface = std::env::args()
        .nth(1)
        .or_else(|| Some(config.node.interface.clone()).filter(|i| !i.is_empty()))
        .unwrap_or_else(|| "veth-a".to_string());
    let interface_index = net::if_index(&interface)?;

    let node_id = NodeId::generate();
    tracing::info!(interface, node = %node_id, "cairnd starting");

    // Resolver over UDP
    let load = LoadMonitor::new(config.node.busy_load_threshold);
    let transport: Arc<dyn NodeTransport> = Arc::new(UdpTransport::new(
        node_id,
        interface_index,
        config.node.discovery_port,
        load.clone(),
    )?);
    // No deployment directory to announce to, so no announce loop either.
    let resolver = Arc::new(Resolver::new(transport, &config.discovery));

    let hosted = services::register_configured(&resolver, &config.services)?;
    tracing::info!(
        count = hosted.len(),
        services = ?hosted.iter().map(|i| i.to_string()).collect::<Vec<_>>(),
        "local services registered"
    );

    // ── Shutdown channel ─────────────────────────────────────────────────────
    let (shutdown_tx, _) = tokio::sync::broadcast::channel::<()>(1);

    {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("shutdown signal received");
            let _ = shutdown.send(());
        });
    }

    // ── Spawn tasks ──────────────────────────────────────────────────────────

    let responder_task = tokio::spawn(responder::responder_loop(
        resolver.local().clone(),
        node_id,
        config.node.discovery_port,
        interface_index,
        shutdown_tx.subscribe(),
    ));

    let load_task = tokio::spawn(load.run(load::SAMPLE_INTERVAL));

    let api_task = {
        let state = cairn_api::ApiState {
            resolver: resolver.clone(),
            started_at: Instant::now(),
            agent_id: format!("cairnd-{}", node_id.short()),
        };
        let port = config.node.api_port;
        tokio::spawn(async move {
            if let Err(e) = cairn_api::serve(state, port).await {
                tracing::error!(error = %e, "status server failed");
            }
        })
    };

    // ── Wait for exit ────────────────────────────────────────────────────────

    let mut shutdown_rx = shutdown_tx.subscribe();

    tokio::select! {
        _ = shutdown_rx.recv() => tracing::info!("shutting down"),
        r = responder_task     => tracing::error!("discovery responder exited: {:?}", r),
        r = load_task          => tracing::error!("load monitor exited: {:?}", r),
        r = api_task           => tracing::error!("status server exited: {:?}", r),
    }

    Ok(())
}
