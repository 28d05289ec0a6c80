//! LatticeDB Node
//!
//! Boots a full coordination node: event bus, communicator, two-phase-commit
//! leader and acceptor, gossip disseminator, failure detector, and the
//! ticker driving both periodic subsystems. Runs until ctrl-c, then stops
//! everything with bounded joins in reverse start order.

use anyhow::{Context, Result};
use lattice_config::NodeConfig;
use lattice_consensus::{TwoPcAcceptor, TwoPcLeader};
use lattice_gossip::{Disseminator, FailureDetector};
use lattice_network::{Communicator, PeerTable};
use lattice_runtime::{spawn, ActorHandle, EventBus, Ticker};
use lattice_types::epoch_ms;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Join deadline per actor at shutdown.
const STOP_TIMEOUT: Duration = Duration::from_secs(2);

fn config_path() -> String {
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" {
            if let Some(path) = args.next() {
                return path;
            }
        }
    }
    "lattice.toml".to_string()
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let path = config_path();
    let config = NodeConfig::load(&path).with_context(|| format!("loading config '{path}'"))?;
    let node_id = config.node_id();
    let listen = config.listen_addr().context("parsing listen address")?;
    let peer_table = PeerTable::new(config.peer_table().context("parsing peer table")?);
    let capacity = config.runtime.channel_capacity;
    let gossip_interval = Duration::from_millis(config.gossip.interval_ms);

    let bus = Arc::new(EventBus::new());

    let mut communicator =
        Communicator::bind(node_id.clone(), listen).context("binding communicator")?;
    communicator.set_peers(peer_table);
    let local_addr = communicator.local_addr();

    let acceptor = TwoPcAcceptor::new(node_id.clone(), config.consensus_unit());
    let leader = TwoPcLeader::new(
        node_id.clone(),
        config.consensus_unit(),
        config.acceptor_ids(),
        config.consensus.round_timeout_ms,
    );
    let disseminator = Disseminator::new(node_id.clone(), config.gossip_unit(), config.peer_ids());
    let detector = FailureDetector::new(node_id.clone(), config.gossip_unit(), config.peer_ids());
    let suspect_view = detector.view();

    info!(
        node = %node_id,
        %local_addr,
        peers = config.peers.len(),
        consensus_unit = %config.consensus_unit(),
        gossip_interval_ms = config.gossip.interval_ms,
        "lattice node starting"
    );

    let mut handles: Vec<ActorHandle> = Vec::new();
    handles.push(spawn(communicator, bus.clone(), capacity).context("spawning communicator")?);
    handles.push(spawn(acceptor, bus.clone(), capacity).context("spawning acceptor")?);
    handles.push(spawn(leader, bus.clone(), capacity).context("spawning leader")?);
    handles.push(spawn(disseminator, bus.clone(), capacity).context("spawning disseminator")?);
    handles.push(spawn(detector, bus.clone(), capacity).context("spawning failure detector")?);

    let ticker = Ticker::start(bus.clone(), gossip_interval);

    // Surface the suspect matrix periodically for operators; the threshold
    // policy itself lives outside this layer.
    let suspect_task = {
        let interval_ms = config.gossip.interval_ms;
        let cleanup_cycles = config.gossip.cleanup_cycles;
        tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(Duration::from_millis(interval_ms.saturating_mul(10).max(1)));
            loop {
                interval.tick().await;
                let suspects = suspect_view.suspects(epoch_ms(), interval_ms, cleanup_cycles);
                if !suspects.is_empty() {
                    warn!(?suspects, cleanup_cycles, "peers over suspect threshold");
                }
            }
        })
    };

    tokio::signal::ctrl_c().await.context("waiting for ctrl-c")?;
    info!("shutdown requested");

    suspect_task.abort();
    if let Err(err) = ticker.stop(STOP_TIMEOUT) {
        warn!(%err, "ticker stop timed out");
    }
    for handle in handles.into_iter().rev() {
        let name = handle.identity().to_string();
        if let Err(err) = handle.stop(STOP_TIMEOUT) {
            warn!(actor = %name, %err, "actor stop timed out");
        }
    }
    info!("lattice node stopped");
    Ok(())
}
