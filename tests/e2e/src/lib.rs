//! Test fixtures: an in-process cluster of full LatticeDB nodes.
//!
//! Each node gets its own bus, communicator (bound to an ephemeral loopback
//! port), two-phase-commit actors, gossip actors, and ticker; nodes talk to
//! each other over real TCP. Helper actors stand in for the application
//! layer: [`AutoValidator`] answers validation requests with a fixed
//! verdict, [`Recorder`] forwards selected event kinds into a channel the
//! test can assert on.

use lattice_consensus::{TwoPcAcceptor, TwoPcLeader};
use lattice_gossip::{Disseminator, FailureDetector, RepositoryView, SuspectView};
use lattice_network::{Communicator, PeerTable};
use lattice_runtime::{spawn, Actor, ActorContext, ActorHandle, EventBus, ProcessResult, Ticker};
use lattice_types::{ActorIdentity, Event, EventKind, NodeId, UnitId, WaitStrategy};
use std::net::SocketAddr;
use std::sync::mpsc;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Gossip/tick cadence for tests; fast enough for sub-second convergence.
pub const TEST_TICK: Duration = Duration::from_millis(50);

/// Consensus round deadline for tests.
pub const TEST_ROUND_TIMEOUT_MS: u64 = 750;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

/// Poll `check` until it passes or `deadline` elapses.
pub fn wait_until(deadline: Duration, mut check: impl FnMut() -> bool) -> bool {
    let end = Instant::now() + deadline;
    while Instant::now() < end {
        if check() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    check()
}

/// Application stand-in answering every `ValidateProposal` with a fixed
/// verdict, or staying silent when `verdict` is `None`.
pub struct AutoValidator {
    identity: ActorIdentity,
    unit: UnitId,
    verdict: Option<bool>,
}

impl AutoValidator {
    pub fn new(unit: UnitId, verdict: Option<bool>) -> Self {
        Self {
            identity: ActorIdentity::named("auto-validator", WaitStrategy::SleepBackoff),
            unit,
            verdict,
        }
    }
}

impl Actor for AutoValidator {
    fn identity(&self) -> ActorIdentity {
        self.identity.clone()
    }

    fn subscriptions(&self) -> Vec<EventKind> {
        vec![EventKind::ValidateProposal]
    }

    fn process(&mut self, ctx: &ActorContext, event: Event) -> ProcessResult {
        let Event::ValidateProposal { unit, proposal } = event else {
            return Ok(());
        };
        if unit != self.unit {
            return Ok(());
        }
        if let Some(accepted) = self.verdict {
            ctx.publish(Event::ProposalVerdict {
                unit,
                proposal_id: proposal.id(),
                accepted,
            })?;
        }
        Ok(())
    }
}

/// Forwards every event of the subscribed kinds into an mpsc channel.
pub struct Recorder {
    identity: ActorIdentity,
    kinds: Vec<EventKind>,
    sink: mpsc::Sender<Event>,
}

impl Recorder {
    pub fn new(kinds: Vec<EventKind>) -> (Self, mpsc::Receiver<Event>) {
        let (sink, source) = mpsc::channel();
        (
            Self {
                identity: ActorIdentity::named("recorder", WaitStrategy::SleepBackoff),
                kinds,
                sink,
            },
            source,
        )
    }
}

impl Actor for Recorder {
    fn identity(&self) -> ActorIdentity {
        self.identity.clone()
    }

    fn subscriptions(&self) -> Vec<EventKind> {
        self.kinds.clone()
    }

    fn process(&mut self, _ctx: &ActorContext, event: Event) -> ProcessResult {
        self.sink
            .send(event)
            .map_err(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>)
    }
}

/// One running node plus observation handles.
pub struct TestNode {
    pub node_id: NodeId,
    pub addr: SocketAddr,
    pub bus: Arc<EventBus>,
    pub repo_view: RepositoryView,
    pub suspect_view: SuspectView,
    handles: Vec<ActorHandle>,
    ticker: Option<Ticker>,
}

impl TestNode {
    /// Publish an event on this node's bus under a test-client identity.
    pub fn publish(&self, event: Event) {
        let client = ActorIdentity::named("test-client", WaitStrategy::SleepBackoff);
        self.bus.publish(&client, event).expect("publish");
    }

    pub fn add_actor(&mut self, actor: impl Actor) {
        let handle = spawn(actor, self.bus.clone(), 128).expect("spawn helper actor");
        self.handles.push(handle);
    }

    pub fn shutdown(mut self) {
        if let Some(ticker) = self.ticker.take() {
            let _ = ticker.stop(Duration::from_secs(2));
        }
        for handle in self.handles.drain(..).rev() {
            let _ = handle.stop(Duration::from_secs(2));
        }
    }
}

/// Launch `names.len()` fully-wired nodes that know each other's addresses.
/// Every node runs an acceptor; every node's leader is configured with the
/// full node set as its acceptor group.
pub fn launch_cluster(names: &[&str], unit: &UnitId) -> Vec<TestNode> {
    init_tracing();

    // Bind all listeners first so every peer table can hold real ports.
    let mut bound: Vec<(NodeId, Communicator)> = names
        .iter()
        .map(|name| {
            let node_id = NodeId::new(*name);
            let communicator = Communicator::bind(
                node_id.clone(),
                "127.0.0.1:0".parse().expect("loopback addr"),
            )
            .expect("bind communicator");
            (node_id, communicator)
        })
        .collect();
    let addrs: Vec<(NodeId, SocketAddr)> = bound
        .iter()
        .map(|(id, c)| (id.clone(), c.local_addr()))
        .collect();
    let all_ids: Vec<NodeId> = addrs.iter().map(|(id, _)| id.clone()).collect();

    bound
        .drain(..)
        .map(|(node_id, mut communicator)| {
            let mut peers = PeerTable::default();
            for (peer_id, addr) in &addrs {
                if *peer_id != node_id {
                    peers.insert(peer_id.clone(), *addr);
                }
            }
            let peer_ids: Vec<NodeId> = all_ids
                .iter()
                .filter(|id| **id != node_id)
                .cloned()
                .collect();
            communicator.set_peers(peers);
            let addr = communicator.local_addr();

            let bus = Arc::new(EventBus::new());
            let acceptor = TwoPcAcceptor::new(node_id.clone(), unit.clone());
            let leader = TwoPcLeader::new(
                node_id.clone(),
                unit.clone(),
                all_ids.clone(),
                TEST_ROUND_TIMEOUT_MS,
            );
            let disseminator = Disseminator::new(node_id.clone(), unit.clone(), peer_ids.clone());
            let detector = FailureDetector::new(node_id.clone(), unit.clone(), peer_ids);
            let repo_view = disseminator.view();
            let suspect_view = detector.view();

            let handles = vec![
                spawn(communicator, bus.clone(), 128).expect("spawn communicator"),
                spawn(acceptor, bus.clone(), 128).expect("spawn acceptor"),
                spawn(leader, bus.clone(), 128).expect("spawn leader"),
                spawn(disseminator, bus.clone(), 128).expect("spawn disseminator"),
                spawn(detector, bus.clone(), 128).expect("spawn detector"),
            ];
            let ticker = Ticker::start(bus.clone(), TEST_TICK);

            TestNode {
                node_id,
                addr,
                bus,
                repo_view,
                suspect_view,
                handles,
                ticker: Some(ticker),
            }
        })
        .collect()
}
