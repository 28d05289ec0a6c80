//! The Communicator Actor
//!
//! Bridges the thread-per-actor world and the socket world. The actor thread
//! consumes `SendMessage` events and drives outbound IO by blocking on a
//! private tokio runtime; inbound, a listener task owned by that runtime
//! accepts peer connections, decodes frames, and publishes them on the bus
//! under the communicator's identity.
//!
//! Delivery semantics are deliberately fire-and-forget: a target equal to
//! the local node never touches a socket, an unknown or unreachable peer is
//! a warning plus a dropped message, and a write failure additionally drops
//! the cached connection so the next send redials. Retries live in the
//! protocol layers (gossip re-solicits every tick; consensus rounds have
//! deadlines), not here.

use crate::error::{NetworkError, Result};
use crate::frame::{read_frame, write_frame, WireEnvelope};
use crate::transport::{PeerTable, TransportMetrics};
use lattice_runtime::{Actor, ActorContext, ProcessResult};
use lattice_types::{identities, ActorIdentity, Event, EventKind, NodeId, ProtocolMessage};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, trace, warn};

/// Dial deadline for outbound connections.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

pub struct Communicator {
    identity: ActorIdentity,
    node_id: NodeId,
    peers: PeerTable,
    runtime: tokio::runtime::Runtime,
    /// Bound synchronously in [`bind`](Self::bind); moved into the listener
    /// task on start.
    listener: Option<std::net::TcpListener>,
    listener_task: Option<tokio::task::JoinHandle<()>>,
    connections: HashMap<NodeId, tokio::net::TcpStream>,
    local_addr: SocketAddr,
    metrics: Arc<TransportMetrics>,
}

impl Communicator {
    /// Bind the inbound listener and build the IO runtime. Binding happens
    /// here, synchronously, so callers can pass port 0 and read the actual
    /// address from [`local_addr`](Self::local_addr) before wiring peers.
    pub fn bind(node_id: NodeId, listen: SocketAddr) -> Result<Self> {
        let listener = std::net::TcpListener::bind(listen)
            .map_err(|e| NetworkError::io(format!("bind {listen} failed"), e))?;
        listener
            .set_nonblocking(true)
            .map_err(|e| NetworkError::io("listener nonblocking mode failed", e))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| NetworkError::io("listener local_addr failed", e))?;
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("lattice-net")
            .enable_all()
            .build()
            .map_err(|e| NetworkError::io("IO runtime build failed", e))?;
        Ok(Self {
            identity: identities::COMMUNICATOR.clone(),
            node_id,
            peers: PeerTable::default(),
            runtime,
            listener: Some(listener),
            listener_task: None,
            connections: HashMap::new(),
            local_addr,
            metrics: Arc::new(TransportMetrics::default()),
        })
    }

    /// Install the node-to-address map. Call before spawning the actor.
    pub fn set_peers(&mut self, peers: PeerTable) {
        self.peers = peers;
    }

    /// Actual listening address (resolves port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn metrics(&self) -> Arc<TransportMetrics> {
        self.metrics.clone()
    }

    fn send_remote(&mut self, target: &NodeId, message: &ProtocolMessage) -> Result<()> {
        let addr = self
            .peers
            .address_of(target)
            .ok_or_else(|| NetworkError::UnknownPeer {
                node: target.clone(),
            })?;
        let envelope = WireEnvelope {
            from: self.node_id.clone(),
            message: message.clone(),
        };
        let runtime = &self.runtime;
        let connections = &mut self.connections;
        let metrics = &self.metrics;
        runtime.block_on(async move {
            let stream = match connections.entry(target.clone()) {
                Entry::Occupied(occupied) => occupied.into_mut(),
                Entry::Vacant(vacant) => {
                    let connect = tokio::net::TcpStream::connect(addr);
                    let stream = tokio::time::timeout(CONNECT_TIMEOUT, connect)
                        .await
                        .map_err(|_| {
                            NetworkError::connection(format!(
                                "connect to {addr} timed out after {}ms",
                                CONNECT_TIMEOUT.as_millis()
                            ))
                        })?
                        .map_err(|e| {
                            NetworkError::connection_with_source("connect failed", addr, e)
                        })?;
                    debug!(peer = %target, %addr, "outbound connection established");
                    vacant.insert(stream)
                }
            };
            match write_frame(stream, &envelope).await {
                Ok(bytes) => {
                    metrics.record_remote_send(bytes);
                    trace!(peer = %target, bytes, "frame sent");
                    Ok(())
                }
                Err(err) => {
                    // Drop the broken connection; the next send redials.
                    connections.remove(target);
                    Err(err)
                }
            }
        })
    }
}

impl Actor for Communicator {
    fn identity(&self) -> ActorIdentity {
        self.identity.clone()
    }

    fn subscriptions(&self) -> Vec<EventKind> {
        vec![EventKind::SendMessage]
    }

    fn on_start(&mut self, ctx: &ActorContext) {
        let Some(std_listener) = self.listener.take() else {
            return;
        };
        let inbound_ctx = ctx.clone();
        let metrics = self.metrics.clone();
        let local_addr = self.local_addr;
        let task = self.runtime.spawn(async move {
            let listener = match tokio::net::TcpListener::from_std(std_listener) {
                Ok(listener) => listener,
                Err(err) => {
                    error!(%err, "listener registration with runtime failed");
                    return;
                }
            };
            debug!(%local_addr, "listener accepting connections");
            loop {
                match listener.accept().await {
                    Ok((stream, peer)) => {
                        debug!(%peer, "inbound connection accepted");
                        let ctx = inbound_ctx.clone();
                        let metrics = metrics.clone();
                        tokio::spawn(handle_connection(stream, peer, ctx, metrics));
                    }
                    Err(err) => {
                        warn!(%err, "accept failed");
                        tokio::time::sleep(Duration::from_millis(50)).await;
                    }
                }
            }
        });
        self.listener_task = Some(task);
    }

    fn process(&mut self, ctx: &ActorContext, event: Event) -> ProcessResult {
        let send = match event {
            Event::SendMessage(send) => send,
            other => {
                trace!(kind = ?other.kind(), "communicator ignoring event");
                return Ok(());
            }
        };
        for target in &send.targets {
            if *target == self.node_id {
                // Local delivery never touches a socket.
                self.metrics.record_local_delivery();
                trace!("short-circuiting message to local bus");
                if let Err(err) = ctx.publish(Event::Protocol(send.message.clone())) {
                    error!(%err, "local short-circuit publish failed");
                }
                continue;
            }
            if let Err(err) = self.send_remote(target, &send.message) {
                warn!(target = %target, %err, "message delivery failed, dropping");
                self.metrics.record_send_failure();
            }
        }
        Ok(())
    }
}

async fn handle_connection(
    mut stream: tokio::net::TcpStream,
    peer: SocketAddr,
    ctx: ActorContext,
    metrics: Arc<TransportMetrics>,
) {
    loop {
        match read_frame(&mut stream).await {
            Ok(envelope) => {
                metrics.record_frame_received();
                trace!(from = %envelope.from, %peer, "frame received");
                if let Err(err) = ctx.publish(Event::Protocol(envelope.message)) {
                    error!(%err, "inbound publish failed, dropping frame");
                }
            }
            Err(err) => {
                debug!(%peer, %err, "connection closed");
                break;
            }
        }
    }
}

impl Drop for Communicator {
    fn drop(&mut self) {
        if let Some(task) = self.listener_task.take() {
            task.abort();
        }
    }
}
