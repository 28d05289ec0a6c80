//! LatticeDB Network Edge
//!
//! The communicator is the only component that touches sockets. Outbound, it
//! consumes [`SendMessage`](lattice_types::Event::SendMessage) events and
//! delivers the wrapped [`ProtocolMessage`](lattice_types::ProtocolMessage)
//! to each target node; inbound, a listener task decodes frames and publishes
//! them on the bus as `Event::Protocol` for subscription dispatch.
//!
//! Transport selection is two-tier: a target equal to the local node
//! short-circuits straight back onto the bus (never touching a socket);
//! remote targets go over length-prefixed, crc-checked bincode frames on
//! TCP with connect-on-demand connection caching. A failed send is logged
//! as a warning and dropped; retry policy belongs to the protocol layers
//! above, not the transport.

pub mod communicator;
pub mod error;
pub mod frame;
pub mod transport;

pub use communicator::Communicator;
pub use error::{NetworkError, Result};
pub use frame::{read_frame, write_frame, WireEnvelope, MAX_FRAME_BYTES};
pub use transport::{PeerTable, TransportMetrics};
