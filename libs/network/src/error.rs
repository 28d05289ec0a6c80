//! Network error types.

use lattice_types::NodeId;
use std::net::SocketAddr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NetworkError {
    /// Connection establishment or socket-level failure.
    #[error("connection error: {message} (peer: {peer:?})")]
    Connection {
        message: String,
        peer: Option<SocketAddr>,
        #[source]
        source: Option<std::io::Error>,
    },

    /// Frame violates the wire format (oversized, truncated, bad checksum).
    #[error("frame error: {message}")]
    Frame { message: String },

    /// Payload failed to encode or decode.
    #[error("codec error: {message}")]
    Codec {
        message: String,
        #[source]
        source: bincode::Error,
    },

    /// Send requested to a node absent from the peer table.
    #[error("unknown peer '{node}'")]
    UnknownPeer { node: NodeId },

    /// Listener or runtime setup failure.
    #[error("I/O error: {message}")]
    Io {
        message: String,
        #[source]
        source: std::io::Error,
    },
}

impl NetworkError {
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            peer: None,
            source: None,
        }
    }

    pub fn connection_with_source(
        message: impl Into<String>,
        peer: SocketAddr,
        source: std::io::Error,
    ) -> Self {
        Self::Connection {
            message: message.into(),
            peer: Some(peer),
            source: Some(source),
        }
    }

    pub fn frame(message: impl Into<String>) -> Self {
        Self::Frame {
            message: message.into(),
        }
    }

    pub fn codec(message: impl Into<String>, source: bincode::Error) -> Self {
        Self::Codec {
            message: message.into(),
            source,
        }
    }

    pub fn io(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, NetworkError>;
