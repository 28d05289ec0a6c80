//! Wire framing.
//!
//! Frame layout, big-endian:
//!
//! ```text
//! ┌────────────┬────────────┬──────────────────────────┐
//! │ length u32 │ crc32  u32 │ bincode(WireEnvelope) …  │
//! └────────────┴────────────┴──────────────────────────┘
//! ```
//!
//! The length covers the payload only. A checksum mismatch or oversized
//! length is a frame error; callers close the connection rather than trying
//! to resynchronize mid-stream.

use crate::error::{NetworkError, Result};
use bytes::{BufMut, BytesMut};
use lattice_types::{NodeId, ProtocolMessage};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Upper bound on a single payload; anything larger is a protocol bug.
pub const MAX_FRAME_BYTES: usize = 4 * 1024 * 1024;

/// What actually crosses the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireEnvelope {
    pub from: NodeId,
    pub message: ProtocolMessage,
}

/// Encode a full frame (header + payload) into a fresh buffer.
pub fn encode_frame(envelope: &WireEnvelope) -> Result<BytesMut> {
    let payload = bincode::serialize(envelope)
        .map_err(|e| NetworkError::codec("envelope encode failed", e))?;
    if payload.len() > MAX_FRAME_BYTES {
        return Err(NetworkError::frame(format!(
            "payload of {} bytes exceeds limit of {MAX_FRAME_BYTES}",
            payload.len()
        )));
    }
    let mut buf = BytesMut::with_capacity(8 + payload.len());
    buf.put_u32(payload.len() as u32);
    buf.put_u32(crc32fast::hash(&payload));
    buf.put_slice(&payload);
    Ok(buf)
}

/// Decode the payload section of a frame whose header was already consumed.
pub fn decode_payload(payload: &[u8], expected_crc: u32) -> Result<WireEnvelope> {
    let actual = crc32fast::hash(payload);
    if actual != expected_crc {
        return Err(NetworkError::frame(format!(
            "checksum mismatch: header {expected_crc:#010x}, payload {actual:#010x}"
        )));
    }
    bincode::deserialize(payload).map_err(|e| NetworkError::codec("envelope decode failed", e))
}

/// Read one frame from the stream.
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> Result<WireEnvelope> {
    let mut header = [0u8; 8];
    reader
        .read_exact(&mut header)
        .await
        .map_err(|e| NetworkError::io("frame header read failed", e))?;
    let len = u32::from_be_bytes([header[0], header[1], header[2], header[3]]) as usize;
    let crc = u32::from_be_bytes([header[4], header[5], header[6], header[7]]);
    if len > MAX_FRAME_BYTES {
        return Err(NetworkError::frame(format!(
            "declared payload of {len} bytes exceeds limit of {MAX_FRAME_BYTES}"
        )));
    }
    let mut payload = vec![0u8; len];
    reader
        .read_exact(&mut payload)
        .await
        .map_err(|e| NetworkError::io("frame payload read failed", e))?;
    decode_payload(&payload, crc)
}

/// Write one frame and flush.
pub async fn write_frame<W: AsyncWrite + Unpin>(
    writer: &mut W,
    envelope: &WireEnvelope,
) -> Result<usize> {
    let frame = encode_frame(envelope)?;
    writer
        .write_all(&frame)
        .await
        .map_err(|e| NetworkError::io("frame write failed", e))?;
    writer
        .flush()
        .await
        .map_err(|e| NetworkError::io("frame flush failed", e))?;
    Ok(frame.len())
}
