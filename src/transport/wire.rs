//! Frame layer of the peer protocol: length-delimited bincode messages.
//!
//! The first frame in each direction is a `Hello`; everything after is an
//! `Envelope`. The membership snapshot inside `Hello` stays encoded so the
//! transport never depends on CRDT internals.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::manager::protocol::Envelope;
use crate::membership::types::Peer;

/// Handshake frame, sent once by each side immediately after connecting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hello {
    /// Who is speaking.
    pub peer: Peer,
    /// Encoded membership snapshot at handshake time.
    pub state: Vec<u8>,
}

/// Everything that crosses a peer connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Frame {
    Hello(Hello),
    Envelope(Envelope),
}

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("frame encode failed: {0}")]
    Encode(#[source] bincode::Error),
    #[error("frame decode failed: {0}")]
    Decode(#[source] bincode::Error),
}

impl Frame {
    pub fn encode(&self) -> Result<Vec<u8>, FrameError> {
        bincode::serialize(self).map_err(FrameError::Encode)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, FrameError> {
        bincode::deserialize(bytes).map_err(FrameError::Decode)
    }
}
