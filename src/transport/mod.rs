//! Peer Transport Module
//!
//! Owns the sockets. The manager never touches a `TcpStream`; it talks to
//! peers through `PeerLink` send handles and hears back through its inbox.
//!
//! ## Core Mechanisms
//! - **Connector seam**: the manager is generic over [`Connector`], so the
//!   production TCP dialer and the in-process test hub are interchangeable.
//! - **Session tasks**: each connection is owned by a spawned task that
//!   performs the `Hello` handshake, then pumps length-delimited bincode
//!   frames in both directions. Outbound (dialed) sessions report their
//!   death so the manager can drop the table entry; inbound (accepted)
//!   sessions are receive pumps with no table presence.
//! - **Bounded dialing**: every connection attempt runs under a timeout so
//!   the manager's event loop never stalls on a dead address.

pub mod client;
pub mod listener;
pub mod wire;

#[cfg(test)]
pub mod hub;

use std::future::Future;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::manager::protocol::{Envelope, InboxSender};
use crate::membership::types::Peer;
use wire::Hello;

/// Outbound connection attempt failures. Recorded as `Disconnected` in the
/// connection table and retried on the next gossip tick; never surfaced to
/// API callers.
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("dial to {addr} failed: {source}")]
    Dial {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("dial to {addr} timed out")]
    Timeout { addr: String },
    #[error("peer {0} is not reachable")]
    Unreachable(String),
}

/// The session backing this link is gone; the envelope was not queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("peer session unavailable")]
pub struct SessionSendError;

/// Send-channel handle over one outbound peer session.
///
/// Cheap to clone; dropping every clone (plus the table entry) closes the
/// session's outbound queue and ends it.
#[derive(Debug, Clone)]
pub struct PeerLink {
    tx: mpsc::Sender<Envelope>,
}

impl PeerLink {
    pub fn new(tx: mpsc::Sender<Envelope>) -> Self {
        Self { tx }
    }

    /// Queues an envelope for the session, fire-and-forget. A full queue
    /// counts as a failed dispatch; gossip will repair missed state.
    pub fn send(&self, envelope: Envelope) -> Result<(), SessionSendError> {
        self.tx.try_send(envelope).map_err(|_| SessionSendError)
    }
}

/// Dials a peer and starts the session that owns the connection.
///
/// `hello` is the local handshake frame (descriptor plus current state
/// snapshot); `inbox` is where the session reports `Connected`, inbound
/// envelopes and its own termination. Implementations must return within a
/// bounded interval.
pub trait Connector: Send + Sync + 'static {
    fn connect(
        &self,
        peer: &Peer,
        hello: Hello,
        inbox: InboxSender,
    ) -> impl Future<Output = Result<PeerLink, ConnectError>> + Send;
}
