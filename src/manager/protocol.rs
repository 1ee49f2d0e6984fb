//! Messages understood by the manager actor: public requests with their
//! reply channels, transport-originated events, and the envelopes peers
//! exchange on the wire.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

use crate::membership::types::{Actor, Peer, PeerName};

/// Everything peers send each other after the handshake. Opaque to the
/// transport; the manager interprets it on arrival.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Envelope {
    /// Full membership snapshot pushed by the anti-entropy gossip.
    ReceiveState(Vec<u8>),
    /// Request to hand `payload` to the handler registered locally under
    /// `target` on the receiving node.
    Forward { target: String, payload: Vec<u8> },
}

/// Errors surfaced to callers of the messaging operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SendError {
    /// The name was never joined or learned; no table entry exists.
    #[error("peer {0} is not yet connected")]
    NotYetConnected(PeerName),
    /// The peer is known but its connection is currently down.
    #[error("peer {0} is disconnected")]
    Disconnected(PeerName),
    /// The manager's event loop has terminated (after `leave`).
    #[error("cluster manager stopped")]
    ManagerStopped,
}

/// Published on the event bus after every membership mutation.
#[derive(Debug, Clone)]
pub struct MembershipChange {
    pub members: Vec<Peer>,
}

/// The manager's inbox message. Requests carry a reply channel; events
/// are one-way signals from the transport or the gossip timer.
#[derive(Debug)]
pub enum ManagerMessage {
    // ------------------------------------------------------------------
    // Requests
    // ------------------------------------------------------------------
    Members {
        reply: oneshot::Sender<Vec<PeerName>>,
    },
    LocalState {
        reply: oneshot::Sender<Vec<u8>>,
    },
    GetActor {
        reply: oneshot::Sender<Actor>,
    },
    Join {
        peer: Peer,
        reply: oneshot::Sender<()>,
    },
    Leave {
        reply: oneshot::Sender<()>,
    },
    UpdateState {
        snapshot: Vec<u8>,
        reply: oneshot::Sender<()>,
    },
    DeleteState {
        reply: oneshot::Sender<()>,
    },
    SendMessage {
        name: PeerName,
        envelope: Envelope,
        reply: oneshot::Sender<Result<(), SendError>>,
    },
    ForwardMessage {
        name: PeerName,
        target: String,
        payload: Vec<u8>,
        reply: oneshot::Sender<Result<(), SendError>>,
    },
    /// Registers a local delivery handle for inbound `Forward` envelopes.
    Register {
        target: String,
        sender: mpsc::Sender<Vec<u8>>,
        reply: oneshot::Sender<()>,
    },

    // ------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------
    /// An inbound envelope from a peer session.
    Receive { envelope: Envelope },
    /// A handshake with `peer` completed; `snapshot` is its state at that
    /// moment. Sent by both dial-side and accept-side sessions.
    Connected { peer: Peer, snapshot: Vec<u8> },
    /// An outbound session terminated; its table entry must go.
    SessionClosed { name: PeerName },
    /// Periodic anti-entropy trigger, self-scheduled into this inbox.
    GossipTick,
}

/// Senders feeding the manager's inbox. Transport sessions hold one of
/// these, never the manager itself.
pub type InboxSender = mpsc::Sender<ManagerMessage>;
