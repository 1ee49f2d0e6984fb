//! Observed-remove set of peer descriptors.
//!
//! Each `add` tags the element with a fresh `(actor, seq)` dot. A `remove`
//! tombstones exactly the dots the local replica has observed, so an add
//! that happened concurrently on another replica carries a dot the
//! tombstones cannot cover and survives the merge (add wins). Merge is a
//! pure union of dots and tombstones and is therefore commutative,
//! associative and idempotent.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

use super::types::{Actor, Dot, Peer, PeerName};

/// Raised when a snapshot received from a peer or read from disk cannot be
/// decoded. The carrier drops the snapshot; local state is untouched.
#[derive(Debug, Error)]
#[error("malformed membership snapshot: {0}")]
pub struct DecodeError(#[from] bincode::Error);

/// The replicated membership set.
///
/// Structural equality doubles as CRDT equality: merge only ever unions
/// state, so two replicas that have exchanged snapshots in both directions
/// hold byte-for-byte the same maps.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Membership {
    /// Live dots per element. Dots already tombstoned are filtered on read.
    entries: HashMap<Peer, HashSet<Dot>>,
    /// Every dot any replica has removed.
    tombstones: HashSet<Dot>,
    /// Highest sequence number observed per replica, merged by max.
    clocks: HashMap<Actor, u64>,
}

impl Membership {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a peer, tagged with the given replica's next sequence number.
    pub fn add(&mut self, peer: Peer, actor: &Actor) {
        let seq = self.clocks.entry(*actor).or_insert(0);
        *seq += 1;
        let dot = Dot {
            actor: *actor,
            seq: *seq,
        };
        self.entries.entry(peer).or_default().insert(dot);
    }

    /// Removes a peer by tombstoning every dot this replica has observed
    /// for it. Dots minted concurrently elsewhere are unaffected.
    pub fn remove(&mut self, name: &PeerName) {
        if let Some(dots) = self.entries.get(name) {
            self.tombstones.extend(dots.iter().copied());
        }
    }

    /// Merges a remote replica's state into this one. Never loses
    /// information: dots, tombstones and clocks only grow.
    pub fn merge(&mut self, other: &Membership) {
        for (peer, dots) in &other.entries {
            let local = self.entries.entry(peer.clone()).or_default();
            local.extend(dots.iter().copied());
        }
        self.tombstones.extend(other.tombstones.iter().copied());
        for (actor, seq) in &other.clocks {
            let local = self.clocks.entry(*actor).or_insert(0);
            *local = (*local).max(*seq);
        }
    }

    /// Whether the named peer is currently present: it has at least one
    /// dot no replica has removed.
    pub fn contains(&self, name: &PeerName) -> bool {
        self.entries
            .get(name)
            .is_some_and(|dots| dots.iter().any(|dot| !self.tombstones.contains(dot)))
    }

    /// Current set of present peers, ordered by name.
    pub fn value(&self) -> Vec<Peer> {
        let mut peers: Vec<Peer> = self
            .entries
            .iter()
            .filter(|(_, dots)| dots.iter().any(|dot| !self.tombstones.contains(dot)))
            .map(|(peer, _)| peer.clone())
            .collect();
        peers.sort_by(|a, b| a.name.cmp(&b.name));
        peers
    }

    /// Names of the present peers, ordered.
    pub fn names(&self) -> Vec<PeerName> {
        self.value().into_iter().map(|peer| peer.name).collect()
    }

    pub fn len(&self) -> usize {
        self.entries
            .iter()
            .filter(|(_, dots)| dots.iter().any(|dot| !self.tombstones.contains(dot)))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deterministic binary encoding used for both disk and wire.
    pub fn encode(&self) -> Vec<u8> {
        bincode::serialize(self).expect("serialization should not fail")
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        Ok(bincode::deserialize(bytes)?)
    }
}
