use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::net::IpAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Globally unique, stable identifier for a node in the cluster.
/// Survives restarts; supplied by the operator, not generated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerName(pub String);

impl PeerName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PeerName {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Descriptor of a single cluster node.
///
/// Identity is the `name` alone: equality and hashing ignore the network
/// fields, which are only used to establish a connection. Two descriptors
/// with the same name but different addresses refer to the same node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Peer {
    /// Stable node identifier.
    pub name: PeerName,
    /// Address the node's peer listener is reachable at.
    pub addr: IpAddr,
    /// Port the node's peer listener is reachable at.
    pub port: u16,
}

impl Peer {
    pub fn new(name: impl Into<String>, addr: IpAddr, port: u16) -> Self {
        Self {
            name: PeerName(name.into()),
            addr,
            port,
        }
    }
}

impl PartialEq for Peer {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Peer {}

impl Hash for Peer {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

// Lets maps keyed by `Peer` be queried by name, which is the identity anyway.
impl Borrow<PeerName> for Peer {
    fn borrow(&self) -> &PeerName {
        &self.name
    }
}

/// Replica identifier for CRDT operations.
///
/// Derived once at startup from the node name and a monotonic unique
/// counter; a restarted node gets a fresh `Actor` even under the same name,
/// so its adds and removes are never confused with a prior incarnation's.
#[derive(Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Actor([u8; 20]);

static ACTOR_COUNTER: AtomicU64 = AtomicU64::new(0);

impl Actor {
    /// Generates a fresh replica identifier for this process.
    pub fn generate(name: &PeerName) -> Self {
        use sha2::{Digest, Sha256};

        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        let unique = ACTOR_COUNTER.fetch_add(1, Ordering::Relaxed);

        let mut hasher = Sha256::new();
        hasher.update(name.0.as_bytes());
        hasher.update(nanos.to_le_bytes());
        hasher.update(unique.to_le_bytes());
        let digest = hasher.finalize();

        let mut id = [0u8; 20];
        id.copy_from_slice(&digest[..20]);
        Self(id)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl fmt::Debug for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short hex prefix; the full 20 bytes are noise in logs.
        write!(
            f,
            "Actor({:02x}{:02x}{:02x}{:02x})",
            self.0[0], self.0[1], self.0[2], self.0[3]
        )
    }
}

/// A unique tag minted by one `add` operation: the adding replica plus its
/// sequence number at the time of the add.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Dot {
    pub actor: Actor,
    pub seq: u64,
}
