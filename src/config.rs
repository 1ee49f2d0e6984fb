//! Cluster Configuration
//!
//! All tunables of the peer service in one place. The binary fills this
//! from command-line flags; embedders construct it directly.

use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for one cluster node.
#[derive(Debug, Clone)]
pub struct ClusterConfig {
    /// Stable, globally unique node name advertised to peers.
    pub name: String,
    /// Address advertised in the local peer descriptor.
    pub peer_ip: IpAddr,
    /// Port advertised in the local peer descriptor.
    pub peer_port: u16,
    /// Root directory for persisted state. `None` disables persistence.
    pub data_dir: Option<PathBuf>,
    /// Period between gossip rounds, measured from the end of the previous
    /// round so rounds never overlap.
    pub gossip_interval: Duration,
    /// Number of peers pushed to per gossip round.
    pub fanout: usize,
    /// Upper bound on a single outbound connection attempt.
    pub connect_timeout: Duration,
    /// Buffer size of the manager's request/event inbox.
    pub inbox_capacity: usize,
    /// Buffer size of each peer session's outbound channel.
    pub session_capacity: usize,
    /// Buffer size of the membership-change broadcast.
    pub event_capacity: usize,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            name: "node".to_string(),
            peer_ip: IpAddr::from([127, 0, 0, 1]),
            peer_port: 9000,
            data_dir: None, // persistence off unless asked for
            gossip_interval: Duration::from_secs(5),
            fanout: 3,
            connect_timeout: Duration::from_secs(2),
            inbox_capacity: 128,  // requests are cheap; events can be bursty
            session_capacity: 64, // one slow peer must not stall the manager
            event_capacity: 64,
        }
    }
}

impl ClusterConfig {
    /// Convenience constructor for the common case.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}
