//! Gossip Engine Module
//!
//! Drives anti-entropy convergence: every `gossip_interval` the manager
//! pushes its full membership snapshot to a random `fanout`-sized subset
//! of known peers. Selection is a uniform shuffle without replacement from
//! a per-manager PRNG, seeded from the node identity and a monotonic time
//! source so no two nodes share a sequence.
//!
//! The timer is not a free-running interval: each tick is scheduled from
//! inside the previous tick's handler by sending a message to the
//! manager's own inbox, so rounds can never overlap or race a restart.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::manager::protocol::{InboxSender, ManagerMessage};
use crate::membership::types::{Peer, PeerName};

/// A PRNG unique to this manager instance.
pub fn seeded_rng(name: &PeerName) -> StdRng {
    let mut hasher = DefaultHasher::new();
    name.hash(&mut hasher);
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64;
    StdRng::seed_from_u64(hasher.finish() ^ nanos)
}

/// Picks up to `fanout` peers uniformly without replacement. With fewer
/// candidates than `fanout`, everyone is picked.
pub fn select_peers(rng: &mut StdRng, mut candidates: Vec<Peer>, fanout: usize) -> Vec<Peer> {
    candidates.shuffle(rng);
    candidates.truncate(fanout);
    candidates
}

/// Arms the next gossip tick: after `interval`, a `GossipTick` lands in
/// the manager's inbox. The spawned timer holds only an inbox sender, so
/// a stopped manager simply makes the send a no-op.
pub fn schedule_tick(inbox: InboxSender, interval: Duration) {
    tokio::spawn(async move {
        tokio::time::sleep(interval).await;
        let _ = inbox.send(ManagerMessage::GossipTick).await;
    });
}
