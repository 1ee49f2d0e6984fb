use std::collections::HashMap;

use crate::membership::types::PeerName;
use crate::transport::PeerLink;

/// Connection status of one peer. Two explicit cases: a missing entry
/// means "unknown peer", never "known but down".
#[derive(Debug, Clone)]
pub enum ConnectionEntry {
    Connected(PeerLink),
    Disconnected,
}

impl ConnectionEntry {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionEntry::Connected(_))
    }
}

/// Peer name → connection status, owned exclusively by the manager task.
#[derive(Debug, Default)]
pub struct ConnectionTable {
    entries: HashMap<PeerName, ConnectionEntry>,
}

impl ConnectionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &PeerName) -> Option<&ConnectionEntry> {
        self.entries.get(name)
    }

    /// Live send handle for a peer, if its session is up.
    pub fn connected_link(&self, name: &PeerName) -> Option<&PeerLink> {
        match self.entries.get(name) {
            Some(ConnectionEntry::Connected(link)) => Some(link),
            _ => None,
        }
    }

    pub fn insert_connected(&mut self, name: PeerName, link: PeerLink) {
        self.entries.insert(name, ConnectionEntry::Connected(link));
    }

    pub fn mark_disconnected(&mut self, name: PeerName) {
        self.entries.insert(name, ConnectionEntry::Disconnected);
    }

    /// Erases a peer entirely, used when its session terminates or it
    /// leaves the cluster. Dropping the link closes the session's queue.
    pub fn remove(&mut self, name: &PeerName) -> Option<ConnectionEntry> {
        self.entries.remove(name)
    }

    pub fn contains(&self, name: &PeerName) -> bool {
        self.entries.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &PeerName> {
        self.entries.keys()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops entries for peers no longer in the candidate set, keeping the
    /// table aligned with membership ∪ pending.
    pub fn retain_names<F>(&mut self, keep: F)
    where
        F: Fn(&PeerName) -> bool,
    {
        self.entries.retain(|name, _| keep(name));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::protocol::Envelope;
    use tokio::sync::mpsc;

    fn name(s: &str) -> PeerName {
        PeerName(s.to_string())
    }

    fn link() -> (PeerLink, mpsc::Receiver<Envelope>) {
        let (tx, rx) = mpsc::channel(4);
        (PeerLink::new(tx), rx)
    }

    #[test]
    fn test_missing_and_disconnected_are_distinct() {
        let mut table = ConnectionTable::new();
        table.mark_disconnected(name("known-down"));

        assert!(table.get(&name("never-seen")).is_none());
        assert!(matches!(
            table.get(&name("known-down")),
            Some(ConnectionEntry::Disconnected)
        ));
    }

    #[test]
    fn test_connected_entry_exposes_link() {
        let mut table = ConnectionTable::new();
        let (peer_link, mut rx) = link();
        table.insert_connected(name("node-1"), peer_link);

        let out = table.connected_link(&name("node-1")).unwrap();
        out.send(Envelope::ReceiveState(vec![1])).unwrap();
        assert!(matches!(
            rx.try_recv().unwrap(),
            Envelope::ReceiveState(bytes) if bytes == vec![1]
        ));

        assert!(table.connected_link(&name("node-2")).is_none());
    }

    #[test]
    fn test_promote_and_demote() {
        let mut table = ConnectionTable::new();
        table.mark_disconnected(name("node-1"));
        assert!(!table.get(&name("node-1")).unwrap().is_connected());

        let (peer_link, _rx) = link();
        table.insert_connected(name("node-1"), peer_link);
        assert!(table.get(&name("node-1")).unwrap().is_connected());
        assert_eq!(table.len(), 1, "promotion must not duplicate the entry");
    }

    #[test]
    fn test_remove_erases_entry() {
        let mut table = ConnectionTable::new();
        let (peer_link, _rx) = link();
        table.insert_connected(name("node-1"), peer_link);

        assert!(table.remove(&name("node-1")).is_some());
        assert!(table.get(&name("node-1")).is_none());
        assert!(table.remove(&name("node-1")).is_none());
    }

    #[test]
    fn test_send_on_dead_link_fails() {
        let (peer_link, rx) = link();
        drop(rx);

        assert!(peer_link.send(Envelope::ReceiveState(vec![])).is_err());
    }

    #[test]
    fn test_retain_names_drops_stale_entries() {
        let mut table = ConnectionTable::new();
        table.mark_disconnected(name("keep"));
        table.mark_disconnected(name("stale"));

        table.retain_names(|n| n.as_str() == "keep");

        assert!(table.contains(&name("keep")));
        assert!(!table.contains(&name("stale")));
    }
}
