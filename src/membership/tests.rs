//! Membership CRDT Tests
//!
//! Validates the algebraic laws the gossip protocol depends on and the
//! observed-remove behavior of the set itself.
//!
//! ## Test Scopes
//! - **Identity**: peer equality/hashing by name, actor freshness.
//! - **Merge Laws**: idempotence, commutativity, associativity.
//! - **Observed-Remove Semantics**: concurrent add wins, removes do not
//!   resurrect, re-add restores.
//! - **Encoding**: binary round-trip and malformed-input rejection.

#[cfg(test)]
mod tests {
    use crate::membership::orset::Membership;
    use crate::membership::types::{Actor, Peer, PeerName};
    use std::collections::HashSet;

    fn peer(name: &str) -> Peer {
        Peer::new(name, "127.0.0.1".parse().unwrap(), 9000)
    }

    fn actor(name: &str) -> Actor {
        Actor::generate(&PeerName(name.to_string()))
    }

    // ============================================================
    // PEER IDENTITY TESTS
    // ============================================================

    #[test]
    fn test_peer_equality_is_by_name_only() {
        let a = Peer::new("node-1", "10.0.0.1".parse().unwrap(), 9000);
        let b = Peer::new("node-1", "192.168.0.7".parse().unwrap(), 9999);
        let c = Peer::new("node-2", "10.0.0.1".parse().unwrap(), 9000);

        assert_eq!(a, b, "same name must compare equal regardless of address");
        assert_ne!(a, c);
    }

    #[test]
    fn test_peer_hash_follows_name() {
        let mut set = HashSet::new();
        set.insert(Peer::new("node-1", "10.0.0.1".parse().unwrap(), 9000));
        set.insert(Peer::new("node-1", "10.0.0.2".parse().unwrap(), 9001));
        set.insert(Peer::new("node-2", "10.0.0.1".parse().unwrap(), 9000));

        assert_eq!(set.len(), 2, "HashSet should collapse same-name peers");
    }

    #[test]
    fn test_actor_is_unique_per_generation() {
        let name = PeerName("node-1".to_string());
        let a = Actor::generate(&name);
        let b = Actor::generate(&name);

        assert_ne!(a, b, "each process start must yield a fresh Actor");
    }

    // ============================================================
    // BASIC SET OPERATIONS
    // ============================================================

    #[test]
    fn test_add_and_contains() {
        let a = actor("a");
        let mut set = Membership::new();
        set.add(peer("node-1"), &a);

        assert!(set.contains(&PeerName("node-1".into())));
        assert!(!set.contains(&PeerName("node-2".into())));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_remove_observed_element() {
        let a = actor("a");
        let mut set = Membership::new();
        set.add(peer("node-1"), &a);
        set.remove(&PeerName("node-1".into()));

        assert!(!set.contains(&PeerName("node-1".into())));
        assert!(set.is_empty());
    }

    #[test]
    fn test_remove_unknown_element_is_noop() {
        let a = actor("a");
        let mut set = Membership::new();
        set.add(peer("node-1"), &a);
        set.remove(&PeerName("ghost".into()));

        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_re_add_after_remove_restores() {
        let a = actor("a");
        let mut set = Membership::new();
        set.add(peer("node-1"), &a);
        set.remove(&PeerName("node-1".into()));
        set.add(peer("node-1"), &a);

        assert!(
            set.contains(&PeerName("node-1".into())),
            "a fresh add must mint a new dot the tombstones cannot cover"
        );
    }

    #[test]
    fn test_value_is_sorted_by_name() {
        let a = actor("a");
        let mut set = Membership::new();
        set.add(peer("charlie"), &a);
        set.add(peer("alpha"), &a);
        set.add(peer("bravo"), &a);

        let names: Vec<String> = set.names().into_iter().map(|n| n.0).collect();
        assert_eq!(names, vec!["alpha", "bravo", "charlie"]);
    }

    // ============================================================
    // MERGE LAW TESTS
    // ============================================================

    fn two_replicas() -> (Membership, Membership) {
        let a = actor("a");
        let b = actor("b");
        let mut left = Membership::new();
        let mut right = Membership::new();
        left.add(peer("node-a"), &a);
        left.add(peer("shared"), &a);
        right.add(peer("node-b"), &b);
        right.add(peer("shared"), &b);
        right.remove(&PeerName("node-b".into()));
        (left, right)
    }

    #[test]
    fn test_merge_is_idempotent() {
        let (mut left, _) = two_replicas();
        let before = left.clone();
        left.merge(&before);

        assert_eq!(left, before, "merge(m, m) must equal m");
    }

    #[test]
    fn test_merge_is_commutative() {
        let (left, right) = two_replicas();

        let mut ab = left.clone();
        ab.merge(&right);
        let mut ba = right.clone();
        ba.merge(&left);

        assert_eq!(ab, ba, "merge(a, b) must equal merge(b, a)");
    }

    #[test]
    fn test_merge_is_associative() {
        let (left, right) = two_replicas();
        let c = actor("c");
        let mut third = Membership::new();
        third.add(peer("node-c"), &c);
        third.add(peer("shared"), &c);

        // (left ⊔ right) ⊔ third
        let mut lr = left.clone();
        lr.merge(&right);
        lr.merge(&third);

        // left ⊔ (right ⊔ third)
        let mut rt = right.clone();
        rt.merge(&third);
        let mut l_rt = left.clone();
        l_rt.merge(&rt);

        assert_eq!(lr, l_rt);
    }

    #[test]
    fn test_merge_unions_elements() {
        let (mut left, right) = two_replicas();
        left.merge(&right);

        assert!(left.contains(&PeerName("node-a".into())));
        assert!(left.contains(&PeerName("shared".into())));
        assert!(
            !left.contains(&PeerName("node-b".into())),
            "right removed node-b having observed its only dot"
        );
    }

    // ============================================================
    // CONCURRENT ADD / REMOVE SEMANTICS
    // ============================================================

    #[test]
    fn test_concurrent_add_wins_over_remove() {
        let a = actor("a");
        let mut left = Membership::new();
        left.add(peer("x"), &a);

        let mut right = left.clone();

        // Concurrently: left re-adds x, right removes the observed x.
        left.add(peer("x"), &a);
        right.remove(&PeerName("x".into()));

        left.merge(&right);
        assert!(
            left.contains(&PeerName("x".into())),
            "the concurrent add's fresh dot must survive the remove"
        );

        // A remove that observed every dot does win.
        let mut all_seen = left.clone();
        all_seen.merge(&right);
        all_seen.remove(&PeerName("x".into()));
        left.merge(&all_seen);
        assert!(!left.contains(&PeerName("x".into())));
    }

    #[test]
    fn test_remove_covers_only_observed_dots() {
        let a = actor("a");
        let b = actor("b");

        let mut left = Membership::new();
        left.add(peer("x"), &a);

        // right has never seen left's add; its remove tombstones nothing.
        let mut right = Membership::new();
        right.add(peer("y"), &b);
        right.remove(&PeerName("x".into()));

        left.merge(&right);
        assert!(
            left.contains(&PeerName("x".into())),
            "a remove of an unobserved element must not affect it"
        );
    }

    #[test]
    fn test_leave_while_other_node_joins() {
        // Mirrors the two-survivor scenario: A and B know {A, B}; A leaves
        // while B concurrently joins C. Survivors converge on {B, C}.
        let a = actor("a");
        let b = actor("b");

        let mut node_a = Membership::new();
        node_a.add(peer("A"), &a);
        node_a.add(peer("B"), &a);
        let mut node_b = node_a.clone();

        node_a.remove(&PeerName("A".into()));
        node_b.add(peer("C"), &b);

        node_b.merge(&node_a);
        let names: Vec<String> = node_b.names().into_iter().map(|n| n.0).collect();
        assert_eq!(names, vec!["B", "C"]);
    }

    // ============================================================
    // ENCODING TESTS
    // ============================================================

    #[test]
    fn test_encode_decode_round_trip() {
        let (mut left, right) = two_replicas();
        left.merge(&right);

        let bytes = left.encode();
        let restored = Membership::decode(&bytes).expect("decode failed");

        assert_eq!(restored, left);
        assert_eq!(restored.names(), left.names());
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(Membership::decode(b"definitely not bincode").is_err());
    }

    #[test]
    fn test_peer_json_serialization() {
        let original = Peer::new("node-1", "192.168.1.7".parse().unwrap(), 9000);

        let json = serde_json::to_string(&original).expect("Serialization failed");
        let restored: Peer = serde_json::from_str(&json).expect("Deserialization failed");

        assert_eq!(restored.name, original.name);
        assert_eq!(restored.addr, original.addr);
        assert_eq!(restored.port, original.port);
    }

    #[test]
    fn test_merge_of_decoded_snapshot_converges() {
        let (left, mut right) = two_replicas();

        let wire = left.encode();
        let remote = Membership::decode(&wire).unwrap();
        right.merge(&remote);

        let mut direct = right.clone();
        direct.merge(&left);
        assert_eq!(
            right, direct,
            "merging a decoded snapshot must equal merging the live value"
        );
    }
}
