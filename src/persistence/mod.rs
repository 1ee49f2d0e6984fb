//! State Persistence Module
//!
//! Stores the serialized membership CRDT in a single file,
//! `<data_dir>/peer_service/cluster_state`, so a restarted node rejoins
//! with its last known view instead of an empty one.
//!
//! ## Core Mechanisms
//! - **Write-then-rename**: every save writes a sibling temp file and
//!   renames it over the target, so a crash mid-write leaves either the
//!   old state or the new state, never a torn file.
//! - **Fail-open loading**: a missing or undecodable file yields no state
//!   and the node seeds itself fresh; corruption is logged, never fatal.
//! - **Optional**: with no data directory configured every operation is a
//!   no-op.

pub mod store;
