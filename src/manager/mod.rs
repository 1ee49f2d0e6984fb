//! Manager Actor Module
//!
//! The single owner of all cluster state: membership CRDT, pending joins,
//! connection table and the local forward-delivery registry. Every public
//! operation and every transport event is a message on one inbox, handled
//! to completion before the next, which is the whole concurrency story —
//! no locks, no shared mutable state.
//!
//! ## Core Mechanisms
//! - **Request/reply**: API calls travel as messages carrying a oneshot
//!   reply channel; callers see their own effects in issue order.
//! - **Lifecycle events**: transport sessions report handshakes and
//!   terminations into the same inbox, keeping the connection table in
//!   step with reality.
//! - **Self-scheduled gossip**: each tick re-arms the next by sending to
//!   the manager's own inbox, so rounds never overlap.

pub mod protocol;
pub mod service;
