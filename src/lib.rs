//! Peer-to-Peer Cluster Membership Library
//!
//! This library crate implements an eventually-consistent cluster
//! membership manager: nodes maintain a replicated view of the cluster
//! with an anti-entropy gossip protocol and multiplex application
//! messages over persistent peer-to-peer connections.
//!
//! ## Architecture Modules
//! The system is composed of loosely coupled subsystems around one
//! single-writer actor:
//!
//! - **`manager`**: the manager actor. Sole owner of all cluster state;
//!   serializes every API call, transport event and gossip tick through
//!   one event loop.
//! - **`membership`**: the replicated data layer. An observed-remove set
//!   (OR-Set) of peer descriptors with per-replica causality, giving
//!   conflict-free merges and add-wins semantics.
//! - **`connection`**: the connection table. Tracks, per known peer,
//!   whether an outbound session is up, and keeps that view aligned with
//!   the membership.
//! - **`gossip`**: the dissemination engine. Periodically pushes the full
//!   local state to a random fanout of peers, driving convergence and
//!   healing transient partitions.
//! - **`transport`**: the socket layer. Owns TCP sessions, performs the
//!   handshake, and feeds envelopes and lifecycle signals back into the
//!   manager's inbox.
//! - **`persistence`**: crash-safe storage of the membership snapshot in
//!   a single state file.

pub mod config;
pub mod connection;
pub mod gossip;
pub mod manager;
pub mod membership;
pub mod persistence;
pub mod transport;
