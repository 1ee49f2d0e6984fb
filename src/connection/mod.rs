//! Connection Table Module
//!
//! Tracks, per known peer, whether an outbound session is currently up.
//! The table realizes the invariant that every peer in the membership view
//! or the pending-join list has exactly one entry, `Connected` when a live
//! send handle exists and `Disconnected` otherwise. Names outside that set
//! never appear; entries whose session died are erased and reinserted as
//! `Disconnected` on the next establish pass.

pub mod table;
