// src/controller/mod.rs

//! The primary handoff & force-join controller, split by
//! entry point: `regular` (operator-driven handoff and its force
//! dispatch), `force_join` (the 10-step merge), `follower` (the RPC
//! handlers a follower exposes), and `become_primary` (the shared
//! smap-mutation final step).

pub mod admin;
pub mod become_primary;
pub mod follower;
pub mod force_join;
pub mod regular;

pub use regular::set_primary;
