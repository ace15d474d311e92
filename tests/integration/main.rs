//! Cairn integration test harness.
//!
//! Several nodes share an in-memory network. Each node is a full `Resolver`
//! with its own registry and cache. Requests are answered by every other node
//! whose registry serves them, exactly as the daemon's responder would.
//!
//!   cargo test --test integration

mod infra;

mod concurrency;
mod discovery;
mod eviction;
mod policy;
mod registration;

pub use infra::*;
