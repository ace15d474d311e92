//! cairn-core — shared types, wire format, versions and configuration.
//! All other Cairn crates depend on this one.

pub mod config;
pub mod node;
pub mod version;
pub mod wire;

pub use node::{AgentId, NodeId};
pub use version::{ServiceIdentity, ServiceRequest, ServiceVersion, VersionConstraint, VersionError};
