//! cairn-services — the discovery core.
//!
//! Local registry, remote instance cache, discovery rounds and the resolver
//! that ties them together. The network sits behind `NodeTransport`.

pub mod announce;
pub mod discovery;
pub mod error;
pub mod instance;
pub mod local;
pub mod remote;
pub mod resolver;
pub mod transport;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use announce::{announce_loop, Announcer, NoopAnnouncer};
pub use discovery::DiscoveryProtocol;
pub use error::{DiscoveryError, Result, TransportError};
pub use instance::{LocalService, Locality, ServiceInstance};
pub use local::LocalServiceRegistry;
pub use remote::RemoteServiceCache;
pub use resolver::Resolver;
pub use transport::NodeTransport;
