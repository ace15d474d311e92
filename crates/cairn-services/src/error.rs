//! Error types for service discovery.

use std::time::Duration;

use cairn_core::wire::{FrameKind, WireError};
use cairn_core::{ServiceIdentity, ServiceRequest};

pub type Result<T> = std::result::Result<T, DiscoveryError>;

/// Failures reported by the node transport.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The transport gave up waiting and has nothing to show for it.
    #[error("no replies within {0:?}")]
    Timeout(Duration),

    #[error("send failed: {0}")]
    Send(String),
}

#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    /// Nothing local or remote satisfies the request.
    #[error(
        "no instance of {request} found{}",
        .cause.as_ref().map(|c| format!(" ({c})")).unwrap_or_default()
    )]
    NotFound {
        request: ServiceRequest,
        #[source]
        cause: Option<Box<DiscoveryError>>,
    },

    /// A discovery round hit its deadline with no usable replies.
    #[error("discovery timed out after {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },

    #[error("transport failure: {0}")]
    Transport(#[source] TransportError),

    /// One reply could not be decoded. Skipped, never aborts a round.
    #[error("malformed discovery reply: {0}")]
    MalformedReply(#[from] WireError),

    /// One reply decoded but carried something other than a discovery reply.
    #[error("unexpected {kind:?} frame in discovery replies")]
    UnexpectedReply { kind: FrameKind },

    /// Two different local services claim the same identity. Never retried.
    #[error("another local service is already registered as {identity}")]
    RegistryConflict { identity: ServiceIdentity },
}

impl DiscoveryError {
    pub fn not_found(request: &ServiceRequest, cause: Option<DiscoveryError>) -> Self {
        Self::NotFound {
            request: request.clone(),
            cause: cause.map(Box::new),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<TransportError> for DiscoveryError {
    fn from(e: TransportError) -> Self {
        match e {
            TransportError::Timeout(d) => Self::Timeout {
                timeout_ms: d.as_millis() as u64,
            },
            other => Self::Transport(other),
        }
    }
}
