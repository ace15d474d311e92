//! Cairn wire format — discovery datagrams.
//!
//! Every datagram is a fixed 8-byte `FrameHeader` followed by a JSON
//! `Envelope`. The header lets a receiver reject foreign or truncated
//! traffic before touching the JSON body.
//!
//! The header is #[repr(C, packed)] with zerocopy derives, like every
//! fixed-layout type in this crate. Multi-byte header fields are little endian.

use serde::{Deserialize, Serialize};
use static_assertions::assert_eq_size;
use zerocopy::{AsBytes, FromBytes, FromZeroes};

use crate::node::{AgentId, NodeId};
use crate::version::{ServiceVersion, VersionConstraint};

// ── Frame Header ──────────────────────────────────────────────────────────────

/// Precedes every discovery datagram.
///
/// Wire size: 8 bytes.
#[derive(Debug, Clone, AsBytes, FromBytes, FromZeroes)]
#[repr(C, packed)]
pub struct FrameHeader {
    /// Always FRAME_MAGIC. Anything else is not Cairn traffic.
    pub magic: [u8; 4],

    /// Wire format version. Currently 0x01.
    pub version: u8,

    /// FrameKind of the enclosed envelope.
    pub kind: u8,

    /// Length of the JSON body in bytes, little endian.
    pub length: u16,
}

assert_eq_size!(FrameHeader, [u8; 8]);

/// What the envelope carries, mirrored in the frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FrameKind {
    Request = 0x01,
    Reply = 0x02,
}

impl TryFrom<u8> for FrameKind {
    type Error = WireError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x01 => Ok(FrameKind::Request),
            0x02 => Ok(FrameKind::Reply),
            other => Err(WireError::UnknownKind(other)),
        }
    }
}

impl From<FrameKind> for u8 {
    fn from(k: FrameKind) -> u8 {
        k as u8
    }
}

// ── Topics ────────────────────────────────────────────────────────────────────

/// Discovery topic — BLAKE3 hash of the canonical service name.
pub type Topic = [u8; 32];

/// Derive the topic a service's discovery requests are addressed to.
/// Deterministic across nodes: every node hosting `name` listens on it.
pub fn topic_for(name: &str) -> Topic {
    let mut hasher = blake3::Hasher::new();
    hasher.update(b"cairn.service.");
    hasher.update(name.as_bytes());
    *hasher.finalize().as_bytes()
}

// ── Envelope ──────────────────────────────────────────────────────────────────

/// Ask the network who runs a service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryRequest {
    pub service_name: String,
    pub version_constraint: VersionConstraint,
    pub exact: bool,
}

/// One node's answer: "I run this version of it".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryReply {
    pub service_name: String,
    pub version: ServiceVersion,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Content {
    DiscoveryRequest(DiscoveryRequest),
    DiscoveryReply(DiscoveryReply),
}

impl Content {
    pub fn kind(&self) -> FrameKind {
        match self {
            Content::DiscoveryRequest(_) => FrameKind::Request,
            Content::DiscoveryReply(_) => FrameKind::Reply,
        }
    }
}

/// A message with its sender identity attached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Agent that sent this: the requester, or the agent running the service.
    pub sender: AgentId,
    /// Node the sender runs on.
    pub sending_node: NodeId,
    #[serde(with = "hex_topic")]
    pub topic: Topic,
    pub content: Content,
}

// ── Constants ─────────────────────────────────────────────────────────────────

pub const FRAME_MAGIC: [u8; 4] = *b"CAIR";

/// Current frame format version.
pub const WIRE_VERSION: u8 = 0x01;

/// Largest datagram we send or accept. Stays under the IPv6 minimum MTU.
pub const MAX_DATAGRAM: usize = 1200;

/// IPv6 link-local multicast address for discovery requests.
pub const MULTICAST_ADDR: &str = "ff02::1";

/// Default UDP port discovery responders listen on.
pub const DISCOVERY_PORT: u16 = 9100;

const HEADER_LEN: usize = std::mem::size_of::<FrameHeader>();

// ── Errors ────────────────────────────────────────────────────────────────────

/// Errors that can arise when interpreting wire-format data.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WireError {
    #[error("bad frame magic: {0:02x?}")]
    BadMagic([u8; 4]),

    #[error("unsupported frame version: 0x{0:02x}")]
    UnsupportedVersion(u8),

    #[error("unknown frame kind: 0x{0:02x}")]
    UnknownKind(u8),

    #[error("frame truncated: header says {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },

    #[error("frame kind {header:?} does not match envelope content {content:?}")]
    KindMismatch { header: FrameKind, content: FrameKind },

    #[error("datagram of {0} bytes exceeds maximum {}", MAX_DATAGRAM)]
    TooLarge(usize),

    #[error("invalid envelope: {0}")]
    Json(String),
}

// ── Codec ─────────────────────────────────────────────────────────────────────

/// Serialize an envelope into one datagram.
pub fn encode(envelope: &Envelope) -> Result<Vec<u8>, WireError> {
    let body = serde_json::to_vec(envelope).map_err(|e| WireError::Json(e.to_string()))?;
    if HEADER_LEN + body.len() > MAX_DATAGRAM {
        return Err(WireError::TooLarge(HEADER_LEN + body.len()));
    }

    let header = FrameHeader {
        magic: FRAME_MAGIC,
        version: WIRE_VERSION,
        kind: envelope.content.kind().into(),
        length: (body.len() as u16).to_le(),
    };

    let mut out = Vec::with_capacity(HEADER_LEN + body.len());
    out.extend_from_slice(header.as_bytes());
    out.extend_from_slice(&body);
    Ok(out)
}

/// Parse one datagram back into an envelope.
pub fn decode(buf: &[u8]) -> Result<Envelope, WireError> {
    let header = FrameHeader::read_from_prefix(buf).ok_or(WireError::Truncated {
        expected: HEADER_LEN,
        actual: buf.len(),
    })?;

    // Copy packed fields to locals before use.
    let magic = header.magic;
    let version = header.version;
    let length = u16::from_le(header.length) as usize;

    if magic != FRAME_MAGIC {
        return Err(WireError::BadMagic(magic));
    }
    if version != WIRE_VERSION {
        return Err(WireError::UnsupportedVersion(version));
    }
    let kind = FrameKind::try_from(header.kind)?;

    let body = &buf[HEADER_LEN..];
    if body.len() < length {
        return Err(WireError::Truncated {
            expected: length,
            actual: body.len(),
        });
    }

    let envelope: Envelope =
        serde_json::from_slice(&body[..length]).map_err(|e| WireError::Json(e.to_string()))?;

    let content = envelope.content.kind();
    if content != kind {
        return Err(WireError::KindMismatch {
            header: kind,
            content,
        });
    }
    Ok(envelope)
}

mod hex_topic {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8; 32], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<[u8; 32], D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let mut arr = [0u8; 32];
        hex::decode_to_slice(&s, &mut arr).map_err(serde::de::Error::custom)?;
        Ok(arr)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
