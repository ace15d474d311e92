//! Service versions, version constraints and service identities.
//!
//! A version is `major.minor.patch`. Shorter forms ("1", "1.2") fill the
//! missing components with zero. A constraint decides which versions a
//! request accepts:
//!
//!   "*"                   any version
//!   "1", "1.2", "1.2.3"   every given component must match
//!   "^1.2"                same major, at least 1.2.0
//!   "=1.2.3"              exactly 1.2.3

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VersionError {
    #[error("empty version string")]
    Empty,
    #[error("invalid version component {0:?}")]
    InvalidComponent(String),
    #[error("too many version components in {0:?}")]
    TooManyComponents(String),
}

/// Split "1.2.3" into at most three numeric components.
fn parse_components(s: &str) -> Result<Vec<u32>, VersionError> {
    let s = s.trim();
    if s.is_empty() {
        return Err(VersionError::Empty);
    }
    let parts = s
        .split('.')
        .map(|p| {
            p.parse::<u32>()
                .map_err(|_| VersionError::InvalidComponent(p.to_string()))
        })
        .collect::<Result<Vec<_>, _>>()?;
    if parts.len() > 3 {
        return Err(VersionError::TooManyComponents(s.to_string()));
    }
    Ok(parts)
}

// ── ServiceVersion ────────────────────────────────────────────────────────────

/// A concrete service version. Ordered lexicographically by component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ServiceVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl ServiceVersion {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self { major, minor, patch }
    }

    /// Does this version satisfy the constraint?
    pub fn fits(&self, constraint: &VersionConstraint) -> bool {
        match constraint {
            VersionConstraint::Any => true,
            VersionConstraint::Prefix {
                major,
                minor,
                patch,
            } => {
                self.major == *major
                    && minor.map_or(true, |m| self.minor == m)
                    && patch.map_or(true, |p| self.patch == p)
            }
            VersionConstraint::Caret(base) => self.major == base.major && self >= base,
            VersionConstraint::Exact(v) => self == v,
        }
    }
}

impl FromStr for ServiceVersion {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts = parse_components(s)?;
        Ok(Self {
            major: parts[0],
            minor: parts.get(1).copied().unwrap_or(0),
            patch: parts.get(2).copied().unwrap_or(0),
        })
    }
}

impl fmt::Display for ServiceVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl TryFrom<String> for ServiceVersion {
    type Error = VersionError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<ServiceVersion> for String {
    fn from(v: ServiceVersion) -> Self {
        v.to_string()
    }
}

// ── VersionConstraint ─────────────────────────────────────────────────────────

/// The set of versions a request is willing to accept.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum VersionConstraint {
    /// "*"
    Any,
    /// "1", "1.2", "1.2.3" — unspecified components are wildcards.
    Prefix {
        major: u32,
        minor: Option<u32>,
        patch: Option<u32>,
    },
    /// "^1.2" — same major, not older than the base.
    Caret(ServiceVersion),
    /// "=1.2.3"
    Exact(ServiceVersion),
}

impl VersionConstraint {
    pub fn exactly(version: ServiceVersion) -> Self {
        Self::Exact(version)
    }

    /// The single version an exact request addresses.
    /// None for "*", which names no particular version.
    pub fn pinned(&self) -> Option<ServiceVersion> {
        match self {
            Self::Any => None,
            Self::Prefix {
                major,
                minor,
                patch,
            } => Some(ServiceVersion::new(
                *major,
                minor.unwrap_or(0),
                patch.unwrap_or(0),
            )),
            Self::Caret(v) | Self::Exact(v) => Some(*v),
        }
    }
}

impl FromStr for VersionConstraint {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s == "*" {
            return Ok(Self::Any);
        }
        if let Some(rest) = s.strip_prefix('^') {
            return Ok(Self::Caret(rest.parse()?));
        }
        if let Some(rest) = s.strip_prefix('=') {
            return Ok(Self::Exact(rest.parse()?));
        }
        let parts = parse_components(s)?;
        Ok(Self::Prefix {
            major: parts[0],
            minor: parts.get(1).copied(),
            patch: parts.get(2).copied(),
        })
    }
}

impl fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str("*"),
            Self::Prefix {
                major,
                minor,
                patch,
            } => {
                write!(f, "{major}")?;
                if let Some(m) = minor {
                    write!(f, ".{m}")?;
                }
                if let Some(p) = patch {
                    write!(f, ".{p}")?;
                }
                Ok(())
            }
            Self::Caret(v) => write!(f, "^{v}"),
            Self::Exact(v) => write!(f, "={v}"),
        }
    }
}

impl TryFrom<String> for VersionConstraint {
    type Error = VersionError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<VersionConstraint> for String {
    fn from(c: VersionConstraint) -> Self {
        c.to_string()
    }
}

// ── Identities and requests ───────────────────────────────────────────────────

/// A service name paired with one concrete version.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ServiceIdentity {
    pub name: String,
    pub version: ServiceVersion,
}

impl ServiceIdentity {
    pub fn new(name: impl Into<String>, version: ServiceVersion) -> Self {
        Self {
            name: name.into(),
            version,
        }
    }

    /// Parse "name" + "1.2.3" into an identity.
    pub fn parse(name: impl Into<String>, version: &str) -> Result<Self, VersionError> {
        Ok(Self::new(name, version.parse()?))
    }

    /// A request matching exactly this identity.
    pub fn as_request(&self) -> ServiceRequest {
        ServiceRequest::new(self.name.clone(), VersionConstraint::exactly(self.version))
    }
}

impl fmt::Display for ServiceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.version)
    }
}

/// What a caller asks for: a service name and the versions it accepts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServiceRequest {
    pub name: String,
    pub constraint: VersionConstraint,
}

impl ServiceRequest {
    pub fn new(name: impl Into<String>, constraint: VersionConstraint) -> Self {
        Self {
            name: name.into(),
            constraint,
        }
    }

    pub fn parse(name: impl Into<String>, constraint: &str) -> Result<Self, VersionError> {
        Ok(Self::new(name, constraint.parse()?))
    }
}

impl fmt::Display for ServiceRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.constraint)
    }
}
