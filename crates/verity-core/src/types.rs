use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// DID method used for documents created by Verity issuers.
pub const VERITY_METHOD: &str = "verity";

/// Maximum length of a namespace or entity segment.
pub const MAX_SEGMENT_LEN: usize = 63;

/// Decentralized Identifier (DID).
/// Format: `did:<method>:<namespace>[:<entity-identifier>]`
///
/// Documents built by Verity always use `did:verity:<namespace>:<entity>`;
/// parsing is more tolerant so that externally chosen identifiers such as
/// `did:example:org` can be represented.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Did(String);

impl Did {
    /// Parse and validate a full DID URI.
    pub fn new(uri: impl Into<String>) -> Result<Self, CoreError> {
        let uri = uri.into();
        let Some(rest) = uri.strip_prefix("did:") else {
            return Err(CoreError::InvalidDid(format!(
                "DID must start with 'did:', got: {}",
                uri
            )));
        };
        let parts: Vec<&str> = rest.split(':').collect();
        if parts.len() < 2 || parts.iter().any(|p| p.is_empty()) {
            return Err(CoreError::InvalidDid(format!(
                "DID must have format 'did:<method>:<namespace>[:<entity>]', got: {}",
                uri
            )));
        }
        if !parts[0]
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        {
            return Err(CoreError::InvalidDid(format!(
                "DID method must be lowercase alphanumeric, got: {}",
                parts[0]
            )));
        }
        if uri
            .chars()
            .any(|c| c.is_whitespace() || c == '#' || c == '?' || c == '/')
        {
            return Err(CoreError::InvalidDid(format!(
                "DID must not contain whitespace, fragments, queries or paths: {}",
                uri
            )));
        }
        Ok(Self(uri))
    }

    /// Build a `did:verity:<namespace>:<entity>` identifier from validated segments.
    pub fn from_parts(namespace: &str, entity: &str) -> Result<Self, CoreError> {
        validate_segment("namespace", namespace)?;
        validate_segment("entity identifier", entity)?;
        Ok(Self(format!("did:{}:{}:{}", VERITY_METHOD, namespace, entity)))
    }

    /// Get the full DID URI.
    pub fn uri(&self) -> &str {
        &self.0
    }

    /// Extract the method (e.g. `verity`).
    pub fn method(&self) -> &str {
        self.0.split(':').nth(1).unwrap_or_default()
    }

    /// Extract the namespace segment.
    pub fn namespace(&self) -> &str {
        self.0.split(':').nth(2).unwrap_or_default()
    }

    /// Extract the entity identifier, if the DID has one.
    pub fn entity(&self) -> Option<&str> {
        self.0.splitn(4, ':').nth(3)
    }
}

impl fmt::Display for Did {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Did {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for Did {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Did> for String {
    fn from(did: Did) -> Self {
        did.0
    }
}

impl PartialEq<str> for Did {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

/// Normalize a free-form organization name into an entity identifier:
/// lower-cased, whitespace turned into hyphens, other characters dropped,
/// hyphen runs collapsed.
pub fn normalize_entity(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.trim().chars().flat_map(char::to_lowercase) {
        let mapped = if c.is_whitespace() || c == '-' || c == '_' {
            '-'
        } else if c.is_ascii_lowercase() || c.is_ascii_digit() {
            c
        } else {
            continue;
        };
        if mapped == '-' && (out.is_empty() || out.ends_with('-')) {
            continue;
        }
        out.push(mapped);
    }
    while out.ends_with('-') {
        out.pop();
    }
    out.truncate(MAX_SEGMENT_LEN);
    while out.ends_with('-') {
        out.pop();
    }
    out
}

/// Validate a namespace or entity segment: `[a-z0-9-]`, no leading or
/// trailing hyphen, at most 63 characters.
pub fn validate_segment(kind: &str, segment: &str) -> Result<(), CoreError> {
    if segment.is_empty() || segment.len() > MAX_SEGMENT_LEN {
        return Err(CoreError::InvalidDid(format!(
            "{} must be 1..={} characters, got {:?}",
            kind, MAX_SEGMENT_LEN, segment
        )));
    }
    let valid_chars = segment
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    if !valid_chars || segment.starts_with('-') || segment.ends_with('-') {
        return Err(CoreError::InvalidDid(format!(
            "{} must be lowercase alphanumeric with inner hyphens, got {:?}",
            kind, segment
        )));
    }
    Ok(())
}

/// Issuer trust classification carried by a DID document.
///
/// `S` is the highest tier; the derived ordering sorts `S` first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Tier {
    S,
    A,
    B,
    C,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::S => write!(f, "S"),
            Self::A => write!(f, "A"),
            Self::B => write!(f, "B"),
            Self::C => write!(f, "C"),
        }
    }
}

impl FromStr for Tier {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "S" => Ok(Self::S),
            "A" => Ok(Self::A),
            "B" => Ok(Self::B),
            "C" => Ok(Self::C),
            other => Err(CoreError::ValidationError(format!(
                "unknown tier {:?}, expected one of S, A, B, C",
                other
            ))),
        }
    }
}

/// Kind of statement a claim makes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimType {
    /// Short inline text message.
    Message,
    /// Reference to externally stored content by digest.
    FileReference,
}

impl fmt::Display for ClaimType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Message => write!(f, "message"),
            Self::FileReference => write!(f, "file_reference"),
        }
    }
}

/// Content-derived claim identifier: `claim_<64 hex chars>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ClaimId(String);

impl ClaimId {
    /// Prefix shared by all claim identifiers.
    pub const PREFIX: &'static str = "claim_";

    /// Build an identifier from a 32-byte digest.
    pub fn from_digest(digest: &[u8; 32]) -> Self {
        Self(format!("{}{}", Self::PREFIX, hex::encode(digest)))
    }

    /// Parse and validate an identifier string.
    pub fn parse(id: &str) -> Result<Self, CoreError> {
        let hex_part = id.strip_prefix(Self::PREFIX).ok_or_else(|| {
            CoreError::InvalidClaimId(format!("expected '{}' prefix: {}", Self::PREFIX, id))
        })?;
        let valid = hex_part.len() == 64
            && hex_part
                .chars()
                .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c));
        if !valid {
            return Err(CoreError::InvalidClaimId(format!(
                "expected 64 lowercase hex characters after prefix: {}",
                id
            )));
        }
        Ok(Self(id.to_string()))
    }

    /// Get the identifier string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClaimId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ClaimId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ClaimId {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ClaimId> for String {
    fn from(id: ClaimId) -> Self {
        id.0
    }
}
