//! Canonical byte payloads.
//!
//! Signing and id derivation never serialize a `Claim` or `DidDocument`
//! directly. They go through a fixed view struct whose field order is set by
//! its declaration, serialized as compact JSON. The first field of every
//! signed view is the canonicalization version, so a future layout change
//! cannot be mistaken for an old one.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use verity_core::{ClaimId, ClaimType, Did, Tier};

use crate::claim::{Claim, ClaimContent};
use crate::document::{DidDocument, VerificationMethod};
use crate::error::IdentityError;

/// Version tag recorded in every proof.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CanonicalizationVersion(u16);

impl CanonicalizationVersion {
    pub const V1: Self = Self(1);
    /// Version used for new signatures.
    pub const CURRENT: Self = Self::V1;

    /// Accept only versions this build can reproduce.
    pub fn new(version: u16) -> Result<Self, IdentityError> {
        let v = Self(version);
        if v.is_supported() {
            Ok(v)
        } else {
            Err(IdentityError::UnsupportedCanonicalization(version))
        }
    }

    pub fn get(&self) -> u16 {
        self.0
    }

    pub fn is_supported(&self) -> bool {
        *self == Self::V1
    }
}

impl fmt::Display for CanonicalizationVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Bytes produced only by the canonicalization functions in this module.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalBytes(Vec<u8>);

impl CanonicalBytes {
    fn encode(view: &impl Serialize) -> Result<Self, IdentityError> {
        Ok(Self(serde_json::to_vec(view)?))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl AsRef<[u8]> for CanonicalBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// RFC 3339 with microseconds, widened to nanoseconds when the value carries
/// them, so that distinct instants never share a rendering.
fn timestamp(t: &DateTime<Utc>) -> String {
    let format = if t.timestamp_subsec_nanos() % 1_000 == 0 {
        SecondsFormat::Micros
    } else {
        SecondsFormat::Nanos
    };
    t.to_rfc3339_opts(format, true)
}

const CLAIM_ID_DOMAIN: &str = "verity.claim.id";

#[derive(Serialize)]
struct ClaimIdPayload<'a> {
    domain: &'static str,
    issuer: &'a Did,
    claim_type: ClaimType,
    content: &'a ClaimContent,
    created_at: String,
}

#[derive(Serialize)]
struct ClaimViewV1<'a> {
    canonicalization_version: CanonicalizationVersion,
    id: &'a ClaimId,
    issuer: &'a Did,
    claim_type: ClaimType,
    content: &'a ClaimContent,
    created_at: String,
}

#[derive(Serialize)]
struct DocumentViewV1<'a> {
    canonicalization_version: CanonicalizationVersion,
    id: &'a Did,
    controller: &'a Did,
    organization_name: Option<&'a str>,
    jurisdiction: Option<&'a str>,
    tier: Tier,
    verification_method: &'a [VerificationMethod],
    created_at: String,
    updated_at: String,
}

/// Derive the content-addressed claim id from the unsigned fields.
pub fn claim_id(
    issuer: &Did,
    claim_type: ClaimType,
    content: &ClaimContent,
    created_at: &DateTime<Utc>,
) -> Result<ClaimId, IdentityError> {
    let payload = ClaimIdPayload {
        domain: CLAIM_ID_DOMAIN,
        issuer,
        claim_type,
        content,
        created_at: timestamp(created_at),
    };
    let bytes = CanonicalBytes::encode(&payload)?;
    Ok(ClaimId::from_digest(&verity_crypto::blake3_hash(bytes.as_bytes())))
}

/// Canonical signing payload of a claim under the current version.
pub fn canonicalize(claim: &Claim) -> Result<CanonicalBytes, IdentityError> {
    canonicalize_versioned(claim, CanonicalizationVersion::CURRENT)
}

/// Canonical signing payload of a claim under an explicit version. The proof
/// is never part of the payload.
pub fn canonicalize_versioned(
    claim: &Claim,
    version: CanonicalizationVersion,
) -> Result<CanonicalBytes, IdentityError> {
    match version {
        CanonicalizationVersion::V1 => CanonicalBytes::encode(&ClaimViewV1 {
            canonicalization_version: version,
            id: &claim.id,
            issuer: &claim.issuer,
            claim_type: claim.claim_type,
            content: &claim.content,
            created_at: timestamp(&claim.created_at),
        }),
        other => Err(IdentityError::UnsupportedCanonicalization(other.get())),
    }
}

/// Canonical payload of a DID document, excluding its self-signature.
pub fn canonicalize_document(doc: &DidDocument) -> Result<CanonicalBytes, IdentityError> {
    CanonicalBytes::encode(&DocumentViewV1 {
        canonicalization_version: CanonicalizationVersion::CURRENT,
        id: doc.id(),
        controller: doc.controller(),
        organization_name: doc.organization_name(),
        jurisdiction: doc.jurisdiction(),
        tier: doc.tier(),
        verification_method: doc.verification_methods(),
        created_at: timestamp(&doc.created_at()),
        updated_at: timestamp(&doc.updated_at()),
    })
}
