//! Verity Identity Layer
//!
//! Issuer identity and claim data model:
//! - DID Documents with typed verification methods and an immutable trust tier
//! - Claims with content-derived identifiers and inline or referenced content
//! - Versioned canonical byte payloads used for signing and id derivation

pub mod canonical;
pub mod claim;
pub mod document;
pub mod error;

pub use canonical::{canonicalize, canonicalize_versioned, CanonicalBytes, CanonicalizationVersion};
pub use claim::{Claim, ClaimContent, ClaimProof, PresentedContent, MAX_INLINE_BYTES};
pub use document::{
    DidDocument, DidDocumentRequest, DocumentProof, MethodSpec, VerificationMethod,
    VerificationMethodType,
};
pub use error::IdentityError;

use chrono::{DateTime, SubsecRound, Utc};

/// Current time truncated to microseconds, so that timestamps survive a JSON
/// round-trip bit-exactly.
pub(crate) fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}
