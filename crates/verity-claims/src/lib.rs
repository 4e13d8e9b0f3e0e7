//! Verity Claims: signing, publication and verification of claims.

pub mod error;
pub mod result;
pub mod service;
pub mod signer;
pub mod verifier;

pub use error::{ClaimError, ErrorKind};
pub use result::{Step, StepOutcome, Steps, VerificationResult, RESULT_SCHEMA_VERSION};
pub use service::{ClaimService, Publication};
pub use signer::sign_claim;
pub use verifier::{parse_reference, verification_url, VerificationPipeline, VerifyOptions, VerifyTarget};
