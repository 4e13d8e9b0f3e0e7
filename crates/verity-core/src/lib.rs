//! Verity Core: fundamental types, errors, and configuration for the
//! Verity claim issuance and verification protocol.

pub mod config;
pub mod error;
pub mod types;

pub use config::{RegistryConfig, VerifierConfig, VerityConfig};
pub use error::CoreError;
pub use types::{ClaimId, ClaimType, Did, Tier};
