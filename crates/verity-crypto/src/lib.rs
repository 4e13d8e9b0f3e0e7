//! Verity Crypto: key handling, signatures and content digests.
//!
//! Two signature suites are supported, selected by [`KeyType`]:
//! Ed25519 and ECDSA over secp256k1. Content digests use SHA-256 or BLAKE3.

pub mod error;
pub mod hashing;
pub mod keys;
pub mod signing;

pub use error::CryptoError;
pub use hashing::{blake3_hash, digest, digest_file, sha256, DigestAlgorithm};
pub use keys::{derive_public, KeyPair, KeyType, PublicKey};
pub use signing::{sign, verify, Signature};
