use ed25519_dalek::{Signer as _, Verifier as _};
use k256::ecdsa::signature::{Signer as _, Verifier as _};

use crate::error::CryptoError;
use crate::keys::{KeyPair, KeyType, PublicKey, SecretKey};

/// Signature length shared by Ed25519 and compact secp256k1 ECDSA.
pub const SIGNATURE_LEN: usize = 64;

/// Detached signature (64 bytes). Its suite is implied by the verifying key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    bytes: [u8; SIGNATURE_LEN],
}

impl Signature {
    /// Get the raw bytes (64 bytes).
    pub fn to_bytes(&self) -> [u8; SIGNATURE_LEN] {
        self.bytes
    }

    /// Create from raw bytes (64 bytes).
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let bytes: [u8; SIGNATURE_LEN] = bytes.try_into().map_err(|_| {
            CryptoError::InvalidInput(format!(
                "signature must be {} bytes, got {}",
                SIGNATURE_LEN,
                bytes.len()
            ))
        })?;
        Ok(Self { bytes })
    }

    /// Encode as hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes)
    }

    /// Decode from hex string.
    pub fn from_hex(hex_str: &str) -> Result<Self, CryptoError> {
        let bytes = hex::decode(hex_str)
            .map_err(|e| CryptoError::InvalidInput(format!("invalid hex: {}", e)))?;
        Self::from_bytes(&bytes)
    }
}

/// Sign a message with the key pair's suite.
///
/// Ed25519 signs the message directly; secp256k1 signs its SHA-256 digest
/// with RFC 6979 nonces. Both are deterministic for a given key and message.
pub fn sign(message: &[u8], keypair: &KeyPair) -> Result<Signature, CryptoError> {
    match keypair.secret() {
        SecretKey::Ed25519(sk) => Ok(Signature {
            bytes: sk.sign(message).to_bytes(),
        }),
        SecretKey::Secp256k1(sk) => {
            let sig: k256::ecdsa::Signature = sk
                .try_sign(message)
                .map_err(|e| CryptoError::SigningError(e.to_string()))?;
            Signature::from_bytes(sig.to_bytes().as_slice())
        }
    }
}

/// Verify a signature against a public key.
pub fn verify(
    message: &[u8],
    signature: &Signature,
    pubkey: &PublicKey,
) -> Result<(), CryptoError> {
    match pubkey.key_type() {
        KeyType::Ed25519 => {
            let key_bytes: [u8; 32] =
                pubkey
                    .as_bytes()
                    .try_into()
                    .map_err(|_| CryptoError::InvalidKeyLength {
                        expected: 32,
                        actual: pubkey.as_bytes().len(),
                    })?;
            let vk = ed25519_dalek::VerifyingKey::from_bytes(&key_bytes)
                .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
            let sig = ed25519_dalek::Signature::from_bytes(&signature.bytes);
            vk.verify(message, &sig)
                .map_err(|_| CryptoError::SignatureVerificationFailed)
        }
        KeyType::Secp256k1 => {
            let vk = k256::ecdsa::VerifyingKey::from_sec1_bytes(pubkey.as_bytes())
                .map_err(|_| CryptoError::InvalidKey("invalid secp256k1 public key".into()))?;
            let sig = k256::ecdsa::Signature::from_slice(&signature.bytes)
                .map_err(|_| CryptoError::SignatureVerificationFailed)?;
            vk.verify(message, &sig)
                .map_err(|_| CryptoError::SignatureVerificationFailed)
        }
    }
}
