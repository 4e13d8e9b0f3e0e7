use ed25519_dalek::{SigningKey as Ed25519SigningKey, VerifyingKey as Ed25519VerifyingKey};
use k256::ecdsa::{SigningKey as EcdsaSigningKey, VerifyingKey as EcdsaVerifyingKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::Zeroizing;

use crate::error::CryptoError;

/// Length of a raw secret key for every supported key type.
pub const SECRET_KEY_LEN: usize = 32;

/// Signature suite of a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyType {
    Ed25519,
    /// ECDSA over secp256k1, public keys in compressed SEC1 form.
    Secp256k1,
}

impl KeyType {
    /// Length of the normalized public key encoding.
    pub fn public_key_len(&self) -> usize {
        match self {
            Self::Ed25519 => 32,
            Self::Secp256k1 => 33,
        }
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ed25519 => write!(f, "ed25519"),
            Self::Secp256k1 => write!(f, "secp256k1"),
        }
    }
}

pub(crate) enum SecretKey {
    Ed25519(Ed25519SigningKey),
    Secp256k1(EcdsaSigningKey),
}

/// Signing key pair. Both backends zeroize their secret scalar on drop.
pub struct KeyPair {
    secret: SecretKey,
}

impl KeyPair {
    /// Generate a new random key pair using OS-provided entropy.
    pub fn generate(key_type: KeyType) -> Self {
        let secret = match key_type {
            KeyType::Ed25519 => SecretKey::Ed25519(Ed25519SigningKey::generate(&mut OsRng)),
            KeyType::Secp256k1 => SecretKey::Secp256k1(EcdsaSigningKey::random(&mut OsRng)),
        };
        Self { secret }
    }

    /// Rebuild a key pair from raw secret bytes (32 bytes).
    pub fn from_secret_bytes(key_type: KeyType, bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() != SECRET_KEY_LEN {
            return Err(CryptoError::InvalidKeyLength {
                expected: SECRET_KEY_LEN,
                actual: bytes.len(),
            });
        }
        let mut seed = Zeroizing::new([0u8; SECRET_KEY_LEN]);
        seed.copy_from_slice(bytes);
        let secret = match key_type {
            KeyType::Ed25519 => SecretKey::Ed25519(Ed25519SigningKey::from_bytes(&seed)),
            KeyType::Secp256k1 => SecretKey::Secp256k1(
                EcdsaSigningKey::from_slice(seed.as_slice()).map_err(|_| {
                    CryptoError::InvalidKey("secret is not a valid secp256k1 scalar".into())
                })?,
            ),
        };
        Ok(Self { secret })
    }

    pub fn key_type(&self) -> KeyType {
        match &self.secret {
            SecretKey::Ed25519(_) => KeyType::Ed25519,
            SecretKey::Secp256k1(_) => KeyType::Secp256k1,
        }
    }

    /// Get the public key.
    pub fn public_key(&self) -> PublicKey {
        match &self.secret {
            SecretKey::Ed25519(sk) => PublicKey {
                key_type: KeyType::Ed25519,
                bytes: sk.verifying_key().as_bytes().to_vec(),
            },
            SecretKey::Secp256k1(sk) => PublicKey {
                key_type: KeyType::Secp256k1,
                bytes: sk.verifying_key().to_encoded_point(true).as_bytes().to_vec(),
            },
        }
    }

    /// Export the raw secret bytes in a buffer that is wiped on drop.
    pub fn secret_bytes(&self) -> Zeroizing<[u8; SECRET_KEY_LEN]> {
        let mut out = Zeroizing::new([0u8; SECRET_KEY_LEN]);
        match &self.secret {
            SecretKey::Ed25519(sk) => out.copy_from_slice(sk.as_bytes()),
            SecretKey::Secp256k1(sk) => out.copy_from_slice(sk.to_bytes().as_slice()),
        }
        out
    }

    pub(crate) fn secret(&self) -> &SecretKey {
        &self.secret
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("key_type", &self.key_type())
            .field("public_key", &self.public_key().to_hex())
            .finish_non_exhaustive()
    }
}

/// Public key with its suite. Secp256k1 keys are stored compressed, so two
/// encodings of the same point compare equal.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct PublicKey {
    key_type: KeyType,
    bytes: Vec<u8>,
}

impl PublicKey {
    /// Validate raw key material for the given suite.
    pub fn from_bytes(key_type: KeyType, bytes: &[u8]) -> Result<Self, CryptoError> {
        match key_type {
            KeyType::Ed25519 => {
                let arr: [u8; 32] =
                    bytes
                        .try_into()
                        .map_err(|_| CryptoError::InvalidKeyLength {
                            expected: key_type.public_key_len(),
                            actual: bytes.len(),
                        })?;
                Ed25519VerifyingKey::from_bytes(&arr).map_err(|e| {
                    CryptoError::InvalidKey(format!("invalid ed25519 public key: {}", e))
                })?;
                Ok(Self {
                    key_type,
                    bytes: arr.to_vec(),
                })
            }
            KeyType::Secp256k1 => {
                let vk = EcdsaVerifyingKey::from_sec1_bytes(bytes).map_err(|_| {
                    CryptoError::InvalidKey("invalid secp256k1 SEC1 public key".into())
                })?;
                Ok(Self {
                    key_type,
                    bytes: vk.to_encoded_point(true).as_bytes().to_vec(),
                })
            }
        }
    }

    /// Decode hex or multibase base58btc (`z...`) key material.
    pub fn decode(key_type: KeyType, encoded: &str) -> Result<Self, CryptoError> {
        let encoded = encoded.trim();
        if encoded.is_empty() {
            return Err(CryptoError::InvalidKey("public key is empty".into()));
        }
        let bytes = match encoded.strip_prefix('z') {
            Some(b58) => bs58::decode(b58)
                .into_vec()
                .map_err(|e| CryptoError::InvalidInput(format!("invalid base58: {}", e)))?,
            None => hex::decode(encoded)
                .map_err(|e| CryptoError::InvalidInput(format!("invalid hex: {}", e)))?,
        };
        Self::from_bytes(key_type, &bytes)
    }

    pub fn key_type(&self) -> KeyType {
        self.key_type
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Encode as hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.bytes)
    }

    /// Encode as multibase base58btc (`z` prefix).
    pub fn to_multibase(&self) -> String {
        format!("z{}", bs58::encode(&self.bytes).into_string())
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({}:{})", self.key_type, self.to_hex())
    }
}

/// Derive the public key that belongs to `secret` under `key_type`.
pub fn derive_public(key_type: KeyType, secret: &[u8]) -> Result<PublicKey, CryptoError> {
    Ok(KeyPair::from_secret_bytes(key_type, secret)?.public_key())
}
