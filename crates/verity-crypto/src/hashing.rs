use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

use crate::error::CryptoError;

/// 32-byte digest.
pub type Hash = [u8; 32];

const READ_CHUNK: usize = 64 * 1024;

/// Digest algorithm used for externally stored content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DigestAlgorithm {
    Sha256,
    Blake3,
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sha256 => write!(f, "sha256"),
            Self::Blake3 => write!(f, "blake3"),
        }
    }
}

impl FromStr for DigestAlgorithm {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sha256" => Ok(Self::Sha256),
            "blake3" => Ok(Self::Blake3),
            other => Err(CryptoError::InvalidInput(format!(
                "unsupported digest algorithm: {}",
                other
            ))),
        }
    }
}

/// Hash arbitrary data using SHA-256.
pub fn sha256(data: &[u8]) -> Hash {
    Sha256::digest(data).into()
}

/// Hash arbitrary data using BLAKE3.
pub fn blake3_hash(data: &[u8]) -> Hash {
    *blake3::hash(data).as_bytes()
}

/// Hash data with the chosen algorithm.
pub fn digest(algorithm: DigestAlgorithm, data: &[u8]) -> Hash {
    match algorithm {
        DigestAlgorithm::Sha256 => sha256(data),
        DigestAlgorithm::Blake3 => blake3_hash(data),
    }
}

/// Stream a reader through the chosen algorithm. Returns the digest and the
/// number of bytes consumed.
pub fn digest_reader<R: Read>(
    algorithm: DigestAlgorithm,
    mut reader: R,
) -> Result<(Hash, u64), CryptoError> {
    let mut buf = vec![0u8; READ_CHUNK];
    let mut total = 0u64;
    let mut sha = Sha256::new();
    let mut b3 = blake3::Hasher::new();
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        match algorithm {
            DigestAlgorithm::Sha256 => sha.update(&buf[..n]),
            DigestAlgorithm::Blake3 => {
                b3.update(&buf[..n]);
            }
        }
        total += n as u64;
    }
    let hash: Hash = match algorithm {
        DigestAlgorithm::Sha256 => sha.finalize().into(),
        DigestAlgorithm::Blake3 => *b3.finalize().as_bytes(),
    };
    Ok((hash, total))
}

/// Hash a file on disk without loading it into memory.
pub fn digest_file(algorithm: DigestAlgorithm, path: &Path) -> Result<(Hash, u64), CryptoError> {
    let file = std::fs::File::open(path)?;
    digest_reader(algorithm, std::io::BufReader::new(file))
}
