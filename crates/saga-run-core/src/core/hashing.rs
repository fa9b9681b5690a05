// crates/saga-run-core/src/core/hashing.rs
// ============================================================================
// Module: Saga Run Hashing
// Description: Content hashing for artifact checksums and derived identities.
// Purpose: Provide deterministic digests with stable wire forms.
// Dependencies: serde, serde_jcs, sha2
// ============================================================================

//! ## Overview
//! Artifact checksums and virtual-identity derivation both rely on
//! deterministic hashing. Raw bodies hash byte-for-byte; JSON bodies hash
//! their canonical (JCS) form so key ordering never changes a checksum.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use sha2::Digest;
use sha2::Sha256;
use thiserror::Error;

// ============================================================================
// SECTION: Hash Algorithm
// ============================================================================

/// Default hash algorithm for artifact checksums.
pub const DEFAULT_HASH_ALGORITHM: HashAlgorithm = HashAlgorithm::Sha256;

/// Supported hash algorithms.
///
/// # Invariants
/// - Variants are stable for serialization and checksum verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HashAlgorithm {
    /// SHA-256.
    Sha256,
}

/// Hash digest with its producing algorithm.
///
/// # Invariants
/// - `value` is lowercase hexadecimal for the full digest width.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HashDigest {
    /// Algorithm that produced the digest.
    pub algorithm: HashAlgorithm,
    /// Lowercase hexadecimal digest value.
    pub value: String,
}

// ============================================================================
// SECTION: Hashing Errors
// ============================================================================

/// Errors raised while canonicalizing JSON for hashing.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum HashingError {
    /// JSON value could not be canonicalized.
    #[error("canonical json failure: {0}")]
    Canonicalize(String),
}

// ============================================================================
// SECTION: Hash Functions
// ============================================================================

/// Hashes raw bytes with the provided algorithm.
#[must_use]
pub fn hash_bytes(algorithm: HashAlgorithm, bytes: &[u8]) -> HashDigest {
    match algorithm {
        HashAlgorithm::Sha256 => {
            let digest = Sha256::digest(bytes);
            HashDigest {
                algorithm,
                value: hex_lower(&digest),
            }
        }
    }
}

/// Hashes a JSON value over its canonical (JCS) byte form.
///
/// # Errors
///
/// Returns [`HashingError`] when the value cannot be canonicalized.
pub fn hash_canonical_json(
    algorithm: HashAlgorithm,
    value: &Value,
) -> Result<HashDigest, HashingError> {
    let canonical =
        serde_jcs::to_vec(value).map_err(|err| HashingError::Canonicalize(err.to_string()))?;
    Ok(hash_bytes(algorithm, &canonical))
}

/// Returns the raw SHA-256 digest bytes for an input string.
#[must_use]
pub fn sha256_raw(input: &str) -> [u8; 32] {
    Sha256::digest(input.as_bytes()).into()
}

/// Encodes bytes as lowercase hexadecimal.
fn hex_lower(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}
