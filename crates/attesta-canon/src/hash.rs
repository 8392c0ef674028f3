//! Payload and event hashing over the canonical encoding.
//!
//! Hash input layout for a chained event (bytes, in order):
//!   1. previous event hash as 64 lowercase hex ASCII characters
//!   2. a single `:` separator
//!   3. the canonical bytes of the payload
//!
//! The genesis event has no previous hash; its input is the canonical bytes
//! alone. All outputs are lowercase hex SHA-256.

use sha2::{Digest, Sha256};

use crate::encode::canonical_bytes;
use crate::error::CanonError;
use crate::value::CanonMap;

/// SHA-256 of the canonical encoding of `payload`, as lowercase hex.
pub fn hash_payload(payload: &CanonMap) -> Result<String, CanonError> {
    let canonical = canonical_bytes(payload)?;
    Ok(hex::encode(Sha256::digest(&canonical)))
}

/// Hash an event with chain linkage.
///
/// `previous_hash` is `None` only for the genesis event. A present hash must
/// be exactly 64 hex characters; case is accepted and normalized to
/// lowercase before it enters the hash input.
pub fn hash_event(payload: &CanonMap, previous_hash: Option<&str>) -> Result<String, CanonError> {
    let canonical = canonical_bytes(payload)?;

    let input = match previous_hash {
        None => canonical,
        Some(prev) => {
            let prev = normalize_hash(prev)?;
            let mut buf = Vec::with_capacity(prev.len() + 1 + canonical.len());
            buf.extend_from_slice(prev.as_bytes());
            buf.push(b':');
            buf.extend_from_slice(&canonical);
            buf
        }
    };

    Ok(hex::encode(Sha256::digest(&input)))
}

/// Recompute an event hash and compare it to the stored value.
///
/// Comparison is case-insensitive on the stored side. Serialization failures
/// are reported as a mismatch — an unhashable payload cannot match anything.
pub fn verify_event_hash(
    payload: &CanonMap,
    expected_hash: &str,
    previous_hash: Option<&str>,
) -> bool {
    match hash_event(payload, previous_hash) {
        Ok(computed) => computed == expected_hash.to_ascii_lowercase(),
        Err(_) => false,
    }
}

/// Validate a 64-character hex hash and normalize it to lowercase.
pub fn normalize_hash(hash: &str) -> Result<String, CanonError> {
    if hash.len() == 64 && hash.bytes().all(|b| b.is_ascii_hexdigit()) {
        Ok(hash.to_ascii_lowercase())
    } else {
        Err(CanonError::InvalidPreviousHash {
            hash: hash.to_string(),
        })
    }
}
