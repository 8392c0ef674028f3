//! Signer error type.

use thiserror::Error;

/// Failures in key handling. Signature *mismatches* are not errors — they
/// surface as a `false` return from `verify`.
#[derive(Debug, Error)]
pub enum SignerError {
    /// Key or signature material was not valid base64.
    #[error("invalid base64 key material: {0}")]
    InvalidKeyEncoding(#[from] base64::DecodeError),

    /// Decoded key material had the wrong length.
    #[error("key material has wrong length: expected {expected} bytes, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    /// The configured system keypair failed its sign/verify round trip.
    #[error("system keypair validation failed: private and public keys do not match")]
    KeypairMismatch,

    /// Production mode requires an explicitly configured system keypair.
    #[error(
        "SYSTEM_PRIVATE_KEY and SYSTEM_PUBLIC_KEY must both be set in production; \
         generate a pair with attesta_signer::generate_keypair()"
    )]
    MissingSystemKey,
}
