//! Canonical-serialization error type.
//!
//! Every failure here means the offending payload was rejected *before* any
//! store interaction — the write never happened.

use thiserror::Error;

/// Raised when a payload cannot be deterministically serialized.
#[derive(Debug, Error)]
pub enum CanonError {
    /// A JSON number with a fractional part or exponent reached the ingest
    /// boundary. Fractional quantities must arrive as decimal strings.
    #[error("cannot canonicalize fractional number at '{path}': floats are banned, use a decimal string")]
    FloatRejected { path: String },

    /// A JSON integer outside the signed 64-bit range.
    #[error("integer at '{path}' does not fit a 64-bit signed integer")]
    IntegerOverflow { path: String },

    /// The literal is not a plain decimal number.
    #[error("invalid decimal literal '{literal}'")]
    InvalidDecimal { literal: String },

    /// An instant without a UTC offset cannot name an absolute moment.
    #[error("naive instant '{value}': instants must carry a UTC offset")]
    NaiveInstant { value: String },

    /// Top-level canonical values must be objects, never lists or scalars.
    #[error("top-level canonical value must be an object, got {kind}")]
    TopLevelNotObject { kind: &'static str },

    /// The payload tried to use a key reserved for the version marker.
    #[error("payload uses reserved key '{key}'")]
    ReservedKey { key: String },

    /// `previous_hash` must be exactly 64 hex characters.
    #[error("invalid previous hash '{hash}': must be 64 hex characters")]
    InvalidPreviousHash { hash: String },

    /// The canonical JSON writer failed. Cannot happen for in-memory buffers;
    /// kept so the encoder can propagate rather than panic.
    #[error("canonical encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
}
