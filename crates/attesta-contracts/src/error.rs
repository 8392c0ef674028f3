//! The unified error type for the attesta ledger.
//!
//! All fallible operations across the workspace return `LedgerResult<T>`.
//! Variants map one-to-one onto the system's error kinds: validation and
//! editor errors are user-facing and never retried; `LockBusy` and
//! `Concurrency` are retryable with bounded backoff; a `Chain` error raised
//! while loading from storage is fatal and halts ingestion.

use thiserror::Error;

use attesta_canon::CanonError;

/// The unified error type for ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The payload could not be canonically serialized. The write was
    /// rejected before any store interaction.
    #[error("canonical serialization error: {0}")]
    CanonicalSerialization(#[from] CanonError),

    /// A business rule was violated: duplicate claim, illegal state
    /// transition, resolution without evidence, and so on.
    #[error("validation error: {reason}")]
    Validation { reason: String },

    /// Editor identity failure: unknown or deactivated editor, insufficient
    /// role, key mismatch, duplicate public key.
    #[error("editor error: {reason}")]
    Editor { reason: String },

    /// Chain integrity is compromised: sequence mismatch, broken linkage,
    /// hash recomputation failure, genesis rule violation.
    #[error("chain integrity error: {reason}")]
    Chain { reason: String },

    /// The chain head changed between reservation and commit. Retryable.
    #[error("concurrency conflict: {reason}")]
    Concurrency { reason: String },

    /// The head lock could not be acquired within the configured timeout.
    /// Retryable with backoff.
    #[error("chain head lock busy: {reason}")]
    LockBusy { reason: String },

    /// A storage statement exceeded its timeout. Not retried automatically.
    #[error("storage operation timed out: {reason}")]
    OperationTimedOut { reason: String },

    /// A required configuration value is missing or invalid.
    #[error("configuration error: {reason}")]
    Config { reason: String },

    /// The storage backend failed outside the timeout/concurrency paths.
    #[error("storage error: {reason}")]
    Store { reason: String },
}

impl LedgerError {
    /// Whether a caller may retry the failed operation with backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LedgerError::LockBusy { .. } | LedgerError::Concurrency { .. }
        )
    }

    /// Build the standard event identifier used in diagnostics: the sequence
    /// number and the first 16 hex characters of the event hash.
    pub fn event_ref(sequence: i64, event_hash: &str) -> String {
        let prefix: String = event_hash.chars().take(16).collect();
        format!("sequence {sequence} ({prefix}...)")
    }
}

/// Convenience alias used throughout the attesta crates.
pub type LedgerResult<T> = Result<T, LedgerError>;
