//! # attesta-anchor
//!
//! Merkle anchoring for the attesta ledger.
//!
//! ## Overview
//!
//! Anchoring turns "a trustworthy ledger" into "a ledger that does not
//! require trust": a contiguous range of events is committed to by a single
//! Merkle root that can be published externally, and any individual event
//! can later prove its inclusion under that root with a self-contained
//! proof — no access to the ledger required.
//!
//! - [`MerkleTree`] — tree construction, proof generation, standalone
//!   proof replay.
//! - [`AnchorService`] — batch creation, indexing, `prove_event`.
//! - [`AnchorScheduler`] — optional background batching of unanchored
//!   events.

pub mod batch;
pub mod merkle;
pub mod scheduler;

pub use batch::{AnchorBatch, AnchorService, ExternalAnchors, VerificationResult};
pub use merkle::MerkleTree;
pub use scheduler::{AnchorConfig, AnchorScheduler};

// ── Tests ─────────────────────────────────────────────────────────────────────
