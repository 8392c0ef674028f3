//! # attesta-bundle
//!
//! Self-contained claim bundles: export on one side, standalone offline
//! verification on the other.
//!
//! A third party holding only the bundle file can check that every event's
//! payload is authentic, that events were not reordered or tampered with,
//! that each event was signed by an editor anchored in the same chain, and
//! that anchored events are included in their published Merkle commitments
//! — all without contacting the issuing server.

pub mod export;
pub mod verify;

pub use export::{bundle_filename, export_claim_bundle, write_claim_bundle, BUNDLE_FORMAT_VERSION};
pub use verify::{verify_bundle_file, verify_bundle_value, BundleReport, Verdict};

// ── Tests ─────────────────────────────────────────────────────────────────────
