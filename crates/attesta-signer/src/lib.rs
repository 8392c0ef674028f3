//! # attesta-signer
//!
//! Ed25519 signing for editorial accountability.
//!
//! Every editorial action in the ledger is signed by the editor who
//! performed it, creating cryptographic proof of who did what. This crate
//! provides keypair generation, signing and verification over message
//! strings, the fixed key-binding challenge, and the lifecycle of the
//! process-wide system keypair.

pub mod error;
pub mod keys;
pub mod service;

pub use error::SignerError;
pub use keys::{generate_keypair, sign, verify, KEY_BINDING_CHALLENGE};
pub use service::{KeyPair, SigningService};

// ── Tests ─────────────────────────────────────────────────────────────────────
