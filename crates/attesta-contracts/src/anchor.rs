//! Merkle inclusion proof — the shared wire type.
//!
//! The proof is self-contained: given only this object, anyone can recompute
//! the path from a leaf hash to the claimed root. Proof construction and
//! batch bookkeeping live in `attesta-anchor`; the type lives here because
//! events, the store, and bundles all carry it.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Proof that an event hash is included under a Merkle root.
///
/// `proof_hashes[i]` is the sibling hex hash at level `i`;
/// `proof_directions[i]` says whether that sibling sits to the `"left"` or
/// `"right"` of the running hash. Both arrays have length equal to the tree
/// depth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MerkleProof {
    /// The event this proof covers.
    pub event_id: Uuid,

    /// The leaf: the event's own hex hash.
    pub event_hash: String,

    /// Sibling hashes, leaf level first.
    pub proof_hashes: Vec<String>,

    /// `"left"` / `"right"` per step, same length as `proof_hashes`.
    pub proof_directions: Vec<ProofDirection>,

    /// The root this proof resolves to.
    pub merkle_root: String,

    /// The anchor batch that published the root.
    pub batch_id: Uuid,

    /// When the batch was created (ISO-8601 UTC).
    pub batch_created_at: String,
}

/// Which side a proof sibling sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProofDirection {
    Left,
    Right,
}

impl ProofDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProofDirection::Left => "left",
            ProofDirection::Right => "right",
        }
    }

    /// The opposite side. Used by tamper tests that flip every direction.
    pub fn flipped(&self) -> ProofDirection {
        match self {
            ProofDirection::Left => ProofDirection::Right,
            ProofDirection::Right => ProofDirection::Left,
        }
    }
}
