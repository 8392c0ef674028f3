//! Merkle tree over event hashes.
//!
//! Leaves are the events' hex hashes in chain order. A level with an odd
//! node count duplicates its last node to form a pair (classical
//! Bitcoin-style padding). Parents are `SHA-256(left_hex || right_hex)` over
//! the ASCII concatenation of the child hex strings — the same string-level
//! convention the event chain itself uses, so any verifier that can hash
//! text can replay a proof.

use sha2::{Digest, Sha256};

use attesta_contracts::{LedgerError, LedgerResult, ProofDirection};

/// A Merkle tree built from an ordered list of hex leaf hashes.
pub struct MerkleTree {
    leaves: Vec<String>,
    root: String,
}

impl MerkleTree {
    /// Build the tree. At least one leaf is required.
    pub fn new(leaves: &[String]) -> LedgerResult<MerkleTree> {
        if leaves.is_empty() {
            return Err(LedgerError::Validation {
                reason: "cannot build a Merkle tree with no leaves".to_string(),
            });
        }

        let mut level: Vec<String> = leaves.to_vec();
        if level.len() % 2 == 1 {
            level.push(level[level.len() - 1].clone());
        }

        while level.len() > 1 {
            let mut next: Vec<String> = Vec::with_capacity(level.len() / 2);
            for pair in level.chunks(2) {
                next.push(hash_pair(&pair[0], &pair[1]));
            }
            if next.len() > 1 && next.len() % 2 == 1 {
                next.push(next[next.len() - 1].clone());
            }
            level = next;
        }

        Ok(MerkleTree {
            leaves: leaves.to_vec(),
            root: level.remove(0),
        })
    }

    /// The Merkle root: a single hash committing to every leaf.
    pub fn root_hash(&self) -> &str {
        &self.root
    }

    /// Generate the inclusion proof for a leaf.
    ///
    /// Walks up the tree recording, per level, the sibling's hash and which
    /// side the sibling sits on. Returns `None` when the hash is not a leaf
    /// of this tree.
    pub fn proof_for(&self, leaf_hash: &str) -> Option<(Vec<String>, Vec<ProofDirection>)> {
        let mut index = self.leaves.iter().position(|h| h == leaf_hash)?;

        let mut proof_hashes = Vec::new();
        let mut proof_directions = Vec::new();

        let mut level: Vec<String> = self.leaves.clone();
        if level.len() % 2 == 1 {
            level.push(level[level.len() - 1].clone());
        }

        while level.len() > 1 {
            let sibling_index = if index % 2 == 0 {
                proof_directions.push(ProofDirection::Right);
                index + 1
            } else {
                proof_directions.push(ProofDirection::Left);
                index - 1
            };
            proof_hashes.push(level[sibling_index].clone());

            let mut next: Vec<String> = Vec::with_capacity(level.len() / 2);
            for pair in level.chunks(2) {
                next.push(hash_pair(&pair[0], &pair[1]));
            }
            if next.len() > 1 && next.len() % 2 == 1 {
                next.push(next[next.len() - 1].clone());
            }
            level = next;
            index /= 2;
        }

        Some((proof_hashes, proof_directions))
    }

    /// Replay an inclusion proof. Standalone: needs no tree, no store —
    /// just the leaf, the path, and the claimed root.
    pub fn verify_proof(
        leaf_hash: &str,
        proof_hashes: &[String],
        proof_directions: &[ProofDirection],
        expected_root: &str,
    ) -> bool {
        if proof_hashes.len() != proof_directions.len() {
            return false;
        }

        let mut current = leaf_hash.to_string();
        for (sibling, direction) in proof_hashes.iter().zip(proof_directions) {
            current = match direction {
                ProofDirection::Left => hash_pair(sibling, &current),
                ProofDirection::Right => hash_pair(&current, sibling),
            };
        }
        current == expected_root
    }
}

/// Hash two sibling hex strings into their parent.
fn hash_pair(left: &str, right: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(left.as_bytes());
    hasher.update(right.as_bytes());
    hex::encode(hasher.finalize())
}
