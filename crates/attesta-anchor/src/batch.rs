//! Anchor batches and the proving service.
//!
//! A batch binds a contiguous range of events to one Merkle root that can be
//! published externally — a git tag, a blockchain transaction, a
//! transparency log. Once created, a batch's events and root are frozen;
//! only the external-anchor references may be attached afterwards.
//!
//! The capability that matters here: given an `event_id`, produce a
//! self-contained proof that the event is included in a published root.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use attesta_contracts::{LedgerError, LedgerResult, MerkleProof};

use crate::merkle::MerkleTree;

/// A frozen batch of anchored events.
#[derive(Debug, Clone, Serialize)]
pub struct AnchorBatch {
    pub batch_id: Uuid,

    /// The anchored events, in chain order.
    pub event_ids: Vec<Uuid>,
    /// Their hashes, parallel to `event_ids`. These are the tree's leaves.
    pub event_hashes: Vec<String>,

    /// Inclusive sequence range the batch spans.
    pub sequence_start: i64,
    pub sequence_end: i64,

    pub merkle_root: String,
    pub created_at: DateTime<Utc>,

    /// External anchor references, attached after publishing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub git_commit_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub git_repo_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blockchain_tx_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blockchain_network: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transparency_url: Option<String>,
}

/// External anchor references collected for a verification result.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExternalAnchors {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub git_commit_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub git_repo_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blockchain_tx_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blockchain_network: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transparency_url: Option<String>,
}

impl ExternalAnchors {
    fn from_batch(batch: &AnchorBatch) -> ExternalAnchors {
        ExternalAnchors {
            git_commit_hash: batch.git_commit_hash.clone(),
            git_repo_url: batch.git_repo_url.clone(),
            blockchain_tx_hash: batch.blockchain_tx_hash.clone(),
            blockchain_network: batch.blockchain_network.clone(),
            transparency_url: batch.transparency_url.clone(),
        }
    }
}

/// The complete answer to "prove event X is anchored".
#[derive(Debug, Clone, Serialize)]
pub struct VerificationResult {
    /// Self-check: the generated proof replays against the stored root.
    pub verified: bool,
    pub event_id: Uuid,
    pub event_hash: String,
    pub batch_id: Uuid,
    pub merkle_root: String,
    pub proof: Option<MerkleProof>,
    pub external_anchors: ExternalAnchors,
    pub message: String,
}

#[derive(Default)]
struct AnchorState {
    batches: Vec<AnchorBatch>,
    event_to_batch: HashMap<Uuid, Uuid>,
    event_to_hash: HashMap<Uuid, String>,
}

/// Creates and indexes anchor batches, and proves event inclusion.
pub struct AnchorService {
    state: Mutex<AnchorState>,
}

impl AnchorService {
    pub fn new() -> AnchorService {
        AnchorService {
            state: Mutex::new(AnchorState::default()),
        }
    }

    /// Create a new anchor batch.
    ///
    /// Preconditions: nonempty, ids and hashes parallel, and no event
    /// already anchored anywhere. On success the batch is frozen and the
    /// event→batch and event→hash indexes are updated for O(1) proving.
    pub fn create_batch(
        &self,
        event_ids: Vec<Uuid>,
        event_hashes: Vec<String>,
        sequence_start: i64,
        sequence_end: i64,
    ) -> LedgerResult<AnchorBatch> {
        if event_ids.len() != event_hashes.len() {
            return Err(LedgerError::Validation {
                reason: "event_ids and event_hashes must have the same length".to_string(),
            });
        }
        if event_ids.is_empty() {
            return Err(LedgerError::Validation {
                reason: "cannot create an empty anchor batch".to_string(),
            });
        }

        let mut state = self.state.lock();
        for event_id in &event_ids {
            if let Some(existing) = state.event_to_batch.get(event_id) {
                return Err(LedgerError::Validation {
                    reason: format!("event {event_id} is already anchored in batch {existing}"),
                });
            }
        }

        let tree = MerkleTree::new(&event_hashes)?;
        let batch = AnchorBatch {
            batch_id: Uuid::new_v4(),
            event_ids: event_ids.clone(),
            event_hashes: event_hashes.clone(),
            sequence_start,
            sequence_end,
            merkle_root: tree.root_hash().to_string(),
            created_at: Utc::now(),
            git_commit_hash: None,
            git_repo_url: None,
            blockchain_tx_hash: None,
            blockchain_network: None,
            transparency_url: None,
        };

        for (event_id, event_hash) in event_ids.iter().zip(&event_hashes) {
            let _ = state.event_to_batch.insert(*event_id, batch.batch_id);
            let _ = state.event_to_hash.insert(*event_id, event_hash.clone());
        }
        state.batches.push(batch.clone());

        info!(
            batch = %batch.batch_id,
            events = batch.event_ids.len(),
            sequence_start,
            sequence_end,
            root = %batch.merkle_root,
            "anchor batch created"
        );
        Ok(batch)
    }

    /// Produce a complete, self-contained inclusion proof for an event.
    ///
    /// Returns `None` when the event has not been anchored yet. The result
    /// carries the batch reference, the root, the proof, any external
    /// anchors, and a self-check of the proof against the stored root.
    pub fn prove_event(&self, event_id: Uuid) -> Option<VerificationResult> {
        let state = self.state.lock();
        let batch_id = *state.event_to_batch.get(&event_id)?;
        let batch = state.batches.iter().find(|b| b.batch_id == batch_id)?;
        let event_hash = state.event_to_hash.get(&event_id)?.clone();

        let tree = MerkleTree::new(&batch.event_hashes).ok()?;
        let Some((proof_hashes, proof_directions)) = tree.proof_for(&event_hash) else {
            return Some(VerificationResult {
                verified: false,
                event_id,
                event_hash,
                batch_id,
                merkle_root: batch.merkle_root.clone(),
                proof: None,
                external_anchors: ExternalAnchors::from_batch(batch),
                message: "event hash not found in the batch tree".to_string(),
            });
        };

        let verified = MerkleTree::verify_proof(
            &event_hash,
            &proof_hashes,
            &proof_directions,
            &batch.merkle_root,
        );

        let proof = MerkleProof {
            event_id,
            event_hash: event_hash.clone(),
            proof_hashes,
            proof_directions,
            merkle_root: batch.merkle_root.clone(),
            batch_id,
            batch_created_at: batch.created_at.to_rfc3339(),
        };

        Some(VerificationResult {
            verified,
            event_id,
            event_hash,
            batch_id,
            merkle_root: batch.merkle_root.clone(),
            proof: Some(proof),
            external_anchors: ExternalAnchors::from_batch(batch),
            message: if verified {
                "event is anchored and the proof verifies".to_string()
            } else {
                "proof generation succeeded but verification failed".to_string()
            },
        })
    }

    /// Replay a proof object. Needs no service state at all.
    pub fn verify_proof(proof: &MerkleProof) -> bool {
        MerkleTree::verify_proof(
            &proof.event_hash,
            &proof.proof_hashes,
            &proof.proof_directions,
            &proof.merkle_root,
        )
    }

    pub fn get_batch(&self, batch_id: Uuid) -> Option<AnchorBatch> {
        self.state
            .lock()
            .batches
            .iter()
            .find(|b| b.batch_id == batch_id)
            .cloned()
    }

    pub fn get_batch_for_event(&self, event_id: Uuid) -> Option<AnchorBatch> {
        let state = self.state.lock();
        let batch_id = state.event_to_batch.get(&event_id)?;
        state.batches.iter().find(|b| b.batch_id == *batch_id).cloned()
    }

    pub fn is_event_anchored(&self, event_id: Uuid) -> bool {
        self.state.lock().event_to_batch.contains_key(&event_id)
    }

    /// Filter a list of event ids down to the ones not yet anchored.
    pub fn unanchored_events(&self, event_ids: &[Uuid]) -> Vec<Uuid> {
        let state = self.state.lock();
        event_ids
            .iter()
            .filter(|id| !state.event_to_batch.contains_key(id))
            .copied()
            .collect()
    }

    pub fn all_batches(&self) -> Vec<AnchorBatch> {
        self.state.lock().batches.clone()
    }

    /// The highest sequence number any batch covers; -1 if none exist.
    pub fn last_anchored_sequence(&self) -> i64 {
        self.state
            .lock()
            .batches
            .iter()
            .map(|b| b.sequence_end)
            .max()
            .unwrap_or(-1)
    }

    // ── Publishing bookkeeping ────────────────────────────────────────────────

    /// Record that a batch root was committed to a git repository.
    pub fn set_git_anchor(&self, batch_id: Uuid, commit_hash: String, repo_url: String) {
        self.with_batch(batch_id, |b| {
            b.git_commit_hash = Some(commit_hash);
            b.git_repo_url = Some(repo_url);
        });
    }

    /// Record that a batch root was written to a blockchain.
    pub fn set_blockchain_anchor(&self, batch_id: Uuid, tx_hash: String, network: String) {
        self.with_batch(batch_id, |b| {
            b.blockchain_tx_hash = Some(tx_hash);
            b.blockchain_network = Some(network);
        });
    }

    /// Record the transparency-log URL for a batch.
    pub fn set_transparency_url(&self, batch_id: Uuid, url: String) {
        self.with_batch(batch_id, |b| b.transparency_url = Some(url));
    }

    fn with_batch(&self, batch_id: Uuid, update: impl FnOnce(&mut AnchorBatch)) {
        let mut state = self.state.lock();
        if let Some(batch) = state.batches.iter_mut().find(|b| b.batch_id == batch_id) {
            update(batch);
        }
    }
}

impl Default for AnchorService {
    fn default() -> Self {
        Self::new()
    }
}
