//! The ledger event: the only mechanism by which state changes.
//!
//! Every event commits to the previous event via `previous_event_hash`,
//! forming a strictly sequential chain. Events are immutable once created;
//! nothing is ever edited or deleted — things happen, and the ledger records
//! that they happened.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use attesta_canon::CanonMap;

use crate::anchor::MerkleProof;
use crate::error::{LedgerError, LedgerResult};

/// All event kinds the ledger accepts. New kinds may be added later; none
/// may ever be removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    /// Editorial identity events. These must come first in any ledger — an
    /// editor's key is anchored before anything it signs.
    #[serde(rename = "EDITOR_REGISTERED")]
    EditorRegistered,
    #[serde(rename = "EDITOR_DEACTIVATED")]
    EditorDeactivated,

    /// Claim lifecycle events.
    #[serde(rename = "CLAIM_DECLARED")]
    ClaimDeclared,
    #[serde(rename = "CLAIM_OPERATIONALIZED")]
    ClaimOperationalized,
    #[serde(rename = "EVIDENCE_ADDED")]
    EvidenceAdded,
    #[serde(rename = "CLAIM_RESOLVED")]
    ClaimResolved,
}

impl EventType {
    /// The wire value, identical to the serde rename.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::EditorRegistered => "EDITOR_REGISTERED",
            EventType::EditorDeactivated => "EDITOR_DEACTIVATED",
            EventType::ClaimDeclared => "CLAIM_DECLARED",
            EventType::ClaimOperationalized => "CLAIM_OPERATIONALIZED",
            EventType::EvidenceAdded => "EVIDENCE_ADDED",
            EventType::ClaimResolved => "CLAIM_RESOLVED",
        }
    }

    /// Parse the wire value back into an event type.
    pub fn parse(value: &str) -> Option<EventType> {
        match value {
            "EDITOR_REGISTERED" => Some(EventType::EditorRegistered),
            "EDITOR_DEACTIVATED" => Some(EventType::EditorDeactivated),
            "CLAIM_DECLARED" => Some(EventType::ClaimDeclared),
            "CLAIM_OPERATIONALIZED" => Some(EventType::ClaimOperationalized),
            "EVIDENCE_ADDED" => Some(EventType::EvidenceAdded),
            "CLAIM_RESOLVED" => Some(EventType::ClaimResolved),
        _ => None,
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What kind of entity an event targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Editor,
    Claim,
    Evidence,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Editor => "editor",
            EntityType::Claim => "claim",
            EntityType::Evidence => "evidence",
        }
    }

    pub fn parse(value: &str) -> Option<EntityType> {
        match value {
            "editor" => Some(EntityType::Editor),
            "claim" => Some(EntityType::Claim),
            "evidence" => Some(EntityType::Evidence),
            _ => None,
        }
    }
}

/// One immutable entry in the hash-linked event log.
///
/// `event_hash` is SHA-256 over the chain input defined by the
/// canonicalizer: the canonical payload bytes, prefixed by
/// `previous_event_hash:` for every event after genesis. The signature is
/// Ed25519 over the lowercase hex hash *string*.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEvent {
    /// Unique identifier for this event.
    pub event_id: Uuid,

    /// Position in the chain. 0 is the genesis event of the entire ledger.
    pub sequence_number: i64,

    /// What happened.
    pub event_type: EventType,

    /// What kind of entity this targets.
    pub entity_type: EntityType,

    /// The targeted editor, claim, or evidence id.
    pub entity_id: Uuid,

    /// The canonicalizable payload that was hashed and signed.
    pub payload: CanonMap,

    /// Hex hash of event N-1. Absent only for genesis.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_event_hash: Option<String>,

    /// Lowercase hex SHA-256 over the chain input.
    pub event_hash: String,

    /// The editor who performed and signed this action.
    pub created_by: Uuid,

    /// Base64 Ed25519 signature over the `event_hash` string.
    pub editor_signature: String,

    /// Wall-clock creation time (UTC, microsecond precision). Informational:
    /// the only order that matters is `sequence_number`.
    pub created_at: DateTime<Utc>,

    /// The anchor batch this event was committed to, once anchored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchor_batch_id: Option<Uuid>,

    /// Convenience copy of the inclusion proof. Informational only —
    /// verification always replays proofs against the batch's own root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merkle_proof: Option<MerkleProof>,
}

impl LedgerEvent {
    /// Enforce the genesis pairing rule on this event in isolation.
    ///
    /// `previous_event_hash` must be absent iff `sequence_number == 0`.
    /// Chain linkage against the actual predecessor is the store's and the
    /// ledger's job; this check catches malformed events before they travel.
    pub fn validate_chain_rules(&self) -> LedgerResult<()> {
        if self.sequence_number < 0 {
            return Err(LedgerError::Chain {
                reason: format!(
                    "event {} has negative sequence number {}",
                    self.event_id, self.sequence_number
                ),
            });
        }
        match (self.sequence_number, &self.previous_event_hash) {
            (0, Some(prev)) => Err(LedgerError::Chain {
                reason: format!(
                    "genesis event must have no previous hash, got '{}'",
                    &prev[..prev.len().min(16)]
                ),
            }),
            (seq, None) if seq > 0 => Err(LedgerError::Chain {
                reason: format!("non-genesis event at sequence {seq} has no previous hash"),
            }),
            _ => Ok(()),
        }
    }

    /// The standard diagnostic reference for this event.
    pub fn event_ref(&self) -> String {
        LedgerError::event_ref(self.sequence_number, &self.event_hash)
    }
}
