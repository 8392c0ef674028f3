//! Derived read models.
//!
//! Everything here is a pure projection of the event log: flat maps from
//! ids to records, rebuilt at any time by replaying events from sequence 0.
//! No cross-referenced object graphs — editors, claim statuses, evidence
//! attachments, and summaries are separate mappings keyed by id.

use std::collections::HashMap;

use serde::Serialize;
use uuid::Uuid;

use attesta_contracts::{
    ClaimStatus, EditorRole, EventType, EvidenceStance, LedgerError, LedgerEvent, LedgerResult,
    RegisteredEditor, Resolution,
};

use crate::fields::{get_opt_uuid, get_str, get_uuid};

/// Denormalized per-claim read model, maintained alongside the status map.
#[derive(Debug, Clone, Serialize)]
pub struct ClaimSummary {
    pub claim_id: Uuid,
    pub statement: String,
    pub claimant: String,
    pub status: ClaimStatus,
    pub resolution: Option<Resolution>,
    /// Total events involving this claim, evidence events included.
    pub event_count: usize,
    pub supporting_evidence: usize,
    pub contradicting_evidence: usize,
    pub neutral_evidence: usize,
    /// Sequence number of the last event that touched this claim.
    pub last_sequence: i64,
}

/// The mutable interior of the ledger's caches.
///
/// Mutated only after a successful commit; rebuilt from scratch on load.
#[derive(Default)]
pub(crate) struct ProjectionState {
    pub editors: HashMap<Uuid, RegisteredEditor>,
    pub key_to_editor: HashMap<String, Uuid>,
    pub claims: HashMap<Uuid, ClaimStatus>,
    pub claim_evidence: HashMap<Uuid, Vec<Uuid>>,
    pub summaries: HashMap<Uuid, ClaimSummary>,
}

impl ProjectionState {
    /// Apply one committed event to the projections.
    ///
    /// Used both for incremental updates after a commit and for full
    /// rebuilds on load. The event is assumed chain-verified.
    pub fn apply(&mut self, event: &LedgerEvent) -> LedgerResult<()> {
        match event.event_type {
            EventType::EditorRegistered => {
                let editor_id = get_uuid(&event.payload, "editor_id")?;
                let public_key = get_str(&event.payload, "public_key")?.to_string();
                let role_raw = get_str(&event.payload, "role")?;
                let role = EditorRole::parse(role_raw).ok_or_else(|| LedgerError::Chain {
                    reason: format!("unknown editor role '{role_raw}' at {}", event.event_ref()),
                })?;

                let editor = RegisteredEditor {
                    editor_id,
                    username: get_str(&event.payload, "username")?.to_string(),
                    display_name: get_str(&event.payload, "display_name")?.to_string(),
                    role,
                    public_key: public_key.clone(),
                    is_active: true,
                    registered_at: event.created_at,
                    registered_by: get_opt_uuid(&event.payload, "registered_by")?,
                };
                let _ = self.editors.insert(editor_id, editor);
                let _ = self.key_to_editor.insert(public_key, editor_id);
            }

            EventType::EditorDeactivated => {
                let target_id = get_uuid(&event.payload, "editor_id")?;
                if let Some(editor) = self.editors.get(&target_id) {
                    let _ = self.editors.insert(target_id, editor.deactivated());
                }
            }

            EventType::ClaimDeclared => {
                let claim_id = get_uuid(&event.payload, "claim_id")?;
                let status = parse_status(&event.payload, "initial_status", event)?;
                let _ = self.claims.insert(claim_id, status);
                let _ = self.claim_evidence.insert(claim_id, Vec::new());
                let _ = self.summaries.insert(
                    claim_id,
                    ClaimSummary {
                        claim_id,
                        statement: get_str(&event.payload, "statement")?.to_string(),
                        claimant: get_str(&event.payload, "claimant")?.to_string(),
                        status,
                        resolution: None,
                        event_count: 1,
                        supporting_evidence: 0,
                        contradicting_evidence: 0,
                        neutral_evidence: 0,
                        last_sequence: event.sequence_number,
                    },
                );
            }

            EventType::ClaimOperationalized => {
                let claim_id = get_uuid(&event.payload, "claim_id")?;
                let status = parse_status(&event.payload, "new_status", event)?;
                let _ = self.claims.insert(claim_id, status);
                self.touch_summary(claim_id, event, |s| s.status = status);
            }

            EventType::EvidenceAdded => {
                let claim_id = get_uuid(&event.payload, "claim_id")?;
                let evidence_id = get_uuid(&event.payload, "evidence_id")?;
                self.claim_evidence
                    .entry(claim_id)
                    .or_default()
                    .push(evidence_id);

                // First evidence moves the claim into observation.
                if self.claims.get(&claim_id) == Some(&ClaimStatus::Operationalized) {
                    let _ = self.claims.insert(claim_id, ClaimStatus::Observing);
                }

                let stance = get_str(&event.payload, "stance")?.to_string();
                let status = self
                    .claims
                    .get(&claim_id)
                    .copied()
                    .unwrap_or(ClaimStatus::Observing);
                self.touch_summary(claim_id, event, |s| {
                    s.status = status;
                    match stance.as_str() {
                        v if v == EvidenceStance::Supporting.as_str() => {
                            s.supporting_evidence += 1
                        }
                        v if v == EvidenceStance::Contradicting.as_str() => {
                            s.contradicting_evidence += 1
                        }
                        _ => s.neutral_evidence += 1,
                    }
                });
            }

            EventType::ClaimResolved => {
                let claim_id = get_uuid(&event.payload, "claim_id")?;
                let status = parse_status(&event.payload, "new_status", event)?;
                let resolution_raw = get_str(&event.payload, "resolution")?;
                let resolution = parse_resolution(resolution_raw);
                let _ = self.claims.insert(claim_id, status);
                self.touch_summary(claim_id, event, |s| {
                    s.status = status;
                    s.resolution = resolution;
                });
            }
        }

        Ok(())
    }

    fn touch_summary(
        &mut self,
        claim_id: Uuid,
        event: &LedgerEvent,
        update: impl FnOnce(&mut ClaimSummary),
    ) {
        if let Some(summary) = self.summaries.get_mut(&claim_id) {
            summary.event_count += 1;
            summary.last_sequence = event.sequence_number;
            update(summary);
        }
    }
}

fn parse_status(
    payload: &attesta_canon::CanonMap,
    key: &str,
    event: &LedgerEvent,
) -> LedgerResult<ClaimStatus> {
    let raw = get_str(payload, key)?;
    ClaimStatus::parse(raw).ok_or_else(|| LedgerError::Chain {
        reason: format!("unknown claim status '{raw}' at {}", event.event_ref()),
    })
}

fn parse_resolution(raw: &str) -> Option<Resolution> {
    match raw {
        "met" => Some(Resolution::Met),
        "partially_met" => Some(Resolution::PartiallyMet),
        "not_met" => Some(Resolution::NotMet),
        "inconclusive" => Some(Resolution::Inconclusive),
        _ => None,
    }
}
