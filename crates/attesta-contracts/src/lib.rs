//! # attesta-contracts
//!
//! Shared types, payloads, and error contracts for the attesta ledger.
//!
//! All crates in the workspace import from here. No business logic lives in
//! this crate — only data definitions, the unified error type, and the small
//! invariants a value can check about itself (chain-rule pairing, role
//! authority).

pub mod anchor;
pub mod claim;
pub mod editor;
pub mod error;
pub mod event;
pub mod evidence;

/// Version of the ledger's data contract. Stored with every event row and
/// stamped into exported bundles.
pub const SPEC_VERSION: u32 = 1;

pub use anchor::{MerkleProof, ProofDirection};
pub use claim::{
    ClaimDeclaredPayload, ClaimOperationalizedPayload, ClaimResolvedPayload, ClaimStatus,
    ClaimType, Resolution,
};
pub use editor::{
    EditorDeactivatedPayload, EditorRegisteredPayload, EditorRole, RegisteredEditor,
};
pub use error::{LedgerError, LedgerResult};
pub use event::{EntityType, EventType, LedgerEvent};
pub use evidence::{EvidenceAddedPayload, EvidenceStance, SourceTier};

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use attesta_canon::{hash_event, CanonValue};

    use super::*;

    // ── Helpers ───────────────────────────────────────────────────────────────

    fn sample_event(sequence: i64, previous: Option<&str>) -> LedgerEvent {
        let payload = ClaimDeclaredPayload {
            claim_id: Uuid::new_v4(),
            statement: "Transit ridership will double within three years".to_string(),
            statement_context: "Mayoral press conference".to_string(),
            claimant: "City of Example".to_string(),
            claim_type: ClaimType::Predictive,
            declared_at: Utc::now(),
            source_url: "https://example.org/press/42".to_string(),
            initial_status: ClaimStatus::Declared,
        }
        .into_payload();
        let event_hash = hash_event(&payload, previous).unwrap();
        LedgerEvent {
            event_id: Uuid::new_v4(),
            sequence_number: sequence,
            event_type: EventType::ClaimDeclared,
            entity_type: EntityType::Claim,
            entity_id: Uuid::new_v4(),
            payload,
            previous_event_hash: previous.map(str::to_string),
            event_hash,
            created_by: Uuid::new_v4(),
            editor_signature: "c2lnbmF0dXJl".to_string(),
            created_at: Utc::now(),
            anchor_batch_id: None,
            merkle_proof: None,
        }
    }

    // ── Chain rules ───────────────────────────────────────────────────────────

    /// Genesis may not carry a previous hash; non-genesis must.
    #[test]
    fn chain_rule_pairing() {
        let prev = "a".repeat(64);

        assert!(sample_event(0, None).validate_chain_rules().is_ok());
        assert!(sample_event(1, Some(&prev)).validate_chain_rules().is_ok());

        let bad_genesis = sample_event(0, Some(&prev));
        assert!(matches!(
            bad_genesis.validate_chain_rules(),
            Err(LedgerError::Chain { .. })
        ));

        let bad_follower = sample_event(3, None);
        assert!(matches!(
            bad_follower.validate_chain_rules(),
            Err(LedgerError::Chain { .. })
        ));
    }

    /// Events serialize without a `previous_event_hash` key at genesis and
    /// round-trip losslessly.
    #[test]
    fn event_serde_round_trip() {
        let event = sample_event(0, None);
        let json = serde_json::to_string(&event).unwrap();
        assert!(!json.contains("previous_event_hash"));

        let decoded: LedgerEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded.event_hash, event.event_hash);
        assert_eq!(decoded.sequence_number, 0);
        assert_eq!(decoded.event_type, EventType::ClaimDeclared);
        assert_eq!(
            attesta_canon::canonical_bytes(&decoded.payload).unwrap(),
            attesta_canon::canonical_bytes(&event.payload).unwrap(),
            "payload must canonicalize identically after a serde round trip"
        );
    }

    // ── Enum wire values ──────────────────────────────────────────────────────

    #[test]
    fn event_type_wire_values() {
        for (ty, wire) in [
            (EventType::EditorRegistered, "\"EDITOR_REGISTERED\""),
            (EventType::ClaimOperationalized, "\"CLAIM_OPERATIONALIZED\""),
            (EventType::EvidenceAdded, "\"EVIDENCE_ADDED\""),
        ] {
            assert_eq!(serde_json::to_string(&ty).unwrap(), wire);
            let back: EventType = serde_json::from_str(wire).unwrap();
            assert_eq!(back, ty);
        }
    }

    #[test]
    fn role_and_status_wire_values() {
        assert_eq!(serde_json::to_string(&EditorRole::Senior).unwrap(), "\"senior\"");
        assert_eq!(
            serde_json::to_string(&ClaimStatus::Operationalized).unwrap(),
            "\"operationalized\""
        );
        assert_eq!(
            serde_json::to_string(&Resolution::PartiallyMet).unwrap(),
            "\"partially_met\""
        );
        assert_eq!(EditorRole::parse("reviewer"), Some(EditorRole::Reviewer));
        assert_eq!(ClaimStatus::parse("bogus"), None);
    }

    // ── Role gating ───────────────────────────────────────────────────────────

    /// The authority matrix: reviewers commit nothing, editors cannot
    /// resolve, only admins touch identity events.
    #[test]
    fn role_authority_matrix() {
        use EventType::*;

        for ty in [EditorRegistered, EditorDeactivated] {
            assert!(EditorRole::Admin.may_author(ty));
            assert!(!EditorRole::Senior.may_author(ty));
            assert!(!EditorRole::Editor.may_author(ty));
        }

        assert!(EditorRole::Senior.may_author(ClaimResolved));
        assert!(!EditorRole::Editor.may_author(ClaimResolved));

        for ty in [ClaimDeclared, ClaimOperationalized, EvidenceAdded] {
            assert!(EditorRole::Editor.may_author(ty));
            assert!(!EditorRole::Reviewer.may_author(ty));
        }
    }

    // ── Payload canonicalization ──────────────────────────────────────────────

    /// Optional payload fields that are `None` vanish from the canonical
    /// bytes rather than appearing as nulls.
    #[test]
    fn optional_fields_omitted() {
        let payload = EditorRegisteredPayload {
            editor_id: Uuid::new_v4(),
            username: "ana".to_string(),
            display_name: "Ana".to_string(),
            role: EditorRole::Admin,
            public_key: "cHVibGlj".to_string(),
            registered_by: None,
            rationale: None,
        }
        .into_payload();

        let canonical = attesta_canon::canonical_string(&payload).unwrap();
        assert!(!canonical.contains("registered_by"));
        assert!(!canonical.contains("rationale"));
        assert!(canonical.contains("\"role\":\"admin\""));
    }

    /// Evidence confidence must be a decimal literal; floats smuggled as
    /// strings are refused.
    #[test]
    fn evidence_confidence_validated() {
        let base = EvidenceAddedPayload {
            claim_id: Uuid::new_v4(),
            evidence_id: Uuid::new_v4(),
            title: "Quarterly ridership report".to_string(),
            source_url: "https://example.org/report".to_string(),
            source_tier: SourceTier::Primary,
            stance: EvidenceStance::Supporting,
            confidence: Some("0.80".to_string()),
            summary: None,
        };
        let map = base.clone().into_payload().unwrap();
        let canonical = attesta_canon::canonical_string(&map).unwrap();
        assert!(canonical.contains("\"confidence\":\"0.80\""));

        let bad = EvidenceAddedPayload {
            confidence: Some("eighty percent".to_string()),
            ..base
        };
        assert!(bad.into_payload().is_err());
    }

    /// Enum payload values are string values, never variant names.
    #[test]
    fn payload_enums_use_values() {
        let payload = ClaimResolvedPayload {
            claim_id: Uuid::new_v4(),
            resolution: Resolution::PartiallyMet,
            resolution_summary: "Target partially reached by the deadline".to_string(),
            supporting_evidence_ids: vec![Uuid::new_v4()],
            new_status: ClaimStatus::Resolved,
        }
        .into_payload();

        assert_eq!(
            payload.get("resolution"),
            Some(&CanonValue::Enum("partially_met".to_string()))
        );
    }

    // ── Error surface ─────────────────────────────────────────────────────────

    #[test]
    fn retryable_kinds() {
        assert!(LedgerError::LockBusy { reason: "held".into() }.is_retryable());
        assert!(LedgerError::Concurrency { reason: "head moved".into() }.is_retryable());
        assert!(!LedgerError::Validation { reason: "dup".into() }.is_retryable());
        assert!(!LedgerError::Chain { reason: "gap".into() }.is_retryable());
    }

    #[test]
    fn event_ref_format() {
        let hash = "deadbeefdeadbeefdeadbeefdeadbeefdeadbeefdeadbeefdeadbeefdeadbeef";
        let msg = LedgerError::event_ref(7, hash);
        assert_eq!(msg, "sequence 7 (deadbeefdeadbeef...)");
    }
}
