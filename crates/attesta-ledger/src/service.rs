//! The core ledger service.
//!
//! Orchestrates canonicalization, signing, storage, and business rules.
//! Nothing is edited: every operation validates against the cached
//! projections, appends exactly one signed event through the store's append
//! scope, and only then updates the caches.
//!
//! Guarantees enforced here:
//! - editors must be registered (and active, and sufficiently privileged)
//!   before they can act, and must prove possession of their private key;
//! - editor public keys are immutable and unique across all of history;
//! - claims move through exactly one lifecycle path;
//! - sequence numbers and previous hashes come from the EventStore under
//!   its lock, never from the caches.

use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use tracing::info;
use uuid::Uuid;

use attesta_canon::{canonical_bytes, hash_event, CanonMap, CANON_VERSION};
use attesta_contracts::{
    ClaimDeclaredPayload, ClaimOperationalizedPayload, ClaimResolvedPayload, ClaimStatus,
    EditorDeactivatedPayload, EditorRegisteredPayload, EditorRole, EntityType, EventType,
    EvidenceAddedPayload, LedgerError, LedgerEvent, LedgerResult, RegisteredEditor,
};
use attesta_signer::KEY_BINDING_CHALLENGE;
use attesta_store::EventStore;

use crate::fields::get_opt_uuid;
use crate::projection::{ClaimSummary, ProjectionState};
use crate::verify::verify_event_chain;

/// The core ledger service. See the module docs for the guarantees.
pub struct LedgerService {
    store: Arc<dyn EventStore>,
    state: RwLock<ProjectionState>,
}

impl LedgerService {
    /// Create a service over an empty (or separately verified) store.
    ///
    /// Production startup should use [`LedgerService::load_from_store`],
    /// which verifies the whole chain before serving.
    pub fn new(store: Arc<dyn EventStore>) -> LedgerService {
        LedgerService {
            store,
            state: RwLock::new(ProjectionState::default()),
        }
    }

    /// Load a ledger from storage: fetch every event in sequence order, run
    /// full chain verification, and rebuild all projections.
    ///
    /// A verification failure aborts startup — a ledger that cannot prove
    /// its own integrity must not serve.
    pub fn load_from_store(store: Arc<dyn EventStore>) -> LedgerResult<LedgerService> {
        let events = store.list_all()?;
        verify_event_chain(&events)?;

        let mut state = ProjectionState::default();
        for event in &events {
            state.apply(event)?;
        }

        info!(event_count = events.len(), "ledger loaded and chain verified");
        Ok(LedgerService {
            store,
            state: RwLock::new(state),
        })
    }

    // ── Editor operations ─────────────────────────────────────────────────────

    /// Register a new editor, anchoring their public key immutably.
    ///
    /// The first registration is the genesis editor: `registered_by` must be
    /// absent and the editor self-signs with the candidate private key. Every
    /// later registration must name an active admin in `registered_by`, and
    /// `registering_private_key` must pass that admin's key-binding check.
    pub fn register_editor(
        &self,
        payload: EditorRegisteredPayload,
        registering_private_key: &str,
    ) -> LedgerResult<LedgerEvent> {
        let mut state = self.state.write();

        if state.editors.contains_key(&payload.editor_id) {
            return Err(LedgerError::Editor {
                reason: format!("editor {} already exists", payload.editor_id),
            });
        }
        if state.key_to_editor.contains_key(&payload.public_key) {
            return Err(LedgerError::Editor {
                reason: format!(
                    "public key already registered to editor {}; each editor needs a unique key",
                    state.key_to_editor[&payload.public_key]
                ),
            });
        }

        let signing_editor = if state.editors.is_empty() {
            // Genesis: self-signed, and the candidate key must actually
            // correspond to the public key being anchored.
            if payload.registered_by.is_some() {
                return Err(LedgerError::Editor {
                    reason: "genesis editor must not carry registered_by".to_string(),
                });
            }
            check_key_binding(
                &payload.public_key,
                registering_private_key,
                &format!("genesis editor {}", payload.editor_id),
            )?;
            payload.editor_id
        } else {
            let admin_id = payload.registered_by.ok_or_else(|| LedgerError::Editor {
                reason: "non-genesis registrations must specify registered_by".to_string(),
            })?;
            let admin = validate_editor(&state, admin_id, EventType::EditorRegistered)?;
            check_key_binding(
                &admin.public_key,
                registering_private_key,
                &format!("editor {admin_id}"),
            )?;
            admin_id
        };

        let entity_id = payload.editor_id;
        let username = payload.username.clone();
        let event = self.append_signed(
            EventType::EditorRegistered,
            EntityType::Editor,
            entity_id,
            payload.into_payload(),
            signing_editor,
            registering_private_key,
        )?;
        state.apply(&event)?;

        info!(editor = %entity_id, %username, sequence = event.sequence_number, "editor registered");
        Ok(event)
    }

    /// Deactivate an editor. Terminal: past actions stay valid, new actions
    /// are refused, and there is no reactivation — a returning human gets a
    /// freshly registered identity.
    pub fn deactivate_editor(
        &self,
        payload: EditorDeactivatedPayload,
        admin_private_key: &str,
    ) -> LedgerResult<LedgerEvent> {
        let mut state = self.state.write();

        let target = state
            .editors
            .get(&payload.editor_id)
            .ok_or_else(|| LedgerError::Editor {
                reason: format!("editor {} does not exist", payload.editor_id),
            })?;
        if !target.is_active {
            return Err(LedgerError::Editor {
                reason: format!("editor {} is already deactivated", payload.editor_id),
            });
        }

        let admin = validate_editor(&state, payload.deactivated_by, EventType::EditorDeactivated)?;
        check_key_binding(
            &admin.public_key,
            admin_private_key,
            &format!("editor {}", admin.editor_id),
        )?;

        if payload.editor_id == payload.deactivated_by {
            let active_admins = state
                .editors
                .values()
                .filter(|e| e.is_active && e.role == EditorRole::Admin)
                .count();
            if active_admins <= 1 {
                return Err(LedgerError::Editor {
                    reason: "cannot deactivate the only active admin; register another admin first"
                        .to_string(),
                });
            }
        }

        let entity_id = payload.editor_id;
        let event = self.append_signed(
            EventType::EditorDeactivated,
            EntityType::Editor,
            entity_id,
            payload.into_payload(),
            admin.editor_id,
            admin_private_key,
        )?;
        state.apply(&event)?;

        info!(editor = %entity_id, by = %admin.editor_id, "editor deactivated");
        Ok(event)
    }

    // ── Claim operations ──────────────────────────────────────────────────────

    /// Declare a new claim: the first event in its lifecycle.
    pub fn declare_claim(
        &self,
        payload: ClaimDeclaredPayload,
        editor_id: Uuid,
        editor_private_key: &str,
    ) -> LedgerResult<LedgerEvent> {
        let mut state = self.state.write();
        let editor = validate_editor(&state, editor_id, EventType::ClaimDeclared)?;
        check_key_binding(&editor.public_key, editor_private_key, "declaring editor")?;

        if state.claims.contains_key(&payload.claim_id) {
            return Err(LedgerError::Validation {
                reason: format!("claim {} already exists", payload.claim_id),
            });
        }
        if payload.initial_status != ClaimStatus::Declared {
            return Err(LedgerError::Validation {
                reason: format!(
                    "a new claim must start as 'declared', got '{}'",
                    payload.initial_status
                ),
            });
        }

        let claim_id = payload.claim_id;
        let event = self.append_signed(
            EventType::ClaimDeclared,
            EntityType::Claim,
            claim_id,
            payload.into_payload(),
            editor_id,
            editor_private_key,
        )?;
        state.apply(&event)?;

        info!(claim = %claim_id, sequence = event.sequence_number, "claim declared");
        Ok(event)
    }

    /// Bind a declared claim to explicit metrics and evaluation criteria.
    /// This step is explicitly labeled interpretation — it locks the
    /// goalposts before observation begins.
    pub fn operationalize_claim(
        &self,
        payload: ClaimOperationalizedPayload,
        editor_id: Uuid,
        editor_private_key: &str,
    ) -> LedgerResult<LedgerEvent> {
        let mut state = self.state.write();
        let editor = validate_editor(&state, editor_id, EventType::ClaimOperationalized)?;
        check_key_binding(&editor.public_key, editor_private_key, "operationalizing editor")?;

        match state.claims.get(&payload.claim_id) {
            None => {
                return Err(LedgerError::Validation {
                    reason: format!(
                        "claim {} does not exist; CLAIM_DECLARED must come first",
                        payload.claim_id
                    ),
                })
            }
            Some(ClaimStatus::Declared) => {}
            Some(status) => {
                return Err(LedgerError::Validation {
                    reason: format!(
                        "claim {} has status '{status}'; only declared claims can be operationalized",
                        payload.claim_id
                    ),
                })
            }
        }
        if payload.new_status != ClaimStatus::Operationalized {
            return Err(LedgerError::Validation {
                reason: format!(
                    "operationalization must set status 'operationalized', got '{}'",
                    payload.new_status
                ),
            });
        }

        let claim_id = payload.claim_id;
        let event = self.append_signed(
            EventType::ClaimOperationalized,
            EntityType::Claim,
            claim_id,
            payload.into_payload(),
            editor_id,
            editor_private_key,
        )?;
        state.apply(&event)?;

        info!(claim = %claim_id, "claim operationalized");
        Ok(event)
    }

    /// Attach one piece of evidence to an operationalized or observing
    /// claim. Supporting and contradicting evidence are both welcome.
    pub fn add_evidence(
        &self,
        payload: EvidenceAddedPayload,
        editor_id: Uuid,
        editor_private_key: &str,
    ) -> LedgerResult<LedgerEvent> {
        let mut state = self.state.write();
        let editor = validate_editor(&state, editor_id, EventType::EvidenceAdded)?;
        check_key_binding(&editor.public_key, editor_private_key, "attaching editor")?;

        match state.claims.get(&payload.claim_id) {
            None => {
                return Err(LedgerError::Validation {
                    reason: format!("claim {} does not exist", payload.claim_id),
                })
            }
            Some(ClaimStatus::Operationalized) | Some(ClaimStatus::Observing) => {}
            Some(status) => {
                return Err(LedgerError::Validation {
                    reason: format!(
                        "claim {} has status '{status}'; it must be operationalized before evidence is added",
                        payload.claim_id
                    ),
                })
            }
        }

        let claim_id = payload.claim_id;
        let evidence_id = payload.evidence_id;
        let event = self.append_signed(
            EventType::EvidenceAdded,
            EntityType::Evidence,
            evidence_id,
            payload.into_payload()?,
            editor_id,
            editor_private_key,
        )?;
        state.apply(&event)?;

        info!(claim = %claim_id, evidence = %evidence_id, "evidence attached");
        Ok(event)
    }

    /// Resolve a claim with a final determination. Resolution requires at
    /// least one referenced evidence item, every reference must already be
    /// attached to this claim, and a claim resolves exactly once.
    pub fn resolve_claim(
        &self,
        payload: ClaimResolvedPayload,
        editor_id: Uuid,
        editor_private_key: &str,
    ) -> LedgerResult<LedgerEvent> {
        let mut state = self.state.write();
        let editor = validate_editor(&state, editor_id, EventType::ClaimResolved)?;
        check_key_binding(&editor.public_key, editor_private_key, "resolving editor")?;

        match state.claims.get(&payload.claim_id) {
            None => {
                return Err(LedgerError::Validation {
                    reason: format!("claim {} does not exist", payload.claim_id),
                })
            }
            Some(ClaimStatus::Resolved) => {
                return Err(LedgerError::Validation {
                    reason: format!(
                        "claim {} is already resolved; claims resolve exactly once",
                        payload.claim_id
                    ),
                })
            }
            Some(ClaimStatus::Operationalized) | Some(ClaimStatus::Observing) => {}
            Some(status) => {
                return Err(LedgerError::Validation {
                    reason: format!(
                        "claim {} has status '{status}'; it must be operationalized before resolution",
                        payload.claim_id
                    ),
                })
            }
        }

        if payload.supporting_evidence_ids.is_empty() {
            return Err(LedgerError::Validation {
                reason: "resolution requires at least one evidence reference".to_string(),
            });
        }
        let attached = state
            .claim_evidence
            .get(&payload.claim_id)
            .cloned()
            .unwrap_or_default();
        for evidence_id in &payload.supporting_evidence_ids {
            if !attached.contains(evidence_id) {
                return Err(LedgerError::Validation {
                    reason: format!(
                        "evidence {evidence_id} is not attached to claim {}",
                        payload.claim_id
                    ),
                });
            }
        }
        if payload.new_status != ClaimStatus::Resolved {
            return Err(LedgerError::Validation {
                reason: format!(
                    "resolution must set status 'resolved', got '{}'",
                    payload.new_status
                ),
            });
        }

        let claim_id = payload.claim_id;
        let event = self.append_signed(
            EventType::ClaimResolved,
            EntityType::Claim,
            claim_id,
            payload.into_payload(),
            editor_id,
            editor_private_key,
        )?;
        state.apply(&event)?;

        info!(claim = %claim_id, "claim resolved");
        Ok(event)
    }

    // ── The append flow ───────────────────────────────────────────────────────

    /// The single write path: reserve the head, derive the chain input, hash,
    /// sign, commit. Any early return drops the scope, which rolls back.
    fn append_signed(
        &self,
        event_type: EventType,
        entity_type: EntityType,
        entity_id: Uuid,
        payload: CanonMap,
        editor_id: Uuid,
        editor_private_key: &str,
    ) -> LedgerResult<LedgerEvent> {
        let scope = self.store.begin_append()?;
        let sequence = scope.head().next_sequence();

        let previous_event_hash = if sequence == 0 {
            None
        } else {
            match scope.head().last_event_hash.clone() {
                Some(hash) => Some(hash),
                None => {
                    return Err(LedgerError::Chain {
                        reason: format!(
                            "store reports an empty head at non-genesis sequence {sequence}"
                        ),
                    })
                }
            }
        };

        let canonical = canonical_bytes(&payload)?;
        let event_hash = hash_event(&payload, previous_event_hash.as_deref())?;
        let editor_signature = attesta_signer::sign(&event_hash, editor_private_key)
            .map_err(|e| LedgerError::Editor {
                reason: format!("could not sign event hash: {e}"),
            })?;

        let event = LedgerEvent {
            event_id: Uuid::new_v4(),
            sequence_number: sequence,
            event_type,
            entity_type,
            entity_id,
            payload,
            previous_event_hash,
            event_hash,
            created_by: editor_id,
            editor_signature,
            created_at: Utc::now(),
            anchor_batch_id: None,
            merkle_proof: None,
        };
        event.validate_chain_rules()?;

        scope.commit(&event, &canonical, CANON_VERSION)?;
        Ok(event)
    }

    // ── Reads ─────────────────────────────────────────────────────────────────

    pub fn store(&self) -> &Arc<dyn EventStore> {
        &self.store
    }

    pub fn event_count(&self) -> LedgerResult<usize> {
        self.store.get_event_count()
    }

    pub fn has_genesis_editor(&self) -> bool {
        !self.state.read().editors.is_empty()
    }

    pub fn get_editor(&self, editor_id: Uuid) -> Option<RegisteredEditor> {
        self.state.read().editors.get(&editor_id).cloned()
    }

    pub fn get_editor_by_public_key(&self, public_key: &str) -> Option<RegisteredEditor> {
        let state = self.state.read();
        let editor_id = state.key_to_editor.get(public_key)?;
        state.editors.get(editor_id).cloned()
    }

    pub fn list_editors(&self, active_only: bool) -> Vec<RegisteredEditor> {
        let state = self.state.read();
        let mut editors: Vec<RegisteredEditor> = state
            .editors
            .values()
            .filter(|e| !active_only || e.is_active)
            .cloned()
            .collect();
        editors.sort_by_key(|e| e.registered_at);
        editors
    }

    pub fn get_claim_status(&self, claim_id: Uuid) -> Option<ClaimStatus> {
        self.state.read().claims.get(&claim_id).copied()
    }

    pub fn get_claim_evidence(&self, claim_id: Uuid) -> Vec<Uuid> {
        self.state
            .read()
            .claim_evidence
            .get(&claim_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn get_claim_summary(&self, claim_id: Uuid) -> Option<ClaimSummary> {
        self.state.read().summaries.get(&claim_id).cloned()
    }

    pub fn list_claim_summaries(&self) -> Vec<ClaimSummary> {
        let state = self.state.read();
        let mut summaries: Vec<ClaimSummary> = state.summaries.values().cloned().collect();
        summaries.sort_by_key(|s| s.last_sequence);
        summaries
    }

    /// All events in chain order, straight from the store.
    pub fn events(&self) -> LedgerResult<Vec<LedgerEvent>> {
        self.store.list_all()
    }

    /// All events targeting one entity, in chain order.
    pub fn events_for_entity(&self, entity_id: Uuid) -> LedgerResult<Vec<LedgerEvent>> {
        self.store.list_for_entity(entity_id)
    }

    /// Every event involving a claim: those targeting it directly plus
    /// evidence events whose payload references it. This is the event set a
    /// bundle exports.
    pub fn events_for_claim(&self, claim_id: Uuid) -> LedgerResult<Vec<LedgerEvent>> {
        Ok(self
            .store
            .list_all()?
            .into_iter()
            .filter(|event| {
                event.entity_id == claim_id
                    || get_opt_uuid(&event.payload, "claim_id")
                        .ok()
                        .flatten()
                        .map(|id| id == claim_id)
                        .unwrap_or(false)
            })
            .collect())
    }

    /// Replay and verify the entire chain from storage.
    pub fn verify_chain_integrity(&self) -> LedgerResult<()> {
        verify_event_chain(&self.store.list_all()?)
    }

    /// `true` iff the chain verifies end to end.
    pub fn is_chain_intact(&self) -> bool {
        self.verify_chain_integrity().is_ok()
    }
}

// ── Editor validation helpers ─────────────────────────────────────────────────

/// An editor may act iff registered, active, and authorized for the event
/// kind.
fn validate_editor(
    state: &ProjectionState,
    editor_id: Uuid,
    event_type: EventType,
) -> LedgerResult<RegisteredEditor> {
    let editor = state
        .editors
        .get(&editor_id)
        .ok_or_else(|| LedgerError::Editor {
            reason: format!(
                "editor {editor_id} is not registered; editors must be registered before acting"
            ),
        })?;

    if !editor.is_active {
        return Err(LedgerError::Editor {
            reason: format!(
                "editor {editor_id} ({}) is deactivated and cannot perform new actions",
                editor.username
            ),
        });
    }

    if !editor.role.may_author(event_type) {
        return Err(LedgerError::Editor {
            reason: format!(
                "editor {editor_id} has role '{}' which may not author {event_type}",
                editor.role
            ),
        });
    }

    Ok(editor.clone())
}

/// The key-binding check: prove possession of the private key matching a
/// registered public key by signing the fixed challenge. This is what stops
/// someone with database access from impersonating an editor with a
/// substituted key.
fn check_key_binding(public_key: &str, private_key: &str, who: &str) -> LedgerResult<()> {
    let signature =
        attesta_signer::sign(KEY_BINDING_CHALLENGE, private_key).map_err(|e| {
            LedgerError::Editor {
                reason: format!("public key mismatch: could not sign challenge for {who}: {e}"),
            }
        })?;

    if !attesta_signer::verify(KEY_BINDING_CHALLENGE, &signature, public_key) {
        return Err(LedgerError::Editor {
            reason: format!(
                "public key mismatch: provided private key does not match the registered public key for {who}"
            ),
        });
    }
    Ok(())
}
