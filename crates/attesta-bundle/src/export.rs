//! Claim bundle export.
//!
//! A bundle is the externalization of trust: a single JSON document holding
//! every event involving one claim, the public keys of every editor who
//! signed them, and any inclusion proofs — everything a standalone verifier
//! needs to reach a verdict without contacting the issuing server.

use std::path::{Path, PathBuf};

use chrono::Utc;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use attesta_canon::CANON_VERSION;
use attesta_contracts::{LedgerError, LedgerResult, SPEC_VERSION};
use attesta_ledger::LedgerService;

/// Version of the bundle document format itself.
pub const BUNDLE_FORMAT_VERSION: u32 = 1;

/// The export filename for a claim: `claim-<first-8-of-id>-bundle.json`.
pub fn bundle_filename(claim_id: Uuid) -> String {
    format!("claim-{}-bundle.json", &claim_id.to_string()[..8])
}

/// Assemble the bundle document for one claim.
///
/// Events are every event involving the claim (targeting it directly, or an
/// evidence event referencing it), in sequence order, serialized with the
/// canonicalizer's output conventions so a verifier re-canonicalizing each
/// payload reproduces the stored hashes. Editors are trimmed to the fields
/// verification needs.
pub fn export_claim_bundle(
    ledger: &LedgerService,
    claim_id: Uuid,
) -> LedgerResult<serde_json::Value> {
    let status = ledger
        .get_claim_status(claim_id)
        .ok_or_else(|| LedgerError::Validation {
            reason: format!("claim {claim_id} does not exist"),
        })?;

    let events = ledger.events_for_claim(claim_id)?;
    if events.is_empty() {
        return Err(LedgerError::Validation {
            reason: format!("claim {claim_id} has no events to export"),
        });
    }

    let mut editors = serde_json::Map::new();
    for event in &events {
        let editor_id = event.created_by.to_string();
        if editors.contains_key(&editor_id) {
            continue;
        }
        let editor = ledger
            .get_editor(event.created_by)
            .ok_or_else(|| LedgerError::Editor {
                reason: format!(
                    "event {} signed by unknown editor {}",
                    event.event_ref(),
                    event.created_by
                ),
            })?;
        let _ = editors.insert(
            editor_id,
            json!({
                "username": editor.username,
                "display_name": editor.display_name,
                "role": editor.role,
                "public_key": editor.public_key,
            }),
        );
    }

    let chain_intact = ledger.is_chain_intact();
    let bundle = json!({
        "_meta": {
            "bundle_format_version": BUNDLE_FORMAT_VERSION,
            "canon_version": CANON_VERSION,
            "spec_version": SPEC_VERSION,
            "exported_at": Utc::now().to_rfc3339(),
            "claim_id": claim_id,
            "chain_intact_at_export": chain_intact,
        },
        "_verification": {
            "hash_algorithm": "sha256",
            "signature_algorithm": "ed25519",
            "canon_version": CANON_VERSION,
            "instructions": [
                "canonicalize each event payload: inject {\"__canon_v\":canon_version}, sort keys by codepoint, drop null fields, escape non-ASCII, no whitespace",
                "event_hash = sha256(canonical) for the first event of the chain, else sha256(lowercase(previous_event_hash) + ':' + canonical), lowercase hex",
                "each event's previous_event_hash must equal the preceding event's event_hash",
                "editor_signature is ed25519 over the event_hash hex string, verified with the editor's base64 public_key",
                "replay any merkle_proof: fold the leaf with each sibling hash per its left/right direction and compare to merkle_root",
            ],
        },
        "claim": {
            "claim_id": claim_id,
            "status": status,
            "event_count": events.len(),
        },
        "events": events,
        "editors": serde_json::Value::Object(editors),
    });

    info!(claim = %claim_id, events = events.len(), "claim bundle assembled");
    Ok(bundle)
}

/// Export a claim bundle to `<dir>/claim-<first8>-bundle.json`, pretty-
/// printed UTF-8 JSON. Returns the written path.
pub fn write_claim_bundle(
    ledger: &LedgerService,
    claim_id: Uuid,
    dir: &Path,
) -> LedgerResult<PathBuf> {
    let bundle = export_claim_bundle(ledger, claim_id)?;
    let path = dir.join(bundle_filename(claim_id));
    let pretty = serde_json::to_string_pretty(&bundle).map_err(|e| LedgerError::Store {
        reason: format!("could not serialize bundle: {e}"),
    })?;
    std::fs::write(&path, pretty).map_err(|e| LedgerError::Store {
        reason: format!("could not write bundle to {}: {e}", path.display()),
    })?;

    info!(path = %path.display(), "claim bundle written");
    Ok(path)
}
