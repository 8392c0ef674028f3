//! Full-chain verification.
//!
//! This is the nuclear option: replay every event, re-derive every hash,
//! re-verify every signature against the editor registry reconstructed from
//! the chain itself. It runs on every load from storage — even someone with
//! direct database access cannot inject, reorder, or rewrite events without
//! failing this pass.

use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use attesta_canon::hash_event;
use attesta_contracts::{EventType, LedgerError, LedgerEvent, LedgerResult};

use crate::fields::{get_opt_uuid, get_str, get_uuid};

/// Minimal editor view reconstructed during verification.
struct ChainEditor {
    public_key: String,
    is_active: bool,
}

/// Verify a complete event chain.
///
/// Checks, in order, for every event:
/// 1. contiguous sequence numbers starting at 0;
/// 2. the genesis/previous-hash pairing rules and exact chain linkage;
/// 3. hash recomputation from the payload and previous hash;
/// 4. the editor signature against the registry reconstructed so far
///    (the genesis editor self-signs against the key in its own payload);
/// 5. registration/deactivation consistency: no duplicate public keys, no
///    deactivating an unknown or already-inactive editor, no events signed
///    by unregistered or deactivated editors.
///
/// Any failure identifies the offending event by sequence number and hash
/// prefix.
pub fn verify_event_chain(events: &[LedgerEvent]) -> LedgerResult<()> {
    let mut prev_hash: Option<&str> = None;
    let mut editors: HashMap<Uuid, ChainEditor> = HashMap::new();
    let mut seen_keys: HashSet<String> = HashSet::new();

    for (index, event) in events.iter().enumerate() {
        let chain_err = |reason: String| LedgerError::Chain {
            reason: format!("{} at {}", reason, event.event_ref()),
        };

        // 1. Sequence contiguity.
        let expected = index as i64;
        if event.sequence_number != expected {
            return Err(chain_err(format!(
                "sequence gap or reorder: expected {expected}, got {}",
                event.sequence_number
            )));
        }

        // 2. Genesis pairing and linkage.
        event.validate_chain_rules()?;
        if event.previous_event_hash.as_deref() != prev_hash {
            return Err(chain_err(format!(
                "chain linkage broken: expected previous '{}'",
                prev_hash.map(|h| &h[..16]).unwrap_or("<none>")
            )));
        }

        // 3. Hash recomputation.
        let computed = hash_event(&event.payload, prev_hash)?;
        if computed != event.event_hash {
            return Err(chain_err(format!(
                "hash mismatch: recomputed {}...",
                &computed[..16]
            )));
        }

        // 4 & 5. Signature and editor-registry consistency.
        verify_editorial_rules(event, &mut editors, &mut seen_keys)?;

        prev_hash = Some(event.event_hash.as_str());
    }

    Ok(())
}

/// Convenience wrapper: `true` iff the chain verifies.
pub fn is_chain_intact(events: &[LedgerEvent]) -> bool {
    verify_event_chain(events).is_ok()
}

fn verify_editorial_rules(
    event: &LedgerEvent,
    editors: &mut HashMap<Uuid, ChainEditor>,
    seen_keys: &mut HashSet<String>,
) -> LedgerResult<()> {
    let chain_err = |reason: String| LedgerError::Chain {
        reason: format!("{} at {}", reason, event.event_ref()),
    };

    match event.event_type {
        EventType::EditorRegistered => {
            let editor_id = get_uuid(&event.payload, "editor_id")?;
            let public_key = get_str(&event.payload, "public_key")?.to_string();
            let registered_by = get_opt_uuid(&event.payload, "registered_by")?;

            if seen_keys.contains(&public_key) {
                return Err(chain_err("public key registered twice".to_string()));
            }
            if editors.contains_key(&editor_id) {
                return Err(chain_err(format!("editor {editor_id} registered twice")));
            }

            if editors.is_empty() {
                // Genesis editor: self-signed, no registrar. The only event
                // allowed to reference a signer not yet in the registry.
                if registered_by.is_some() {
                    return Err(chain_err(
                        "genesis registration must not carry registered_by".to_string(),
                    ));
                }
                if event.created_by != editor_id {
                    return Err(chain_err(
                        "genesis registration must be signed by the editor itself".to_string(),
                    ));
                }
                if !attesta_signer::verify(&event.event_hash, &event.editor_signature, &public_key)
                {
                    return Err(chain_err(
                        "genesis self-signature does not verify".to_string(),
                    ));
                }
            } else {
                if registered_by != Some(event.created_by) {
                    return Err(chain_err(
                        "registration signer differs from registered_by".to_string(),
                    ));
                }
                verify_known_signer(event, editors)?;
            }

            let _ = seen_keys.insert(public_key.clone());
            let _ = editors.insert(
                editor_id,
                ChainEditor {
                    public_key,
                    is_active: true,
                },
            );
        }

        EventType::EditorDeactivated => {
            verify_known_signer(event, editors)?;
            let target_id = get_uuid(&event.payload, "editor_id")?;
            match editors.get_mut(&target_id) {
                Some(target) if target.is_active => target.is_active = false,
                Some(_) => {
                    return Err(chain_err(format!(
                        "editor {target_id} deactivated twice"
                    )))
                }
                None => {
                    return Err(chain_err(format!(
                        "deactivation of unregistered editor {target_id}"
                    )))
                }
            }
        }

        _ => verify_known_signer(event, editors)?,
    }

    Ok(())
}

fn verify_known_signer(
    event: &LedgerEvent,
    editors: &HashMap<Uuid, ChainEditor>,
) -> LedgerResult<()> {
    let chain_err = |reason: String| LedgerError::Chain {
        reason: format!("{} at {}", reason, event.event_ref()),
    };

    let editor = editors
        .get(&event.created_by)
        .ok_or_else(|| chain_err(format!("event signed by unregistered editor {}", event.created_by)))?;

    if !editor.is_active {
        return Err(chain_err(format!(
            "event signed by deactivated editor {}",
            event.created_by
        )));
    }

    if !attesta_signer::verify(
        &event.event_hash,
        &event.editor_signature,
        &editor.public_key,
    ) {
        return Err(chain_err(format!(
            "signature does not verify for editor {}",
            event.created_by
        )));
    }

    Ok(())
}
