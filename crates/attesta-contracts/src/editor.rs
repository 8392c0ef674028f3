//! Editorial identity: roles, the derived editor record, and the payloads
//! for identity events.
//!
//! Editors are librarians of commitments, not arbiters of truth. Every
//! editorial action is signed, attributable, and part of the audit trail.
//! A public key is anchored immutably at registration and never changes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use attesta_canon::{CanonMap, CanonValue};

use crate::event::EventType;

/// Editor roles, in decreasing order of authority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EditorRole {
    /// Full system access: registers and deactivates editors.
    Admin,
    /// May resolve claims in addition to everything an editor can do.
    Senior,
    /// May declare claims, operationalize them, and attach evidence.
    Editor,
    /// May review but not commit events.
    Reviewer,
}

impl EditorRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            EditorRole::Admin => "admin",
            EditorRole::Senior => "senior",
            EditorRole::Editor => "editor",
            EditorRole::Reviewer => "reviewer",
        }
    }

    pub fn parse(value: &str) -> Option<EditorRole> {
        match value {
            "admin" => Some(EditorRole::Admin),
            "senior" => Some(EditorRole::Senior),
            "editor" => Some(EditorRole::Editor),
            "reviewer" => Some(EditorRole::Reviewer),
            _ => None,
        }
    }

    /// Whether this role may author the given event kind.
    ///
    /// Identity events require `admin`; resolution requires `admin` or
    /// `senior`; the remaining claim lifecycle events require any committing
    /// role. Reviewers can author nothing.
    pub fn may_author(&self, event_type: EventType) -> bool {
        match event_type {
            EventType::EditorRegistered | EventType::EditorDeactivated => {
                matches!(self, EditorRole::Admin)
            }
            EventType::ClaimResolved => {
                matches!(self, EditorRole::Admin | EditorRole::Senior)
            }
            EventType::ClaimDeclared
            | EventType::ClaimOperationalized
            | EventType::EvidenceAdded => !matches!(self, EditorRole::Reviewer),
        }
    }
}

impl std::fmt::Display for EditorRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The derived record of a registered editor.
///
/// Rebuilt by replaying `EDITOR_REGISTERED` / `EDITOR_DEACTIVATED` events.
/// Once created, `public_key` never changes — it is the accountability
/// anchor for every event this editor signs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisteredEditor {
    pub editor_id: Uuid,
    pub username: String,
    pub display_name: String,
    pub role: EditorRole,
    /// Base64 Ed25519 public key. Immutable once registered.
    pub public_key: String,
    pub is_active: bool,
    pub registered_at: DateTime<Utc>,
    /// Absent for the genesis editor only.
    pub registered_by: Option<Uuid>,
}

impl RegisteredEditor {
    /// The same record with `is_active = false`. Deactivation is terminal;
    /// there is no inverse operation.
    pub fn deactivated(&self) -> RegisteredEditor {
        RegisteredEditor {
            is_active: false,
            ..self.clone()
        }
    }
}

/// Payload of an `EDITOR_REGISTERED` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditorRegisteredPayload {
    pub editor_id: Uuid,
    pub username: String,
    pub display_name: String,
    pub role: EditorRole,
    /// Base64 Ed25519 public key being anchored.
    pub public_key: String,
    /// The registering admin. Must be absent for the genesis editor.
    pub registered_by: Option<Uuid>,
    pub rationale: Option<String>,
}

impl EditorRegisteredPayload {
    /// The canonicalizable form of this payload.
    pub fn into_payload(self) -> CanonMap {
        let mut map = CanonMap::new();
        let _ = map.insert("editor_id".into(), self.editor_id.into());
        let _ = map.insert("username".into(), self.username.into());
        let _ = map.insert("display_name".into(), self.display_name.into());
        let _ = map.insert(
            "role".into(),
            CanonValue::Enum(self.role.as_str().to_string()),
        );
        let _ = map.insert("public_key".into(), self.public_key.into());
        let _ = map.insert("registered_by".into(), self.registered_by.into());
        let _ = map.insert("rationale".into(), self.rationale.into());
        map
    }
}

/// Payload of an `EDITOR_DEACTIVATED` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditorDeactivatedPayload {
    pub editor_id: Uuid,
    pub deactivated_by: Uuid,
    pub reason: String,
}

impl EditorDeactivatedPayload {
    pub fn into_payload(self) -> CanonMap {
        let mut map = CanonMap::new();
        let _ = map.insert("editor_id".into(), self.editor_id.into());
        let _ = map.insert("deactivated_by".into(), self.deactivated_by.into());
        let _ = map.insert("reason".into(), self.reason.into());
        map
    }
}
