//! Typed access into stored payload maps.
//!
//! Projections are rebuilt from payloads that may have round-tripped through
//! JSON, so a UUID can arrive either as `CanonValue::Uuid` (freshly built)
//! or as a string (reloaded). These helpers accept both and fail with a
//! chain-integrity diagnostic naming the missing or malformed field.

use uuid::Uuid;

use attesta_canon::{CanonMap, CanonValue};
use attesta_contracts::{LedgerError, LedgerResult};

fn missing(key: &str) -> LedgerError {
    LedgerError::Chain {
        reason: format!("payload field '{key}' is missing or malformed"),
    }
}

/// A required string-like field (string, enum value, or decimal literal).
pub(crate) fn get_str<'a>(payload: &'a CanonMap, key: &str) -> LedgerResult<&'a str> {
    match payload.get(key) {
        Some(CanonValue::Str(s)) | Some(CanonValue::Enum(s)) | Some(CanonValue::Decimal(s)) => {
            Ok(s)
        }
        _ => Err(missing(key)),
    }
}

/// A required UUID field.
pub(crate) fn get_uuid(payload: &CanonMap, key: &str) -> LedgerResult<Uuid> {
    match payload.get(key) {
        Some(CanonValue::Uuid(u)) => Ok(*u),
        Some(CanonValue::Str(s)) => Uuid::parse_str(s).map_err(|_| missing(key)),
        _ => Err(missing(key)),
    }
}

/// An optional UUID field. Absent and null are both `None`.
pub(crate) fn get_opt_uuid(payload: &CanonMap, key: &str) -> LedgerResult<Option<Uuid>> {
    match payload.get(key) {
        None | Some(CanonValue::Null) => Ok(None),
        _ => get_uuid(payload, key).map(Some),
    }
}

/// A required list of UUIDs.
pub(crate) fn get_uuid_list(payload: &CanonMap, key: &str) -> LedgerResult<Vec<Uuid>> {
    match payload.get(key) {
        Some(CanonValue::List(items)) => items
            .iter()
            .map(|item| match item {
                CanonValue::Uuid(u) => Ok(*u),
                CanonValue::Str(s) => Uuid::parse_str(s).map_err(|_| missing(key)),
                _ => Err(missing(key)),
            })
            .collect(),
        _ => Err(missing(key)),
    }
}
