//! The canonical byte encoding.
//!
//! Output is JSON with no separator whitespace, keys sorted everywhere,
//! ASCII-only (non-ASCII characters escaped as `\uXXXX`), and a `__canon_v`
//! version marker injected at the top level. The marker makes every hash
//! self-describing: a future format change bumps [`CANON_VERSION`] and old
//! events stay verifiable under the rules their marker names.

use std::io;

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

use crate::error::CanonError;
use crate::value::{format_instant, CanonMap, CanonValue};

/// Current canonical serialization version.
///
/// Increment on any behavior-changing modification to the encoding rules.
pub const CANON_VERSION: u32 = 1;

/// The reserved top-level key carrying the serialization version.
pub const VERSION_KEY: &str = "__canon_v";

/// Encode a payload to its canonical byte string.
///
/// The top-level value must be an object (enforced by the `CanonMap` input
/// type); the reserved version key may not appear in the payload itself.
/// Fields whose value is `Null` are omitted; empty strings, lists, and
/// objects are preserved.
pub fn canonical_bytes(payload: &CanonMap) -> Result<Vec<u8>, CanonError> {
    if payload.contains_key(VERSION_KEY) {
        return Err(CanonError::ReservedKey {
            key: VERSION_KEY.to_string(),
        });
    }

    let mut buf = Vec::new();
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, AsciiFormatter);
    TopLevel(payload).serialize(&mut ser)?;
    Ok(buf)
}

/// Encode a payload to its canonical string (UTF-8 view of the bytes).
pub fn canonical_string(payload: &CanonMap) -> Result<String, CanonError> {
    let bytes = canonical_bytes(payload)?;
    // The encoder only ever emits ASCII.
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

// ── Serialization wrappers ────────────────────────────────────────────────────

/// The top-level object with the version marker merged into key order.
struct TopLevel<'a>(&'a CanonMap);

impl Serialize for TopLevel<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        let mut marker_written = false;
        for (key, value) in self.0 {
            // BTreeMap iterates in codepoint order; the marker slots into
            // that order like any other key.
            if !marker_written && VERSION_KEY < key.as_str() {
                map.serialize_entry(VERSION_KEY, &CANON_VERSION)?;
                marker_written = true;
            }
            if !matches!(value, CanonValue::Null) {
                map.serialize_entry(key, &Emit(value))?;
            }
        }
        if !marker_written {
            map.serialize_entry(VERSION_KEY, &CANON_VERSION)?;
        }
        map.end()
    }
}

/// Recursive canonical emission: null fields dropped from objects, null
/// elements inside lists preserved as JSON `null` (they are positional data).
struct Emit<'a>(&'a CanonValue);

impl Serialize for Emit<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.0 {
            CanonValue::Null => serializer.serialize_none(),
            CanonValue::Bool(b) => serializer.serialize_bool(*b),
            CanonValue::Int(i) => serializer.serialize_i64(*i),
            CanonValue::Decimal(d) => serializer.serialize_str(d),
            CanonValue::Str(s) => serializer.serialize_str(s),
            CanonValue::Uuid(u) => serializer.collect_str(u),
            CanonValue::Date(d) => serializer.collect_str(&d.format("%Y-%m-%d")),
            CanonValue::Instant(t) => serializer.serialize_str(&format_instant(t)),
            CanonValue::Enum(e) => serializer.serialize_str(e),
            CanonValue::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(&Emit(item))?;
                }
                seq.end()
            }
            CanonValue::Map(fields) => {
                let mut map = serializer.serialize_map(None)?;
                for (key, value) in fields {
                    if !matches!(value, CanonValue::Null) {
                        map.serialize_entry(key, &Emit(value))?;
                    }
                }
                map.end()
            }
        }
    }
}

// ── ASCII-only formatter ──────────────────────────────────────────────────────

/// Compact JSON with non-ASCII characters escaped as `\uXXXX`.
///
/// serde_json's default (compact) formatting already matches the canonical
/// rules for separators and control-character escapes; the only divergence is
/// that it passes non-ASCII characters through raw. This formatter escapes
/// them as UTF-16 code units (surrogate pairs for astral characters), which
/// is the `ensure_ascii` behavior the stored hashes were computed under.
struct AsciiFormatter;

impl serde_json::ser::Formatter for AsciiFormatter {
    fn write_string_fragment<W>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        let mut start = 0;
        for (index, ch) in fragment.char_indices() {
            if ch.is_ascii() {
                continue;
            }
            if start < index {
                writer.write_all(fragment[start..index].as_bytes())?;
            }
            let mut units = [0u16; 2];
            for unit in ch.encode_utf16(&mut units) {
                write!(writer, "\\u{unit:04x}")?;
            }
            start = index + ch.len_utf8();
        }
        writer.write_all(fragment[start..].as_bytes())
    }
}
