//! The closed set of value kinds that may enter the canonical encoding.
//!
//! `CanonValue` is an exhaustive tagged variant: anything the ledger will
//! ever hash must be expressible here, and anything not expressible here
//! (IEEE-754 floats, sets, raw bytes) is rejected at the boundary where
//! external data enters the system — not deep inside the encoder.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

use crate::error::CanonError;

/// A canonical object: string keys, sorted by Unicode codepoint.
///
/// `BTreeMap<String, _>` iterates in byte order, which for UTF-8 strings is
/// exactly codepoint order — the sorted-keys rule falls out of the type.
pub type CanonMap = BTreeMap<String, CanonValue>;

/// A value that can be canonically serialized.
#[derive(Debug, Clone, PartialEq)]
pub enum CanonValue {
    /// Omitted from the enclosing object when serialized.
    Null,
    /// JSON `true` / `false`.
    Bool(bool),
    /// JSON integer literal. Booleans are not integers here.
    Int(i64),
    /// Arbitrary-precision decimal, carried as the authored digit string.
    /// `"0.80"` and `"0.8"` are distinct values with distinct hashes.
    Decimal(String),
    /// UTF-8 string; whitespace preserved verbatim, non-ASCII escaped on output.
    Str(String),
    /// Serialized as the lowercase canonical 36-character form.
    Uuid(Uuid),
    /// Serialized as `YYYY-MM-DD`.
    Date(NaiveDate),
    /// Serialized as `YYYY-MM-DDTHH:MM:SS.ffffffZ`, six fractional digits,
    /// forced UTC. Naive instants never reach this type — see [`parse_instant`].
    Instant(DateTime<Utc>),
    /// An enumerated value, serialized as its string value (never a name).
    Enum(String),
    /// JSON array; element order preserved.
    List(Vec<CanonValue>),
    /// Nested canonical object.
    Map(CanonMap),
}

impl CanonValue {
    /// Construct a decimal value, validating the literal.
    ///
    /// Accepted: optional sign, digits, optional fractional digits, optional
    /// exponent — i.e. what `Decimal("...")` would accept. The literal is
    /// stored as authored; no normalization is performed.
    pub fn decimal(literal: impl Into<String>) -> Result<CanonValue, CanonError> {
        let literal = literal.into();
        if is_decimal_literal(&literal) {
            Ok(CanonValue::Decimal(literal))
        } else {
            Err(CanonError::InvalidDecimal { literal })
        }
    }

    /// Convert parsed JSON into a canonical value.
    ///
    /// This is the ingest boundary: JSON numbers with fractional parts or
    /// exponents are rejected here (`FloatRejected`), as are integers outside
    /// the `i64` range. JSON strings stay strings — a verifier does not need
    /// to know whether `"2024-01-15"` was authored as a date or a string,
    /// because both canonicalize to the same bytes.
    pub fn from_json(value: &serde_json::Value) -> Result<CanonValue, CanonError> {
        Self::from_json_at(value, "")
    }

    fn from_json_at(value: &serde_json::Value, path: &str) -> Result<CanonValue, CanonError> {
        match value {
            serde_json::Value::Null => Ok(CanonValue::Null),
            serde_json::Value::Bool(b) => Ok(CanonValue::Bool(*b)),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Ok(CanonValue::Int(i)),
                None => {
                    if n.is_u64() {
                        Err(CanonError::IntegerOverflow { path: path.to_string() })
                    } else {
                        Err(CanonError::FloatRejected { path: path.to_string() })
                    }
                }
            },
            serde_json::Value::String(s) => Ok(CanonValue::Str(s.clone())),
            serde_json::Value::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for (i, item) in items.iter().enumerate() {
                    out.push(Self::from_json_at(item, &format!("{path}[{i}]"))?);
                }
                Ok(CanonValue::List(out))
            }
            serde_json::Value::Object(fields) => {
                let mut out = CanonMap::new();
                for (key, item) in fields {
                    let child = if path.is_empty() {
                        key.clone()
                    } else {
                        format!("{path}.{key}")
                    };
                    let _ = out.insert(key.clone(), Self::from_json_at(item, &child)?);
                }
                Ok(CanonValue::Map(out))
            }
        }
    }

    /// Convert a JSON value that must be an object into a `CanonMap`.
    pub fn map_from_json(value: &serde_json::Value) -> Result<CanonMap, CanonError> {
        match Self::from_json(value)? {
            CanonValue::Map(map) => Ok(map),
            other => Err(CanonError::TopLevelNotObject { kind: other.kind() }),
        }
    }

    /// A short name for the value kind, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            CanonValue::Null => "null",
            CanonValue::Bool(_) => "boolean",
            CanonValue::Int(_) => "integer",
            CanonValue::Decimal(_) => "decimal",
            CanonValue::Str(_) => "string",
            CanonValue::Uuid(_) => "uuid",
            CanonValue::Date(_) => "date",
            CanonValue::Instant(_) => "instant",
            CanonValue::Enum(_) => "enum",
            CanonValue::List(_) => "list",
            CanonValue::Map(_) => "map",
        }
    }
}

/// Parse an RFC 3339 instant, rejecting naive timestamps.
///
/// A string without an offset (`2024-01-15T12:30:45`) names no absolute
/// moment and is a serialization error; anything with an offset is converted
/// to UTC.
pub fn parse_instant(value: &str) -> Result<DateTime<Utc>, CanonError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| CanonError::NaiveInstant { value: value.to_string() })
}

/// Format an instant in the canonical form: UTC, six fractional digits.
pub fn format_instant(instant: &DateTime<Utc>) -> String {
    // SecondsFormat::Micros always emits exactly six fractional digits.
    instant.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn is_decimal_literal(s: &str) -> bool {
    let rest = s.strip_prefix(['+', '-']).unwrap_or(s);
    if rest.is_empty() {
        return false;
    }
    let (mantissa, exponent) = match rest.split_once(['e', 'E']) {
        Some((m, e)) => (m, Some(e)),
        None => (rest, None),
    };
    let (int_part, frac_part) = match mantissa.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (mantissa, None),
    };
    let digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    let mantissa_ok = match frac_part {
        Some(f) => (digits(int_part) && digits(f)) || (int_part.is_empty() && digits(f)),
        None => digits(int_part),
    };
    let exponent_ok = match exponent {
        Some(e) => digits(e.strip_prefix(['+', '-']).unwrap_or(e)),
        None => true,
    };
    mantissa_ok && exponent_ok
}

// ── Serde ─────────────────────────────────────────────────────────────────────
//
// Serialization emits the canonicalizer's *output conventions* for scalar
// types (lowercase UUIDs, canonical instant format, decimals as strings), so
// a payload stored as JSON and later re-canonicalized via `from_json`
// produces the same canonical bytes — and therefore the same hash.

impl Serialize for CanonValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            CanonValue::Null => serializer.serialize_none(),
            CanonValue::Bool(b) => serializer.serialize_bool(*b),
            CanonValue::Int(i) => serializer.serialize_i64(*i),
            CanonValue::Decimal(d) => serializer.serialize_str(d),
            CanonValue::Str(s) => serializer.serialize_str(s),
            CanonValue::Uuid(u) => serializer.collect_str(u),
            CanonValue::Date(d) => serializer.collect_str(&d.format("%Y-%m-%d")),
            CanonValue::Instant(t) => serializer.serialize_str(&format_instant(t)),
            CanonValue::Enum(e) => serializer.serialize_str(e),
            CanonValue::List(items) => items.serialize(serializer),
            CanonValue::Map(map) => map.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for CanonValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = serde_json::Value::deserialize(deserializer)?;
        CanonValue::from_json(&raw).map_err(D::Error::custom)
    }
}

// ── Conversions ───────────────────────────────────────────────────────────────

impl From<bool> for CanonValue {
    fn from(v: bool) -> Self {
        CanonValue::Bool(v)
    }
}

impl From<i64> for CanonValue {
    fn from(v: i64) -> Self {
        CanonValue::Int(v)
    }
}

impl From<&str> for CanonValue {
    fn from(v: &str) -> Self {
        CanonValue::Str(v.to_string())
    }
}

impl From<String> for CanonValue {
    fn from(v: String) -> Self {
        CanonValue::Str(v)
    }
}

impl From<Uuid> for CanonValue {
    fn from(v: Uuid) -> Self {
        CanonValue::Uuid(v)
    }
}

impl From<NaiveDate> for CanonValue {
    fn from(v: NaiveDate) -> Self {
        CanonValue::Date(v)
    }
}

impl From<DateTime<Utc>> for CanonValue {
    fn from(v: DateTime<Utc>) -> Self {
        CanonValue::Instant(v)
    }
}

impl From<Vec<CanonValue>> for CanonValue {
    fn from(v: Vec<CanonValue>) -> Self {
        CanonValue::List(v)
    }
}

impl From<CanonMap> for CanonValue {
    fn from(v: CanonMap) -> Self {
        CanonValue::Map(v)
    }
}

impl<T: Into<CanonValue>> From<Option<T>> for CanonValue {
    /// `None` becomes `Null`, which the encoder omits — so optional payload
    /// fields can be inserted unconditionally.
    fn from(v: Option<T>) -> Self {
        match v {
            Some(inner) => inner.into(),
            None => CanonValue::Null,
        }
    }
}
