//! # attesta-canon
//!
//! Deterministic, versioned canonical serialization and SHA-256 hashing for
//! the attesta ledger. This is the load-bearing contract of the whole
//! system: hashes and signatures stay verifiable only as long as the same
//! logical payload produces the same bytes — on every platform, forever.
//!
//! ## Canonical rules
//!
//! 1. A `__canon_v` version marker is injected into every top-level object.
//! 2. Object keys are sorted recursively (Unicode codepoint order).
//! 3. Null fields are omitted; empty strings/lists/objects are preserved.
//! 4. Instants are forced to UTC with exactly six fractional digits.
//! 5. Dates are `YYYY-MM-DD`; UUIDs are lowercase; enums use their value.
//! 6. IEEE-754 floats, sets, and bytes are rejected at the ingest boundary.
//! 7. Decimals are carried as authored strings (`"0.80"` ≠ `"0.8"`).
//! 8. Output is compact JSON, ASCII-only, no NaN/Infinity.
//!
//! Changing any of these rules requires incrementing [`CANON_VERSION`];
//! events hashed under earlier versions remain verifiable because their
//! canonical bytes begin with `{"__canon_v":N,…}`.

pub mod encode;
pub mod error;
pub mod hash;
pub mod value;

pub use encode::{canonical_bytes, canonical_string, CANON_VERSION, VERSION_KEY};
pub use error::CanonError;
pub use hash::{hash_event, hash_payload, normalize_hash, verify_event_hash};
pub use value::{format_instant, parse_instant, CanonMap, CanonValue};

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use uuid::Uuid;

    use super::*;

    // ── Helpers ───────────────────────────────────────────────────────────────

    fn map(entries: Vec<(&str, CanonValue)>) -> CanonMap {
        entries
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect()
    }

    fn instant(s: &str) -> CanonValue {
        CanonValue::Instant(parse_instant(s).unwrap())
    }

    // ── Golden vector ─────────────────────────────────────────────────────────

    /// The pinned canonical format. This test must never change: the expected
    /// string and hash were computed once and document the exact byte format
    /// every stored event hash depends on.
    #[test]
    fn golden_canonical_vector() {
        let payload = map(vec![
            ("string", "hello".into()),
            ("integer", 42i64.into()),
            ("decimal", CanonValue::decimal("3.14159").unwrap()),
            ("boolean", true.into()),
            ("null_omitted", CanonValue::Null),
            (
                "uuid",
                Uuid::parse_str("550e8400-e29b-41d4-a716-446655440000")
                    .unwrap()
                    .into(),
            ),
            (
                "date",
                NaiveDate::from_ymd_opt(2024, 1, 15).unwrap().into(),
            ),
            ("datetime", instant("2024-01-15T12:30:45.123456Z")),
            (
                "nested",
                CanonValue::Map(map(vec![
                    ("z_key", "last".into()),
                    ("a_key", "first".into()),
                ])),
            ),
            (
                "list",
                CanonValue::List(vec![1i64.into(), 2i64.into(), 3i64.into()]),
            ),
            ("empty_string", "".into()),
            ("empty_list", CanonValue::List(vec![])),
        ]);

        let canonical = canonical_string(&payload).unwrap();

        const EXPECTED_CANONICAL: &str = concat!(
            "{\"__canon_v\":1,\"boolean\":true,\"date\":\"2024-01-15\",",
            "\"datetime\":\"2024-01-15T12:30:45.123456Z\",\"decimal\":\"3.14159\",",
            "\"empty_list\":[],\"empty_string\":\"\",\"integer\":42,\"list\":[1,2,3],",
            "\"nested\":{\"a_key\":\"first\",\"z_key\":\"last\"},\"string\":\"hello\",",
            "\"uuid\":\"550e8400-e29b-41d4-a716-446655440000\"}",
        );
        const EXPECTED_HASH: &str =
            "8cdaf50a263888f11b2c3404ce14c8012641db34e98994e55fbb3989e8ee09cc";

        assert_eq!(canonical, EXPECTED_CANONICAL, "canonical format drifted");
        assert!(!canonical.contains("null_omitted"), "nulls must be omitted");
        assert!(!canonical.contains(' '), "no separator whitespace allowed");
        assert!(canonical.starts_with("{\"__canon_v\":1,"));
        assert_eq!(hash_payload(&payload).unwrap(), EXPECTED_HASH);
    }

    // ── Encoding rules ────────────────────────────────────────────────────────

    /// The same payload canonicalizes to the same bytes on every call.
    #[test]
    fn deterministic_bytes() {
        let payload = map(vec![
            ("b", 2i64.into()),
            ("a", 1i64.into()),
            ("c", CanonValue::List(vec!["x".into(), "y".into()])),
        ]);
        assert_eq!(
            canonical_bytes(&payload).unwrap(),
            canonical_bytes(&payload).unwrap()
        );
    }

    /// Keys are sorted recursively, not just at the top level.
    #[test]
    fn keys_sorted_recursively() {
        let payload = map(vec![(
            "outer",
            CanonValue::Map(map(vec![("zz", 1i64.into()), ("aa", 2i64.into())])),
        )]);
        let s = canonical_string(&payload).unwrap();
        assert_eq!(s, "{\"__canon_v\":1,\"outer\":{\"aa\":2,\"zz\":1}}");
    }

    /// A null field and an absent field canonicalize identically.
    #[test]
    fn null_fields_dropped() {
        let with_null = map(vec![("keep", 1i64.into()), ("gone", CanonValue::Null)]);
        let without = map(vec![("keep", 1i64.into())]);
        assert_eq!(
            canonical_bytes(&with_null).unwrap(),
            canonical_bytes(&without).unwrap()
        );
    }

    /// Empty strings, lists, and objects are valid data and must survive.
    #[test]
    fn empties_preserved() {
        let payload = map(vec![
            ("s", "".into()),
            ("l", CanonValue::List(vec![])),
            ("m", CanonValue::Map(CanonMap::new())),
        ]);
        assert_eq!(
            canonical_string(&payload).unwrap(),
            "{\"__canon_v\":1,\"l\":[],\"m\":{},\"s\":\"\"}"
        );
    }

    /// Non-ASCII characters escape as `\uXXXX`, astral characters as
    /// surrogate pairs — the `ensure_ascii` convention.
    #[test]
    fn non_ascii_escaped() {
        let payload = map(vec![("text", "héllo 🎯".into())]);
        let s = canonical_string(&payload).unwrap();
        assert_eq!(
            s,
            "{\"__canon_v\":1,\"text\":\"h\\u00e9llo \\ud83c\\udfaf\"}"
        );
        assert!(s.is_ascii());
    }

    /// Whitespace inside strings is data and is preserved verbatim.
    #[test]
    fn string_whitespace_preserved() {
        let payload = map(vec![("text", "  spaced\tout  ".into())]);
        let s = canonical_string(&payload).unwrap();
        assert!(s.contains("  spaced\\tout  "));
    }

    /// Decimals keep their authored form: a trailing zero is significant.
    #[test]
    fn decimal_trailing_zero_significant() {
        let a = map(vec![("v", CanonValue::decimal("0.80").unwrap())]);
        let b = map(vec![("v", CanonValue::decimal("0.8").unwrap())]);
        assert_ne!(hash_payload(&a).unwrap(), hash_payload(&b).unwrap());
    }

    /// A malformed decimal literal is rejected at construction.
    #[test]
    fn invalid_decimal_rejected() {
        assert!(CanonValue::decimal("3.14").is_ok());
        assert!(CanonValue::decimal("-0.5").is_ok());
        assert!(CanonValue::decimal("1e9").is_ok());
        assert!(matches!(
            CanonValue::decimal("not-a-number"),
            Err(CanonError::InvalidDecimal { .. })
        ));
        assert!(CanonValue::decimal("").is_err());
        assert!(CanonValue::decimal("1.2.3").is_err());
    }

    /// An instant at microsecond zero still emits six fractional digits.
    #[test]
    fn instant_zero_microseconds_padded() {
        let payload = map(vec![("t", instant("2024-06-01T00:00:00Z"))]);
        let s = canonical_string(&payload).unwrap();
        assert!(s.contains("2024-06-01T00:00:00.000000Z"), "got: {s}");
    }

    /// Instants with a non-UTC offset are normalized to UTC.
    #[test]
    fn instant_normalized_to_utc() {
        let payload = map(vec![("t", instant("2024-01-15T14:30:45.123456+02:00"))]);
        let s = canonical_string(&payload).unwrap();
        assert!(s.contains("2024-01-15T12:30:45.123456Z"), "got: {s}");
    }

    /// A timestamp string with no offset names no absolute moment.
    #[test]
    fn naive_instant_rejected() {
        assert!(matches!(
            parse_instant("2024-01-15T12:30:45"),
            Err(CanonError::NaiveInstant { .. })
        ));
    }

    /// Enum values serialize as their string value.
    #[test]
    fn enum_uses_value() {
        let payload = map(vec![("status", CanonValue::Enum("declared".to_string()))]);
        assert_eq!(
            canonical_string(&payload).unwrap(),
            "{\"__canon_v\":1,\"status\":\"declared\"}"
        );
    }

    /// The reserved version key may not appear in a payload.
    #[test]
    fn reserved_key_rejected() {
        let payload = map(vec![(VERSION_KEY, 99i64.into())]);
        assert!(matches!(
            canonical_bytes(&payload),
            Err(CanonError::ReservedKey { .. })
        ));
    }

    // ── Ingest boundary ───────────────────────────────────────────────────────

    /// JSON numbers with fractional parts are floats and are refused.
    #[test]
    fn fractional_json_number_rejected() {
        let raw = serde_json::json!({ "confidence": 0.8 });
        assert!(matches!(
            CanonValue::map_from_json(&raw),
            Err(CanonError::FloatRejected { .. })
        ));
    }

    /// Integers beyond i64 are refused rather than silently rounded.
    #[test]
    fn oversized_integer_rejected() {
        let raw = serde_json::json!({ "big": u64::MAX });
        assert!(matches!(
            CanonValue::map_from_json(&raw),
            Err(CanonError::IntegerOverflow { .. })
        ));
    }

    /// A non-object top level is a serialization error.
    #[test]
    fn top_level_must_be_object() {
        let raw = serde_json::json!([1, 2, 3]);
        assert!(matches!(
            CanonValue::map_from_json(&raw),
            Err(CanonError::TopLevelNotObject { .. })
        ));
    }

    /// Serialize → parse → re-canonicalize produces identical bytes.
    #[test]
    fn json_round_trip_stable() {
        let payload = map(vec![
            (
                "uuid",
                Uuid::parse_str("550e8400-e29b-41d4-a716-446655440000")
                    .unwrap()
                    .into(),
            ),
            ("when", instant("2024-01-15T12:30:45.123456Z")),
            ("score", CanonValue::decimal("0.80").unwrap()),
            ("note", "héllo".into()),
            ("n", 7i64.into()),
        ]);
        let first = canonical_bytes(&payload).unwrap();

        // Store the payload as plain JSON (the output conventions), read it
        // back, and canonicalize again — as the bundle verifier does.
        let stored = serde_json::to_value(CanonValue::Map(payload)).unwrap();
        let reparsed = CanonValue::map_from_json(&stored).unwrap();
        let second = canonical_bytes(&reparsed).unwrap();

        assert_eq!(first, second);
    }

    // ── Chain hashing ─────────────────────────────────────────────────────────

    /// Genesis input is the canonical bytes; chained input is `prev:bytes`.
    #[test]
    fn chain_hash_linkage() {
        let payload = map(vec![("k", "v".into())]);
        let genesis = hash_event(&payload, None).unwrap();
        let chained = hash_event(&payload, Some(&genesis)).unwrap();
        assert_ne!(genesis, chained);
        assert_eq!(genesis, hash_payload(&payload).unwrap());
    }

    /// A previous hash in uppercase normalizes to the same chain input.
    #[test]
    fn previous_hash_case_insensitive() {
        let payload = map(vec![("k", "v".into())]);
        let prev = hash_event(&payload, None).unwrap();
        let lower = hash_event(&payload, Some(&prev)).unwrap();
        let upper = hash_event(&payload, Some(&prev.to_ascii_uppercase())).unwrap();
        assert_eq!(lower, upper);
    }

    /// Anything that is not 64 hex characters is an invalid previous hash.
    #[test]
    fn malformed_previous_hash_rejected() {
        let payload = map(vec![("k", "v".into())]);
        for bad in ["", "abc", &"z".repeat(64), &"a".repeat(63)] {
            assert!(
                matches!(
                    hash_event(&payload, Some(bad)),
                    Err(CanonError::InvalidPreviousHash { .. })
                ),
                "expected rejection for {bad:?}"
            );
        }
    }

    /// `verify_event_hash` accepts the stored hash in either case and fails
    /// closed on mismatch.
    #[test]
    fn verify_event_hash_round_trip() {
        let payload = map(vec![("k", "v".into())]);
        let hash = hash_event(&payload, None).unwrap();
        assert!(verify_event_hash(&payload, &hash, None));
        assert!(verify_event_hash(&payload, &hash.to_ascii_uppercase(), None));

        let tampered = map(vec![("k", "V".into())]);
        assert!(!verify_event_hash(&tampered, &hash, None));
    }

    // ── Property tests ────────────────────────────────────────────────────────

    mod properties {
        use proptest::collection::{btree_map, vec};
        use proptest::prelude::*;

        use super::super::*;

        /// Scalar values that can appear in a generated payload.
        fn scalar() -> impl Strategy<Value = CanonValue> {
            prop_oneof![
                Just(CanonValue::Null),
                any::<bool>().prop_map(CanonValue::Bool),
                any::<i64>().prop_map(CanonValue::Int),
                "[0-9]{1,6}\\.[0-9]{1,4}".prop_map(CanonValue::Decimal),
                any::<String>().prop_map(CanonValue::Str),
            ]
        }

        fn value() -> impl Strategy<Value = CanonValue> {
            scalar().prop_recursive(3, 24, 6, |inner| {
                prop_oneof![
                    vec(inner.clone(), 0..4).prop_map(CanonValue::List),
                    btree_map("[a-z_]{1,8}", inner, 0..4).prop_map(CanonValue::Map),
                ]
            })
        }

        fn payload() -> impl Strategy<Value = CanonMap> {
            btree_map("[a-z_]{1,8}", value(), 0..6)
        }

        proptest! {
            /// Canonical bytes are identical across repeated calls.
            #[test]
            fn canonicalization_is_deterministic(p in payload()) {
                prop_assert_eq!(canonical_bytes(&p).unwrap(), canonical_bytes(&p).unwrap());
            }

            /// Dropping a null field leaves the canonical bytes unchanged.
            #[test]
            fn null_drop_is_identity(mut p in payload(), key in "[a-z]{1,8}") {
                let without = canonical_bytes(&p).unwrap();
                if !p.contains_key(&key) {
                    let _ = p.insert(key, CanonValue::Null);
                    let with_null = canonical_bytes(&p).unwrap();
                    prop_assert_eq!(without, with_null);
                }
            }

            /// Serialize → parse → re-canonicalize is byte-stable.
            #[test]
            fn round_trip_is_byte_stable(p in payload()) {
                let first = canonical_bytes(&p).unwrap();
                let stored = serde_json::to_value(CanonValue::Map(p)).unwrap();
                let reparsed = CanonValue::map_from_json(&stored).unwrap();
                prop_assert_eq!(first, canonical_bytes(&reparsed).unwrap());
            }

            /// The output is always pure ASCII.
            #[test]
            fn output_is_ascii(p in payload()) {
                prop_assert!(canonical_bytes(&p).unwrap().is_ascii());
            }
        }
    }
}
