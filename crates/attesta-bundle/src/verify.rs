//! Standalone bundle verification.
//!
//! Works on the raw JSON document — deliberately not on the ledger's own
//! types — so the verdict is an independent reconstruction: structural
//! completeness, hash recomputation, chain linkage, signatures, and Merkle
//! proof replay. No server access, no store access; verification is
//! cryptographic or it is nothing.
//!
//! All content checks are accumulated before returning, so a report shows
//! the full failure set rather than only the first problem found.

use std::path::Path;

use serde_json::Value;

use attesta_anchor::MerkleTree;
use attesta_canon::{verify_event_hash, CanonValue};
use attesta_contracts::MerkleProof;

/// The verifier's verdict. Exit codes are contractual.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Every check passed.
    Verified,
    /// A hash, signature, or proof did not verify.
    Tampered,
    /// Required data is missing (editor, required fields).
    Incomplete,
    /// The document is unreadable or structurally wrong.
    InvalidFormat,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Verified => "VERIFIED",
            Verdict::Tampered => "TAMPERED",
            Verdict::Incomplete => "INCOMPLETE",
            Verdict::InvalidFormat => "INVALID_FORMAT",
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            Verdict::Verified => 0,
            Verdict::Tampered => 1,
            Verdict::Incomplete => 2,
            Verdict::InvalidFormat => 3,
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The full verification report.
#[derive(Debug, Clone)]
pub struct BundleReport {
    pub verdict: Verdict,
    pub checks_passed: Vec<String>,
    pub checks_failed: Vec<String>,
    pub warnings: Vec<String>,
}

impl BundleReport {
    fn conclude(verdict: Verdict, mut report: BundleReport) -> BundleReport {
        report.verdict = verdict;
        report
    }

    fn empty() -> BundleReport {
        BundleReport {
            verdict: Verdict::Verified,
            checks_passed: Vec::new(),
            checks_failed: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Machine-readable form for `--json` output.
    pub fn to_json(&self) -> Value {
        serde_json::json!({
            "verdict": self.verdict.as_str(),
            "exit_code": self.verdict.exit_code(),
            "checks_passed": self.checks_passed,
            "checks_failed": self.checks_failed,
            "warnings": self.warnings,
        })
    }
}

/// Verify a bundle file on disk.
pub fn verify_bundle_file(path: &Path) -> BundleReport {
    let mut report = BundleReport::empty();

    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) => {
            report.checks_failed.push(format!("bundle not readable: {e}"));
            return BundleReport::conclude(Verdict::InvalidFormat, report);
        }
    };
    let bundle: Value = match serde_json::from_str(&raw) {
        Ok(value) => value,
        Err(e) => {
            report.checks_failed.push(format!("bundle is not valid JSON: {e}"));
            return BundleReport::conclude(Verdict::InvalidFormat, report);
        }
    };
    verify_bundle_value(&bundle)
}

/// Verify an already-parsed bundle document.
pub fn verify_bundle_value(bundle: &Value) -> BundleReport {
    let mut report = BundleReport::empty();

    // ── Step 1: structure ─────────────────────────────────────────────────────

    let Some(top) = bundle.as_object() else {
        report.checks_failed.push("top level is not an object".to_string());
        return BundleReport::conclude(Verdict::InvalidFormat, report);
    };
    for key in ["_meta", "_verification", "claim", "events"] {
        if !top.contains_key(key) {
            report.checks_failed.push(format!("missing top-level key '{key}'"));
        }
    }
    if !report.checks_failed.is_empty() {
        return BundleReport::conclude(Verdict::InvalidFormat, report);
    }

    let Some(events) = top["events"].as_array() else {
        report.checks_failed.push("'events' is not an array".to_string());
        return BundleReport::conclude(Verdict::InvalidFormat, report);
    };
    if events.is_empty() {
        report.checks_failed.push("bundle contains no events".to_string());
        return BundleReport::conclude(Verdict::InvalidFormat, report);
    }
    report.checks_passed.push("structure: required keys present".to_string());

    // The editors section is completeness, not structure: a bundle without
    // it is well-formed JSON that cannot be fully verified.
    let editors = match top.get("editors").and_then(Value::as_object) {
        Some(editors) => editors,
        None => {
            report
                .checks_failed
                .push("missing or invalid 'editors' section".to_string());
            return BundleReport::conclude(Verdict::Incomplete, report);
        }
    };

    // Required event fields and editor resolvability.
    let mut incomplete = false;
    for (i, event) in events.iter().enumerate() {
        for field in ["sequence_number", "event_hash", "editor_signature", "payload", "created_by"] {
            if event.get(field).is_none() {
                report
                    .checks_failed
                    .push(format!("event {i}: missing required field '{field}'"));
                incomplete = true;
            }
        }
        match event.get("created_by").map(Value::as_str) {
            Some(Some(created_by)) => {
                let resolvable = editors
                    .get(created_by)
                    .and_then(|e| e.get("public_key"))
                    .and_then(Value::as_str)
                    .is_some();
                if !resolvable {
                    report
                        .checks_failed
                        .push(format!("event {i}: editor '{created_by}' not present in editors"));
                    incomplete = true;
                }
            }
            Some(None) => {
                report
                    .checks_failed
                    .push(format!("event {i}: created_by is not a string"));
                incomplete = true;
            }
            None => {} // already reported as a missing field
        }
    }
    if incomplete {
        return BundleReport::conclude(Verdict::Incomplete, report);
    }
    report
        .checks_passed
        .push(format!("completeness: {} events, all editors resolvable", events.len()));

    // ── Steps 2–5: content ────────────────────────────────────────────────────

    let mut previous: Option<(i64, String)> = None; // (sequence, event_hash)

    for (i, event) in events.iter().enumerate() {
        let sequence = event["sequence_number"].as_i64().unwrap_or(-1);
        let stored_hash = event["event_hash"].as_str().unwrap_or_default().to_string();
        let prev_hash = event.get("previous_event_hash").and_then(Value::as_str);

        // Step 2: recompute the event hash from the payload.
        let payload_ok = match CanonValue::map_from_json(&event["payload"]) {
            Ok(payload) => verify_event_hash(&payload, &stored_hash, prev_hash),
            Err(_) => false,
        };
        if payload_ok {
            report.checks_passed.push(format!("event {i} (seq {sequence}): hash verified"));
        } else {
            report.checks_failed.push(format!(
                "event {i} (seq {sequence}): recomputed hash does not match stored event_hash"
            ));
        }

        // Step 3: linkage and ordering.
        match &previous {
            None => {
                if prev_hash.is_some() && sequence == 0 {
                    report.checks_failed.push(
                        "event 0: genesis event must not carry previous_event_hash".to_string(),
                    );
                }
            }
            Some((prev_seq, prev_event_hash)) => {
                if sequence <= *prev_seq {
                    report.checks_failed.push(format!(
                        "event {i}: sequence {sequence} not increasing after {prev_seq}"
                    ));
                } else if sequence == prev_seq + 1 {
                    if prev_hash != Some(prev_event_hash.as_str()) {
                        report.checks_failed.push(format!(
                            "event {i} (seq {sequence}): previous_event_hash does not match event {}",
                            i - 1
                        ));
                    }
                } else {
                    // A filtered view: other entities' events sit in the gap,
                    // so linkage to the preceding bundle event is not checkable.
                    report.warnings.push(format!(
                        "sequence gap between {prev_seq} and {sequence}: filtered view, linkage not verified across the gap"
                    ));
                }
            }
        }

        // Step 4: the editor signature over the hash string.
        let created_by = event["created_by"].as_str().unwrap_or_default();
        let public_key = editors
            .get(created_by)
            .and_then(|e| e.get("public_key"))
            .and_then(Value::as_str)
            .unwrap_or_default();
        let signature = event["editor_signature"].as_str().unwrap_or_default();
        if attesta_signer::verify(&stored_hash, signature, public_key) {
            report
                .checks_passed
                .push(format!("event {i} (seq {sequence}): signature verified"));
        } else {
            report.checks_failed.push(format!(
                "event {i} (seq {sequence}): editor signature does not verify"
            ));
        }

        // Step 5: replay any attached inclusion proof.
        if let Some(proof_value) = event.get("merkle_proof") {
            if !proof_value.is_null() {
                match serde_json::from_value::<MerkleProof>(proof_value.clone()) {
                    Ok(proof) => {
                        let leaf_matches =
                            proof.event_hash.eq_ignore_ascii_case(&stored_hash);
                        let replays = MerkleTree::verify_proof(
                            &proof.event_hash,
                            &proof.proof_hashes,
                            &proof.proof_directions,
                            &proof.merkle_root,
                        );
                        if leaf_matches && replays {
                            report.checks_passed.push(format!(
                                "event {i} (seq {sequence}): merkle proof replays to root"
                            ));
                        } else {
                            report.checks_failed.push(format!(
                                "event {i} (seq {sequence}): merkle proof does not verify"
                            ));
                        }
                    }
                    Err(e) => {
                        report
                            .checks_failed
                            .push(format!("event {i} (seq {sequence}): malformed merkle proof: {e}"));
                    }
                }
            }
        }

        previous = Some((sequence, stored_hash));
    }

    let verdict = if report.checks_failed.is_empty() {
        Verdict::Verified
    } else {
        Verdict::Tampered
    };
    BundleReport::conclude(verdict, report)
}
