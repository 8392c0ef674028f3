//! Claim lifecycle types and event payloads.
//!
//! A claim is a future-addressable statement: if it cannot be evaluated
//! later, it does not belong in the ledger. Claims move through exactly one
//! path — declared → operationalized → observing → resolved — and the only
//! way to move is a committed event.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use attesta_canon::{CanonMap, CanonValue};

/// Lifecycle status of a claim. No shortcuts, no reversals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClaimStatus {
    /// Initial registration.
    Declared,
    /// Metrics and evaluation criteria have been defined.
    Operationalized,
    /// Evidence is being collected.
    Observing,
    /// A final determination has been made.
    Resolved,
}

impl ClaimStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClaimStatus::Declared => "declared",
            ClaimStatus::Operationalized => "operationalized",
            ClaimStatus::Observing => "observing",
            ClaimStatus::Resolved => "resolved",
        }
    }

    pub fn parse(value: &str) -> Option<ClaimStatus> {
        match value {
            "declared" => Some(ClaimStatus::Declared),
            "operationalized" => Some(ClaimStatus::Operationalized),
            "observing" => Some(ClaimStatus::Observing),
            "resolved" => Some(ClaimStatus::Resolved),
            _ => None,
        }
    }
}

impl std::fmt::Display for ClaimStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final resolution states. No shaming, no dunking — record-keeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    /// Outcome matched expectations.
    Met,
    /// Partial alignment.
    PartiallyMet,
    /// Outcome diverged.
    NotMet,
    /// Insufficient evidence to decide.
    Inconclusive,
}

impl Resolution {
    pub fn as_str(&self) -> &'static str {
        match self {
            Resolution::Met => "met",
            Resolution::PartiallyMet => "partially_met",
            Resolution::NotMet => "not_met",
            Resolution::Inconclusive => "inconclusive",
        }
    }
}

/// Claim typing prevents goalpost shifting: how a claim is evaluated is
/// fixed when it is declared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClaimType {
    /// "X will happen."
    Predictive,
    /// "X will cause Y."
    Causal,
    /// "We did X because Y."
    Justificatory,
    /// "This will prevent X."
    Preventative,
    /// "X is better than Y."
    Comparative,
}

impl ClaimType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClaimType::Predictive => "predictive",
            ClaimType::Causal => "causal",
            ClaimType::Justificatory => "justificatory",
            ClaimType::Preventative => "preventative",
            ClaimType::Comparative => "comparative",
        }
    }
}

/// Payload of a `CLAIM_DECLARED` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimDeclaredPayload {
    pub claim_id: Uuid,
    /// Verbatim or near-verbatim claim text.
    pub statement: String,
    /// Context in which the statement was made.
    pub statement_context: String,
    /// Who made the claim (free-form: person or institution).
    pub claimant: String,
    pub claim_type: ClaimType,
    /// When the claim was made — not when it was entered.
    pub declared_at: DateTime<Utc>,
    /// Primary source for the statement.
    pub source_url: String,
    pub initial_status: ClaimStatus,
}

impl ClaimDeclaredPayload {
    pub fn into_payload(self) -> CanonMap {
        let mut map = CanonMap::new();
        let _ = map.insert("claim_id".into(), self.claim_id.into());
        let _ = map.insert("statement".into(), self.statement.into());
        let _ = map.insert("statement_context".into(), self.statement_context.into());
        let _ = map.insert("claimant".into(), self.claimant.into());
        let _ = map.insert(
            "claim_type".into(),
            CanonValue::Enum(self.claim_type.as_str().to_string()),
        );
        let _ = map.insert("declared_at".into(), self.declared_at.into());
        let _ = map.insert("source_url".into(), self.source_url.into());
        let _ = map.insert(
            "initial_status".into(),
            CanonValue::Enum(self.initial_status.as_str().to_string()),
        );
        map
    }
}

/// Payload of a `CLAIM_OPERATIONALIZED` event.
///
/// Operationalization is explicitly labeled interpretation: it binds the
/// claim to measurable indicators and locks the goalposts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimOperationalizedPayload {
    pub claim_id: Uuid,
    /// Measurable indicators. "Improve" without metrics is not a metric.
    pub metrics: Vec<String>,
    /// What would constitute full success.
    pub success_conditions: Vec<String>,
    /// What would constitute failure.
    pub failure_conditions: Vec<String>,
    /// When the claim should be evaluated.
    pub evaluation_date: NaiveDate,
    pub rationale: Option<String>,
    pub new_status: ClaimStatus,
}

impl ClaimOperationalizedPayload {
    pub fn into_payload(self) -> CanonMap {
        let strings = |items: Vec<String>| {
            CanonValue::List(items.into_iter().map(CanonValue::from).collect())
        };
        let mut map = CanonMap::new();
        let _ = map.insert("claim_id".into(), self.claim_id.into());
        let _ = map.insert("metrics".into(), strings(self.metrics));
        let _ = map.insert("success_conditions".into(), strings(self.success_conditions));
        let _ = map.insert("failure_conditions".into(), strings(self.failure_conditions));
        let _ = map.insert("evaluation_date".into(), self.evaluation_date.into());
        let _ = map.insert("rationale".into(), self.rationale.into());
        let _ = map.insert(
            "new_status".into(),
            CanonValue::Enum(self.new_status.as_str().to_string()),
        );
        map
    }
}

/// Payload of a `CLAIM_RESOLVED` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimResolvedPayload {
    pub claim_id: Uuid,
    pub resolution: Resolution,
    /// Brief explanation of the determination.
    pub resolution_summary: String,
    /// Evidence the resolution rests on. At least one entry; every id must
    /// already be attached to this claim.
    pub supporting_evidence_ids: Vec<Uuid>,
    pub new_status: ClaimStatus,
}

impl ClaimResolvedPayload {
    pub fn into_payload(self) -> CanonMap {
        let mut map = CanonMap::new();
        let _ = map.insert("claim_id".into(), self.claim_id.into());
        let _ = map.insert(
            "resolution".into(),
            CanonValue::Enum(self.resolution.as_str().to_string()),
        );
        let _ = map.insert("resolution_summary".into(), self.resolution_summary.into());
        let _ = map.insert(
            "supporting_evidence_ids".into(),
            CanonValue::List(
                self.supporting_evidence_ids
                    .into_iter()
                    .map(CanonValue::from)
                    .collect(),
            ),
        );
        let _ = map.insert(
            "new_status".into(),
            CanonValue::Enum(self.new_status.as_str().to_string()),
        );
        map
    }
}
