//! Evidence types and the `EVIDENCE_ADDED` payload.
//!
//! Evidence is not truth — it is constraint. It narrows the space of
//! possible interpretations. Conflicting evidence is allowed and expected;
//! sources are weighted, not censored.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use attesta_canon::{CanonError, CanonMap, CanonValue};

/// How an evidence item bears on its claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvidenceStance {
    Supporting,
    Contradicting,
    Neutral,
}

impl EvidenceStance {
    pub fn as_str(&self) -> &'static str {
        match self {
            EvidenceStance::Supporting => "supporting",
            EvidenceStance::Contradicting => "contradicting",
            EvidenceStance::Neutral => "neutral",
        }
    }
}

/// Source classification. Primary sources weigh more than secondary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceTier {
    /// Original data, official reports.
    Primary,
    /// Analysis, journalism.
    Secondary,
    /// Aggregation, commentary.
    Tertiary,
}

impl SourceTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceTier::Primary => "primary",
            SourceTier::Secondary => "secondary",
            SourceTier::Tertiary => "tertiary",
        }
    }
}

/// Payload of an `EVIDENCE_ADDED` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceAddedPayload {
    pub claim_id: Uuid,
    pub evidence_id: Uuid,
    pub title: String,
    pub source_url: String,
    pub source_tier: SourceTier,
    pub stance: EvidenceStance,
    /// Editorial confidence as an arbitrary-precision decimal string
    /// (e.g. `"0.80"`). Never a float — trailing zeros are significant.
    pub confidence: Option<String>,
    pub summary: Option<String>,
}

impl EvidenceAddedPayload {
    /// The canonicalizable form of this payload.
    ///
    /// Fails if `confidence` is present but not a valid decimal literal —
    /// the one field here that could smuggle a float in.
    pub fn into_payload(self) -> Result<CanonMap, CanonError> {
        let confidence = match self.confidence {
            Some(literal) => CanonValue::decimal(literal)?,
            None => CanonValue::Null,
        };
        let mut map = CanonMap::new();
        let _ = map.insert("claim_id".into(), self.claim_id.into());
        let _ = map.insert("evidence_id".into(), self.evidence_id.into());
        let _ = map.insert("title".into(), self.title.into());
        let _ = map.insert("source_url".into(), self.source_url.into());
        let _ = map.insert(
            "source_tier".into(),
            CanonValue::Enum(self.source_tier.as_str().to_string()),
        );
        let _ = map.insert(
            "stance".into(),
            CanonValue::Enum(self.stance.as_str().to_string()),
        );
        let _ = map.insert("confidence".into(), confidence);
        let _ = map.insert("summary".into(), self.summary.into());
        Ok(map)
    }
}
