//! The EventStore contract: chain head, append scopes, and the commit-time
//! checks shared by every backend.
//!
//! The store is the single source of truth for sequence numbers and
//! previous-event hashes. All mutation goes through [`EventStore::begin_append`],
//! which yields a scope holding exclusive access to the chain head for its
//! entire lifetime. A scope either commits exactly once or rolls back on
//! drop — there is no two-phase reserve/commit API to misuse across threads
//! or connections.

use uuid::Uuid;

use attesta_canon::{canonical_bytes, hash_event};
use attesta_contracts::{LedgerError, LedgerEvent, LedgerResult, MerkleProof};

/// The singleton chain head: the only globally shared mutable datum.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainHead {
    /// Sequence number of the last committed event; -1 on an empty ledger.
    pub last_sequence: i64,
    /// Hash of the last committed event; absent on an empty ledger.
    pub last_event_hash: Option<String>,
}

impl ChainHead {
    /// The head of an empty ledger.
    pub fn empty() -> ChainHead {
        ChainHead {
            last_sequence: -1,
            last_event_hash: None,
        }
    }

    /// The sequence number the next committed event must carry.
    pub fn next_sequence(&self) -> i64 {
        self.last_sequence + 1
    }
}

/// An open append transaction.
///
/// Holds exclusive access to the chain head from creation until commit or
/// drop. Dropping the scope without committing rolls back; this is the only
/// cancellation mechanism for an in-flight append.
pub trait AppendScope: std::fmt::Debug {
    /// The chain head observed when this scope was opened.
    fn head(&self) -> &ChainHead;

    /// Persist the event and advance the head, consuming the scope.
    ///
    /// `canonical_payload` is the exact byte string that was hashed; durable
    /// backends store it verbatim so re-verification never depends on a
    /// future canonicalizer version reproducing it. Commit re-reads the head
    /// under the same lock and re-derives the event hash before persisting.
    fn commit(
        self: Box<Self>,
        event: &LedgerEvent,
        canonical_payload: &[u8],
        canon_version: u32,
    ) -> LedgerResult<()>;
}

/// Ordered, append-only event storage.
///
/// Reads never take the append lock and may proceed in parallel with an open
/// scope.
pub trait EventStore: Send + Sync {
    /// Open an append scope: acquire the head lock and read the current
    /// `(last_sequence, last_event_hash)`.
    fn begin_append(&self) -> LedgerResult<Box<dyn AppendScope + '_>>;

    /// Current chain head.
    fn get_head(&self) -> LedgerResult<ChainHead>;

    /// Total number of committed events.
    fn get_event_count(&self) -> LedgerResult<usize>;

    /// All events, ordered by `sequence_number` ascending.
    fn list_all(&self) -> LedgerResult<Vec<LedgerEvent>>;

    /// All events targeting `entity_id`, in chain order.
    fn list_for_entity(&self, entity_id: Uuid) -> LedgerResult<Vec<LedgerEvent>>;

    /// Look up one event by id.
    fn get_by_event_id(&self, event_id: Uuid) -> LedgerResult<Option<LedgerEvent>>;

    /// Attach anchor bookkeeping to an already-committed event.
    ///
    /// The only post-commit mutation the store permits, and it is
    /// informational: verification always replays proofs against the batch's
    /// own root, never against these fields.
    fn set_anchor_fields(
        &self,
        event_id: Uuid,
        batch_id: Uuid,
        proof: &MerkleProof,
    ) -> LedgerResult<()>;
}

// ── Shared commit-time checks ─────────────────────────────────────────────────

/// Reject a commit whose event does not extend the head it reserved.
///
/// Under a correctly held lock the head cannot have moved; this check is
/// defense-in-depth against scope misuse and surfaces as a retryable
/// concurrency conflict.
pub(crate) fn check_event_against_head(head: &ChainHead, event: &LedgerEvent) -> LedgerResult<()> {
    if event.sequence_number != head.next_sequence() {
        return Err(LedgerError::Concurrency {
            reason: format!(
                "sequence mismatch at commit: reserved {}, event carries {}",
                head.next_sequence(),
                event.sequence_number
            ),
        });
    }

    if event.sequence_number == 0 {
        if head.last_event_hash.is_some() {
            return Err(LedgerError::Concurrency {
                reason: "genesis commit against a non-empty chain".to_string(),
            });
        }
    } else if event.previous_event_hash != head.last_event_hash {
        let claimed = event.previous_event_hash.as_deref().unwrap_or("<none>");
        let actual = head.last_event_hash.as_deref().unwrap_or("<none>");
        return Err(LedgerError::Concurrency {
            reason: format!(
                "previous-hash mismatch at commit: event claims '{}', head is '{}'",
                &claimed[..claimed.len().min(16)],
                &actual[..actual.len().min(16)],
            ),
        });
    }

    Ok(())
}

/// Recompute the event hash from the payload and verify the canonical bytes
/// the caller intends to persist are the bytes that were actually hashed.
pub(crate) fn check_event_hash(event: &LedgerEvent, canonical_payload: &[u8]) -> LedgerResult<()> {
    event.validate_chain_rules()?;

    let recomputed = hash_event(&event.payload, event.previous_event_hash.as_deref())?;
    if recomputed != event.event_hash {
        return Err(LedgerError::Chain {
            reason: format!(
                "event hash mismatch at {}: recomputed {}...",
                event.event_ref(),
                &recomputed[..16],
            ),
        });
    }

    let expected_canonical = canonical_bytes(&event.payload)?;
    if expected_canonical != canonical_payload {
        return Err(LedgerError::Chain {
            reason: format!(
                "canonical payload bytes diverge from payload at {}",
                event.event_ref()
            ),
        });
    }

    Ok(())
}
