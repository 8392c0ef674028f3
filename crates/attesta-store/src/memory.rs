//! In-memory EventStore.
//!
//! The reference implementation: all events in a `Vec` behind a
//! `parking_lot::Mutex`, with the same observable contract as the durable
//! backend — bounded lock acquisition, idle-scope abort, and commit-time
//! re-validation. No persistence; restarts start empty.

use std::time::{Duration, Instant};

use parking_lot::{Mutex, MutexGuard};
use tracing::debug;
use uuid::Uuid;

use attesta_contracts::{LedgerError, LedgerEvent, LedgerResult, MerkleProof};

use crate::config::{DEFAULT_IDLE_CEILING, DEFAULT_LOCK_TIMEOUT};
use crate::store::{
    check_event_against_head, check_event_hash, AppendScope, ChainHead, EventStore,
};

struct MemoryState {
    events: Vec<LedgerEvent>,
    head: ChainHead,
}

/// An in-memory, append-only event store.
///
/// `begin_append` serializes writers on an internal mutex; readers clone
/// data out under short lock holds and never contend with an open scope for
/// longer than a snapshot copy.
pub struct MemoryEventStore {
    state: Mutex<MemoryState>,
    lock_timeout: Duration,
    idle_ceiling: Duration,
}

impl MemoryEventStore {
    pub fn new() -> MemoryEventStore {
        Self::with_timeouts(DEFAULT_LOCK_TIMEOUT, DEFAULT_IDLE_CEILING)
    }

    pub fn with_timeouts(lock_timeout: Duration, idle_ceiling: Duration) -> MemoryEventStore {
        MemoryEventStore {
            state: Mutex::new(MemoryState {
                events: Vec::new(),
                head: ChainHead::empty(),
            }),
            lock_timeout,
            idle_ceiling,
        }
    }
}

impl Default for MemoryEventStore {
    fn default() -> Self {
        Self::new()
    }
}

impl EventStore for MemoryEventStore {
    fn begin_append(&self) -> LedgerResult<Box<dyn AppendScope + '_>> {
        let guard = self
            .state
            .try_lock_for(self.lock_timeout)
            .ok_or_else(|| LedgerError::LockBusy {
                reason: format!(
                    "chain head lock not acquired within {:?}",
                    self.lock_timeout
                ),
            })?;

        let head = guard.head.clone();
        Ok(Box::new(MemoryAppendScope {
            guard,
            head,
            opened_at: Instant::now(),
            idle_ceiling: self.idle_ceiling,
        }))
    }

    fn get_head(&self) -> LedgerResult<ChainHead> {
        Ok(self.state.lock().head.clone())
    }

    fn get_event_count(&self) -> LedgerResult<usize> {
        Ok(self.state.lock().events.len())
    }

    fn list_all(&self) -> LedgerResult<Vec<LedgerEvent>> {
        // Events are appended in sequence order, so the Vec is the chain.
        Ok(self.state.lock().events.clone())
    }

    fn list_for_entity(&self, entity_id: Uuid) -> LedgerResult<Vec<LedgerEvent>> {
        Ok(self
            .state
            .lock()
            .events
            .iter()
            .filter(|e| e.entity_id == entity_id)
            .cloned()
            .collect())
    }

    fn get_by_event_id(&self, event_id: Uuid) -> LedgerResult<Option<LedgerEvent>> {
        Ok(self
            .state
            .lock()
            .events
            .iter()
            .find(|e| e.event_id == event_id)
            .cloned())
    }

    fn set_anchor_fields(
        &self,
        event_id: Uuid,
        batch_id: Uuid,
        proof: &MerkleProof,
    ) -> LedgerResult<()> {
        let mut state = self.state.lock();
        let event = state
            .events
            .iter_mut()
            .find(|e| e.event_id == event_id)
            .ok_or_else(|| LedgerError::Store {
                reason: format!("event {event_id} not found"),
            })?;
        event.anchor_batch_id = Some(batch_id);
        event.merkle_proof = Some(proof.clone());
        Ok(())
    }
}

struct MemoryAppendScope<'a> {
    guard: MutexGuard<'a, MemoryState>,
    head: ChainHead,
    opened_at: Instant,
    idle_ceiling: Duration,
}

impl std::fmt::Debug for MemoryAppendScope<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryAppendScope")
            .field("head", &self.head)
            .field("opened_at", &self.opened_at)
            .field("idle_ceiling", &self.idle_ceiling)
            .finish()
    }
}

impl AppendScope for MemoryAppendScope<'_> {
    fn head(&self) -> &ChainHead {
        &self.head
    }

    fn commit(
        mut self: Box<Self>,
        event: &LedgerEvent,
        canonical_payload: &[u8],
        _canon_version: u32,
    ) -> LedgerResult<()> {
        // Crash-safety net: a scope held idle past the ceiling is aborted
        // rather than allowed to extend the chain.
        let held = self.opened_at.elapsed();
        if held > self.idle_ceiling {
            return Err(LedgerError::OperationTimedOut {
                reason: format!(
                    "append scope idle for {held:?}, past the {:?} ceiling; transaction aborted",
                    self.idle_ceiling
                ),
            });
        }

        // Re-read the head under the same lock.
        check_event_against_head(&self.guard.head, event)?;
        check_event_hash(event, canonical_payload)?;

        self.guard.events.push(event.clone());
        self.guard.head = ChainHead {
            last_sequence: event.sequence_number,
            last_event_hash: Some(event.event_hash.clone()),
        };

        debug!(
            sequence = event.sequence_number,
            event_type = %event.event_type,
            "event committed to in-memory store"
        );
        Ok(())
    }
}
