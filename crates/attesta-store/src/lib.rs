//! # attesta-store
//!
//! Durable, ordered, concurrency-safe storage for the attesta event chain.
//!
//! ## Overview
//!
//! The store owns the chain head — the singleton
//! `(last_sequence, last_event_hash)` that every append must extend — and is
//! the single source of truth for sequence numbers and previous-event
//! hashes. Writers open an [`AppendScope`] that holds exclusive access to
//! the head for its lifetime; commit re-validates under the same lock and
//! either persists atomically or rolls back. Readers never take the append
//! lock.
//!
//! Two backends with one observable contract:
//!
//! - [`MemoryEventStore`] — process-local, for development and tests.
//! - [`SqliteEventStore`] — durable embedded relational storage with the
//!   full persisted-state layout (`ledger_events` + `ledger_head`).
//!
//! Blocking is bounded everywhere: lock acquisition (`LockBusy`), statement
//! execution (`OperationTimedOut`), and idle transactions (aborted past a
//! configured ceiling).

pub mod config;
pub mod memory;
pub mod sqlite;
pub mod store;

pub use config::{DatabaseConfig, StoreConfig, StoreDriver};
pub use memory::MemoryEventStore;
pub use sqlite::SqliteEventStore;
pub use store::{AppendScope, ChainHead, EventStore};

// ── Tests ─────────────────────────────────────────────────────────────────────
