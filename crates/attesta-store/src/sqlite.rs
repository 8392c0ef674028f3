//! Durable EventStore backed by an embedded relational database.
//!
//! Layout (per the external-interface contract):
//! - `ledger_events` — one row per event, including `payload_canon` (the
//!   exact canonical bytes that were hashed) and `canon_version`, so
//!   re-verification never depends on a future canonicalizer reproducing
//!   the same output for the same logical payload.
//! - `ledger_head` — a singleton `(last_sequence, last_event_hash)` row,
//!   updated only inside an immediate (write-locked) transaction.
//!
//! Concurrency: in-process writers serialize on a mutex with a bounded
//! acquisition timeout; cross-process writers serialize on SQLite's write
//! lock with `busy_timeout`. Both surface as `LockBusy`. Statements run
//! under a progress-handler deadline that surfaces `OperationTimedOut`.
//! Reads open their own connections and, under WAL, never block on an open
//! append scope.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use parking_lot::{Mutex, MutexGuard};
use rusqlite::{params, Connection, ErrorCode, OpenFlags, OptionalExtension};
use tracing::{debug, info};
use uuid::Uuid;

use attesta_canon::{format_instant, CanonValue};
use attesta_contracts::{
    EntityType, EventType, LedgerError, LedgerEvent, LedgerResult, MerkleProof, SPEC_VERSION,
};

use crate::config::{DEFAULT_IDLE_CEILING, DEFAULT_LOCK_TIMEOUT, DEFAULT_STATEMENT_TIMEOUT};
use crate::store::{
    check_event_against_head, check_event_hash, AppendScope, ChainHead, EventStore,
};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS ledger_events (
    sequence_number     INTEGER PRIMARY KEY,
    event_id            TEXT    NOT NULL UNIQUE,
    event_type          TEXT    NOT NULL,
    entity_type         TEXT    NOT NULL,
    entity_id           TEXT    NOT NULL,
    payload_json        TEXT    NOT NULL,
    payload_canon       BLOB    NOT NULL,
    canon_version       INTEGER NOT NULL,
    spec_version        INTEGER NOT NULL,
    previous_event_hash TEXT,
    event_hash          TEXT    NOT NULL,
    created_by          TEXT    NOT NULL,
    editor_signature    TEXT    NOT NULL,
    created_at          TEXT    NOT NULL,
    anchor_batch_id     TEXT,
    merkle_proof        TEXT
);
CREATE INDEX IF NOT EXISTS idx_ledger_events_entity
    ON ledger_events (entity_id, sequence_number);
CREATE TABLE IF NOT EXISTS ledger_head (
    id              INTEGER PRIMARY KEY CHECK (id = 1),
    last_sequence   INTEGER NOT NULL,
    last_event_hash TEXT
);
INSERT OR IGNORE INTO ledger_head (id, last_sequence, last_event_hash)
    VALUES (1, -1, NULL);
";

const EVENT_COLUMNS: &str = "event_id, sequence_number, event_type, entity_type, entity_id, \
     payload_json, previous_event_hash, event_hash, created_by, editor_signature, created_at, \
     anchor_batch_id, merkle_proof";

/// A durable event store on an embedded relational database.
pub struct SqliteEventStore {
    path: PathBuf,
    write_conn: Mutex<Connection>,
    lock_timeout: Duration,
    statement_timeout: Duration,
    idle_ceiling: Duration,
}

impl SqliteEventStore {
    /// Open (or create) the database at `path` with default timeouts.
    pub fn open(path: impl AsRef<Path>) -> LedgerResult<SqliteEventStore> {
        Self::open_with_timeouts(
            path,
            DEFAULT_LOCK_TIMEOUT,
            DEFAULT_STATEMENT_TIMEOUT,
            DEFAULT_IDLE_CEILING,
        )
    }

    /// Open with explicit lock, statement, and idle-abort timeouts.
    pub fn open_with_timeouts(
        path: impl AsRef<Path>,
        lock_timeout: Duration,
        statement_timeout: Duration,
        idle_ceiling: Duration,
    ) -> LedgerResult<SqliteEventStore> {
        let path = path.as_ref().to_path_buf();
        let conn = Connection::open(&path).map_err(map_sqlite)?;

        // WAL keeps readers independent of the single writer.
        let _mode: String = conn
            .query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))
            .map_err(map_sqlite)?;
        conn.busy_timeout(lock_timeout).map_err(map_sqlite)?;
        conn.execute_batch(SCHEMA).map_err(map_sqlite)?;

        info!(path = %path.display(), "durable event store opened");
        Ok(SqliteEventStore {
            path,
            write_conn: Mutex::new(conn),
            lock_timeout,
            statement_timeout,
            idle_ceiling,
        })
    }

    /// A fresh read-only connection. Reads never contend with the writer
    /// mutex; WAL guarantees they see the last committed state.
    fn read_conn(&self) -> LedgerResult<Connection> {
        let conn = Connection::open_with_flags(
            &self.path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(map_sqlite)?;
        conn.busy_timeout(self.lock_timeout).map_err(map_sqlite)?;
        Ok(conn)
    }
}

impl EventStore for SqliteEventStore {
    fn begin_append(&self) -> LedgerResult<Box<dyn AppendScope + '_>> {
        let guard = self
            .write_conn
            .try_lock_for(self.lock_timeout)
            .ok_or_else(|| LedgerError::LockBusy {
                reason: format!(
                    "writer connection not acquired within {:?}",
                    self.lock_timeout
                ),
            })?;

        arm_deadline(&guard, self.statement_timeout);
        let begun = guard.execute_batch("BEGIN IMMEDIATE");
        if let Err(e) = begun {
            disarm_deadline(&guard);
            return Err(map_sqlite(e));
        }

        let head = match read_head(&guard) {
            Ok(head) => head,
            Err(e) => {
                let _ = guard.execute_batch("ROLLBACK");
                disarm_deadline(&guard);
                return Err(e);
            }
        };
        disarm_deadline(&guard);

        Ok(Box::new(SqliteAppendScope {
            guard,
            head,
            opened_at: Instant::now(),
            statement_timeout: self.statement_timeout,
            idle_ceiling: self.idle_ceiling,
            finished: false,
        }))
    }

    fn get_head(&self) -> LedgerResult<ChainHead> {
        read_head(&self.read_conn()?)
    }

    fn get_event_count(&self) -> LedgerResult<usize> {
        let count: i64 = self
            .read_conn()?
            .query_row("SELECT COUNT(*) FROM ledger_events", [], |row| row.get(0))
            .map_err(map_sqlite)?;
        Ok(count as usize)
    }

    fn list_all(&self) -> LedgerResult<Vec<LedgerEvent>> {
        let conn = self.read_conn()?;
        let sql = format!(
            "SELECT {EVENT_COLUMNS} FROM ledger_events ORDER BY sequence_number ASC"
        );
        let mut stmt = conn.prepare(&sql).map_err(map_sqlite)?;
        let rows = stmt
            .query_map([], RawEventRow::from_row)
            .map_err(map_sqlite)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(map_sqlite)?;
        rows.into_iter().map(RawEventRow::decode).collect()
    }

    fn list_for_entity(&self, entity_id: Uuid) -> LedgerResult<Vec<LedgerEvent>> {
        let conn = self.read_conn()?;
        let sql = format!(
            "SELECT {EVENT_COLUMNS} FROM ledger_events WHERE entity_id = ?1 \
             ORDER BY sequence_number ASC"
        );
        let mut stmt = conn.prepare(&sql).map_err(map_sqlite)?;
        let rows = stmt
            .query_map([entity_id.to_string()], RawEventRow::from_row)
            .map_err(map_sqlite)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(map_sqlite)?;
        rows.into_iter().map(RawEventRow::decode).collect()
    }

    fn get_by_event_id(&self, event_id: Uuid) -> LedgerResult<Option<LedgerEvent>> {
        let conn = self.read_conn()?;
        let sql = format!("SELECT {EVENT_COLUMNS} FROM ledger_events WHERE event_id = ?1");
        let raw = conn
            .query_row(&sql, [event_id.to_string()], RawEventRow::from_row)
            .optional()
            .map_err(map_sqlite)?;
        raw.map(RawEventRow::decode).transpose()
    }

    fn set_anchor_fields(
        &self,
        event_id: Uuid,
        batch_id: Uuid,
        proof: &MerkleProof,
    ) -> LedgerResult<()> {
        let proof_json = serde_json::to_string(proof).map_err(|e| LedgerError::Store {
            reason: format!("could not serialize merkle proof: {e}"),
        })?;
        let guard = self
            .write_conn
            .try_lock_for(self.lock_timeout)
            .ok_or_else(|| LedgerError::LockBusy {
                reason: "writer connection busy while attaching anchor fields".to_string(),
            })?;
        let updated = guard
            .execute(
                "UPDATE ledger_events SET anchor_batch_id = ?1, merkle_proof = ?2 \
                 WHERE event_id = ?3",
                params![batch_id.to_string(), proof_json, event_id.to_string()],
            )
            .map_err(map_sqlite)?;
        if updated == 0 {
            return Err(LedgerError::Store {
                reason: format!("event {event_id} not found"),
            });
        }
        Ok(())
    }
}

// ── Append scope ──────────────────────────────────────────────────────────────

struct SqliteAppendScope<'a> {
    guard: MutexGuard<'a, Connection>,
    head: ChainHead,
    opened_at: Instant,
    statement_timeout: Duration,
    idle_ceiling: Duration,
    finished: bool,
}

impl std::fmt::Debug for SqliteAppendScope<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteAppendScope")
            .field("head", &self.head)
            .field("opened_at", &self.opened_at)
            .field("statement_timeout", &self.statement_timeout)
            .field("idle_ceiling", &self.idle_ceiling)
            .field("finished", &self.finished)
            .finish()
    }
}

impl SqliteAppendScope<'_> {
    fn try_commit(
        &self,
        event: &LedgerEvent,
        canonical_payload: &[u8],
        canon_version: u32,
    ) -> LedgerResult<()> {
        // Re-read the head inside the same transaction.
        let head = read_head(&self.guard)?;
        check_event_against_head(&head, event)?;
        check_event_hash(event, canonical_payload)?;

        let payload_json =
            serde_json::to_string(&event.payload).map_err(|e| LedgerError::Store {
                reason: format!("could not serialize payload: {e}"),
            })?;
        let proof_json = event
            .merkle_proof
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| LedgerError::Store {
                reason: format!("could not serialize merkle proof: {e}"),
            })?;

        self.guard
            .execute(
                "INSERT INTO ledger_events (sequence_number, event_id, event_type, entity_type, \
                 entity_id, payload_json, payload_canon, canon_version, spec_version, \
                 previous_event_hash, event_hash, created_by, editor_signature, created_at, \
                 anchor_batch_id, merkle_proof) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
                params![
                    event.sequence_number,
                    event.event_id.to_string(),
                    event.event_type.as_str(),
                    event.entity_type.as_str(),
                    event.entity_id.to_string(),
                    payload_json,
                    canonical_payload,
                    canon_version,
                    SPEC_VERSION,
                    event.previous_event_hash,
                    event.event_hash,
                    event.created_by.to_string(),
                    event.editor_signature,
                    format_instant(&event.created_at),
                    event.anchor_batch_id.map(|id| id.to_string()),
                    proof_json,
                ],
            )
            .map_err(map_sqlite)?;

        self.guard
            .execute(
                "UPDATE ledger_head SET last_sequence = ?1, last_event_hash = ?2 WHERE id = 1",
                params![event.sequence_number, event.event_hash],
            )
            .map_err(map_sqlite)?;

        self.guard.execute_batch("COMMIT").map_err(map_sqlite)?;
        Ok(())
    }
}

impl AppendScope for SqliteAppendScope<'_> {
    fn head(&self) -> &ChainHead {
        &self.head
    }

    fn commit(
        mut self: Box<Self>,
        event: &LedgerEvent,
        canonical_payload: &[u8],
        canon_version: u32,
    ) -> LedgerResult<()> {
        // Crash-safety net: a transaction left idle beyond the ceiling is
        // aborted (the Drop impl issues the ROLLBACK).
        let held = self.opened_at.elapsed();
        if held > self.idle_ceiling {
            return Err(LedgerError::OperationTimedOut {
                reason: format!(
                    "append transaction idle for {held:?}, past the {:?} ceiling; aborted",
                    self.idle_ceiling
                ),
            });
        }

        arm_deadline(&self.guard, self.statement_timeout);
        let result = self.try_commit(event, canonical_payload, canon_version);
        disarm_deadline(&self.guard);

        match result {
            Ok(()) => {
                self.finished = true;
                debug!(
                    sequence = event.sequence_number,
                    event_type = %event.event_type,
                    "event committed to durable store"
                );
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

impl Drop for SqliteAppendScope<'_> {
    fn drop(&mut self) {
        if !self.finished {
            // Any exit without a successful commit rolls back.
            let _ = self.guard.execute_batch("ROLLBACK");
        }
        disarm_deadline(&self.guard);
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn arm_deadline(conn: &Connection, timeout: Duration) {
    let deadline = Instant::now() + timeout;
    conn.progress_handler(1000, Some(move || Instant::now() >= deadline));
}

fn disarm_deadline(conn: &Connection) {
    conn.progress_handler(0, None::<fn() -> bool>);
}

fn read_head(conn: &Connection) -> LedgerResult<ChainHead> {
    conn.query_row(
        "SELECT last_sequence, last_event_hash FROM ledger_head WHERE id = 1",
        [],
        |row| {
            Ok(ChainHead {
                last_sequence: row.get(0)?,
                last_event_hash: row.get(1)?,
            })
        },
    )
    .map_err(map_sqlite)
}

fn map_sqlite(error: rusqlite::Error) -> LedgerError {
    match error.sqlite_error_code() {
        Some(ErrorCode::DatabaseBusy) | Some(ErrorCode::DatabaseLocked) => LedgerError::LockBusy {
            reason: error.to_string(),
        },
        Some(ErrorCode::OperationInterrupted) => LedgerError::OperationTimedOut {
            reason: "statement exceeded its deadline and was interrupted".to_string(),
        },
        Some(ErrorCode::ConstraintViolation) => LedgerError::Concurrency {
            reason: format!("uniqueness violation on append: {error}"),
        },
        _ => LedgerError::Store {
            reason: error.to_string(),
        },
    }
}

/// The raw column values of one event row, before domain decoding.
struct RawEventRow {
    event_id: String,
    sequence_number: i64,
    event_type: String,
    entity_type: String,
    entity_id: String,
    payload_json: String,
    previous_event_hash: Option<String>,
    event_hash: String,
    created_by: String,
    editor_signature: String,
    created_at: String,
    anchor_batch_id: Option<String>,
    merkle_proof: Option<String>,
}

impl RawEventRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawEventRow> {
        Ok(RawEventRow {
            event_id: row.get(0)?,
            sequence_number: row.get(1)?,
            event_type: row.get(2)?,
            entity_type: row.get(3)?,
            entity_id: row.get(4)?,
            payload_json: row.get(5)?,
            previous_event_hash: row.get(6)?,
            event_hash: row.get(7)?,
            created_by: row.get(8)?,
            editor_signature: row.get(9)?,
            created_at: row.get(10)?,
            anchor_batch_id: row.get(11)?,
            merkle_proof: row.get(12)?,
        })
    }

    fn decode(self) -> LedgerResult<LedgerEvent> {
        let bad_row = |what: &str, detail: String| LedgerError::Store {
            reason: format!(
                "corrupt event row at sequence {}: bad {what}: {detail}",
                self.sequence_number
            ),
        };

        let parse_uuid = |what: &str, value: &str| {
            Uuid::parse_str(value).map_err(|e| bad_row(what, e.to_string()))
        };

        let payload_raw: serde_json::Value = serde_json::from_str(&self.payload_json)
            .map_err(|e| bad_row("payload_json", e.to_string()))?;
        let payload = CanonValue::map_from_json(&payload_raw)?;

        let created_at = chrono::DateTime::parse_from_rfc3339(&self.created_at)
            .map_err(|e| bad_row("created_at", e.to_string()))?
            .with_timezone(&chrono::Utc);

        let merkle_proof = self
            .merkle_proof
            .as_deref()
            .map(serde_json::from_str::<MerkleProof>)
            .transpose()
            .map_err(|e| bad_row("merkle_proof", e.to_string()))?;

        Ok(LedgerEvent {
            event_id: parse_uuid("event_id", &self.event_id)?,
            sequence_number: self.sequence_number,
            event_type: EventType::parse(&self.event_type)
                .ok_or_else(|| bad_row("event_type", self.event_type.clone()))?,
            entity_type: EntityType::parse(&self.entity_type)
                .ok_or_else(|| bad_row("entity_type", self.entity_type.clone()))?,
            entity_id: parse_uuid("entity_id", &self.entity_id)?,
            payload,
            previous_event_hash: self.previous_event_hash.clone(),
            event_hash: self.event_hash.clone(),
            created_by: parse_uuid("created_by", &self.created_by)?,
            editor_signature: self.editor_signature.clone(),
            created_at,
            anchor_batch_id: self
                .anchor_batch_id
                .as_deref()
                .map(|s| parse_uuid("anchor_batch_id", s))
                .transpose()?,
            merkle_proof,
        })
    }
}
