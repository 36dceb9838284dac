use std::collections::HashMap;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};
use crate::model::Record;

/// Default undo window.
pub const DEFAULT_UNDO_TTL_SECS: i64 = 30;

/// A pending reversal for one record.
#[derive(Debug, Clone, PartialEq)]
pub struct UndoEntry {
    pub record_id: Uuid,
    /// Deep copy of the record as it was before the update
    pub snapshot: Record,
    pub recorded_at: DateTime<Utc>,
    /// Set when the entry leaves the ledger. Entries still held are never consumed.
    pub consumed: bool,
}

/// At most one pending undo per record. Expiry is checked lazily at undo time.
#[derive(Debug, Default)]
pub struct UndoLedger {
    entries: HashMap<Uuid, UndoEntry>,
}

impl UndoLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `snapshot` as the pending undo for `id`, dropping any older one.
    pub fn record(&mut self, id: Uuid, snapshot: Record, now: DateTime<Utc>) {
        let entry = UndoEntry {
            record_id: id,
            snapshot,
            recorded_at: now,
            consumed: false,
        };
        self.entries.insert(id, entry);
    }

    /// Takes the pending snapshot for `id`.
    ///
    /// The entry is removed whether or not it is still within `ttl`, so a
    /// rejected undo cannot be retried into success.
    pub fn undo(&mut self, id: Uuid, now: DateTime<Utc>, ttl: Duration) -> StoreResult<Record> {
        let mut entry = self.entries.remove(&id).ok_or(StoreError::NoUndoAvailable(id))?;
        entry.consumed = true;

        if now - entry.recorded_at > ttl {
            return Err(StoreError::UndoExpired(id));
        }
        Ok(entry.snapshot)
    }

    pub fn size(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ClassificationLabel, NewDocument};

    fn snapshot(name: &str) -> Record {
        let doc = NewDocument {
            document_name: name.into(),
            classifications: vec![ClassificationLabel::new("invoice", 0.9)],
        };
        Record::from_new(Uuid::new_v4(), doc, Utc::now())
    }

    fn ttl() -> Duration {
        Duration::seconds(DEFAULT_UNDO_TTL_SECS)
    }

    #[test]
    fn undo_returns_snapshot_once() {
        let mut ledger = UndoLedger::new();
        let snap = snapshot("a.pdf");
        let id = snap.id;
        let t0 = Utc::now();

        ledger.record(id, snap.clone(), t0);
        assert_eq!(ledger.size(), 1);

        let restored = ledger.undo(id, t0 + Duration::seconds(1), ttl()).unwrap();
        assert_eq!(restored, snap);
        assert_eq!(ledger.size(), 0);

        assert!(matches!(ledger.undo(id, t0, ttl()), Err(StoreError::NoUndoAvailable(_))));
    }

    #[test]
    fn newer_update_replaces_pending_entry() {
        let mut ledger = UndoLedger::new();
        let first = snapshot("first.pdf");
        let id = first.id;
        let second = Record { document_name: "second.pdf".into(), ..first.clone() };
        let t0 = Utc::now();

        ledger.record(id, first, t0);
        ledger.record(id, second, t0);
        assert_eq!(ledger.size(), 1);

        let restored = ledger.undo(id, t0, ttl()).unwrap();
        assert_eq!(restored.document_name, "second.pdf");
    }

    #[test]
    fn expired_entry_is_rejected_and_dropped() {
        let mut ledger = UndoLedger::new();
        let snap = snapshot("a.pdf");
        let id = snap.id;
        let t0 = Utc::now();
        ledger.record(id, snap, t0);

        let late = t0 + ttl() + Duration::milliseconds(1);
        assert!(matches!(ledger.undo(id, late, ttl()), Err(StoreError::UndoExpired(_))));
        assert_eq!(ledger.size(), 0);
        assert!(matches!(ledger.undo(id, late, ttl()), Err(StoreError::NoUndoAvailable(_))));
    }

    #[test]
    fn undo_exactly_at_ttl_is_allowed() {
        let mut ledger = UndoLedger::new();
        let snap = snapshot("a.pdf");
        let id = snap.id;
        let t0 = Utc::now();
        ledger.record(id, snap, t0);

        assert!(ledger.undo(id, t0 + ttl(), ttl()).is_ok());
    }
}
