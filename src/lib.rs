pub mod model;
pub mod error;
pub mod store;
pub mod query;
pub mod ledger;
pub mod seed;
pub mod config;
pub mod server;
pub mod parser;

use std::fmt;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};
use crate::ledger::UndoLedger;
use crate::model::{NewDocument, Record, RecordPatch};
use crate::query::{QueryPage, QueryParams};
use crate::store::RecordStore;

/// Counters reported by the health endpoint.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Health {
    pub status: &'static str,
    pub documents_count: usize,
    pub undo_history_count: usize,
}

/// Process-wide handle: one record store and one undo ledger.
///
/// Built once at startup and shared with every request handler. Writes
/// that touch both halves take the store lock first, then the ledger lock.
pub struct ClassiDb {
    store: RwLock<RecordStore>,
    ledger: Mutex<UndoLedger>,
    undo_ttl: Duration,
}

impl fmt::Debug for ClassiDb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("ClassiDb");
        if let Ok(store) = self.store.read() {
            s.field("documents", &store.len());
        }
        s.field("undo_ttl", &self.undo_ttl).finish()
    }
}

impl ClassiDb {
    pub fn new(undo_ttl: Duration) -> Self {
        Self {
            store: RwLock::new(RecordStore::new()),
            ledger: Mutex::new(UndoLedger::new()),
            undo_ttl,
        }
    }

    pub fn undo_ttl(&self) -> Duration {
        self.undo_ttl
    }

    // --- SEED ---

    /// Replaces the collection with `entries`.
    pub fn load_seed(&self, entries: Vec<NewDocument>) -> StoreResult<usize> {
        let count = self.write_store()?.load_seed(entries, Utc::now());
        info!(count, "seed data loaded");
        Ok(count)
    }

    /// Reads and loads a seed file. A missing or malformed file leaves the store empty.
    pub fn load_seed_file(&self, path: &Path) -> StoreResult<usize> {
        match seed::read_seed_file(path) {
            Ok(entries) => self.load_seed(entries),
            Err(e) => {
                self.write_store()?.clear();
                warn!(path = %path.display(), error = %e, "seed rejected, store is empty");
                Err(e)
            }
        }
    }

    // --- RECORDS ---

    /// Appends every element of a JSON array. Anything else is rejected whole.
    pub fn ingest(&self, body: Value) -> StoreResult<Vec<Record>> {
        if !body.is_array() {
            return Err(StoreError::InvalidInput { reason: "expected an array of documents".into() });
        }
        let entries: Vec<NewDocument> = serde_json::from_value(body)
        .map_err(|e| StoreError::InvalidInput { reason: e.to_string() })?;

        let created = self.write_store()?.ingest(entries, Utc::now());
        info!(count = created.len(), "documents ingested");
        Ok(created)
    }

    pub fn get(&self, id: Uuid) -> StoreResult<Record> {
        self.read_store()?.get(id)
    }

    pub fn list(&self) -> StoreResult<Vec<Record>> {
        Ok(self.read_store()?.list())
    }

    /// Runs a listing query over a snapshot of the store.
    pub fn query(&self, params: &QueryParams) -> StoreResult<QueryPage> {
        let records = self.list()?;
        Ok(query::query(&records, params))
    }

    /// Applies a manual correction and arms the undo window for it.
    pub fn update(&self, id: Uuid, patch: RecordPatch) -> StoreResult<Record> {
        self.update_at(id, patch, Utc::now())
    }

    /// Same as [`ClassiDb::update`], stamped with `now`.
    pub fn update_at(&self, id: Uuid, patch: RecordPatch, now: DateTime<Utc>) -> StoreResult<Record> {
        let mut store = self.write_store()?;
        let applied = store.apply_update(id, patch, now)?;
        self.lock_ledger()?.record(id, applied.snapshot, now);
        debug!(%id, "record updated, undo armed");
        Ok(applied.record)
    }

    // --- UNDO ---

    pub fn undo(&self, id: Uuid) -> StoreResult<Record> {
        self.undo_at(id, Utc::now())
    }

    /// Reverts the last update of `id` as if the request arrived at `now`.
    pub fn undo_at(&self, id: Uuid, now: DateTime<Utc>) -> StoreResult<Record> {
        let mut store = self.write_store()?;
        let snapshot = self
        .lock_ledger()?
        .undo(id, now, self.undo_ttl)
        .map_err(|e| {
            warn!(%id, error = %e, "undo rejected");
            e
        })?;
        let restored = store.restore(id, snapshot, now)?;
        debug!(%id, "record restored from undo snapshot");
        Ok(restored)
    }

    // --- DIAGNOSTICS ---

    pub fn health(&self) -> StoreResult<Health> {
        let documents_count = self.read_store()?.len();
        let undo_history_count = self.lock_ledger()?.size();
        Ok(Health { status: "ok", documents_count, undo_history_count })
    }

    fn read_store(&self) -> StoreResult<RwLockReadGuard<'_, RecordStore>> {
        self.store.read().map_err(|_| StoreError::Internal("poisoned store lock"))
    }

    fn write_store(&self) -> StoreResult<RwLockWriteGuard<'_, RecordStore>> {
        self.store.write().map_err(|_| StoreError::Internal("poisoned store lock"))
    }

    fn lock_ledger(&self) -> StoreResult<MutexGuard<'_, UndoLedger>> {
        self.ledger.lock().map_err(|_| StoreError::Internal("poisoned ledger lock"))
    }
}

impl Default for ClassiDb {
    fn default() -> Self {
        Self::new(Duration::seconds(ledger::DEFAULT_UNDO_TTL_SECS))
    }
}
