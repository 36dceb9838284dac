use std::collections::HashMap;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};
use crate::model::{NewDocument, Record, RecordPatch};

/// In-memory record collection.
///
/// Records are kept in insertion order (the order unsorted listings
/// return), with an id -> position index for point lookups. Nothing is
/// ever removed individually, so positions stay valid until the next
/// full seed replacement.
#[derive(Debug, Default)]
pub struct RecordStore {
    records: Vec<Record>,
    index: HashMap<Uuid, usize>,
}

/// Result of an in-place update: the new state and the state it replaced.
#[derive(Debug, Clone)]
pub struct AppliedUpdate {
    pub record: Record,
    pub snapshot: Record,
}

impl RecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Replaces the whole collection with freshly identified records.
    pub fn load_seed(&mut self, entries: Vec<NewDocument>, now: DateTime<Utc>) -> usize {
        self.records.clear();
        self.index.clear();
        self.append(entries, now).len()
    }

    /// Empties the collection. Used when seed data turns out to be malformed.
    pub fn clear(&mut self) {
        self.records.clear();
        self.index.clear();
    }

    /// Appends new records and returns copies of what was created.
    pub fn ingest(&mut self, entries: Vec<NewDocument>, now: DateTime<Utc>) -> Vec<Record> {
        self.append(entries, now)
    }

    pub fn get(&self, id: Uuid) -> StoreResult<Record> {
        self.position(id).map(|pos| self.records[pos].clone())
    }

    /// Detached copy of every record, in insertion order.
    pub fn list(&self) -> Vec<Record> {
        self.records.clone()
    }

    /// Merges `patch` onto the record and marks it as manually edited.
    ///
    /// The returned snapshot is a deep copy taken before the merge, so it
    /// shares no storage with the live record.
    pub fn apply_update(&mut self, id: Uuid, patch: RecordPatch, now: DateTime<Utc>) -> StoreResult<AppliedUpdate> {
        let pos = self.position(id)?;
        let record = &mut self.records[pos];
        let snapshot = record.clone();

        patch.apply_to(record);
        record.manually_edited = true;
        record.updated_at = now;

        Ok(AppliedUpdate { record: record.clone(), snapshot })
    }

    /// Puts `snapshot` back, with a fresh `updated_at`.
    ///
    /// `manually_edited` is sticky: once set on the live record it survives
    /// the restore even if the snapshot predates the first edit.
    pub fn restore(&mut self, id: Uuid, snapshot: Record, now: DateTime<Utc>) -> StoreResult<Record> {
        let pos = self.position(id)?;
        let record = &mut self.records[pos];
        let manually_edited = record.manually_edited || snapshot.manually_edited;
        *record = Record { id, manually_edited, updated_at: now, ..snapshot };
        Ok(record.clone())
    }

    fn position(&self, id: Uuid) -> StoreResult<usize> {
        self.index.get(&id).copied().ok_or(StoreError::NotFound(id))
    }

    fn append(&mut self, entries: Vec<NewDocument>, now: DateTime<Utc>) -> Vec<Record> {
        let mut created = Vec::with_capacity(entries.len());
        for doc in entries {
            let id = self.fresh_id();
            let record = Record::from_new(id, doc, now);
            self.index.insert(id, self.records.len());
            self.records.push(record.clone());
            created.push(record);
        }
        created
    }

    fn fresh_id(&self) -> Uuid {
        loop {
            let id = Uuid::new_v4();
            if !self.index.contains_key(&id) {
                return id;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use crate::model::ClassificationLabel;

    fn doc(name: &str, labels: &[(&str, f64)]) -> NewDocument {
        NewDocument {
            document_name: name.into(),
            classifications: labels.iter().map(|(l, s)| ClassificationLabel::new(*l, *s)).collect(),
        }
    }

    #[test]
    fn ids_are_unique_across_seed_and_ingest() {
        let mut store = RecordStore::new();
        let now = Utc::now();
        store.load_seed((0..50).map(|i| doc(&format!("seed-{i}"), &[])).collect(), now);
        store.ingest((0..50).map(|i| doc(&format!("new-{i}"), &[])).collect(), now);
        store.ingest((0..50).map(|i| doc(&format!("more-{i}"), &[])).collect(), now);

        let ids: HashSet<Uuid> = store.list().iter().map(|r| r.id).collect();
        assert_eq!(ids.len(), 150);
    }

    #[test]
    fn load_seed_replaces_and_ingest_appends() {
        let mut store = RecordStore::new();
        let now = Utc::now();
        store.ingest(vec![doc("old", &[])], now);
        store.load_seed(vec![doc("a", &[]), doc("b", &[])], now);
        assert_eq!(store.len(), 2);

        let created = store.ingest(vec![doc("c", &[])], now);
        assert_eq!(created.len(), 1);
        let names: Vec<String> = store.list().into_iter().map(|r| r.document_name).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert_eq!(store.get(created[0].id).unwrap().document_name, "c");
    }

    #[test]
    fn get_unknown_id_is_not_found() {
        let store = RecordStore::new();
        assert!(matches!(store.get(Uuid::new_v4()), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn update_replaces_fields_and_stamps_provenance() {
        let mut store = RecordStore::new();
        let t0 = Utc::now();
        let id = store.ingest(vec![doc("a.pdf", &[("invoice", 0.9)])], t0)[0].id;

        let t1 = t0 + chrono::Duration::seconds(5);
        let patch = RecordPatch {
            classifications: Some(vec![ClassificationLabel::new("receipt", 0.6)]),
            ..Default::default()
        };
        let applied = store.apply_update(id, patch, t1).unwrap();

        assert!(applied.record.manually_edited);
        assert_eq!(applied.record.updated_at, t1);
        assert_eq!(applied.record.created_at, t0);
        assert_eq!(applied.record.document_name, "a.pdf");
        assert_eq!(applied.record.classifications[0].label, "receipt");

        assert!(!applied.snapshot.manually_edited);
        assert_eq!(applied.snapshot.classifications[0].label, "invoice");
    }

    #[test]
    fn snapshot_is_independent_of_live_record() {
        let mut store = RecordStore::new();
        let now = Utc::now();
        let id = store.ingest(vec![doc("a.pdf", &[("invoice", 0.9)])], now)[0].id;

        let applied = store.apply_update(id, RecordPatch::default(), now).unwrap();
        let patch = RecordPatch {
            classifications: Some(vec![]),
            ..Default::default()
        };
        store.apply_update(id, patch, now).unwrap();

        assert_eq!(applied.snapshot.classifications.len(), 1);
        assert!(store.get(id).unwrap().classifications.is_empty());
    }

    #[test]
    fn restore_brings_back_snapshot_fields() {
        let mut store = RecordStore::new();
        let t0 = Utc::now();
        let id = store.ingest(vec![doc("a.pdf", &[("invoice", 0.9)])], t0)[0].id;

        let patch = RecordPatch { document_name: Some("b.pdf".into()), ..Default::default() };
        let applied = store.apply_update(id, patch, t0).unwrap();

        let t2 = t0 + chrono::Duration::seconds(10);
        let restored = store.restore(id, applied.snapshot, t2).unwrap();
        assert_eq!(restored.document_name, "a.pdf");
        assert_eq!(restored.created_at, t0);
        assert!(restored.manually_edited);
        assert_eq!(restored.updated_at, t2);
        assert_eq!(store.get(id).unwrap(), restored);
    }

    #[test]
    fn restore_after_reseed_is_not_found() {
        let mut store = RecordStore::new();
        let now = Utc::now();
        let id = store.ingest(vec![doc("a.pdf", &[("invoice", 0.9)])], now)[0].id;
        let applied = store.apply_update(id, RecordPatch::default(), now).unwrap();

        store.load_seed(vec![doc("other.pdf", &[])], now);
        assert!(matches!(store.restore(id, applied.snapshot, now), Err(StoreError::NotFound(_))));
        assert_eq!(store.len(), 1);
        assert_eq!(store.list()[0].document_name, "other.pdf");
    }

    #[test]
    fn list_is_a_detached_copy() {
        let mut store = RecordStore::new();
        store.ingest(vec![doc("a.pdf", &[("invoice", 0.9)])], Utc::now());

        let first = store.list();
        assert_eq!(first, store.list());

        let mut copy = store.list();
        copy[0].document_name = "tampered".into();
        copy[0].classifications.clear();
        assert_eq!(store.list(), first);
    }
}
