use chrono::{DateTime, Utc};
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One predicted label and its confidence.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ClassificationLabel {
    pub label: String,
    pub score: f64,
}

impl ClassificationLabel {
    pub fn new(label: impl Into<String>, score: f64) -> Self {
        Self { label: label.into(), score }
    }
}

/// A document's classification entry plus edit provenance.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Record {
    /// Assigned by the store, never reused
    pub id: Uuid,

    pub document_name: String,

    /// Replaced as a whole on update
    pub classifications: Vec<ClassificationLabel>,

    /// Flips to true on the first update and stays there
    pub manually_edited: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Record {
    /// Builds a fresh, unedited record from caller input.
    pub fn from_new(id: Uuid, doc: NewDocument, now: DateTime<Utc>) -> Self {
        Self {
            id,
            document_name: doc.document_name,
            classifications: doc.classifications,
            manually_edited: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Highest label score, `-inf` when the record has no labels.
    pub fn max_score(&self) -> OrderedFloat<f64> {
        self.classifications
        .iter()
        .map(|c| OrderedFloat(c.score))
        .max()
        .unwrap_or(OrderedFloat(f64::NEG_INFINITY))
    }
}

/// Raw `{document_name, classifications}` entry as found in seed files and ingest bodies.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct NewDocument {
    pub document_name: String,
    pub classifications: Vec<ClassificationLabel>,
}

/// Partial update. Each present field fully replaces the stored value.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct RecordPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classifications: Option<Vec<ClassificationLabel>>,
}

impl RecordPatch {
    pub fn apply_to(self, record: &mut Record) {
        if let Some(name) = self.document_name {
            record.document_name = name;
        }
        if let Some(classifications) = self.classifications {
            record.classifications = classifications;
        }
    }
}
