use std::fs;
use std::path::Path;

use crate::error::{StoreError, StoreResult};
use crate::model::NewDocument;

/// Parses a JSON array of `{document_name, classifications}` entries.
pub fn parse_seed(raw: &str) -> StoreResult<Vec<NewDocument>> {
    serde_json::from_str(raw).map_err(|e| StoreError::SeedLoad { reason: e.to_string() })
}

/// Reads and parses a seed file.
pub fn read_seed_file(path: &Path) -> StoreResult<Vec<NewDocument>> {
    let raw = fs::read_to_string(path).map_err(|e| StoreError::SeedLoad {
        reason: format!("{}: {}", path.display(), e),
    })?;
    parse_seed(&raw)
}
