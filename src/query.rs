use std::cmp::Ordering;
use std::collections::HashMap;
use serde::Serialize;

use crate::model::Record;

pub const DEFAULT_PAGE: i64 = 1;
pub const DEFAULT_LIMIT: i64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Name,
    Confidence,
    Updated,
}

impl SortKey {
    /// Unknown keys yield `None`, which leaves the order untouched.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "name" => Some(Self::Name),
            "confidence" => Some(Self::Confidence),
            "updated" => Some(Self::Updated),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn parse(raw: &str) -> Self {
        if raw.eq_ignore_ascii_case("desc") { Self::Desc } else { Self::Asc }
    }
}

/// Listing parameters, all optional.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryParams {
    pub label_type: Option<String>,
    pub min_confidence: Option<f64>,
    pub max_confidence: Option<f64>,
    pub sort: Option<SortKey>,
    pub order: SortOrder,
    pub page: i64,
    pub limit: i64,
}

impl Default for QueryParams {
    fn default() -> Self {
        Self {
            label_type: None,
            min_confidence: None,
            max_confidence: None,
            sort: None,
            order: SortOrder::Asc,
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl QueryParams {
    /// Builds params from raw query-string pairs.
    /// Values that fail to parse are treated as if they were never sent.
    pub fn from_pairs(pairs: &HashMap<String, String>) -> Self {
        let text = |key: &str| pairs.get(key).map(|v| v.trim()).filter(|v| !v.is_empty());
        let float = |key: &str| text(key).and_then(|v| v.parse::<f64>().ok()).filter(|v| !v.is_nan());
        let int = |key: &str| text(key).and_then(|v| v.parse::<i64>().ok());

        Self {
            label_type: text("type").map(str::to_string),
            min_confidence: float("min_confidence"),
            max_confidence: float("max_confidence"),
            sort: text("sort").and_then(SortKey::parse),
            order: text("order").map(SortOrder::parse).unwrap_or_default(),
            page: int("page").unwrap_or(DEFAULT_PAGE),
            limit: int("limit").unwrap_or(DEFAULT_LIMIT),
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
    pub total: usize,
    pub pages: usize,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct QueryPage {
    pub data: Vec<Record>,
    pub pagination: Pagination,
}

/// Filter, sort and page a record set. The input is never modified.
pub fn query(records: &[Record], params: &QueryParams) -> QueryPage {
    // 1 + 2. Filters
    let mut matched: Vec<&Record> = records
    .iter()
    .filter(|r| matches_type(r, params.label_type.as_deref()))
    .filter(|r| matches_confidence(r, params.min_confidence, params.max_confidence))
    .collect();

    // 3. Sort (stable, so ties keep insertion order)
    if let Some(key) = params.sort {
        matched.sort_by(|a, b| {
            let ord = compare(a, b, key);
            match params.order {
                SortOrder::Asc => ord,
                SortOrder::Desc => ord.reverse(),
            }
        });
    }

    // 4. Pagination
    let total = matched.len();
    let data = page_slice(&matched, params.page, params.limit)
    .iter()
    .map(|r| (*r).clone())
    .collect();

    QueryPage {
        data,
        pagination: Pagination {
            page: params.page,
            limit: params.limit,
            total,
            pages: page_count(total, params.limit),
        },
    }
}

fn matches_type(record: &Record, needle: Option<&str>) -> bool {
    let Some(needle) = needle else { return true };
    let needle = needle.to_lowercase();
    record
    .classifications
    .iter()
    .any(|c| c.label.to_lowercase().contains(&needle))
}

// The two bounds are checked independently: one label may satisfy the
// minimum while a different label satisfies the maximum.
fn matches_confidence(record: &Record, min: Option<f64>, max: Option<f64>) -> bool {
    let labels = &record.classifications;
    let min_ok = min.map_or(true, |min| labels.iter().any(|c| c.score >= min));
    let max_ok = max.map_or(true, |max| labels.iter().any(|c| c.score <= max));
    min_ok && max_ok
}

fn compare(a: &Record, b: &Record, key: SortKey) -> Ordering {
    match key {
        SortKey::Name => collate(&a.document_name, &b.document_name),
        SortKey::Confidence => a.max_score().cmp(&b.max_score()),
        SortKey::Updated => a.updated_at.cmp(&b.updated_at),
    }
}

/// Case-insensitive first, lowercase before uppercase on ties: "apple" < "banana" < "Banana".
fn collate(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
    .cmp(&b.to_lowercase())
    .then_with(|| b.cmp(a))
}

fn page_slice<'a, T>(items: &'a [T], page: i64, limit: i64) -> &'a [T] {
    if page < 1 || limit < 1 {
        return &[];
    }
    let limit = limit as usize;
    let start = (page as usize - 1).saturating_mul(limit);
    if start >= items.len() {
        return &[];
    }
    let end = start.saturating_add(limit).min(items.len());
    &items[start..end]
}

fn page_count(total: usize, limit: i64) -> usize {
    if limit < 1 {
        return 0;
    }
    total.div_ceil(limit as usize)
}
