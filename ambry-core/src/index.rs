use crate::entry::BlobEntry;
use crate::error::{AmbryError, Result};
use crate::locator::Locator;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use tokio::sync::RwLock;

/// Page-size hint used when the caller does not supply one.
pub const DEFAULT_PAGE_SIZE: usize = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComparisonOp {
    Equals,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogicalOp {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// A single property comparison, evaluated against the serialized
/// (camelCase) form of a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyComparison {
    pub property: String,
    pub op: ComparisonOp,
    pub value: Value,
}

impl PropertyComparison {
    pub fn equals(property: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            property: property.into(),
            op: ComparisonOp::Equals,
            value: value.into(),
        }
    }

    fn matches(&self, record: &Value) -> bool {
        let actual = record.get(&self.property).unwrap_or(&Value::Null);
        match self.op {
            ComparisonOp::Equals => *actual == self.value,
        }
    }
}

/// Condition tree for index queries.
///
/// The wire form is flat: a comparison is `{"property", "op", "value"}` and
/// a group is `{"logic", "filters"}`, distinguished by their fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntryFilter {
    Comparison(PropertyComparison),
    Group {
        logic: LogicalOp,
        filters: Vec<EntryFilter>,
    },
}

impl EntryFilter {
    pub fn equals(property: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Comparison(PropertyComparison::equals(property, value))
    }

    pub fn all(filters: Vec<EntryFilter>) -> Self {
        Self::Group {
            logic: LogicalOp::And,
            filters,
        }
    }

    pub fn matches(&self, record: &Value) -> bool {
        match self {
            Self::Comparison(comparison) => comparison.matches(record),
            Self::Group { logic, filters } => match logic {
                LogicalOp::And => filters.iter().all(|filter| filter.matches(record)),
                LogicalOp::Or => filters.iter().any(|filter| filter.matches(record)),
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct SortSpec {
    pub property: String,
    pub direction: SortDirection,
}

/// One page of query results. The index may return fewer or more entries
/// than the page-size hint; the cursor is absent once results are exhausted.
#[derive(Debug, Clone, Default)]
pub struct EntryPage {
    pub entries: Vec<BlobEntry>,
    pub cursor: Option<String>,
}

/// Keyed, conditionable, queryable record store for entry metadata.
///
/// Equality conditions are compare-and-write guards evaluated against the
/// stored record: a mismatching condition rejects the write, hides the read,
/// or fails the delete. They are the only concurrency guard applied at this
/// layer.
#[async_trait]
pub trait EntryIndex: Send + Sync {
    /// Insert or replace the record. When a record already exists under the
    /// same id and any condition does not match it, the write is rejected.
    async fn put(&self, entry: BlobEntry, conditions: &[PropertyComparison]) -> Result<()>;

    /// Fetch a record by id. Absence and condition mismatch are
    /// indistinguishable by design.
    async fn get(&self, id: &Locator, conditions: &[PropertyComparison])
        -> Result<Option<BlobEntry>>;

    /// Delete a record by id, failing with `NotFound` when no record matches
    /// the id and conditions.
    async fn remove(&self, id: &Locator, conditions: &[PropertyComparison]) -> Result<()>;

    /// Query records matching the filter, sorted and paginated. The cursor is
    /// opaque to callers.
    async fn query(
        &self,
        filter: Option<&EntryFilter>,
        sort: &[SortSpec],
        cursor: Option<&str>,
        page_size: Option<usize>,
    ) -> Result<EntryPage>;
}

/// In-memory entry index for tests and single-process deployments.
#[derive(Debug, Default)]
pub struct MemoryEntryIndex {
    entries: RwLock<Vec<BlobEntry>>,
}

impl MemoryEntryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

fn record_value(entry: &BlobEntry) -> Result<Value> {
    serde_json::to_value(entry).map_err(|error| AmbryError::Backend(error.to_string()))
}

fn conditions_match(record: &Value, conditions: &[PropertyComparison]) -> bool {
    conditions.iter().all(|condition| condition.matches(record))
}

fn compare_properties(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Less,
        (_, Value::Null) => Ordering::Greater,
        (Value::String(left), Value::String(right)) => left.cmp(right),
        (Value::Number(left), Value::Number(right)) => left
            .as_f64()
            .partial_cmp(&right.as_f64())
            .unwrap_or(Ordering::Equal),
        (left, right) => left.to_string().cmp(&right.to_string()),
    }
}

#[async_trait]
impl EntryIndex for MemoryEntryIndex {
    async fn put(&self, entry: BlobEntry, conditions: &[PropertyComparison]) -> Result<()> {
        let mut entries = self.entries.write().await;
        if let Some(existing) = entries.iter_mut().find(|existing| existing.id == entry.id) {
            let record = record_value(existing)?;
            if !conditions_match(&record, conditions) {
                return Err(AmbryError::Backend(format!(
                    "entry conditions not met for '{}'",
                    entry.id
                )));
            }
            *existing = entry;
        } else {
            entries.push(entry);
        }
        Ok(())
    }

    async fn get(
        &self,
        id: &Locator,
        conditions: &[PropertyComparison],
    ) -> Result<Option<BlobEntry>> {
        let entries = self.entries.read().await;
        let Some(entry) = entries.iter().find(|entry| entry.id == *id) else {
            return Ok(None);
        };
        let record = record_value(entry)?;
        if !conditions_match(&record, conditions) {
            return Ok(None);
        }
        Ok(Some(entry.clone()))
    }

    async fn remove(&self, id: &Locator, conditions: &[PropertyComparison]) -> Result<()> {
        let mut entries = self.entries.write().await;
        let position = match entries.iter().position(|entry| entry.id == *id) {
            Some(position) => position,
            None => return Err(AmbryError::NotFound(id.to_string())),
        };
        let record = record_value(&entries[position])?;
        if !conditions_match(&record, conditions) {
            return Err(AmbryError::NotFound(id.to_string()));
        }
        entries.remove(position);
        Ok(())
    }

    async fn query(
        &self,
        filter: Option<&EntryFilter>,
        sort: &[SortSpec],
        cursor: Option<&str>,
        page_size: Option<usize>,
    ) -> Result<EntryPage> {
        let entries = self.entries.read().await;

        let mut matched = Vec::new();
        for entry in entries.iter() {
            let record = record_value(entry)?;
            if filter.map_or(true, |filter| filter.matches(&record)) {
                matched.push((entry.clone(), record));
            }
        }

        matched.sort_by(|(_, left), (_, right)| {
            for spec in sort {
                let a = left.get(&spec.property).unwrap_or(&Value::Null);
                let b = right.get(&spec.property).unwrap_or(&Value::Null);
                let ordering = match spec.direction {
                    SortDirection::Ascending => compare_properties(a, b),
                    SortDirection::Descending => compare_properties(b, a),
                };
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            Ordering::Equal
        });

        let offset = match cursor {
            Some(cursor) => cursor
                .parse::<usize>()
                .map_err(|_| AmbryError::Backend(format!("invalid cursor '{cursor}'")))?,
            None => 0,
        };
        let page_size = page_size.unwrap_or(DEFAULT_PAGE_SIZE);

        let page: Vec<BlobEntry> = matched
            .iter()
            .skip(offset)
            .take(page_size)
            .map(|(entry, _)| entry.clone())
            .collect();

        let next = offset + page.len();
        let cursor = (next < matched.len()).then(|| next.to_string());

        Ok(EntryPage {
            entries: page,
            cursor,
        })
    }
}
