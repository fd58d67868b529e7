//! Storage backend abstraction underneath the typed stores.

use super::{PARTITION_FIELD, SORT_KEY_FIELD};
use crate::error::{RelayError, Result};
use async_trait::async_trait;
use serde_json::{Map, Value};

/// One persisted row: a flat JSON object holding the payload fields plus the
/// partition and sort key fields.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRow {
    pub partition: String,
    pub sort_key: String,
    pub item: Map<String, Value>,
}

impl StoredRow {
    /// Build a row from a payload object, stamping the key fields into it.
    pub fn new(
        partition: impl Into<String>,
        sort_key: impl Into<String>,
        mut item: Map<String, Value>,
    ) -> Self {
        let partition = partition.into();
        let sort_key = sort_key.into();
        item.insert(PARTITION_FIELD.to_string(), Value::String(partition.clone()));
        item.insert(SORT_KEY_FIELD.to_string(), Value::String(sort_key.clone()));
        Self {
            partition,
            sort_key,
            item,
        }
    }

    /// Recover a row from its flat object form, as read back from disk.
    pub fn from_item(item: Map<String, Value>) -> Result<Self> {
        let field = |name: &str| {
            item.get(name)
                .and_then(Value::as_str)
                .map(str::to_owned)
                .ok_or_else(|| RelayError::decode_failure("stored row", format!("missing '{name}'")))
        };
        let partition = field(PARTITION_FIELD)?;
        let sort_key = field(SORT_KEY_FIELD)?;
        Ok(Self {
            partition,
            sort_key,
            item,
        })
    }
}

/// Inclusive sort-key bounds; `None` leaves that side open.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyRange {
    pub start: Option<String>,
    pub end: Option<String>,
}

impl KeyRange {
    pub fn between(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            start: Some(start.into()),
            end: Some(end.into()),
        }
    }

    pub fn all() -> Self {
        Self::default()
    }

    pub(crate) fn is_empty(&self) -> bool {
        matches!((&self.start, &self.end), (Some(start), Some(end)) if start > end)
    }
}

/// Key/value persistence shared by every typed store.
///
/// Implementations must make each `put` atomic and let a second `put` under
/// the same partition and sort key replace the first.
#[async_trait]
pub trait StoreBackend: Send + Sync {
    /// Persist one row.
    async fn put(&self, row: StoredRow) -> Result<()>;

    /// All rows of a partition whose sort key lies in `range`, ascending by sort key.
    async fn query(&self, partition: &str, range: KeyRange) -> Result<Vec<StoredRow>>;

    /// Short name used in logs and `info` output.
    fn name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_row_carries_key_fields() {
        let item = json!({"on": true}).as_object().cloned().unwrap();
        let row = StoredRow::new("LedState", "2025-01-01T00:00:00.000Z", item);
        assert_eq!(row.item["partition"], "LedState");
        assert_eq!(row.item["uploadDate"], "2025-01-01T00:00:00.000Z");

        let back = StoredRow::from_item(row.item.clone()).unwrap();
        assert_eq!(back, row);
    }

    #[test]
    fn test_row_without_partition_is_rejected() {
        let item = json!({"uploadDate": "2025-01-01T00:00:00.000Z"})
            .as_object()
            .cloned()
            .unwrap();
        assert!(StoredRow::from_item(item).is_err());
    }

    #[test]
    fn test_reversed_key_range_is_empty() {
        assert!(KeyRange::between("b", "a").is_empty());
        assert!(!KeyRange::between("a", "a").is_empty());
        assert!(!KeyRange::all().is_empty());
    }
}
