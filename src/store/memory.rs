//! In-process backend: one ordered map per partition.

use super::backend::{KeyRange, StoreBackend, StoredRow};
use crate::error::Result;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use tokio::sync::RwLock;

type Partition = BTreeMap<String, Map<String, Value>>;

/// Volatile backend; contents are lost when the process exits.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    partitions: RwLock<HashMap<String, Partition>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows across all partitions.
    pub async fn len(&self) -> usize {
        self.partitions.read().await.values().map(BTreeMap::len).sum()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl StoreBackend for MemoryBackend {
    async fn put(&self, row: StoredRow) -> Result<()> {
        let mut partitions = self.partitions.write().await;
        partitions
            .entry(row.partition)
            .or_default()
            .insert(row.sort_key, row.item);
        Ok(())
    }

    async fn query(&self, partition: &str, range: KeyRange) -> Result<Vec<StoredRow>> {
        // BTreeMap::range panics on reversed bounds
        if range.is_empty() {
            return Ok(Vec::new());
        }

        let partitions = self.partitions.read().await;
        let Some(rows) = partitions.get(partition) else {
            return Ok(Vec::new());
        };

        let lower = range
            .start
            .as_deref()
            .map_or(Bound::Unbounded, Bound::Included);
        let upper = range
            .end
            .as_deref()
            .map_or(Bound::Unbounded, Bound::Included);

        Ok(rows
            .range::<str, _>((lower, upper))
            .map(|(sort_key, item)| StoredRow {
                partition: partition.to_string(),
                sort_key: sort_key.clone(),
                item: item.clone(),
            })
            .collect())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
