//! Append-only, partition- and time-ordered record store.
//!
//! Every record lives under a partition key derived from its category and
//! optional channel, and a sort key derived from its timestamp (see
//! [`crate::model::time::sort_key`]). Rows are flat JSON objects holding the
//! payload fields plus [`PARTITION_FIELD`] and [`SORT_KEY_FIELD`].

pub mod backend;
pub mod file;
pub mod memory;

pub use backend::{KeyRange, StoreBackend, StoredRow};
pub use file::JsonlBackend;
pub use memory::MemoryBackend;

use crate::error::{RelayError, Result};
use crate::model::time;
use crate::model::{Channel, Stamped};
use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Row field holding the partition key.
pub const PARTITION_FIELD: &str = "partition";

/// Row field holding the sort key.
pub const SORT_KEY_FIELD: &str = "uploadDate";

/// Closed set of record categories. Names never contain `-`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    AnalogReading,
    DigitalValue,
    Host,
    LedState,
    LightSensorReading,
    DeviceToken,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AnalogReading => "AnalogReading",
            Self::DigitalValue => "DigitalValue",
            Self::Host => "Host",
            Self::LedState => "LedState",
            Self::LightSensorReading => "LightSensorReading",
            Self::DeviceToken => "DeviceToken",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Partition key: `"<Category>"` or `"<Category>-<channel>"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PartitionKey(String);

impl PartitionKey {
    pub fn new(category: Category, channel: Option<Channel>) -> Self {
        match channel {
            Some(channel) => Self(format!("{}-{}", category, channel)),
            None => Self(category.as_str().to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A value that can live in the time store.
pub trait Record: Serialize + DeserializeOwned + Send + Sync + 'static {
    const CATEGORY: Category;

    fn channel(&self) -> Option<Channel> {
        None
    }

    fn timestamp(&self) -> DateTime<Utc>;

    fn partition(&self) -> PartitionKey {
        PartitionKey::new(Self::CATEGORY, self.channel())
    }
}

/// A state value without its own timestamp; stored as [`Stamped<T>`].
pub trait Snapshot: Serialize + DeserializeOwned + Send + Sync + 'static {
    const CATEGORY: Category;

    fn channel(&self) -> Option<Channel> {
        None
    }
}

impl<T: Snapshot> Record for Stamped<T> {
    const CATEGORY: Category = T::CATEGORY;

    fn channel(&self) -> Option<Channel> {
        self.value.channel()
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.recorded_at
    }
}

/// How far back `latest` and `recent` look.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookback {
    /// Only records within `[now - horizon, now]` are considered.
    Horizon(Duration),
    /// Every record in the partition is considered.
    Unbounded,
}

impl Lookback {
    pub fn days(days: i64) -> Self {
        Self::Horizon(Duration::days(days))
    }

    fn key_range(self) -> Result<KeyRange> {
        match self {
            Self::Horizon(horizon) => {
                let now = time::now();
                Ok(KeyRange::between(
                    time::sort_key(&(now - horizon))?,
                    time::sort_key(&now)?,
                ))
            }
            Self::Unbounded => Ok(KeyRange::all()),
        }
    }
}

impl Default for Lookback {
    fn default() -> Self {
        Self::days(crate::DEFAULT_LOOKBACK_DAYS)
    }
}

/// Typed view of a [`StoreBackend`] for one record kind.
pub struct PartitionedTimeStore<R> {
    backend: Arc<dyn StoreBackend>,
    lookback: Lookback,
    decode_errors: AtomicU64,
    _record: PhantomData<fn() -> R>,
}

impl<R: Record> PartitionedTimeStore<R> {
    pub fn new(backend: Arc<dyn StoreBackend>) -> Self {
        Self {
            backend,
            lookback: Lookback::default(),
            decode_errors: AtomicU64::new(0),
            _record: PhantomData,
        }
    }

    pub fn with_lookback(mut self, lookback: Lookback) -> Self {
        self.lookback = lookback;
        self
    }

    pub fn lookback(&self) -> Lookback {
        self.lookback
    }

    /// Persist a record and return it as stored.
    pub async fn append(&self, record: R) -> Result<R> {
        let partition = record.partition();
        let sort_key = time::sort_key(&record.timestamp())?;
        let item = match serde_json::to_value(&record) {
            Ok(Value::Object(item)) => item,
            Ok(other) => {
                return Err(RelayError::internal_error(format!(
                    "{} encoded to a non-object: {}",
                    R::CATEGORY,
                    other
                )))
            }
            Err(e) => {
                return Err(RelayError::internal_error(format!(
                    "Failed to encode {}: {}",
                    R::CATEGORY,
                    e
                )))
            }
        };

        let row = StoredRow::new(partition.as_str(), sort_key, item);
        let stored = decode_row::<R>(&row)?;
        self.backend.put(row).await?;
        debug!("Appended {} record to {}", R::CATEGORY, partition);
        Ok(stored)
    }

    /// Records with `from <= timestamp <= to`, ascending by time.
    pub async fn query_range(
        &self,
        partition: &PartitionKey,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<R>> {
        if from > to {
            return Err(RelayError::invalid_range(
                time::format_timestamp(&from),
                time::format_timestamp(&to),
            ));
        }

        let range = KeyRange::between(time::sort_key(&from)?, time::sort_key(&to)?);
        let rows = self.backend.query(partition.as_str(), range).await?;
        Ok(self
            .decode_all(rows)
            .into_iter()
            .filter(|record| {
                let at = record.timestamp();
                from <= at && at <= to
            })
            .collect())
    }

    /// The newest record in the partition within the lookback window.
    pub async fn latest(&self, partition: &PartitionKey) -> Result<Option<R>> {
        let rows = self
            .backend
            .query(partition.as_str(), self.lookback.key_range()?)
            .await?;

        for row in rows.iter().rev() {
            match decode_row::<R>(row) {
                Ok(record) => return Ok(Some(record)),
                Err(e) => self.skip(row, &e),
            }
        }
        Ok(None)
    }

    /// Every record in the partition within the lookback window, ascending.
    pub async fn recent(&self, partition: &PartitionKey) -> Result<Vec<R>> {
        let rows = self
            .backend
            .query(partition.as_str(), self.lookback.key_range()?)
            .await?;
        Ok(self.decode_all(rows))
    }

    /// Rows skipped so far because they failed to decode.
    pub fn decode_errors(&self) -> u64 {
        self.decode_errors.load(Ordering::Relaxed)
    }

    fn decode_all(&self, rows: Vec<StoredRow>) -> Vec<R> {
        rows.iter()
            .filter_map(|row| match decode_row::<R>(row) {
                Ok(record) => Some(record),
                Err(e) => {
                    self.skip(row, &e);
                    None
                }
            })
            .collect()
    }

    fn skip(&self, row: &StoredRow, error: &RelayError) {
        self.decode_errors.fetch_add(1, Ordering::Relaxed);
        warn!(
            "Skipping row {}/{}: {}",
            row.partition, row.sort_key, error
        );
    }
}

fn decode_row<R: Record>(row: &StoredRow) -> Result<R> {
    let at = time::parse_timestamp(&row.sort_key)?;
    if time::sort_key(&at)? != row.sort_key {
        return Err(RelayError::decode_failure(
            "sort key",
            format!("'{}' is not in canonical form", row.sort_key),
        ));
    }
    serde_json::from_value(Value::Object(row.item.clone()))
        .map_err(|e| RelayError::decode_failure(R::CATEGORY.as_str(), e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AnalogReading, LedState};
    use chrono::TimeZone;
    use serde_json::json;
    use std::collections::HashSet;

    fn at(secs: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, secs).unwrap()
    }

    fn analog_store() -> (Arc<MemoryBackend>, PartitionedTimeStore<AnalogReading>) {
        let backend = Arc::new(MemoryBackend::new());
        let store = PartitionedTimeStore::new(backend.clone() as Arc<dyn StoreBackend>);
        (backend, store)
    }

    #[test]
    fn test_partition_keys_are_injective() {
        let categories = [
            Category::AnalogReading,
            Category::DigitalValue,
            Category::Host,
            Category::LedState,
            Category::LightSensorReading,
            Category::DeviceToken,
        ];
        let mut seen = HashSet::new();
        for category in categories {
            assert!(seen.insert(PartitionKey::new(category, None)));
            for channel in [0, 1, 2, 10, 20, 21, 255] {
                assert!(seen.insert(PartitionKey::new(category, Some(channel))));
            }
        }
        assert_eq!(
            PartitionKey::new(Category::AnalogReading, Some(2)).as_str(),
            "AnalogReading-2"
        );
    }

    #[tokio::test]
    async fn test_range_is_inclusive_and_ordered() {
        let (_, store) = analog_store();
        for secs in [30, 10, 20, 40] {
            store
                .append(AnalogReading::new(1, at(secs), secs as f64))
                .await
                .unwrap();
        }

        let partition = PartitionKey::new(Category::AnalogReading, Some(1));
        let records = store.query_range(&partition, at(10), at(30)).await.unwrap();
        let values: Vec<f64> = records.iter().map(|r| r.value).collect();
        assert_eq!(values, vec![10.0, 20.0, 30.0]);

        let empty = store.query_range(&partition, at(50), at(59)).await.unwrap();
        assert!(empty.is_empty());
    }

    #[tokio::test]
    async fn test_reversed_range_is_rejected() {
        let (_, store) = analog_store();
        let partition = PartitionKey::new(Category::AnalogReading, Some(1));
        let err = store
            .query_range(&partition, at(30), at(10))
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::InvalidRange { .. }));
    }

    #[tokio::test]
    async fn test_latest_returns_newest_within_lookback() {
        let store = PartitionedTimeStore::<Stamped<LedState>>::new(Arc::new(MemoryBackend::new()));
        let partition = PartitionKey::new(Category::LedState, None);
        assert!(store.latest(&partition).await.unwrap().is_none());

        let now = time::now();
        store
            .append(Stamped::new(now - Duration::minutes(5), LedState { on: false }))
            .await
            .unwrap();
        store
            .append(Stamped::new(now - Duration::minutes(1), LedState { on: true }))
            .await
            .unwrap();

        let latest = store.latest(&partition).await.unwrap().unwrap();
        assert!(latest.value.on);
    }

    #[tokio::test]
    async fn test_lookback_horizon_hides_old_records() {
        let backend: Arc<dyn StoreBackend> = Arc::new(MemoryBackend::new());
        let bounded = PartitionedTimeStore::<AnalogReading>::new(backend.clone());
        let unbounded =
            PartitionedTimeStore::<AnalogReading>::new(backend).with_lookback(Lookback::Unbounded);

        let old = time::now() - Duration::days(400);
        bounded
            .append(AnalogReading::new(2, old, 71.5))
            .await
            .unwrap();

        let partition = PartitionKey::new(Category::AnalogReading, Some(2));
        assert!(bounded.latest(&partition).await.unwrap().is_none());
        assert!(bounded.recent(&partition).await.unwrap().is_empty());
        assert_eq!(
            unbounded.latest(&partition).await.unwrap().map(|r| r.value),
            Some(71.5)
        );
    }

    #[tokio::test]
    async fn test_corrupt_rows_are_skipped_and_counted() {
        let (backend, store) = analog_store();
        store.append(AnalogReading::new(1, at(0), 1.0)).await.unwrap();
        store.append(AnalogReading::new(1, at(2), 3.0)).await.unwrap();

        // Valid key, payload missing `value`
        let bad_payload = json!({"channel": 1}).as_object().cloned().unwrap();
        backend
            .put(StoredRow::new("AnalogReading-1", "2025-01-01T00:00:01.000Z", bad_payload))
            .await
            .unwrap();
        // Key sorts inside the range but is not a timestamp
        let bad_key = json!({"channel": 1, "value": 9.0}).as_object().cloned().unwrap();
        backend
            .put(StoredRow::new("AnalogReading-1", "2025-01-01T00:00:01.500Zjunk", bad_key))
            .await
            .unwrap();

        let partition = PartitionKey::new(Category::AnalogReading, Some(1));
        let records = store.query_range(&partition, at(0), at(3)).await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(store.decode_errors(), 2);
    }

    #[tokio::test]
    async fn test_append_returns_stored_record() {
        let (_, store) = analog_store();
        let precise = at(0) + Duration::microseconds(1_234_567);
        let stored = store
            .append(AnalogReading::new(0, precise, 12.0))
            .await
            .unwrap();
        assert_eq!(
            time::format_timestamp(&stored.upload_date),
            "2025-01-01T00:00:01.234Z"
        );
    }
}
