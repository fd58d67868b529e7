//! Timestamp handling shared by the store, the facades and the HTTP surface.
//!
//! Every instant that enters the system is truncated to millisecond precision
//! and rendered as `YYYY-MM-DDTHH:MM:SS.mmmZ`. That fixed-width rendering is the
//! store's sort key, so string order and chronological order agree.

use crate::error::{RelayError, Result};
use chrono::{DateTime, Datelike, SecondsFormat, SubsecRound, Utc};

/// Length of a rendered sort key.
pub const SORT_KEY_LEN: usize = 24;

/// The current instant at millisecond precision.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

/// Render an instant as a lexicographically sortable key.
///
/// Years outside 0000..=9999 would break the fixed width and are rejected.
pub fn sort_key(at: &DateTime<Utc>) -> Result<String> {
    if !(0..=9999).contains(&at.year()) {
        return Err(RelayError::decode_failure(
            "timestamp",
            format!("year {} is outside the sortable range", at.year()),
        ));
    }
    Ok(format_timestamp(at))
}

/// Render an instant with exactly three fractional digits and a `Z` suffix.
pub fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.trunc_subsecs(3)
        .to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse an RFC 3339 / ISO-8601 instant, with or without fractional seconds.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|at| at.with_timezone(&Utc).trunc_subsecs(3))
        .map_err(|e| RelayError::decode_failure(format!("timestamp '{raw}'"), e))
}

/// Serde adapter for `DateTime<Utc>` fields rendered as sort-key strings.
pub mod iso8601 {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(at: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_timestamp(at))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_timestamp(&raw).map_err(serde::de::Error::custom)
    }

    /// Same rendering for optional fields.
    pub mod option {
        use chrono::{DateTime, Utc};
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(
            at: &Option<DateTime<Utc>>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match at {
                Some(at) => serializer.serialize_some(&super::super::format_timestamp(at)),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<DateTime<Utc>>, D::Error> {
            Option::<String>::deserialize(deserializer)?
                .map(|raw| super::super::parse_timestamp(&raw).map_err(serde::de::Error::custom))
                .transpose()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_sort_key_is_fixed_width() {
        let at = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let key = sort_key(&at).unwrap();
        assert_eq!(key, "2025-01-01T00:00:00.000Z");
        assert_eq!(key.len(), SORT_KEY_LEN);
    }

    #[test]
    fn test_sort_key_order_matches_time_order() {
        let base = Utc.with_ymd_and_hms(2024, 12, 31, 23, 59, 59).unwrap();
        let offsets = [0, 1, 9, 10, 99, 100, 999, 1_000, 61_000, 86_400_000];
        let keys: Vec<String> = offsets
            .iter()
            .map(|ms| sort_key(&(base + Duration::milliseconds(*ms))).unwrap())
            .collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
    }

    #[test]
    fn test_parse_accepts_whole_seconds_and_offsets() {
        let a = parse_timestamp("2025-01-01T00:00:00Z").unwrap();
        let b = parse_timestamp("2025-01-01T01:00:00.000+01:00").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        let err = parse_timestamp("yesterday").unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::DecodeFailure);
    }

    #[test]
    fn test_sub_millisecond_precision_is_truncated() {
        let at = parse_timestamp("2025-01-01T00:00:00.123456Z").unwrap();
        assert_eq!(format_timestamp(&at), "2025-01-01T00:00:00.123Z");
    }
}
