use chrono::{TimeZone, Utc};
use pi_everywhere::{
    error::{ApiErrorBody, ErrorKind, RelayError},
    model::{time, AnalogReading, DateRange, Host, Resource},
    store::{Category, Lookback, PartitionKey},
    RelayConfig, WebConfig,
};
use pretty_assertions::assert_eq;
use std::collections::HashSet;

/// Test AnalogReading serialization uses the wire field names
#[test]
fn test_analog_reading_serialization() {
    let reading = AnalogReading::new(
        2,
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 30, 0).unwrap(),
        71.25,
    );

    let json = serde_json::to_value(&reading).expect("Should serialize reading");
    assert_eq!(
        json,
        serde_json::json!({
            "channel": 2,
            "uploadDate": "2025-06-01T12:30:00.000Z",
            "value": 71.25
        })
    );

    let back: AnalogReading = serde_json::from_value(json).expect("Should deserialize reading");
    assert_eq!(back, reading);
}

#[test]
fn test_whole_second_dates_are_accepted() {
    let reading: AnalogReading =
        serde_json::from_str(r#"{"channel":1,"uploadDate":"2025-01-01T00:00:00Z","value":1.0}"#)
            .expect("Should accept dates without fractional seconds");
    assert_eq!(
        time::format_timestamp(&reading.upload_date),
        "2025-01-01T00:00:00.000Z"
    );
}

#[test]
fn test_date_range() {
    let range = DateRange::parse("2025-01-01T00:00:00Z", "2025-01-31T23:59:59.999Z")
        .expect("Should build range");
    assert!(range.contains(&Utc.with_ymd_and_hms(2025, 1, 15, 0, 0, 0).unwrap()));
    assert!(range.contains(&range.start_date));
    assert!(range.contains(&range.end_date));
    assert!(!range.contains(&Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap()));

    let json = serde_json::to_value(range).unwrap();
    assert_eq!(json["startDate"], "2025-01-01T00:00:00.000Z");
}

#[test]
fn test_partition_key_injectivity() {
    let categories = [
        Category::AnalogReading,
        Category::DigitalValue,
        Category::LightSensorReading,
    ];
    let keys: HashSet<String> = categories
        .iter()
        .flat_map(|&category| {
            (0..5u8).map(move |channel| PartitionKey::new(category, Some(channel)).to_string())
        })
        .collect();
    assert_eq!(keys.len(), 15);
    assert!(keys.iter().all(|key| key.matches('-').count() == 1));
}

#[test]
fn test_error_kinds_and_statuses() {
    let cases = [
        (RelayError::invalid_range("b", "a"), ErrorKind::InvalidRange, 400),
        (RelayError::decode_failure("body", "bad"), ErrorKind::DecodeFailure, 400),
        (RelayError::not_found("nothing"), ErrorKind::NotFound, 404),
        (RelayError::unsupported("no"), ErrorKind::Unsupported, 501),
        (RelayError::remote_failure(None, "refused"), ErrorKind::RemoteFailure, 502),
        (RelayError::Timeout("slow".into()), ErrorKind::Timeout, 504),
        (RelayError::hardware_error("spi"), ErrorKind::InternalError, 500),
    ];

    for (error, kind, status) in cases {
        assert_eq!(error.kind(), kind);
        assert_eq!(kind.http_status(), status);
    }
}

#[test]
fn test_error_body_format() {
    let body = RelayError::not_found("no host registered").to_body();
    let json = serde_json::to_string(&body).unwrap();
    assert_eq!(
        json,
        r#"{"kind":"NotFound","description":"Not found: no host registered"}"#
    );
    let back: ApiErrorBody = serde_json::from_str(&json).unwrap();
    assert_eq!(back, body);
}

#[test]
fn test_host_serialization() {
    let host: Host =
        serde_json::from_str(r#"{"ipAddress":"10.0.0.2","port":8080,"lastSeen":"2025-01-01T00:00:00.000Z"}"#)
            .unwrap();
    assert_eq!(host.port, 8080);
    assert!(host.last_seen.is_some());
}

#[test]
fn test_resource_paths() {
    assert_eq!(Resource::AnalogReadings.path(), "/analogReadings");
    assert_eq!(Resource::LightSensorReadings.path(), "/lightSensorReadings");
    assert_eq!(Resource::ALL.len(), 7);
}

#[test]
fn test_web_config() {
    let config = WebConfig::new("127.0.0.1", 3000)
        .with_cors(false)
        .with_body_limit(1024);

    assert_eq!(config.bind_address(), "127.0.0.1:3000");
    assert!(!config.enable_cors);
    assert_eq!(config.body_limit, 1024);
}

#[test]
fn test_relay_config_defaults() {
    let config = RelayConfig::default();
    assert_eq!(config.web.port, pi_everywhere::DEFAULT_WEB_PORT);
    assert_eq!(config.store.lookback(), Lookback::days(365));
    assert!(config.upstream.base_url.is_none());
    assert!(config.auth.token.is_none());
    assert_eq!(config.poll.channels, vec![0, 1, 2]);
}

/// Test the time store keeps channels apart and orders by time
#[test]
fn test_store_partitions_are_isolated() {
    use pi_everywhere::store::{MemoryBackend, StoreBackend};
    use pi_everywhere::PartitionedTimeStore;
    use std::sync::Arc;

    let backend: Arc<dyn StoreBackend> = Arc::new(MemoryBackend::new());
    let store: PartitionedTimeStore<AnalogReading> =
        PartitionedTimeStore::new(backend).with_lookback(Lookback::Unbounded);
    let at = |hour| Utc.with_ymd_and_hms(2025, 1, 1, hour, 0, 0).unwrap();

    tokio_test::block_on(async {
        store.append(AnalogReading::new(1, at(2), 2.0)).await.expect("Should append");
        store.append(AnalogReading::new(1, at(1), 1.0)).await.expect("Should append");
        store.append(AnalogReading::new(2, at(3), 9.0)).await.expect("Should append");

        let channel_one = PartitionKey::new(Category::AnalogReading, Some(1));
        let readings = store
            .query_range(&channel_one, at(0), at(23))
            .await
            .expect("Should query range");
        let values: Vec<f64> = readings.iter().map(|r| r.value).collect();
        assert_eq!(values, vec![1.0, 2.0]);

        let latest = store.latest(&channel_one).await.expect("Should read latest");
        assert_eq!(latest.map(|r| r.value), Some(2.0));
    });
}
