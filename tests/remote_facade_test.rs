// Tests for `RemoteFacade` against a wiremock peer.

use pi_everywhere::{
    device::ChannelMap,
    error::{ErrorKind, RelayError},
    model::{DateRange, Host, LedState},
    DeviceFacade, RemoteFacade,
};
use reqwest::Url;
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn setup() -> (MockServer, RemoteFacade) {
    let server = MockServer::start().await;
    let facade = RemoteFacade::new(&server.uri(), Duration::from_secs(2)).unwrap();
    (server, facade)
}

#[tokio::test]
async fn test_get_analog_reading() {
    let (server, facade) = setup().await;

    Mock::given(method("GET"))
        .and(path("/analogReadings/2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "channel": 2,
            "uploadDate": "2025-01-01T00:00:00.000Z",
            "value": 68.4
        })))
        .expect(1)
        .mount(&server)
        .await;

    let reading = facade.get_analog_reading(2).await.unwrap();
    assert_eq!(reading.channel, 2);
    assert_eq!(reading.value, 68.4);
}

#[tokio::test]
async fn test_ranged_read_sends_query() {
    let (server, facade) = setup().await;

    Mock::given(method("GET"))
        .and(path("/analogReadings"))
        .and(query_param("channel", "1"))
        .and(query_param("startDate", "2025-01-01T00:00:00.000Z"))
        .and(query_param("endDate", "2025-01-02T00:00:00.000Z"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let range = DateRange::parse("2025-01-01T00:00:00Z", "2025-01-02T00:00:00Z").unwrap();
    let readings = facade.get_analog_readings(1, range).await.unwrap();
    assert!(readings.is_empty());
}

#[tokio::test]
async fn test_post_led_state() {
    let (server, facade) = setup().await;

    Mock::given(method("POST"))
        .and(path("/led"))
        .and(body_json(json!({"on": true})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"on": true})))
        .expect(1)
        .mount(&server)
        .await;

    let state = facade.update_led_state(LedState { on: true }).await.unwrap();
    assert!(state.on);
}

#[tokio::test]
async fn test_non_2xx_is_remote_failure_with_peer_error() {
    let (server, facade) = setup().await;

    Mock::given(method("GET"))
        .and(path("/host"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "kind": "NotFound",
            "description": "Not found: no host registered"
        })))
        .mount(&server)
        .await;

    let err = facade.get_host().await.unwrap_err();
    match err {
        RelayError::RemoteFailure { status, message } => {
            assert_eq!(status, Some(404));
            assert!(message.contains("NotFound"), "unexpected message: {message}");
        }
        other => panic!("expected RemoteFailure, got: {other:?}"),
    }
}

#[tokio::test]
async fn test_undecodable_body_is_remote_failure() {
    let (server, facade) = setup().await;

    Mock::given(method("POST"))
        .and(path("/host"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>gateway</html>"))
        .mount(&server)
        .await;

    let err = facade
        .post_host(Host::new("10.0.0.3", 8080))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RemoteFailure);
}

#[tokio::test]
async fn test_slow_peer_is_timeout() {
    let server = MockServer::start().await;
    let facade = RemoteFacade::new(&server.uri(), Duration::from_millis(100)).unwrap();

    Mock::given(method("GET"))
        .and(path("/led"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"on": false}))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let err = facade.get_led_state().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Timeout);
}

#[tokio::test]
async fn test_local_channel_map_short_circuits() {
    let server = MockServer::start().await;
    let base = Url::parse(&server.uri()).unwrap();
    let facade =
        RemoteFacade::from_reqwest(reqwest::Client::new(), base).with_channels(ChannelMap::default());

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let err = facade.get_analog_reading(7).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsupportedChannel);
}

#[tokio::test]
async fn test_unreachable_peer_is_remote_failure() {
    // Nothing listens on port 9 of localhost
    let facade = RemoteFacade::new("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();
    let err = facade.get_led_state().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RemoteFailure);
}
