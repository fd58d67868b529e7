//! Route table and middleware setup.

use super::config::WebConfig;
use super::handlers;
use super::response::panic_response;
use super::state::AppState;
use crate::model::Resource;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post, MethodRouter};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

fn routed(method_router: MethodRouter<AppState>) -> MethodRouter<AppState> {
    method_router.fallback(handlers::method_not_allowed)
}

/// Create the axum application with all routes and middleware.
pub fn create_app(state: AppState, config: &WebConfig) -> Router {
    let analog = Resource::AnalogReadings.path();
    let analog_channel = format!("{}/:channel", analog);
    let digital = Resource::DigitalValues.path();
    let digital_channel = format!("{}/:channel", digital);

    let mut app = Router::new()
        .route(
            &analog,
            routed(get(handlers::get_analog_readings).post(handlers::post_analog_reading)),
        )
        .route(
            &analog_channel,
            routed(get(handlers::get_analog_reading).post(handlers::post_channel_analog_reading)),
        )
        .route(&digital, routed(post(handlers::post_digital_value)))
        .route(&digital_channel, routed(get(handlers::get_digital_value)))
        .route(
            &Resource::Led.path(),
            routed(get(handlers::get_led).post(handlers::post_led)),
        )
        .route(
            &Resource::Host.path(),
            routed(get(handlers::get_host).post(handlers::post_host)),
        )
        .route(
            &Resource::LightSensorReadings.path(),
            routed(
                get(handlers::get_light_sensor_readings)
                    .post(handlers::post_light_sensor_reading),
            ),
        )
        .route(
            &Resource::DeviceToken.path(),
            routed(post(handlers::post_device_token)),
        )
        .route(
            &Resource::PushNotification.path(),
            routed(post(handlers::post_push_notification)),
        )
        .route("/health", routed(get(handlers::health_check)))
        .fallback(handlers::unknown_route)
        .with_state(state);

    if config.enable_cors {
        app = app.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );
    }

    app.layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CatchPanicLayer::custom(panic_response))
            .layer(DefaultBodyLimit::max(config.body_limit)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{ChannelMap, StoreFacade};
    use crate::store::{Lookback, MemoryBackend};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn app() -> Router {
        let facade = StoreFacade::new(
            Arc::new(MemoryBackend::new()),
            ChannelMap::default(),
            Lookback::default(),
        );
        create_app(AppState::new(Arc::new(facade)), &WebConfig::default())
    }

    async fn status_of(method: &str, uri: &str) -> StatusCode {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        app().oneshot(request).await.unwrap().status()
    }

    #[tokio::test]
    async fn test_health() {
        assert_eq!(status_of("GET", "/health").await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unknown_resource_is_404() {
        assert_eq!(status_of("GET", "/metrics").await, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_unhandled_method_is_405() {
        assert_eq!(
            status_of("DELETE", "/led").await,
            StatusCode::METHOD_NOT_ALLOWED
        );
        assert_eq!(
            status_of("GET", "/deviceToken").await,
            StatusCode::METHOD_NOT_ALLOWED
        );
    }

    #[tokio::test]
    async fn test_non_numeric_channel_is_400() {
        assert_eq!(
            status_of("GET", "/analogReadings/abc").await,
            StatusCode::BAD_REQUEST
        );
    }
}
