//! HTTP handlers for the resource routes.

use super::extract::{ApiBody, ApiPath, ApiQuery};
use super::state::AppState;
use crate::error::{RelayError, Result};
use crate::model::time;
use crate::model::{
    AnalogReading, Channel, DateRange, DeviceToken, DigitalValue, Host, LedState,
    LightSensorReading, PushNotification, PushReceipt, RegisteredToken,
};
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{Method, StatusCode, Uri};
use axum::response::{IntoResponse, Json, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;

/// Query parameters accepted by ranged reads.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RangeQuery {
    pub channel: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

impl RangeQuery {
    /// Both bounds, or `None` when neither is given.
    fn range(&self) -> Result<Option<DateRange>> {
        match (&self.start_date, &self.end_date) {
            (Some(start), Some(end)) => DateRange::parse(start, end).map(Some),
            (None, None) => Ok(None),
            _ => Err(RelayError::decode_failure(
                "query",
                "startDate and endDate must be given together",
            )),
        }
    }

    fn required_range(&self) -> Result<DateRange> {
        self.range()?.ok_or_else(|| {
            RelayError::decode_failure("query", "startDate and endDate are required")
        })
    }
}

fn parse_channel(raw: &str) -> Result<Channel> {
    raw.parse::<Channel>()
        .map_err(|e| RelayError::decode_failure(format!("channel '{}'", raw), e))
}

fn decode_body<T: DeserializeOwned>(body: &Bytes) -> Result<T> {
    serde_json::from_slice(body).map_err(|e| RelayError::decode_failure("request body", e))
}

/// GET /analogReadings?channel=&startDate=&endDate=
pub async fn get_analog_readings(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<RangeQuery>,
) -> Result<Json<Vec<AnalogReading>>> {
    let channel = query
        .channel
        .as_deref()
        .ok_or_else(|| RelayError::decode_failure("query", "channel is required"))
        .and_then(parse_channel)?;
    let range = query.required_range()?;
    Ok(Json(state.facade.get_analog_readings(channel, range).await?))
}

/// POST /analogReadings
pub async fn post_analog_reading(
    State(state): State<AppState>,
    ApiBody(body): ApiBody,
) -> Result<Json<AnalogReading>> {
    let reading: AnalogReading = decode_body(&body)?;
    Ok(Json(state.facade.update_analog_reading(reading).await?))
}

/// GET /analogReadings/:channel
pub async fn get_analog_reading(
    State(state): State<AppState>,
    ApiPath(channel): ApiPath<String>,
) -> Result<Json<AnalogReading>> {
    let channel = parse_channel(&channel)?;
    Ok(Json(state.facade.get_analog_reading(channel).await?))
}

/// POST /analogReadings/:channel
pub async fn post_channel_analog_reading(
    State(state): State<AppState>,
    ApiPath(channel): ApiPath<String>,
    ApiBody(body): ApiBody,
) -> Result<Json<AnalogReading>> {
    let channel = parse_channel(&channel)?;
    let reading: AnalogReading = decode_body(&body)?;
    if reading.channel != channel {
        return Err(RelayError::decode_failure(
            "request body",
            format!("channel {} does not match path channel {}", reading.channel, channel),
        ));
    }
    Ok(Json(state.facade.update_analog_reading(reading).await?))
}

/// GET /digitalValues/:channel
pub async fn get_digital_value(
    State(state): State<AppState>,
    ApiPath(channel): ApiPath<String>,
) -> Result<Json<DigitalValue>> {
    let channel = parse_channel(&channel)?;
    Ok(Json(state.facade.get_digital_output(channel).await?))
}

/// POST /digitalValues
pub async fn post_digital_value(
    State(state): State<AppState>,
    ApiBody(body): ApiBody,
) -> Result<Json<DigitalValue>> {
    let value: DigitalValue = decode_body(&body)?;
    Ok(Json(state.facade.update_digital_output(value).await?))
}

pub async fn get_led(State(state): State<AppState>) -> Result<Json<LedState>> {
    Ok(Json(state.facade.get_led_state().await?))
}

pub async fn post_led(
    State(state): State<AppState>,
    ApiBody(body): ApiBody,
) -> Result<Json<LedState>> {
    let led: LedState = decode_body(&body)?;
    Ok(Json(state.facade.update_led_state(led).await?))
}

pub async fn get_host(State(state): State<AppState>) -> Result<Json<Host>> {
    Ok(Json(state.facade.get_host().await?))
}

pub async fn post_host(
    State(state): State<AppState>,
    ApiBody(body): ApiBody,
) -> Result<Json<Host>> {
    let host: Host = decode_body(&body)?;
    Ok(Json(state.facade.post_host(host).await?))
}

/// GET /lightSensorReadings, latest or ranged
pub async fn get_light_sensor_readings(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<RangeQuery>,
) -> Result<Response> {
    match query.range()? {
        Some(range) => Ok(Json(state.facade.get_light_sensor_readings(range).await?).into_response()),
        None => Ok(Json(state.facade.get_light_sensor_reading().await?).into_response()),
    }
}

pub async fn post_light_sensor_reading(
    State(state): State<AppState>,
    ApiBody(body): ApiBody,
) -> Result<Json<LightSensorReading>> {
    let reading: LightSensorReading = decode_body(&body)?;
    Ok(Json(state.facade.update_light_sensor_reading(reading).await?))
}

pub async fn post_device_token(
    State(state): State<AppState>,
    ApiBody(body): ApiBody,
) -> Result<Json<RegisteredToken>> {
    let registry = state
        .registry
        .as_ref()
        .ok_or_else(|| RelayError::unsupported("device token registration"))?;
    let token: DeviceToken = decode_body(&body)?;
    Ok(Json(registry.register(token).await?))
}

pub async fn post_push_notification(
    State(state): State<AppState>,
    ApiBody(body): ApiBody,
) -> Result<Json<PushReceipt>> {
    let registry = state
        .registry
        .as_ref()
        .ok_or_else(|| RelayError::unsupported("push notifications"))?;
    let notification: PushNotification = decode_body(&body)?;
    Ok(Json(
        registry
            .broadcast(state.notifier.as_ref(), &notification)
            .await?,
    ))
}

/// Health check endpoint.
pub async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": "pi_everywhere",
        "version": env!("CARGO_PKG_VERSION"),
        "facade": state.facade.describe(),
        "timestamp": time::format_timestamp(&time::now())
    }))
}

/// Known path, unhandled method.
pub async fn method_not_allowed(method: Method, uri: Uri) -> Response {
    let err = RelayError::NoMatchingHandler(format!("{} {}", method, uri.path()));
    let body = err.to_body();
    super::response::error_response(StatusCode::METHOD_NOT_ALLOWED, body)
}

/// Unknown first path segment.
pub async fn unknown_route(uri: Uri) -> RelayError {
    RelayError::NoMatchingHandler(uri.path().to_string())
}
