//! Data structures shared by every facade, the store and the HTTP surface.

use super::time::{self, iso8601};
use crate::error::{RelayError, Result};
use crate::store::{Category, Record, Snapshot};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifies a physical input or output (ADC channel or GPIO pin number).
pub type Channel = u8;

/// A single analog sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalogReading {
    /// Channel the sample was taken from
    pub channel: Channel,
    /// Instant the sample was taken
    #[serde(with = "iso8601")]
    pub upload_date: DateTime<Utc>,
    /// Calibrated value
    pub value: f64,
}

impl AnalogReading {
    pub fn new(channel: Channel, upload_date: DateTime<Utc>, value: f64) -> Self {
        Self {
            channel,
            upload_date,
            value,
        }
    }
}

/// A sample from the light sensor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LightSensorReading {
    #[serde(with = "iso8601")]
    pub upload_date: DateTime<Utc>,
    pub value: f64,
}

/// State of a digital output pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DigitalValue {
    pub channel: Channel,
    pub on: bool,
}

/// State of the board's LED actuator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedState {
    pub on: bool,
}

/// Network endpoint a board registered itself under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Host {
    pub ip_address: String,
    pub port: u16,
    /// When the registration was recorded, filled in by the store
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "iso8601::option"
    )]
    pub last_seen: Option<DateTime<Utc>>,
}

impl Host {
    pub fn new(ip_address: impl Into<String>, port: u16) -> Self {
        Self {
            ip_address: ip_address.into(),
            port,
            last_seen: None,
        }
    }

    /// Base URL of the HTTP surface served at this host.
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.ip_address, self.port)
    }
}

/// A mobile device asking to receive push notifications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceToken {
    pub token: String,
    pub device_name: String,
}

/// A device token after registration, with the endpoint id notifications go to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisteredToken {
    pub token: String,
    pub device_name: String,
    pub endpoint_id: uuid::Uuid,
}

/// A notification to fan out to every registered device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushNotification {
    pub title: String,
    pub subtitle: String,
    pub message: String,
}

/// Outcome of a push notification send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushReceipt {
    pub recipients: usize,
}

/// Inclusive time window for ranged reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateRange {
    #[serde(with = "iso8601")]
    pub start_date: DateTime<Utc>,
    #[serde(with = "iso8601")]
    pub end_date: DateTime<Utc>,
}

impl DateRange {
    /// Build a range, rejecting `start > end` with `InvalidRange`.
    pub fn new(start_date: DateTime<Utc>, end_date: DateTime<Utc>) -> Result<Self> {
        let range = Self {
            start_date,
            end_date,
        };
        range.validate()?;
        Ok(range)
    }

    /// Parse both bounds from ISO-8601 strings.
    pub fn parse(start: &str, end: &str) -> Result<Self> {
        Self::new(time::parse_timestamp(start)?, time::parse_timestamp(end)?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.start_date > self.end_date {
            return Err(RelayError::invalid_range(
                time::format_timestamp(&self.start_date),
                time::format_timestamp(&self.end_date),
            ));
        }
        Ok(())
    }

    pub fn contains(&self, at: &DateTime<Utc>) -> bool {
        self.start_date <= *at && *at <= self.end_date
    }
}

/// A timestamp-less state value together with the instant it was recorded.
///
/// Serialized flat: the value's fields plus `uploadDate`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stamped<T> {
    #[serde(rename = "uploadDate", with = "iso8601")]
    pub recorded_at: DateTime<Utc>,
    #[serde(flatten)]
    pub value: T,
}

impl<T> Stamped<T> {
    pub fn new(recorded_at: DateTime<Utc>, value: T) -> Self {
        Self { recorded_at, value }
    }

    /// Stamp a value with the current instant.
    pub fn now(value: T) -> Self {
        Self::new(time::now(), value)
    }
}

impl Record for AnalogReading {
    const CATEGORY: Category = Category::AnalogReading;

    fn channel(&self) -> Option<Channel> {
        Some(self.channel)
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.upload_date
    }
}

impl Record for LightSensorReading {
    const CATEGORY: Category = Category::LightSensorReading;

    fn timestamp(&self) -> DateTime<Utc> {
        self.upload_date
    }
}

impl Snapshot for DigitalValue {
    const CATEGORY: Category = Category::DigitalValue;

    fn channel(&self) -> Option<Channel> {
        Some(self.channel)
    }
}

impl Snapshot for LedState {
    const CATEGORY: Category = Category::LedState;
}

impl Snapshot for Host {
    const CATEGORY: Category = Category::Host;
}

impl Snapshot for RegisteredToken {
    const CATEGORY: Category = Category::DeviceToken;
}
