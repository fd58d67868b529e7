//! Facade that forwards every operation to a peer's HTTP surface.

use super::channels::ChannelMap;
use super::DeviceFacade;
use crate::error::{ApiErrorBody, RelayError, Result};
use crate::model::time;
use crate::model::{
    AnalogReading, Channel, DateRange, DigitalValue, Host, LedState, LightSensorReading, Resource,
};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

/// HTTP client for a peer serving the route table in [`crate::web`].
///
/// Each call issues exactly one request; nothing is retried.
#[derive(Debug, Clone)]
pub struct RemoteFacade {
    client: Client,
    base_url: Url,
    channels: Option<ChannelMap>,
}

impl RemoteFacade {
    /// Build a client for `base_url` with a per-request timeout.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(base_url).map_err(|e| {
            RelayError::config_error(format!("Invalid peer URL '{}': {}", base_url, e))
        })?;
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("pi_everywhere/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| RelayError::config_error(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self::from_reqwest(client, base_url))
    }

    /// Wrap an existing client.
    pub fn from_reqwest(client: Client, base_url: Url) -> Self {
        Self {
            client,
            base_url,
            channels: None,
        }
    }

    /// Reject channels missing from `channels` before any request is made.
    pub fn with_channels(mut self, channels: ChannelMap) -> Self {
        self.channels = Some(channels);
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, resource: Resource, channel: Option<Channel>) -> Result<Url> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                RelayError::config_error(format!("Peer URL {} cannot be a base", self.base_url))
            })?;
            segments.pop_if_empty().push(resource.segment());
            if let Some(channel) = channel {
                segments.push(&channel.to_string());
            }
        }
        Ok(url)
    }

    fn ranged_endpoint(
        &self,
        resource: Resource,
        channel: Option<Channel>,
        range: &DateRange,
    ) -> Result<Url> {
        let mut url = self.endpoint(resource, None)?;
        {
            let mut query = url.query_pairs_mut();
            if let Some(channel) = channel {
                query.append_pair("channel", &channel.to_string());
            }
            query
                .append_pair("startDate", &time::format_timestamp(&range.start_date))
                .append_pair("endDate", &time::format_timestamp(&range.end_date));
        }
        Ok(url)
    }

    fn check_analog(&self, channel: Channel) -> Result<()> {
        if let Some(map) = &self.channels {
            map.analog_input(channel)?;
        }
        Ok(())
    }

    fn check_digital(&self, channel: Channel) -> Result<()> {
        if let Some(map) = &self.channels {
            map.digital_output(channel)?;
        }
        Ok(())
    }

    async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        debug!("GET {}", url);
        self.send(self.client.get(url)).await
    }

    async fn post<B: Serialize + Sync, T: DeserializeOwned>(&self, url: Url, body: &B) -> Result<T> {
        debug!("POST {}", url);
        self.send(self.client.post(url).json(body)).await
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = request.send().await.map_err(transport_error)?;
        let status = response.status();
        let body = response.bytes().await.map_err(transport_error)?;

        if !status.is_success() {
            let message = match serde_json::from_slice::<ApiErrorBody>(&body) {
                Ok(peer) => format!("{}: {}", peer.kind, peer.description),
                Err(_) => String::from_utf8_lossy(&body).into_owned(),
            };
            return Err(RelayError::remote_failure(Some(status.as_u16()), message));
        }

        serde_json::from_slice(&body).map_err(|e| {
            RelayError::remote_failure(
                Some(status.as_u16()),
                format!("undecodable response body: {}", e),
            )
        })
    }
}

fn transport_error(e: reqwest::Error) -> RelayError {
    if e.is_timeout() {
        RelayError::Timeout(e.to_string())
    } else {
        RelayError::remote_failure(e.status().map(|s| s.as_u16()), e.to_string())
    }
}

#[async_trait]
impl DeviceFacade for RemoteFacade {
    fn channels(&self) -> Option<&ChannelMap> {
        self.channels.as_ref()
    }

    fn describe(&self) -> String {
        format!("remote {}", self.base_url)
    }

    async fn get_analog_reading(&self, channel: Channel) -> Result<AnalogReading> {
        self.check_analog(channel)?;
        self.get(self.endpoint(Resource::AnalogReadings, Some(channel))?)
            .await
    }

    async fn get_analog_readings(
        &self,
        channel: Channel,
        range: DateRange,
    ) -> Result<Vec<AnalogReading>> {
        self.check_analog(channel)?;
        range.validate()?;
        self.get(self.ranged_endpoint(Resource::AnalogReadings, Some(channel), &range)?)
            .await
    }

    async fn update_analog_reading(&self, reading: AnalogReading) -> Result<AnalogReading> {
        self.check_analog(reading.channel)?;
        self.post(self.endpoint(Resource::AnalogReadings, None)?, &reading)
            .await
    }

    async fn get_digital_output(&self, channel: Channel) -> Result<DigitalValue> {
        self.check_digital(channel)?;
        self.get(self.endpoint(Resource::DigitalValues, Some(channel))?)
            .await
    }

    async fn update_digital_output(&self, state: DigitalValue) -> Result<DigitalValue> {
        self.check_digital(state.channel)?;
        self.post(self.endpoint(Resource::DigitalValues, None)?, &state)
            .await
    }

    async fn get_led_state(&self) -> Result<LedState> {
        self.get(self.endpoint(Resource::Led, None)?).await
    }

    async fn update_led_state(&self, state: LedState) -> Result<LedState> {
        self.post(self.endpoint(Resource::Led, None)?, &state).await
    }

    async fn get_light_sensor_reading(&self) -> Result<LightSensorReading> {
        self.get(self.endpoint(Resource::LightSensorReadings, None)?)
            .await
    }

    async fn get_light_sensor_readings(&self, range: DateRange) -> Result<Vec<LightSensorReading>> {
        range.validate()?;
        self.get(self.ranged_endpoint(Resource::LightSensorReadings, None, &range)?)
            .await
    }

    async fn update_light_sensor_reading(
        &self,
        reading: LightSensorReading,
    ) -> Result<LightSensorReading> {
        self.post(self.endpoint(Resource::LightSensorReadings, None)?, &reading)
            .await
    }

    async fn get_host(&self) -> Result<Host> {
        self.get(self.endpoint(Resource::Host, None)?).await
    }

    async fn post_host(&self, host: Host) -> Result<Host> {
        self.post(self.endpoint(Resource::Host, None)?, &host).await
    }
}
