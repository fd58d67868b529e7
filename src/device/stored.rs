//! Facade answering from the time store: the server-side system of record.

use super::channels::ChannelMap;
use super::DeviceFacade;
use crate::error::{RelayError, Result};
use crate::model::time;
use crate::model::{
    AnalogReading, Channel, DateRange, DigitalValue, Host, LedState, LightSensorReading, Stamped,
};
use crate::store::{Category, Lookback, PartitionKey, PartitionedTimeStore, StoreBackend};
use async_trait::async_trait;
use std::sync::Arc;

/// Reads the last known value, writes by appending.
pub struct StoreFacade {
    channels: ChannelMap,
    analog: PartitionedTimeStore<AnalogReading>,
    light: PartitionedTimeStore<LightSensorReading>,
    digital: PartitionedTimeStore<Stamped<DigitalValue>>,
    led: PartitionedTimeStore<Stamped<LedState>>,
    hosts: PartitionedTimeStore<Stamped<Host>>,
}

impl StoreFacade {
    pub fn new(backend: Arc<dyn StoreBackend>, channels: ChannelMap, lookback: Lookback) -> Self {
        Self {
            channels,
            analog: PartitionedTimeStore::new(backend.clone()).with_lookback(lookback),
            light: PartitionedTimeStore::new(backend.clone()).with_lookback(lookback),
            digital: PartitionedTimeStore::new(backend.clone()).with_lookback(lookback),
            led: PartitionedTimeStore::new(backend.clone()).with_lookback(lookback),
            hosts: PartitionedTimeStore::new(backend).with_lookback(lookback),
        }
    }

    /// Rows skipped across all typed stores because they failed to decode.
    pub fn decode_errors(&self) -> u64 {
        self.analog.decode_errors()
            + self.light.decode_errors()
            + self.digital.decode_errors()
            + self.led.decode_errors()
            + self.hosts.decode_errors()
    }
}

#[async_trait]
impl DeviceFacade for StoreFacade {
    fn channels(&self) -> Option<&ChannelMap> {
        Some(&self.channels)
    }

    fn describe(&self) -> String {
        "store".to_string()
    }

    async fn get_analog_reading(&self, channel: Channel) -> Result<AnalogReading> {
        self.channels.analog_input(channel)?;
        let partition = PartitionKey::new(Category::AnalogReading, Some(channel));
        self.analog
            .latest(&partition)
            .await?
            .ok_or_else(|| RelayError::not_found(format!("no reading for channel {}", channel)))
    }

    async fn get_analog_readings(
        &self,
        channel: Channel,
        range: DateRange,
    ) -> Result<Vec<AnalogReading>> {
        self.channels.analog_input(channel)?;
        let partition = PartitionKey::new(Category::AnalogReading, Some(channel));
        self.analog
            .query_range(&partition, range.start_date, range.end_date)
            .await
    }

    async fn update_analog_reading(&self, reading: AnalogReading) -> Result<AnalogReading> {
        self.channels.analog_input(reading.channel)?;
        self.analog.append(reading).await
    }

    async fn get_digital_output(&self, channel: Channel) -> Result<DigitalValue> {
        self.channels.digital_output(channel)?;
        let partition = PartitionKey::new(Category::DigitalValue, Some(channel));
        self.digital
            .latest(&partition)
            .await?
            .map(|stamped| stamped.value)
            .ok_or_else(|| RelayError::not_found(format!("no state for output {}", channel)))
    }

    async fn update_digital_output(&self, state: DigitalValue) -> Result<DigitalValue> {
        self.channels.digital_output(state.channel)?;
        Ok(self.digital.append(Stamped::now(state)).await?.value)
    }

    async fn get_led_state(&self) -> Result<LedState> {
        self.channels.led_output()?;
        let partition = PartitionKey::new(Category::LedState, None);
        self.led
            .latest(&partition)
            .await?
            .map(|stamped| stamped.value)
            .ok_or_else(|| RelayError::not_found("no LED state recorded"))
    }

    async fn update_led_state(&self, state: LedState) -> Result<LedState> {
        self.channels.led_output()?;
        Ok(self.led.append(Stamped::now(state)).await?.value)
    }

    async fn get_light_sensor_reading(&self) -> Result<LightSensorReading> {
        self.channels.light_sensor_input()?;
        let partition = PartitionKey::new(Category::LightSensorReading, None);
        self.light
            .latest(&partition)
            .await?
            .ok_or_else(|| RelayError::not_found("no light sensor reading recorded"))
    }

    async fn get_light_sensor_readings(&self, range: DateRange) -> Result<Vec<LightSensorReading>> {
        self.channels.light_sensor_input()?;
        let partition = PartitionKey::new(Category::LightSensorReading, None);
        self.light
            .query_range(&partition, range.start_date, range.end_date)
            .await
    }

    async fn update_light_sensor_reading(
        &self,
        reading: LightSensorReading,
    ) -> Result<LightSensorReading> {
        self.channels.light_sensor_input()?;
        self.light.append(reading).await
    }

    async fn get_host(&self) -> Result<Host> {
        let partition = PartitionKey::new(Category::Host, None);
        self.hosts
            .latest(&partition)
            .await?
            .map(|stamped| Host {
                last_seen: Some(stamped.recorded_at),
                ..stamped.value
            })
            .ok_or_else(|| RelayError::not_found("no host registered"))
    }

    async fn post_host(&self, host: Host) -> Result<Host> {
        let now = time::now();
        let host = Host {
            last_seen: None,
            ..host
        };
        let stored = self.hosts.append(Stamped::new(now, host)).await?;
        Ok(Host {
            last_seen: Some(stored.recorded_at),
            ..stored.value
        })
    }
}
