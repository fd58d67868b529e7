//! Transport-polymorphic access to a board's channels.
//!
//! [`DeviceFacade`] is satisfied three ways: directly against the hardware
//! ([`HardwareFacade`]), by calling a remote peer over HTTP ([`RemoteFacade`]),
//! or from the time store ([`StoreFacade`]). [`build_facade`] picks one at
//! construction time.

pub mod channels;
pub mod factory;
pub mod hardware;
pub mod remote;
pub mod stored;

pub use channels::{AnalogInput, Calibration, ChannelMap, ChannelRole, DigitalOutput};
pub use factory::{build_facade, locate_peer, open_backend, peer_from_host, FacadeKind};
pub use hardware::{
    AdcReader, DefaultAdc, DefaultPins, HardwareFacade, PinDriver, SimulatedAdc, SimulatedPins,
};
pub use remote::RemoteFacade;
pub use stored::StoreFacade;

use crate::error::Result;
use crate::model::{
    AnalogReading, Channel, DateRange, DigitalValue, Host, LedState, LightSensorReading,
};
use async_trait::async_trait;

/// Read/write operations on a board's named channels.
#[async_trait]
pub trait DeviceFacade: Send + Sync {
    /// Local channel configuration, when this facade has one.
    fn channels(&self) -> Option<&ChannelMap>;

    /// Short name for logs.
    fn describe(&self) -> String;

    async fn get_analog_reading(&self, channel: Channel) -> Result<AnalogReading>;

    async fn get_analog_readings(
        &self,
        channel: Channel,
        range: DateRange,
    ) -> Result<Vec<AnalogReading>>;

    async fn update_analog_reading(&self, reading: AnalogReading) -> Result<AnalogReading>;

    async fn get_digital_output(&self, channel: Channel) -> Result<DigitalValue>;

    /// Drive an output and echo the requested state.
    async fn update_digital_output(&self, state: DigitalValue) -> Result<DigitalValue>;

    async fn get_led_state(&self) -> Result<LedState>;

    async fn update_led_state(&self, state: LedState) -> Result<LedState>;

    async fn get_light_sensor_reading(&self) -> Result<LightSensorReading>;

    async fn get_light_sensor_readings(&self, range: DateRange) -> Result<Vec<LightSensorReading>>;

    async fn update_light_sensor_reading(
        &self,
        reading: LightSensorReading,
    ) -> Result<LightSensorReading>;

    /// The most recently registered host, or `NotFound`.
    async fn get_host(&self) -> Result<Host>;

    async fn post_host(&self, host: Host) -> Result<Host>;
}
