//! Direct hardware access: MCP3008 ADC over SPI and GPIO output pins.
//!
//! Real drivers are feature-gated behind `gpio` so the crate builds and runs on
//! machines without a Raspberry Pi; otherwise simulated drivers stand in.

use super::channels::{AnalogInput, ChannelMap};
use super::DeviceFacade;
use crate::error::{RelayError, Result};
use crate::model::time;
use crate::model::{
    AnalogReading, Channel, DateRange, DigitalValue, Host, LedState, LightSensorReading,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::{debug, warn};

/// Largest code a 10-bit ADC can return.
pub const ADC_MAX_CODE: u16 = 1023;

/// Source of raw ADC codes.
pub trait AdcReader: Send + Sync {
    /// Read the raw conversion result for a channel.
    fn read_code(&self, channel: Channel) -> Result<u16>;
}

/// Digital output pins.
pub trait PinDriver: Send + Sync {
    /// Drive a pin high (`true`) or low.
    fn write(&self, pin: Channel, on: bool) -> Result<()>;

    /// Read back the level a pin is driven at.
    fn read(&self, pin: Channel) -> Result<bool>;
}

/// Convert a 10-bit ADC code to volts.
pub fn code_to_voltage(code: u16, reference_voltage: f64) -> Result<f64> {
    if code > ADC_MAX_CODE {
        return Err(RelayError::hardware_error(format!(
            "ADC returned out-of-range code {}",
            code
        )));
    }
    Ok(f64::from(code) * reference_voltage / f64::from(ADC_MAX_CODE))
}

#[cfg(feature = "gpio")]
mod raspberry_pi {
    use super::*;
    use rppal::gpio::{Gpio, OutputPin};
    use rppal::spi::{Bus, Mode, SlaveSelect, Spi};

    /// MCP3008 on SPI0/CE0.
    pub struct Mcp3008 {
        spi: Mutex<Spi>,
    }

    impl Mcp3008 {
        pub fn open(clock_hz: u32) -> Result<Self> {
            let spi = Spi::new(Bus::Spi0, SlaveSelect::Ss0, clock_hz, Mode::Mode0).map_err(|e| {
                RelayError::hardware_error(format!("Failed to open SPI bus: {}", e))
            })?;
            Ok(Self {
                spi: Mutex::new(spi),
            })
        }
    }

    impl AdcReader for Mcp3008 {
        fn read_code(&self, channel: Channel) -> Result<u16> {
            if channel > 7 {
                return Err(RelayError::hardware_error(format!(
                    "MCP3008 has no channel {}",
                    channel
                )));
            }

            // Start bit, single-ended mode + channel select, don't-care byte
            let request = [0x01, 0x80 | ((channel & 0x07) << 4), 0x00];
            let mut response = [0u8; 3];

            let mut spi = self
                .spi
                .lock()
                .map_err(|_| RelayError::hardware_error("SPI lock poisoned"))?;
            spi.transfer(&mut response, &request).map_err(|e| {
                RelayError::hardware_error(format!("SPI transfer failed: {}", e))
            })?;

            Ok((u16::from(response[1] & 0x03) << 8) | u16::from(response[2]))
        }
    }

    /// GPIO output pins claimed through rppal on first use.
    pub struct RppalPins {
        gpio: Gpio,
        claimed: Mutex<HashMap<Channel, OutputPin>>,
    }

    impl RppalPins {
        pub fn open() -> Result<Self> {
            let gpio = Gpio::new().map_err(|e| {
                RelayError::hardware_error(format!("Failed to initialize GPIO: {}", e))
            })?;
            Ok(Self {
                gpio,
                claimed: Mutex::new(HashMap::new()),
            })
        }

        fn with_pin<T>(&self, pin: Channel, f: impl FnOnce(&mut OutputPin) -> T) -> Result<T> {
            let mut claimed = self
                .claimed
                .lock()
                .map_err(|_| RelayError::hardware_error("GPIO lock poisoned"))?;

            if !claimed.contains_key(&pin) {
                let mut output = self
                    .gpio
                    .get(pin)
                    .map_err(|e| {
                        RelayError::hardware_error(format!("Failed to access pin {}: {}", pin, e))
                    })?
                    .into_output();
                // Keep the level after the process exits
                output.set_reset_on_drop(false);
                claimed.insert(pin, output);
            }

            claimed
                .get_mut(&pin)
                .map(f)
                .ok_or_else(|| RelayError::hardware_error(format!("Pin {} unavailable", pin)))
        }
    }

    impl PinDriver for RppalPins {
        fn write(&self, pin: Channel, on: bool) -> Result<()> {
            self.with_pin(pin, |output| {
                if on {
                    output.set_high()
                } else {
                    output.set_low()
                }
            })
        }

        fn read(&self, pin: Channel) -> Result<bool> {
            self.with_pin(pin, |output| output.is_set_high())
        }
    }
}

/// In-memory ADC returning configurable codes.
#[derive(Debug)]
pub struct SimulatedAdc {
    codes: Mutex<HashMap<Channel, u16>>,
    default_code: u16,
}

impl SimulatedAdc {
    pub fn new() -> Self {
        Self {
            codes: Mutex::new(HashMap::new()),
            default_code: 512,
        }
    }

    pub fn open(_clock_hz: u32) -> Result<Self> {
        Ok(Self::new())
    }

    /// Fix the code a channel returns.
    pub fn set_code(&self, channel: Channel, code: u16) {
        if let Ok(mut codes) = self.codes.lock() {
            codes.insert(channel, code);
        }
    }
}

impl Default for SimulatedAdc {
    fn default() -> Self {
        Self::new()
    }
}

impl AdcReader for SimulatedAdc {
    fn read_code(&self, channel: Channel) -> Result<u16> {
        let codes = self
            .codes
            .lock()
            .map_err(|_| RelayError::hardware_error("simulated ADC lock poisoned"))?;
        Ok(codes.get(&channel).copied().unwrap_or(self.default_code))
    }
}

/// In-memory output pins; every pin starts low.
#[derive(Debug, Default)]
pub struct SimulatedPins {
    levels: Mutex<HashMap<Channel, bool>>,
    stuck: Mutex<HashMap<Channel, bool>>,
}

impl SimulatedPins {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open() -> Result<Self> {
        Ok(Self::new())
    }

    /// Make a pin ignore writes and always read back `level`.
    pub fn stick(&self, pin: Channel, level: bool) {
        if let Ok(mut stuck) = self.stuck.lock() {
            stuck.insert(pin, level);
        }
    }
}

impl PinDriver for SimulatedPins {
    fn write(&self, pin: Channel, on: bool) -> Result<()> {
        let mut levels = self
            .levels
            .lock()
            .map_err(|_| RelayError::hardware_error("simulated GPIO lock poisoned"))?;
        levels.insert(pin, on);
        Ok(())
    }

    fn read(&self, pin: Channel) -> Result<bool> {
        let stuck = self
            .stuck
            .lock()
            .map_err(|_| RelayError::hardware_error("simulated GPIO lock poisoned"))?;
        if let Some(level) = stuck.get(&pin) {
            return Ok(*level);
        }
        let levels = self
            .levels
            .lock()
            .map_err(|_| RelayError::hardware_error("simulated GPIO lock poisoned"))?;
        Ok(levels.get(&pin).copied().unwrap_or(false))
    }
}

// Re-export the appropriate drivers
#[cfg(feature = "gpio")]
pub use raspberry_pi::{Mcp3008 as DefaultAdc, RppalPins as DefaultPins};

#[cfg(not(feature = "gpio"))]
pub use self::{SimulatedAdc as DefaultAdc, SimulatedPins as DefaultPins};

/// Facade reading and driving the local board.
pub struct HardwareFacade<A, P> {
    adc: A,
    pins: P,
    channels: ChannelMap,
}

impl HardwareFacade<DefaultAdc, DefaultPins> {
    /// Open the board's default drivers.
    pub fn open(channels: ChannelMap, spi_hz: u32) -> Result<Self> {
        channels.validate()?;
        Ok(Self::new(
            DefaultAdc::open(spi_hz)?,
            DefaultPins::open()?,
            channels,
        ))
    }
}

impl<A: AdcReader, P: PinDriver> HardwareFacade<A, P> {
    pub fn new(adc: A, pins: P, channels: ChannelMap) -> Self {
        Self {
            adc,
            pins,
            channels,
        }
    }

    pub fn adc(&self) -> &A {
        &self.adc
    }

    pub fn pins(&self) -> &P {
        &self.pins
    }

    fn sample(&self, input: &AnalogInput) -> Result<f64> {
        let code = self.adc.read_code(input.channel)?;
        let voltage = code_to_voltage(code, input.reference_voltage)?;
        let value = input.calibrate(voltage);
        debug!(
            "Channel {} ({}): code {} -> {:.3} V -> {:.2}",
            input.channel, input.name, code, voltage, value
        );
        Ok(value)
    }

    fn drive(&self, pin: Channel, on: bool) -> Result<()> {
        self.pins.write(pin, on)?;
        match self.pins.read(pin) {
            Ok(level) if level != on => {
                warn!("Pin {} reads {} after writing {}", pin, level, on)
            }
            Ok(_) => {}
            Err(e) => warn!("Could not verify pin {}: {}", pin, e),
        }
        Ok(())
    }
}

#[async_trait]
impl<A: AdcReader, P: PinDriver> DeviceFacade for HardwareFacade<A, P> {
    fn channels(&self) -> Option<&ChannelMap> {
        Some(&self.channels)
    }

    fn describe(&self) -> String {
        "hardware".to_string()
    }

    async fn get_analog_reading(&self, channel: Channel) -> Result<AnalogReading> {
        let input = self.channels.analog_input(channel)?;
        let value = self.sample(input)?;
        Ok(AnalogReading::new(channel, time::now(), value))
    }

    async fn get_analog_readings(
        &self,
        channel: Channel,
        range: DateRange,
    ) -> Result<Vec<AnalogReading>> {
        range.validate()?;
        let reading = self.get_analog_reading(channel).await?;
        Ok(if range.contains(&reading.upload_date) {
            vec![reading]
        } else {
            Vec::new()
        })
    }

    async fn update_analog_reading(&self, _reading: AnalogReading) -> Result<AnalogReading> {
        Err(RelayError::unsupported(
            "analog readings cannot be written to hardware",
        ))
    }

    async fn get_digital_output(&self, channel: Channel) -> Result<DigitalValue> {
        self.channels.digital_output(channel)?;
        let on = self.pins.read(channel)?;
        Ok(DigitalValue { channel, on })
    }

    async fn update_digital_output(&self, state: DigitalValue) -> Result<DigitalValue> {
        self.channels.digital_output(state.channel)?;
        self.drive(state.channel, state.on)?;
        Ok(state)
    }

    async fn get_led_state(&self) -> Result<LedState> {
        let pin = self.channels.led_output()?.channel;
        Ok(LedState {
            on: self.pins.read(pin)?,
        })
    }

    async fn update_led_state(&self, state: LedState) -> Result<LedState> {
        let pin = self.channels.led_output()?.channel;
        self.drive(pin, state.on)?;
        Ok(state)
    }

    async fn get_light_sensor_reading(&self) -> Result<LightSensorReading> {
        let input = self.channels.light_sensor_input()?;
        let value = self.sample(input)?;
        Ok(LightSensorReading {
            upload_date: time::now(),
            value,
        })
    }

    async fn get_light_sensor_readings(&self, range: DateRange) -> Result<Vec<LightSensorReading>> {
        range.validate()?;
        let reading = self.get_light_sensor_reading().await?;
        Ok(if range.contains(&reading.upload_date) {
            vec![reading]
        } else {
            Vec::new()
        })
    }

    async fn update_light_sensor_reading(
        &self,
        _reading: LightSensorReading,
    ) -> Result<LightSensorReading> {
        Err(RelayError::unsupported(
            "light sensor readings cannot be written to hardware",
        ))
    }

    async fn get_host(&self) -> Result<Host> {
        Err(RelayError::not_found("hardware facade keeps no host registry"))
    }

    async fn post_host(&self, _host: Host) -> Result<Host> {
        Err(RelayError::unsupported(
            "hosts cannot be registered with hardware",
        ))
    }
}
