//! Channel configuration: which physical channel serves which role.

use crate::error::{RelayError, Result};
use crate::model::Channel;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Reference voltage of the stock ADC wiring.
pub const DEFAULT_REFERENCE_VOLTAGE: f64 = 3.3;

/// Role a channel can be configured for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChannelRole {
    AnalogInput,
    DigitalOutput,
    Led,
    LightSensor,
}

impl fmt::Display for ChannelRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::AnalogInput => "an analog input",
            Self::DigitalOutput => "a digital output",
            Self::Led => "the LED output",
            Self::LightSensor => "the light sensor",
        };
        f.write_str(name)
    }
}

/// Transform from measured voltage to the reported value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Calibration {
    /// The voltage itself.
    Voltage,
    /// `(vref - v) / vref * 100`; for sensors that pull the line low as they brighten.
    ReversePercent,
    /// TMP36 temperature sensor, reported in °F.
    Tmp36Fahrenheit,
    /// `v * scale + offset`.
    Linear { scale: f64, offset: f64 },
}

impl Calibration {
    pub fn apply(&self, voltage: f64, reference_voltage: f64) -> f64 {
        match *self {
            Self::Voltage => voltage,
            Self::ReversePercent => (reference_voltage - voltage) / reference_voltage * 100.0,
            Self::Tmp36Fahrenheit => {
                let celsius = (voltage - 0.5) * 100.0;
                celsius * 9.0 / 5.0 + 32.0
            }
            Self::Linear { scale, offset } => voltage * scale + offset,
        }
    }
}

/// An analog input channel read through the ADC.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalogInput {
    pub name: String,
    pub channel: Channel,
    #[serde(default = "default_reference_voltage")]
    pub reference_voltage: f64,
    #[serde(default = "default_calibration")]
    pub calibration: Calibration,
}

fn default_reference_voltage() -> f64 {
    DEFAULT_REFERENCE_VOLTAGE
}

fn default_calibration() -> Calibration {
    Calibration::Voltage
}

impl AnalogInput {
    pub fn new(name: impl Into<String>, channel: Channel, calibration: Calibration) -> Self {
        Self {
            name: name.into(),
            channel,
            reference_voltage: DEFAULT_REFERENCE_VOLTAGE,
            calibration,
        }
    }

    /// Convert a voltage measured on this channel to its reported value.
    pub fn calibrate(&self, voltage: f64) -> f64 {
        self.calibration.apply(voltage, self.reference_voltage)
    }
}

/// A digital output pin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DigitalOutput {
    pub name: String,
    pub channel: Channel,
}

impl DigitalOutput {
    pub fn new(name: impl Into<String>, channel: Channel) -> Self {
        Self {
            name: name.into(),
            channel,
        }
    }
}

/// The full channel configuration of a board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelMap {
    pub analog_inputs: Vec<AnalogInput>,
    pub digital_outputs: Vec<DigitalOutput>,
    /// Digital output driving the LED
    pub led: Option<Channel>,
    /// Analog input wired to the light sensor
    pub light_sensor: Option<Channel>,
}

impl Default for ChannelMap {
    fn default() -> Self {
        Self {
            analog_inputs: vec![
                AnalogInput::new("Light", 1, Calibration::ReversePercent),
                AnalogInput::new("Temperature", 2, Calibration::Tmp36Fahrenheit),
                AnalogInput::new("Temperature 2", 0, Calibration::ReversePercent),
            ],
            digital_outputs: vec![
                DigitalOutput::new("Red LED", 20),
                DigitalOutput::new("Blue LED", 21),
            ],
            led: Some(20),
            light_sensor: Some(1),
        }
    }
}

impl ChannelMap {
    /// A map with no channels configured.
    pub fn empty() -> Self {
        Self {
            analog_inputs: Vec::new(),
            digital_outputs: Vec::new(),
            led: None,
            light_sensor: None,
        }
    }

    pub fn analog_input(&self, channel: Channel) -> Result<&AnalogInput> {
        self.analog_inputs
            .iter()
            .find(|input| input.channel == channel)
            .ok_or_else(|| RelayError::unsupported_channel(channel, ChannelRole::AnalogInput))
    }

    pub fn digital_output(&self, channel: Channel) -> Result<&DigitalOutput> {
        self.digital_outputs
            .iter()
            .find(|output| output.channel == channel)
            .ok_or_else(|| RelayError::unsupported_channel(channel, ChannelRole::DigitalOutput))
    }

    /// The digital output driving the LED.
    pub fn led_output(&self) -> Result<&DigitalOutput> {
        let channel = self
            .led
            .ok_or_else(|| RelayError::unsupported("no LED output configured"))?;
        self.digital_output(channel)
            .map_err(|_| RelayError::unsupported_channel(channel, ChannelRole::Led))
    }

    /// The analog input wired to the light sensor.
    pub fn light_sensor_input(&self) -> Result<&AnalogInput> {
        let channel = self
            .light_sensor
            .ok_or_else(|| RelayError::unsupported("no light sensor configured"))?;
        self.analog_input(channel)
            .map_err(|_| RelayError::unsupported_channel(channel, ChannelRole::LightSensor))
    }

    /// Check the map for duplicate channels and dangling role references.
    pub fn validate(&self) -> Result<()> {
        let mut analog: Vec<Channel> = self.analog_inputs.iter().map(|i| i.channel).collect();
        analog.sort_unstable();
        if analog.windows(2).any(|w| w[0] == w[1]) {
            return Err(RelayError::config_error("duplicate analog input channel"));
        }
        if let Some(input) = self.analog_inputs.iter().find(|i| i.channel > 7) {
            return Err(RelayError::config_error(format!(
                "analog input '{}' uses channel {}, the ADC has 8",
                input.name, input.channel
            )));
        }
        if let Some(input) = self.analog_inputs.iter().find(|i| i.reference_voltage <= 0.0) {
            return Err(RelayError::config_error(format!(
                "analog input '{}' needs a positive reference voltage",
                input.name
            )));
        }

        let mut digital: Vec<Channel> = self.digital_outputs.iter().map(|o| o.channel).collect();
        digital.sort_unstable();
        if digital.windows(2).any(|w| w[0] == w[1]) {
            return Err(RelayError::config_error("duplicate digital output channel"));
        }

        if self.led.is_some() {
            self.led_output()
                .map_err(|e| RelayError::config_error(e.to_string()))?;
        }
        if self.light_sensor.is_some() {
            self.light_sensor_input()
                .map_err(|e| RelayError::config_error(e.to_string()))?;
        }
        Ok(())
    }
}
