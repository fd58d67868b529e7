//! The closed set of HTTP resource categories.
//!
//! Both the server route table and the remote client build paths from here so
//! the two sides cannot drift apart.

use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    AnalogReadings,
    DigitalValues,
    Host,
    Led,
    LightSensorReadings,
    DeviceToken,
    PushNotification,
}

impl Resource {
    pub const ALL: [Resource; 7] = [
        Resource::AnalogReadings,
        Resource::DigitalValues,
        Resource::Host,
        Resource::Led,
        Resource::LightSensorReadings,
        Resource::DeviceToken,
        Resource::PushNotification,
    ];

    /// First path segment of the resource.
    pub fn segment(self) -> &'static str {
        match self {
            Self::AnalogReadings => "analogReadings",
            Self::DigitalValues => "digitalValues",
            Self::Host => "host",
            Self::Led => "led",
            Self::LightSensorReadings => "lightSensorReadings",
            Self::DeviceToken => "deviceToken",
            Self::PushNotification => "pushNotification",
        }
    }

    /// Absolute route path, e.g. `/analogReadings`.
    pub fn path(self) -> String {
        format!("/{}", self.segment())
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.segment())
    }
}

impl FromStr for Resource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|resource| resource.segment() == s)
            .ok_or_else(|| format!("unknown resource '{s}'"))
    }
}
