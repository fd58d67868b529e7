//! Data model shared by the store, the device facades and the HTTP surface.

pub mod data;
pub mod resource;
pub mod time;

pub use data::{
    AnalogReading, Channel, DateRange, DeviceToken, DigitalValue, Host, LedState,
    LightSensorReading, PushNotification, PushReceipt, RegisteredToken, Stamped,
};
pub use resource::Resource;
