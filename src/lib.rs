//! # pi_everywhere - one set of sensor logic, every target
//!
//! Read analog and digital channels on a Raspberry Pi, serve them over HTTP,
//! relay them into a time-partitioned store, and answer clients from that
//! store, all through the same [`DeviceFacade`] interface.
//!
//! ## Features
//!
//! - **Device facades**: hardware (ADC over SPI, GPIO pins), remote HTTP peer,
//!   or store-backed, selected at construction time
//! - **Time store**: append-only records keyed by partition and ISO-8601 sort key,
//!   in memory or in a JSON-lines file
//! - **Dispatch**: a fixed HTTP route table plus trial-decode dispatch for
//!   serverless events (HTTP and token authorizer)
//! - **Relay**: periodic sampling of analog channels forwarded upstream
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pi_everywhere::{build_facade, start_web_server, AppState, FacadeKind, RelayConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = RelayConfig::load(None)?;
//!     let facade = build_facade(FacadeKind::Hardware, &config).await?;
//!
//!     start_web_server(config.web.clone(), AppState::new(facade)).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod device;
pub mod dispatch;
pub mod error;
pub mod model;
pub mod notify;
pub mod poller;
pub mod store;
pub mod web;

// Re-export public API
pub use config::RelayConfig;
pub use device::{build_facade, DeviceFacade, FacadeKind, HardwareFacade, RemoteFacade, StoreFacade};
pub use dispatch::{Dispatcher, Handler};
pub use error::{ErrorKind, RelayError, Result};
pub use model::{AnalogReading, Channel, DateRange, DigitalValue, Host, LedState, LightSensorReading};
pub use notify::{DeviceTokenRegistry, LogNotifier, Notifier};
pub use poller::ReadingPoller;
pub use store::{Lookback, PartitionKey, PartitionedTimeStore, StoreBackend};
pub use web::{create_app, start_web_server, AppState, WebConfig};

/// The default web server port
pub const DEFAULT_WEB_PORT: u16 = 8080;

/// Seconds between relayed samples
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 300;

/// How far back "latest" queries look by default
pub const DEFAULT_LOOKBACK_DAYS: i64 = 365;
