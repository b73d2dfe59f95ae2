//! Client for the Netatmo weather station, thermostat, camera and home coach API.
//!
//! ```no_run
//! use netatmo_rs::{Credentials, NetatmoClient, StationsDataOptions};
//!
//! # async fn run() -> netatmo_rs::Result<()> {
//! let client = NetatmoClient::new(Credentials::new("id", "secret", "me@example.com", "pw"));
//! client.authenticate().await?;
//! let devices = client.get_stations_data(StationsDataOptions::default()).await?;
//! println!("{} station(s)", devices.len());
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod request;
mod session;
pub mod types;

pub use client::NetatmoClient;
pub use config::{ClientOptions, Credentials, RefreshFailurePolicy};
pub use error::{Error, Result};
pub use events::{ClientEvent, EventKind, Payload};
pub use types::{
    CameraPictureOptions, DateEnd, Device, DeviceFilter, EventsUntilOptions, HomeDataOptions,
    LastEventOfOptions, MeasureOptions, MeasureTypes, NextEventsOptions, StationsDataOptions,
    SyncScheduleOptions, ThermpointOptions,
};
