//! # speedwatch - unattended internet speed monitoring
//!
//! A small daemon that keeps an eye on connection quality. It provisions the
//! Ookla speedtest CLI on first use, runs it on a fixed cadence while the
//! host is actually online, and publishes the latest reading to whoever
//! subscribes. Built to run unattended: every failure is retried on a short
//! delay and nothing short of killing the process stops the loop.
//!
//! ## Features
//!
//! - **Self-provisioning**: downloads and unpacks the measurement tool when
//!   it is missing, with unbounded retry
//! - **Connectivity gating**: a background sampler plus a fresh pre-flight
//!   probe keep the tool from running while offline
//! - **Typed publication**: measurements go out over a broadcast channel;
//!   a request channel answers "what is the current reading" at any time
//! - **Library + Binary**: embed the loop or run the `speedwatch` daemon
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use speedwatch::{ConnectivityMonitor, Event, MonitorConfig, PollingLoop, SpeedtestRunner};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = MonitorConfig::default();
//!     let mut connectivity = ConnectivityMonitor::new(&config);
//!     connectivity.start();
//!     let runner = SpeedtestRunner::new(&config);
//!     let (poll, handle) = PollingLoop::new(&config, connectivity, runner);
//!     let mut events = handle.subscribe();
//!     tokio::spawn(poll.run());
//!     while let Ok(Event::DataUpdated(measurement)) = events.recv().await {
//!         println!("ping: {} ms", measurement.ping_display());
//!     }
//! }
//! ```

pub mod config;
pub mod connectivity;
pub mod error;
pub mod poll;
pub mod speedtest;

// Re-export public API
pub use config::MonitorConfig;
pub use connectivity::{Connectivity, ConnectivityMonitor};
pub use error::{Result, SpeedwatchError};
pub use poll::{Event, MonitorHandle, PollingLoop, Request};
pub use speedtest::{
    data::{Measurement, SpeedtestReport},
    provision::Provisioner,
    runner::{MeasurementSource, SpeedtestRunner},
};

/// The default connectivity sampling period in milliseconds
pub const DEFAULT_SAMPLE_INTERVAL_MS: u64 = 2_000;

/// The default pause between successful measurements in milliseconds
pub const DEFAULT_SUCCESS_INTERVAL_MS: u64 = 5 * 60 * 1_000;

/// The default pause after a failed cycle in milliseconds
pub const DEFAULT_RETRY_DELAY_MS: u64 = 500;

/// The default pause between provisioning attempts in milliseconds
pub const DEFAULT_PROVISION_RETRY_DELAY_MS: u64 = 100;
