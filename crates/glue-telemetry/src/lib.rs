//! Logging for glue hosts and the plugin processes they launch.
//!
//! Hosts usually log to stderr or a file. Plugins write their handshake to
//! stdout, so [`LogConfig::for_plugin`] sends their events to stderr, where
//! the host picks them up and re-logs them under the plugin's name.
//!
//! ```rust,no_run
//! use glue_telemetry::{FileRotation, LogConfig, setup_logging};
//!
//! # fn main() -> Result<(), glue_telemetry::TelemetryError> {
//! setup_logging(
//!     &LogConfig::new("info")
//!         .with_directive("glue_host=debug")
//!         .with_rotating_files("logs", "host", FileRotation::Daily),
//! )?;
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod error;
mod logging;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::{
    FileLogConfig, FileRotation, LogConfig, LogFormat, LogTarget, setup_default_logging,
    setup_logging,
};
