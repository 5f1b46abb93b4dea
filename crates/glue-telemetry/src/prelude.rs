//! `use glue_telemetry::prelude::*;` for logging setup.

pub use crate::{
    FileRotation, LogConfig, LogFormat, LogTarget, TelemetryError, TelemetryResult,
    setup_logging,
};
