//! Structured logging for Pergola applications.
//!
//! # Usage
//!
//! ```ignore
//! use pergola_telemetry::{LogFormat, TelemetryConfig};
//!
//! let config = TelemetryConfig::new()
//!     .with_service_name("my-app")
//!     .with_log_level("debug")
//!     .with_log_format(LogFormat::Pretty);
//!
//! pergola_telemetry::init_logging(&config)?;
//! ```

pub mod config;
pub mod logging;

pub use config::{LogFormat, TelemetryConfig};
pub use logging::init_logging;

use thiserror::Error;

/// Telemetry errors.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// Failed to initialize logging.
    #[error("failed to initialize logging: {0}")]
    LoggingInit(String),
}
