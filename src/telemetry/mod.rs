//! Telemetry publication: the periodic cycle and the wire payload it emits.

pub mod config;
pub mod payload;
pub mod publisher;

pub use config::TelemetryConfig;
pub use payload::{PayloadError, TelemetryPayload};
pub use publisher::{CycleOutcome, PublishCycleTimer, TelemetryPublisher, TelemetrySink};
