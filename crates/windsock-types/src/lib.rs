//! Platform-agnostic types for windsock weather-station telemetry.
//!
//! This crate holds the data model shared by every windsock component:
//! sensor samples, the wire-format measurement batch, analysis results, and
//! the connection lifecycle states. It deliberately knows nothing about
//! transports or async runtimes; those belong in `windsock-core`.

pub mod error;
pub mod types;

pub use error::{ParseError, ParseResult};
pub use types::{
    AnalysisResult, ConnectionState, LaunchDecision, MeasurementBatch, NodeMeasurement,
    ProcessedSample, WeatherSample,
};
