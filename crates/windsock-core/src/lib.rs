//! Core telemetry library for windsock weather stations.
//!
//! This crate turns the raw byte stream of a hobbyist weather station into
//! analyzed, launch-decision-grade samples, and supervises the connection
//! that carries it.
//!
//! # Features
//!
//! - **Frame synchronization**: Recover complete frames from an arbitrarily
//!   chunked byte stream, discarding partial garbage
//! - **Dual-format parsing**: JSON measurement batches and the legacy
//!   delimited text format, behind one parser
//! - **Outlier filtering**: Reject physically implausible temperature jumps
//! - **Thermal analysis**: EMA-based trend scoring with launch decisions
//! - **Connection supervision**: Cancellable connect attempts, a live read
//!   session, and exponential-backoff reconnects
//! - **Simulator**: An in-process station for development without hardware
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use windsock_core::{
//!     ConnectionSupervisor, DeviceDescriptor, StandardTransport, StationEvent, SupervisorConfig,
//! };
//!
//! #[tokio::main]
//! async fn main() {
//!     let supervisor = ConnectionSupervisor::new(
//!         Arc::new(StandardTransport::new()),
//!         SupervisorConfig::default(),
//!     );
//!     let mut events = supervisor.subscribe();
//!
//!     supervisor.connect(DeviceDescriptor::Simulator).await;
//!     while let Ok(event) = events.recv().await {
//!         if let StationEvent::Sample(processed) = event {
//!             println!("{:.1} m/s  {}", processed.sample.wind_speed, processed.analysis.decision);
//!         }
//!     }
//! }
//! ```

pub mod analyzer;
pub mod config;
pub mod error;
pub mod events;
pub mod filter;
pub mod frame;
pub mod parser;
pub mod pipeline;
pub mod reconnect;
pub mod simulator;
pub mod supervisor;
pub mod transport;

// Re-export the shared data types so frontends only need one import path.
pub use windsock_types::{
    AnalysisResult, ConnectionState, LaunchDecision, MeasurementBatch, NodeMeasurement,
    ProcessedSample, WeatherSample,
};

pub use analyzer::ThermalAnalyzer;
pub use config::{CalibrationConfig, DetectorConfig, ReconnectConfig, StationConfig};
pub use error::{Error, Result};
pub use events::{EventDispatcher, StationEvent};
pub use filter::OutlierFilter;
pub use frame::FrameSynchronizer;
pub use parser::MessageParser;
pub use pipeline::{Calibration, IngestOutcome, SamplePipeline};
pub use reconnect::{ReconnectOptions, ReconnectPolicy};
pub use supervisor::{ConnectionSupervisor, SupervisorConfig};
pub use transport::{BoxedLink, DeviceDescriptor, StandardTransport, Transport, TransportLink};
