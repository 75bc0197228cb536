//! Core types for windsock weather-station data.

use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Lifecycle phase of the hardware link.
///
/// Transitions only ever originate from the `ConnectionSupervisor` in
/// `windsock-core`; external callers observe the state but never mutate it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ConnectionState {
    /// Link torn down; nothing is running.
    Stopped,
    /// Idle, waiting for a connect request (or a scheduled reconnect).
    Disconnected,
    /// A connect attempt is in flight.
    Connecting,
    /// A session is live and the read loop is running.
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Stopped => write!(f, "stopped"),
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Connected => write!(f, "connected"),
        }
    }
}

/// Discrete thermal-soaring suitability verdict.
///
/// Ordered by desirability: `Poor < Waiting < Potential < Launch`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum LaunchDecision {
    /// Conditions are actively unfavourable.
    Poor,
    /// Not enough signal yet, or nothing notable happening.
    Waiting,
    /// Trends look promising; keep watching.
    Potential,
    /// Conditions score high enough to launch.
    Launch,
}

impl fmt::Display for LaunchDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            LaunchDecision::Poor => "POOR",
            LaunchDecision::Waiting => "WAITING",
            LaunchDecision::Potential => "POTENTIAL",
            LaunchDecision::Launch => "LAUNCH",
        })
    }
}

/// One decoded sensor reading.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct WeatherSample {
    /// Wind speed in m/s.
    pub wind_speed: f64,
    /// Air temperature in °C.
    pub temperature: f64,
    /// Originating sensor node (0 is the primary station).
    pub node_id: u32,
    /// Wall-clock time the sample was decoded.
    pub timestamp: time::OffsetDateTime,
}

impl WeatherSample {
    /// Create a sample for the primary node, timestamped now.
    #[must_use]
    pub fn new(wind_speed: f64, temperature: f64) -> Self {
        Self::with_node(wind_speed, temperature, 0)
    }

    /// Create a sample for a specific node, timestamped now.
    #[must_use]
    pub fn with_node(wind_speed: f64, temperature: f64, node_id: u32) -> Self {
        Self {
            wind_speed,
            temperature,
            node_id,
            timestamp: time::OffsetDateTime::now_utc(),
        }
    }

    /// Return a copy with calibration offsets applied.
    #[must_use]
    pub fn calibrated(mut self, wind_offset: f64, temp_offset: f64) -> Self {
        self.wind_speed += wind_offset;
        self.temperature += temp_offset;
        self
    }
}

/// One measurement entry as it appears on the wire.
///
/// The JSON field names are fixed by the station firmware contract:
/// `{"windSpeed": 3.2, "temperature": 22.1, "nodeId": 0}`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct NodeMeasurement {
    /// Wind speed in m/s.
    pub wind_speed: f64,
    /// Air temperature in °C.
    pub temperature: f64,
    /// Originating sensor node.
    #[cfg_attr(feature = "serde", serde(default))]
    pub node_id: u32,
}

impl NodeMeasurement {
    /// Promote the wire measurement to a timestamped sample.
    #[must_use]
    pub fn into_sample(self) -> WeatherSample {
        WeatherSample::with_node(self.wind_speed, self.temperature, self.node_id)
    }
}

/// The structured (modern) frame payload: a batch of per-node measurements.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct MeasurementBatch {
    /// Protocol version reported by the station.
    pub version: u32,
    /// Number of sensor nodes the station believes it has.
    pub number_of_nodes: u32,
    /// Per-node measurements.
    pub measurements: Vec<NodeMeasurement>,
}

impl MeasurementBatch {
    /// The measurement for a given node, if present.
    ///
    /// When a batch carries duplicate entries for a node the *last* one wins,
    /// matching the station firmware's behavior of appending corrections.
    #[must_use]
    pub fn node(&self, node_id: u32) -> Option<&NodeMeasurement> {
        self.measurements.iter().rev().find(|m| m.node_id == node_id)
    }

    /// Whether the batch contains a measurement for the given node.
    #[must_use]
    pub fn has_node(&self, node_id: u32) -> bool {
        self.node(node_id).is_some()
    }
}

/// One scoring outcome from the thermal analyzer.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AnalysisResult {
    /// The launch verdict.
    pub decision: LaunchDecision,
    /// Fast-minus-slow EMA divergence of temperature (°C).
    pub temp_trend: f64,
    /// Fast-minus-slow EMA divergence of wind speed (m/s).
    pub wind_trend: f64,
    /// Suitability score, always clamped to 0..=100.
    pub score: u8,
}

impl AnalysisResult {
    /// The neutral result returned before trend state exists (or while the
    /// analyzer is disabled).
    #[must_use]
    pub fn waiting() -> Self {
        Self {
            decision: LaunchDecision::Waiting,
            temp_trend: 0.0,
            wind_trend: 0.0,
            score: 0,
        }
    }
}

/// A sample bundled with its analysis, published as a single event so
/// consumers never observe a sample and a stale score together.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ProcessedSample {
    /// The accepted, calibration-adjusted sample.
    pub sample: WeatherSample,
    /// The analysis computed from it.
    pub analysis: AnalysisResult,
}
