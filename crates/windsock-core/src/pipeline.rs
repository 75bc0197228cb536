//! Sample processing pipeline.
//!
//! Every complete frame flows through here: parse, outlier filtering on the
//! raw values, calibration offsets, bounded history, thermal analysis. The
//! pipeline owns all sample-side state so the supervisor can reset it in one
//! place when a watch session stops.

use std::collections::VecDeque;

use tracing::debug;

use windsock_types::{ParseError, ProcessedSample, WeatherSample};

use crate::analyzer::ThermalAnalyzer;
use crate::filter::OutlierFilter;
use crate::parser::MessageParser;

/// Retained processed samples; older entries are evicted first.
pub const MAX_HISTORY: usize = 300;

/// Wind and temperature offsets applied to accepted samples.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Calibration {
    /// Added to the measured wind speed (m/s).
    pub wind_offset: f64,
    /// Added to the measured temperature (°C).
    pub temp_offset: f64,
}

/// Outcome of feeding one frame to the pipeline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IngestOutcome {
    /// The sample was accepted, calibrated, and analyzed.
    Processed(ProcessedSample),
    /// The sample was rejected as a physically implausible jump.
    Rejected(WeatherSample),
}

/// Stateful frame-to-analysis pipeline.
#[derive(Debug)]
pub struct SamplePipeline {
    parser: MessageParser,
    filter: OutlierFilter,
    analyzer: ThermalAnalyzer,
    calibration: Calibration,
    history: VecDeque<ProcessedSample>,
    latest: Option<ProcessedSample>,
}

impl Default for SamplePipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl SamplePipeline {
    /// Create a pipeline with default filter and analyzer settings.
    #[must_use]
    pub fn new() -> Self {
        Self {
            parser: MessageParser::new(),
            filter: OutlierFilter::new(),
            analyzer: ThermalAnalyzer::new(),
            calibration: Calibration::default(),
            history: VecDeque::with_capacity(MAX_HISTORY),
            latest: None,
        }
    }

    /// Parse and process one complete frame.
    pub fn ingest_frame(&mut self, frame: &str) -> Result<IngestOutcome, ParseError> {
        let sample = self.parser.parse(frame)?;
        Ok(self.ingest_sample(sample))
    }

    /// Process an already-decoded sample.
    pub fn ingest_sample(&mut self, sample: WeatherSample) -> IngestOutcome {
        // The filter sees raw values; calibration is a display-side concern
        // and must not mask real sensor jumps.
        if !self.filter.accept(sample) {
            debug!(
                temperature = sample.temperature,
                "rejected implausible temperature jump"
            );
            return IngestOutcome::Rejected(sample);
        }

        let calibrated =
            sample.calibrated(self.calibration.wind_offset, self.calibration.temp_offset);
        let analysis = self.analyzer.analyze(&calibrated);
        let processed = ProcessedSample {
            sample: calibrated,
            analysis,
        };

        self.history.push_back(processed);
        if self.history.len() > MAX_HISTORY {
            self.history.pop_front();
        }
        self.latest = Some(processed);
        IngestOutcome::Processed(processed)
    }

    /// Replace the calibration offsets. Applies to future samples only.
    pub fn set_calibration(&mut self, calibration: Calibration) {
        self.calibration = calibration;
    }

    /// Current calibration offsets.
    #[must_use]
    pub fn calibration(&self) -> Calibration {
        self.calibration
    }

    /// Enable or disable the thermal detector.
    pub fn set_detector_enabled(&mut self, enabled: bool) {
        self.analyzer.set_enabled(enabled);
    }

    /// Set the detector score sensitivity.
    pub fn set_sensitivity(&mut self, sensitivity: f64) {
        self.analyzer.set_sensitivity(sensitivity);
    }

    /// The retained processed samples, oldest first.
    #[must_use]
    pub fn history(&self) -> &VecDeque<ProcessedSample> {
        &self.history
    }

    /// The most recently processed sample, if any.
    #[must_use]
    pub fn latest(&self) -> Option<ProcessedSample> {
        self.latest
    }

    /// Clear history, latest sample, and analyzer trends.
    ///
    /// The outlier filter keeps its baseline so a sensor that was mid-stream
    /// when watching stopped is still sanity-checked on the next session.
    pub fn reset(&mut self) {
        self.history.clear();
        self.latest = None;
        self.analyzer.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use windsock_types::LaunchDecision;

    #[test]
    fn frame_flows_through_to_analysis() {
        let mut pipeline = SamplePipeline::new();
        let outcome = pipeline.ingest_frame("WS_3.0 22.0_end").unwrap();
        match outcome {
            IngestOutcome::Processed(processed) => {
                assert_eq!(processed.sample.wind_speed, 3.0);
                assert_eq!(processed.analysis.decision, LaunchDecision::Waiting);
            }
            IngestOutcome::Rejected(_) => panic!("first sample must be accepted"),
        }
        assert_eq!(pipeline.history().len(), 1);
        assert!(pipeline.latest().is_some());
    }

    #[test]
    fn rejected_outlier_leaves_state_untouched() {
        let mut pipeline = SamplePipeline::new();
        pipeline.ingest_sample(WeatherSample::new(3.0, 25.0));
        let outcome = pipeline.ingest_sample(WeatherSample::new(3.0, 45.0));
        assert!(matches!(outcome, IngestOutcome::Rejected(_)));
        assert_eq!(pipeline.history().len(), 1);
    }

    #[test]
    fn calibration_applies_after_filtering() {
        let mut pipeline = SamplePipeline::new();
        pipeline.set_calibration(Calibration {
            wind_offset: 0.5,
            temp_offset: -2.0,
        });
        pipeline.ingest_sample(WeatherSample::new(3.0, 25.0));

        // Raw delta is 9 (accepted); the offset must not count toward it.
        let outcome = pipeline.ingest_sample(WeatherSample::new(3.0, 34.0));
        match outcome {
            IngestOutcome::Processed(processed) => {
                assert_eq!(processed.sample.temperature, 32.0);
                assert_eq!(processed.sample.wind_speed, 3.5);
            }
            IngestOutcome::Rejected(_) => panic!("in-threshold jump must pass"),
        }
    }

    #[test]
    fn history_is_bounded() {
        let mut pipeline = SamplePipeline::new();
        for i in 0..310 {
            pipeline.ingest_sample(WeatherSample::new(3.0, 20.0 + (i % 2) as f64));
        }
        assert_eq!(pipeline.history().len(), MAX_HISTORY);
    }

    #[test]
    fn reset_clears_history_but_keeps_filter_baseline() {
        let mut pipeline = SamplePipeline::new();
        pipeline.ingest_sample(WeatherSample::new(3.0, 25.0));
        pipeline.reset();
        assert!(pipeline.history().is_empty());
        assert!(pipeline.latest().is_none());

        // Baseline from before the reset still applies.
        let outcome = pipeline.ingest_sample(WeatherSample::new(3.0, 45.0));
        assert!(matches!(outcome, IngestOutcome::Rejected(_)));
    }
}
