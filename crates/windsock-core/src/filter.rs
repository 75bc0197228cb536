//! Physical-plausibility filtering of decoded samples.
//!
//! Air temperature does not jump ten degrees between consecutive readings; a
//! delta that large is a sensor glitch or a corrupted payload that happened
//! to parse. This filter drops such samples before they can poison the trend
//! state downstream.

use windsock_types::WeatherSample;

/// Largest credible temperature delta (°C) between consecutive samples.
pub const MAX_TEMP_JUMP: f64 = 10.0;

/// Single-pass outlier rejection keyed on the last accepted sample.
///
/// The first sample is always accepted. Rejected samples never become the
/// comparison baseline and are never reconsidered.
#[derive(Debug)]
pub struct OutlierFilter {
    threshold: f64,
    last_accepted: Option<WeatherSample>,
}

impl Default for OutlierFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl OutlierFilter {
    /// Create a filter with the standard threshold.
    #[must_use]
    pub fn new() -> Self {
        Self::with_threshold(MAX_TEMP_JUMP)
    }

    /// Create a filter with a custom temperature-jump threshold.
    #[must_use]
    pub fn with_threshold(threshold: f64) -> Self {
        Self {
            threshold,
            last_accepted: None,
        }
    }

    /// Check a sample against the last accepted one.
    ///
    /// Returns `true` and updates the baseline when the sample is plausible;
    /// returns `false` and leaves the baseline untouched otherwise.
    pub fn accept(&mut self, sample: WeatherSample) -> bool {
        if let Some(last) = self.last_accepted {
            let delta = (sample.temperature - last.temperature).abs();
            if delta > self.threshold {
                return false;
            }
        }
        self.last_accepted = Some(sample);
        true
    }

    /// The most recently accepted sample, if any.
    #[must_use]
    pub fn last_accepted(&self) -> Option<&WeatherSample> {
        self.last_accepted.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(temp: f64) -> WeatherSample {
        WeatherSample::new(3.0, temp)
    }

    #[test]
    fn first_sample_always_accepted() {
        let mut filter = OutlierFilter::new();
        assert!(filter.accept(sample(-200.0)));
        assert_eq!(filter.last_accepted().unwrap().temperature, -200.0);
    }

    #[test]
    fn implausible_jump_rejected_and_baseline_kept() {
        let mut filter = OutlierFilter::new();
        assert!(filter.accept(sample(25.0)));
        assert!(!filter.accept(sample(45.0)));
        assert_eq!(filter.last_accepted().unwrap().temperature, 25.0);
    }

    #[test]
    fn jump_at_threshold_is_accepted() {
        let mut filter = OutlierFilter::new();
        assert!(filter.accept(sample(20.0)));
        assert!(filter.accept(sample(30.0)));
        assert!(filter.accept(sample(20.0)));
    }

    #[test]
    fn rejected_samples_are_never_reconsidered() {
        let mut filter = OutlierFilter::new();
        assert!(filter.accept(sample(25.0)));
        assert!(!filter.accept(sample(45.0)));
        // A second reading near the rejected value is still an outlier
        // relative to the accepted baseline.
        assert!(!filter.accept(sample(44.0)));
        // Returning near the baseline is fine.
        assert!(filter.accept(sample(26.0)));
    }
}
