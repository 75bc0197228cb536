//! Thermal trend analysis.
//!
//! Scores atmospheric conditions for thermal-soaring suitability by tracking
//! the divergence between a fast and a slow exponential moving average of
//! temperature and wind speed. A rising temperature trend with falling,
//! steady wind is the classic signature of a usable thermal cycle.

use std::collections::VecDeque;

use tracing::trace;

use windsock_types::{AnalysisResult, LaunchDecision, WeatherSample};

/// Samples kept for the wind standard-deviation window.
pub const HISTORY_SIZE: usize = 60;

/// Smoothing factor of the short-memory EMA.
const FAST_ALPHA: f64 = 0.5;
/// Smoothing factor of the long-memory EMA.
const SLOW_ALPHA: f64 = 0.1;

/// Trend state per channel pair; absent until the first analyzed sample.
#[derive(Debug, Clone, Copy)]
struct EmaState {
    fast_temp: f64,
    slow_temp: f64,
    fast_wind: f64,
    slow_wind: f64,
}

impl EmaState {
    fn seed(sample: &WeatherSample) -> Self {
        Self {
            fast_temp: sample.temperature,
            slow_temp: sample.temperature,
            fast_wind: sample.wind_speed,
            slow_wind: sample.wind_speed,
        }
    }

    fn update(&mut self, sample: &WeatherSample) {
        self.fast_temp = ema(sample.temperature, self.fast_temp, FAST_ALPHA);
        self.slow_temp = ema(sample.temperature, self.slow_temp, SLOW_ALPHA);
        self.fast_wind = ema(sample.wind_speed, self.fast_wind, FAST_ALPHA);
        self.slow_wind = ema(sample.wind_speed, self.slow_wind, SLOW_ALPHA);
    }
}

fn ema(value: f64, previous: f64, alpha: f64) -> f64 {
    value * alpha + previous * (1.0 - alpha)
}

/// Scores accepted samples and produces launch decisions.
///
/// While disabled, the rolling history keeps advancing but the EMA state is
/// frozen (not reset), so re-enabling does not need a fresh warm-up of the
/// variance window.
#[derive(Debug)]
pub struct ThermalAnalyzer {
    history: VecDeque<WeatherSample>,
    ema: Option<EmaState>,
    enabled: bool,
    sensitivity: f64,
}

impl Default for ThermalAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl ThermalAnalyzer {
    /// Create an enabled analyzer with neutral sensitivity.
    #[must_use]
    pub fn new() -> Self {
        Self {
            history: VecDeque::with_capacity(HISTORY_SIZE),
            ema: None,
            enabled: true,
            sensitivity: 1.0,
        }
    }

    /// Enable or disable scoring. Disabling freezes (does not reset) trends.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Whether scoring is currently enabled.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Set the score multiplier applied before clamping.
    pub fn set_sensitivity(&mut self, sensitivity: f64) {
        self.sensitivity = sensitivity;
    }

    /// Analyze one accepted sample.
    pub fn analyze(&mut self, sample: &WeatherSample) -> AnalysisResult {
        // History moves even while disabled so the variance window stays warm.
        self.push_history(*sample);

        if !self.enabled {
            return AnalysisResult::waiting();
        }

        let Some(ema) = self.ema.as_mut() else {
            self.ema = Some(EmaState::seed(sample));
            return AnalysisResult::waiting();
        };
        ema.update(sample);

        let temp_trend = ema.fast_temp - ema.slow_temp;
        let wind_trend = ema.fast_wind - ema.slow_wind;
        let wind_std_dev = self.wind_std_dev();

        let score = self.score(temp_trend, wind_trend, wind_std_dev, sample.wind_speed);
        let decision = decide(score, temp_trend);

        trace!(
            temp_trend,
            wind_trend,
            wind_std_dev,
            score,
            ?decision,
            "analyzed sample"
        );

        AnalysisResult {
            decision,
            temp_trend,
            wind_trend,
            score,
        }
    }

    /// Clear history and trend state, returning to the pre-first-sample state.
    pub fn reset(&mut self) {
        self.history.clear();
        self.ema = None;
    }

    /// Number of samples currently in the rolling window.
    #[must_use]
    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    fn push_history(&mut self, sample: WeatherSample) {
        self.history.push_back(sample);
        if self.history.len() > HISTORY_SIZE {
            self.history.pop_front();
        }
    }

    /// Population standard deviation of wind speed over the rolling window.
    fn wind_std_dev(&self) -> f64 {
        if self.history.is_empty() {
            return 0.0;
        }
        let n = self.history.len() as f64;
        let mean = self.history.iter().map(|s| s.wind_speed).sum::<f64>() / n;
        let sum_sq = self
            .history
            .iter()
            .map(|s| (s.wind_speed - mean).powi(2))
            .sum::<f64>();
        (sum_sq / n).sqrt()
    }

    fn score(&self, temp_trend: f64, wind_trend: f64, wind_std_dev: f64, wind_speed: f64) -> u8 {
        let mut score = 0.0_f64;

        // Rising temperature is the primary thermal signal.
        if temp_trend > 0.0 {
            score += (temp_trend * 200.0).min(50.0);
        }
        // Falling wind often accompanies a thermal cycle.
        if wind_trend < 0.0 {
            score += (wind_trend.abs() * 60.0).min(30.0);
        }
        // Reward low wind variance.
        score += (1.0 - wind_std_dev.min(1.0)) * 20.0;
        // Penalize cooling trends and strong wind.
        if temp_trend < -0.1 {
            score -= 30.0;
        }
        if wind_speed > 5.0 {
            score -= 40.0;
        }

        (score * self.sensitivity).clamp(0.0, 100.0) as u8
    }
}

fn decide(score: u8, temp_trend: f64) -> LaunchDecision {
    if score >= 70 {
        LaunchDecision::Launch
    } else if score >= 40 {
        LaunchDecision::Potential
    } else if score < 20 || temp_trend < -0.05 {
        LaunchDecision::Poor
    } else {
        LaunchDecision::Waiting
    }
}
