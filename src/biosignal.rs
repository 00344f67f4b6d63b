//! Biosignal processing
//!
//! Turns a live scalar pulse stream into BPM, RMSSD and a confidence score.
//! Each `process` call appends one sample to the sliding window and recomputes
//! the metrics from the whole window:
//!
//! 1. First-difference filter to remove baseline drift
//! 2. Threshold + local-maximum peak detection with a refractory period
//! 3. Inter-beat intervals from consecutive peaks
//! 4. BPM, RMSSD and a self-consistency confidence heuristic

use crate::chaos::{ChaosRegistry, SIGNAL_DROPOUT};
use crate::error::SignalError;
use crate::types::BioMetrics;
use crate::window::SampleWindow;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// Default sampling rate in Hz (one sample per animation frame)
pub const DEFAULT_SAMPLE_RATE: u32 = 60;

/// Default window length in seconds
pub const DEFAULT_WINDOW_SECONDS: u32 = 10;

/// Peak threshold as a fraction of the largest absolute filtered value
const PEAK_THRESHOLD_RATIO: f64 = 0.4;

/// Minimum spacing between accepted peaks, in seconds
const REFRACTORY_SECONDS: f64 = 0.4;

/// Largest window, in samples, a validated configuration may request
pub const MAX_WINDOW_CAPACITY: usize = 1 << 24;

/// Processor configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessorConfig {
    pub sample_rate: u32,
    pub window_seconds: u32,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            window_seconds: DEFAULT_WINDOW_SECONDS,
        }
    }
}

impl ProcessorConfig {
    pub fn validate(&self) -> Result<(), SignalError> {
        if self.sample_rate == 0 {
            return Err(SignalError::InvalidConfig(
                "sample_rate must be positive".to_string(),
            ));
        }
        if self.window_seconds == 0 {
            return Err(SignalError::InvalidConfig(
                "window_seconds must be positive".to_string(),
            ));
        }
        if self.capacity() > MAX_WINDOW_CAPACITY {
            return Err(SignalError::InvalidConfig(format!(
                "window of {} x {} samples exceeds {MAX_WINDOW_CAPACITY}",
                self.sample_rate, self.window_seconds
            )));
        }
        Ok(())
    }

    /// Window capacity in samples
    pub fn capacity(&self) -> usize {
        (self.sample_rate as usize).saturating_mul(self.window_seconds as usize)
    }

    pub fn from_json(json: &str) -> Result<Self, SignalError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }
}

/// Stateful pulse processor owning one sliding window
#[derive(Debug, Clone)]
pub struct BiosignalProcessor {
    config: ProcessorConfig,
    window: SampleWindow,
    chaos: Option<Arc<ChaosRegistry>>,
}

impl Default for BiosignalProcessor {
    fn default() -> Self {
        Self::new(DEFAULT_SAMPLE_RATE, DEFAULT_WINDOW_SECONDS)
    }
}

impl BiosignalProcessor {
    /// Create a processor. Zero arguments are raised to 1.
    pub fn new(sample_rate: u32, window_seconds: u32) -> Self {
        let config = ProcessorConfig {
            sample_rate: sample_rate.max(1),
            window_seconds: window_seconds.max(1),
        };
        Self {
            window: SampleWindow::new(config.capacity()),
            config,
            chaos: None,
        }
    }

    /// Create a processor from a validated configuration
    pub fn try_from_config(config: ProcessorConfig) -> Result<Self, SignalError> {
        config.validate()?;
        Ok(Self::new(config.sample_rate, config.window_seconds))
    }

    /// Route incoming samples through the given chaos registry
    pub fn with_chaos(mut self, chaos: Arc<ChaosRegistry>) -> Self {
        self.chaos = Some(chaos);
        self
    }

    pub fn config(&self) -> ProcessorConfig {
        self.config
    }

    pub fn window_len(&self) -> usize {
        self.window.len()
    }

    pub fn window(&self) -> &SampleWindow {
        &self.window
    }

    /// Drop all buffered samples
    pub fn reset(&mut self) {
        self.window.clear();
    }

    /// Append a sample and compute a fresh snapshot stamped with the current time
    pub fn process(&mut self, sample: f64) -> BioMetrics {
        self.process_at(sample, chrono::Utc::now().timestamp_millis())
    }

    /// Append a sample and compute a fresh snapshot with an explicit timestamp
    pub fn process_at(&mut self, sample: f64, timestamp: i64) -> BioMetrics {
        let sample = match &self.chaos {
            Some(chaos) => chaos.apply_if(sample, SIGNAL_DROPOUT, |_| 0.0),
            None => sample,
        };

        let sample = if sample.is_finite() {
            sample
        } else {
            // Hold the last value so a single bad reading adds no edge
            let held = self.window.iter().last().unwrap_or(0.0);
            warn!(sample, held, "non-finite sample replaced");
            held
        };
        self.window.push(sample);

        let peaks = self.detect_peaks();
        let ibis = inter_beat_intervals(&peaks, self.config.sample_rate);

        let bpm = if ibis.is_empty() {
            0.0
        } else {
            60_000.0 / mean(&ibis)
        };
        let rmssd = compute_rmssd(&ibis);
        let confidence = compute_confidence(
            ibis.len(),
            self.window.len(),
            self.config.sample_rate,
            bpm,
        );

        BioMetrics {
            bpm: bpm.round() as u32,
            rmssd: rmssd.round(),
            confidence,
            timestamp,
        }
    }

    /// Indices (into the current window) of accepted peaks, ascending
    pub fn detect_peaks(&self) -> Vec<usize> {
        let filtered = difference_filter(self.window.iter());
        let min_spacing = self.config.sample_rate as f64 * REFRACTORY_SECONDS;
        find_peaks(&filtered, min_spacing)
    }
}

/// `out[i] = x[i] - x[i-1]`, `out[0] = 0`
fn difference_filter(samples: impl Iterator<Item = f64>) -> Vec<f64> {
    let mut out = Vec::with_capacity(samples.size_hint().0);
    let mut prev: Option<f64> = None;
    for x in samples {
        out.push(prev.map_or(0.0, |p| x - p));
        prev = Some(x);
    }
    out
}

fn find_peaks(filtered: &[f64], min_spacing: f64) -> Vec<usize> {
    let max_abs = filtered.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));
    if max_abs == 0.0 {
        if filtered.len() > 2 {
            debug!(len = filtered.len(), "zero-variance window, no peaks");
        }
        return Vec::new();
    }

    let threshold = max_abs * PEAK_THRESHOLD_RATIO;
    let mut peaks: Vec<usize> = Vec::new();

    for i in 1..filtered.len().saturating_sub(1) {
        let v = filtered[i];
        if v > threshold && v > filtered[i - 1] && v > filtered[i + 1] {
            let spaced = peaks
                .last()
                .map_or(true, |&last| (i - last) as f64 >= min_spacing);
            if spaced {
                peaks.push(i);
            }
        }
    }
    peaks
}

/// Inter-beat intervals in milliseconds
fn inter_beat_intervals(peaks: &[usize], sample_rate: u32) -> Vec<f64> {
    let ms_per_sample = 1000.0 / sample_rate as f64;
    peaks
        .windows(2)
        .map(|pair| (pair[1] - pair[0]) as f64 * ms_per_sample)
        .collect()
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Root mean square of successive IBI differences; 0 with fewer than two IBIs
fn compute_rmssd(ibis: &[f64]) -> f64 {
    if ibis.len() < 2 {
        return 0.0;
    }
    let sum_sq: f64 = ibis
        .windows(2)
        .map(|pair| {
            let diff = pair[1] - pair[0];
            diff * diff
        })
        .sum();
    (sum_sq / (ibis.len() - 1) as f64).sqrt()
}

/// Coarse self-consistency score.
///
/// Base 0.8 with at least four IBIs, else 0.2. A further 0.2 when the observed
/// interval count is within two of what the BPM predicts for the window
/// length; that bonus needs at least one IBI so an empty window stays at 0.2.
fn compute_confidence(ibi_count: usize, window_len: usize, sample_rate: u32, bpm: f64) -> f64 {
    let base = if ibi_count >= 4 { 0.8 } else { 0.2 };

    let expected_beats = (window_len as f64 / sample_rate as f64) * (bpm / 60.0);
    let consistent = ibi_count > 0 && (ibi_count as f64 - expected_beats).abs() < 2.0;
    let bonus = if consistent { 0.2 } else { 0.0 };

    f64::min(1.0, f64::max(0.0, base + bonus))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::TAU;

    fn feed(processor: &mut BiosignalProcessor, samples: impl IntoIterator<Item = f64>) -> BioMetrics {
        let mut last = None;
        for (t, s) in samples.into_iter().enumerate() {
            last = Some(processor.process_at(s, t as i64));
        }
        last.expect("at least one sample")
    }

    // Phase keeps the window start on a rising edge of the derivative so the
    // first sample is never mistaken for a peak.
    fn sine(period: f64, n: usize) -> impl Iterator<Item = f64> {
        (0..n).map(move |t| (TAU * t as f64 / period + 3.17).sin())
    }

    #[test]
    fn test_window_grows_then_slides() {
        let mut processor = BiosignalProcessor::new(10, 2);
        for i in 0..15 {
            processor.process_at(i as f64, 0);
            assert_eq!(processor.window_len(), (i + 1).min(20));
        }
        for i in 0..10 {
            processor.process_at(i as f64, 0);
        }
        assert_eq!(processor.window_len(), 20);
    }

    #[test]
    fn test_periodic_sine_bpm() {
        // 50-sample period at 60 Hz = 1.2 Hz = 72 bpm
        let mut processor = BiosignalProcessor::default();
        let metrics = feed(&mut processor, sine(50.0, 600));

        assert_eq!(metrics.bpm, 72);
        assert_eq!(metrics.rmssd, 0.0);
        assert!(metrics.confidence >= 0.8);
    }

    #[test]
    fn test_spike_train_bpm() {
        // One spike every 30 samples at 60 Hz = 120 bpm
        let mut processor = BiosignalProcessor::default();
        let samples = (0..600).map(|t| if t % 30 == 0 { 1.0 } else { 0.0 });
        let metrics = feed(&mut processor, samples);

        assert_eq!(metrics.bpm, 120);
        assert_eq!(metrics.rmssd, 0.0);
        assert!(metrics.confidence >= 0.8);
    }

    #[test]
    fn test_constant_signal_has_no_peaks() {
        let mut processor = BiosignalProcessor::default();
        let metrics = feed(&mut processor, std::iter::repeat(0.7).take(700));

        assert!(processor.detect_peaks().is_empty());
        assert_eq!(metrics.bpm, 0);
        assert_eq!(metrics.rmssd, 0.0);
        assert!(metrics.confidence <= 0.2);
    }

    #[test]
    fn test_short_window_reports_zeros() {
        let mut processor = BiosignalProcessor::default();
        let metrics = processor.process_at(1.0, 42);
        assert_eq!(metrics.bpm, 0);
        assert_eq!(metrics.rmssd, 0.0);
        assert_eq!(metrics.confidence, 0.2);
        assert_eq!(metrics.timestamp, 42);

        let metrics = processor.process_at(-1.0, 43);
        assert_eq!(metrics.bpm, 0);
        assert!(metrics.confidence <= 0.2);
    }

    #[test]
    fn test_refractory_suppresses_close_peaks() {
        let mut processor = BiosignalProcessor::default();
        let spikes = [100usize, 110, 160];
        let samples = (0..200).map(|t| if spikes.contains(&t) { 1.0 } else { 0.0 });
        feed(&mut processor, samples);

        assert_eq!(processor.detect_peaks(), vec![100, 160]);
    }

    #[test]
    fn test_peaks_at_exact_refractory_distance_accepted() {
        // 0.4 s at 60 Hz = 24 samples
        let mut processor = BiosignalProcessor::default();
        let spikes = [50usize, 74];
        let samples = (0..100).map(|t| if spikes.contains(&t) { 1.0 } else { 0.0 });
        feed(&mut processor, samples);

        assert_eq!(processor.detect_peaks(), vec![50, 74]);
    }

    #[test]
    fn test_rmssd_of_irregular_intervals() {
        // Peaks spaced 60, 30, 60 samples at 60 Hz -> IBIs 1000, 500, 1000 ms
        let mut processor = BiosignalProcessor::default();
        let spikes = [10usize, 70, 100, 160];
        let samples = (0..200).map(|t| if spikes.contains(&t) { 1.0 } else { 0.0 });
        let metrics = feed(&mut processor, samples);

        // mean IBI = 833.3 ms -> 72 bpm; RMSSD = sqrt((500² + 500²) / 2) = 500
        assert_eq!(metrics.bpm, 72);
        assert_eq!(metrics.rmssd, 500.0);
    }

    #[test]
    fn test_snapshots_are_independent() {
        let mut processor = BiosignalProcessor::default();
        let first = processor.process_at(0.0, 1);
        let _ = feed(&mut processor, sine(50.0, 600));
        assert_eq!(first.bpm, 0);
        assert_eq!(first.timestamp, 1);
    }

    #[test]
    fn test_non_finite_sample_is_held() {
        let mut processor = BiosignalProcessor::default();
        processor.process_at(0.5, 0);
        processor.process_at(f64::NAN, 1);
        let metrics = processor.process_at(f64::INFINITY, 2);

        assert_eq!(processor.window().iter().collect::<Vec<_>>(), vec![0.5, 0.5, 0.5]);
        assert_eq!(metrics.bpm, 0);
    }

    #[test]
    fn test_signal_dropout_flattens_input() {
        let chaos = Arc::new(ChaosRegistry::new());
        chaos.activate(SIGNAL_DROPOUT);
        let mut processor = BiosignalProcessor::default().with_chaos(Arc::clone(&chaos));

        let metrics = feed(&mut processor, sine(50.0, 600));
        assert_eq!(metrics.bpm, 0);
        assert!(processor.window().iter().all(|s| s == 0.0));

        chaos.deactivate(SIGNAL_DROPOUT);
        processor.reset();
        let metrics = feed(&mut processor, sine(50.0, 600));
        assert_eq!(metrics.bpm, 72);
    }

    #[test]
    fn test_config_validation() {
        let bad = ProcessorConfig {
            sample_rate: 0,
            window_seconds: 10,
        };
        assert!(matches!(
            BiosignalProcessor::try_from_config(bad),
            Err(SignalError::InvalidConfig(_))
        ));

        let config = ProcessorConfig::from_json(r#"{"sample_rate": 30}"#).unwrap();
        assert_eq!(config.window_seconds, DEFAULT_WINDOW_SECONDS);
        assert_eq!(config.capacity(), 300);
    }

    #[test]
    fn test_zero_constructor_args_clamped() {
        let processor = BiosignalProcessor::new(0, 0);
        assert_eq!(processor.config().sample_rate, 1);
        assert_eq!(processor.window().capacity(), 1);
    }

    #[test]
    fn test_oversized_window_rejected() {
        let huge = ProcessorConfig {
            sample_rate: u32::MAX,
            window_seconds: u32::MAX,
        };
        assert!(matches!(
            BiosignalProcessor::try_from_config(huge),
            Err(SignalError::InvalidConfig(_))
        ));

        let at_limit = ProcessorConfig {
            sample_rate: 1 << 12,
            window_seconds: 1 << 12,
        };
        assert_eq!(at_limit.capacity(), MAX_WINDOW_CAPACITY);
        assert!(at_limit.validate().is_ok());
    }

    #[test]
    fn test_huge_constructor_args_do_not_preallocate() {
        let mut processor = BiosignalProcessor::new(u32::MAX, u32::MAX);
        let metrics = processor.process_at(0.5, 0);
        assert_eq!(metrics.bpm, 0);
        assert_eq!(processor.window_len(), 1);
    }
}
