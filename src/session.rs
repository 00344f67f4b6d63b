//! Session recording
//!
//! Buffers a guided session's raw pulse stream and the per-tick biometric
//! snapshots, then folds them into an exportable [`SessionArtifact`] once the
//! session ends.

use crate::biosignal::BiosignalProcessor;
use crate::error::SignalError;
use crate::harness::mood_delta;
use crate::mastering::MasteringEngine;
use crate::types::{BioMetrics, DspConfig, SessionArtifact, SessionMetrics};
use crate::window::SampleWindow;
use std::collections::VecDeque;
use tracing::info;
use uuid::Uuid;

/// Artifact schema version
pub const ARTIFACT_VERSION: &str = "1.0.0";

/// Raw samples retained for mastering
pub const SIGNAL_BUFFER_LIMIT: usize = 4000;

/// Biometric snapshots retained for session aggregates
pub const HISTORY_LIMIT: usize = 100;

/// RMSSD (ms) at which HRV modulation depth saturates
const HRV_SATURATION_MS: f64 = 60.0;

const MOOD_SCALE: std::ops::RangeInclusive<i32> = 0..=10;

/// Accumulates one session's signal and biometrics
#[derive(Debug, Clone)]
pub struct SessionRecorder {
    processor: BiosignalProcessor,
    mastering: MasteringEngine,
    signal: SampleWindow,
    history: VecDeque<BioMetrics>,
}

impl Default for SessionRecorder {
    fn default() -> Self {
        Self::new(BiosignalProcessor::default())
    }
}

impl SessionRecorder {
    pub fn new(processor: BiosignalProcessor) -> Self {
        Self {
            processor,
            mastering: MasteringEngine::new(),
            signal: SampleWindow::new(SIGNAL_BUFFER_LIMIT),
            history: VecDeque::with_capacity(HISTORY_LIMIT),
        }
    }

    /// Use a specific mastering stage (e.g. one wired to a chaos registry)
    pub fn with_mastering(mut self, mastering: MasteringEngine) -> Self {
        self.mastering = mastering;
        self
    }

    /// Record one tick
    pub fn record(&mut self, sample: f64) -> BioMetrics {
        self.record_at(sample, chrono::Utc::now().timestamp_millis())
    }

    /// Record one tick with an explicit timestamp
    pub fn record_at(&mut self, sample: f64, timestamp: i64) -> BioMetrics {
        if sample.is_finite() {
            self.signal.push(sample);
        }

        let metrics = self.processor.process_at(sample, timestamp);
        if self.history.len() == HISTORY_LIMIT {
            self.history.pop_front();
        }
        self.history.push_back(metrics);
        metrics
    }

    pub fn history(&self) -> impl Iterator<Item = &BioMetrics> {
        self.history.iter()
    }

    pub fn signal_len(&self) -> usize {
        self.signal.len()
    }

    /// Close the session and build its artifact.
    ///
    /// Mood scores must be on the 0-10 scale and the DSP settings in range.
    pub fn finish(
        self,
        before: i32,
        after: i32,
        dsp: DspConfig,
    ) -> Result<SessionArtifact, SignalError> {
        for (label, score) in [("before", before), ("after", after)] {
            if !MOOD_SCALE.contains(&score) {
                return Err(SignalError::InvalidConfig(format!(
                    "mood score {label} = {score} outside 0-10"
                )));
            }
        }
        dsp.validate().map_err(SignalError::InvalidConfig)?;

        if self.signal.is_empty() || self.history.is_empty() {
            return Err(SignalError::EmptySession);
        }

        let samples: Vec<f64> = self.signal.iter().collect();
        let mut signal = self.mastering.master(&samples)?;

        let count = self.history.len() as f64;
        let avg_bpm = (self.history.iter().map(|m| m.bpm as f64).sum::<f64>() / count).round();
        let peak_rmssd = self
            .history
            .iter()
            .map(|m| m.rmssd)
            .fold(0.0_f64, f64::max);
        let signal_trust = self.history.iter().map(|m| m.confidence).sum::<f64>() / count;

        signal.hrv_modulation_depth = Some((peak_rmssd / HRV_SATURATION_MS).min(1.0));

        let artifact = SessionArtifact {
            version: ARTIFACT_VERSION.to_string(),
            session_id: Uuid::new_v4().to_string(),
            timestamp: chrono::Utc::now().timestamp_millis(),
            metrics: SessionMetrics {
                avg_bpm: avg_bpm as u32,
                peak_rmssd,
                signal_trust,
                suffering_delta: mood_delta(before, after),
                signal: Some(signal),
            },
            dsp,
        };

        info!(
            session = %artifact.session_id,
            avg_bpm = artifact.metrics.avg_bpm,
            suffering_delta = artifact.metrics.suffering_delta,
            "session artifact built"
        );
        Ok(artifact)
    }
}

impl SessionArtifact {
    pub fn to_json(&self) -> Result<String, SignalError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, SignalError> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chaos::{ChaosRegistry, CHECKSUM_DRIFT};
    use pretty_assertions::assert_eq;
    use std::f64::consts::TAU;
    use std::sync::Arc;

    fn record_sine(recorder: &mut SessionRecorder, n: usize) {
        for t in 0..n {
            recorder.record_at((TAU * t as f64 / 50.0 + 3.17).sin(), t as i64);
        }
    }

    #[test]
    fn test_buffers_are_bounded() {
        let mut recorder = SessionRecorder::default();
        record_sine(&mut recorder, SIGNAL_BUFFER_LIMIT + 50);

        assert_eq!(recorder.signal_len(), SIGNAL_BUFFER_LIMIT);
        assert_eq!(recorder.history().count(), HISTORY_LIMIT);
    }

    #[test]
    fn test_finish_builds_artifact() {
        // A window that has not started sliding keeps every IBI at 50 samples
        let mut recorder = SessionRecorder::default();
        record_sine(&mut recorder, 600);

        let artifact = recorder.finish(9, 2, DspConfig::default()).unwrap();
        let metrics = &artifact.metrics;

        assert_eq!(artifact.version, ARTIFACT_VERSION);
        assert!(Uuid::parse_str(&artifact.session_id).is_ok());
        assert_eq!(metrics.suffering_delta, 7);
        assert_eq!(metrics.avg_bpm, 72);
        assert_eq!(metrics.peak_rmssd, 0.0);
        assert!(metrics.signal_trust > 0.9);

        let signal = metrics.signal.as_ref().unwrap();
        assert!(signal.rms > 0.6 && signal.rms < 0.8);
        assert_eq!(signal.hrv_modulation_depth, Some(0.0));
    }

    #[test]
    fn test_finish_rejects_out_of_scale_mood() {
        let mut recorder = SessionRecorder::default();
        record_sine(&mut recorder, 10);
        assert!(matches!(
            recorder.finish(11, 2, DspConfig::default()),
            Err(SignalError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_finish_rejects_invalid_dsp() {
        let mut recorder = SessionRecorder::default();
        record_sine(&mut recorder, 10);
        let dsp = DspConfig {
            reverb_wet: 1.5,
            ..Default::default()
        };
        assert!(matches!(
            recorder.finish(5, 5, dsp),
            Err(SignalError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_finish_empty_session() {
        let recorder = SessionRecorder::default();
        assert!(matches!(
            recorder.finish(5, 3, DspConfig::default()),
            Err(SignalError::EmptySession)
        ));
    }

    #[test]
    fn test_non_finite_samples_not_mastered() {
        let mut recorder = SessionRecorder::default();
        recorder.record_at(0.5, 0);
        recorder.record_at(f64::NAN, 1);
        recorder.record_at(-0.5, 2);

        assert_eq!(recorder.signal_len(), 2);
        let artifact = recorder.finish(4, 4, DspConfig::default()).unwrap();
        assert_eq!(artifact.metrics.signal.unwrap().checksum, "0x1388");
    }

    #[test]
    fn test_mastering_chaos_flows_into_artifact() {
        let chaos = Arc::new(ChaosRegistry::new());
        chaos.activate(CHECKSUM_DRIFT);
        let mut recorder = SessionRecorder::default()
            .with_mastering(MasteringEngine::new().with_chaos(chaos));
        recorder.record_at(0.5, 0);
        recorder.record_at(-0.5, 1);

        let artifact = recorder.finish(6, 1, DspConfig::default()).unwrap();
        assert_eq!(artifact.metrics.signal.unwrap().checksum, "0x1389");
    }

    #[test]
    fn test_artifact_json_round_trip() {
        let mut recorder = SessionRecorder::default();
        record_sine(&mut recorder, 120);
        let artifact = recorder.finish(7, 3, DspConfig::default()).unwrap();

        let json = artifact.to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert!(value["sessionID"].is_string());
        assert_eq!(value["metrics"]["sufferingDelta"], 4);
        assert!(value["metrics"]["signal"]["crestFactor"].is_number());

        assert_eq!(SessionArtifact::from_json(&json).unwrap(), artifact);
    }
}
