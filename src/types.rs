//! Core types for Pulse Integrity
//!
//! This module defines the data structures exchanged with the host UI layer:
//! per-tick biometric snapshots, session-level signal metrics, DSP settings,
//! golden verification vectors and their results, chaos scenario descriptors
//! and session artifacts.
//!
//! Field names on the wire are fixed by downstream artifact consumers, so every
//! struct pins its JSON names explicitly.

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Snapshot produced by one `BiosignalProcessor::process` call
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BioMetrics {
    /// Beats per minute, rounded to the nearest integer
    pub bpm: u32,
    /// RMSSD of inter-beat intervals (ms), rounded
    pub rmssd: f64,
    /// Self-consistency heuristic in [0, 1]; not a calibrated probability
    pub confidence: f64,
    /// Wall-clock time of the snapshot (Unix millis)
    pub timestamp: i64,
}

/// Session-level signal fingerprint produced by mastering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalMetrics {
    pub rms: f64,
    pub peak: f64,
    #[serde(rename = "crestFactor")]
    pub crest_factor: f64,
    /// Placeholder reverb-tail estimate derived from the crest factor
    pub rt60_sec: f64,
    pub tail_rms_db: f64,
    /// `0x`-prefixed lowercase hex, at least four digits. Not cryptographic.
    pub checksum: String,
    #[serde(
        rename = "hrvModulationDepth",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub hrv_modulation_depth: Option<f64>,
}

/// Mains frequency the mastering chain locks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GridFrequency {
    #[serde(rename = "50Hz")]
    Hz50,
    #[default]
    #[serde(rename = "60Hz")]
    Hz60,
}

impl GridFrequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            GridFrequency::Hz50 => "50Hz",
            GridFrequency::Hz60 => "60Hz",
        }
    }
}

/// Slow LFO applied to the binaural carrier
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct MicroModulationParams {
    /// 0.1 - 0.3 Hz
    pub lfo_freq: f64,
    /// 0 - 0.01
    pub depth: f64,
    /// 0 - 2π
    pub phase_shift: f64,
    pub deterministic_seed: u64,
}

/// DSP settings attached to sessions and golden vectors.
///
/// The effects are labels only; nothing in this crate transforms audio with
/// them. Unknown fields are rejected when deserializing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DspConfig {
    /// 0 - 100
    pub denoise_amount: f64,
    /// 1 - 20
    pub compression_ratio: f64,
    /// 0 - 1
    pub reverb_wet: f64,
    /// 0 - 1
    pub binaural_depth: f64,
    #[serde(default)]
    pub grid_sync: GridFrequency,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub micro_modulation: Option<MicroModulationParams>,
}

impl Default for DspConfig {
    fn default() -> Self {
        Self {
            denoise_amount: 40.0,
            compression_ratio: 4.0,
            reverb_wet: 0.3,
            binaural_depth: 0.8,
            grid_sync: GridFrequency::Hz60,
            micro_modulation: None,
        }
    }
}

impl DspConfig {
    /// Check that every field lies in its documented range.
    pub fn validate(&self) -> Result<(), String> {
        check_range("denoiseAmount", self.denoise_amount, 0.0, 100.0)?;
        check_range("compressionRatio", self.compression_ratio, 1.0, 20.0)?;
        check_range("reverbWet", self.reverb_wet, 0.0, 1.0)?;
        check_range("binauralDepth", self.binaural_depth, 0.0, 1.0)?;

        if let Some(m) = &self.micro_modulation {
            check_range("microModulation.lfoFreq", m.lfo_freq, 0.1, 0.3)?;
            check_range("microModulation.depth", m.depth, 0.0, 0.01)?;
            check_range(
                "microModulation.phaseShift",
                m.phase_shift,
                0.0,
                std::f64::consts::TAU,
            )?;
        }
        Ok(())
    }
}

fn check_range(name: &str, value: f64, min: f64, max: f64) -> Result<(), String> {
    if value.is_finite() && (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(format!("{name} = {value} outside [{min}, {max}]"))
    }
}

/// Inputs of a golden vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoldenInput {
    /// Mood score before the session (0-10)
    pub before: i32,
    /// Mood score after the session (0-10)
    pub after: i32,
    pub dsp: DspConfig,
}

/// Expected outputs of a golden vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoldenExpected {
    pub delta: i32,
    pub checksum: String,
}

/// A hand-verified input/expected-output pair used as a regression oracle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoldenTest {
    pub id: String,
    pub input: GoldenInput,
    pub expected: GoldenExpected,
}

/// Outcome of one verification run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationStatus {
    /// Unix millis at completion
    #[serde(rename = "lastRun")]
    pub last_run: i64,
    pub passed: bool,
    pub results: VerificationResults,
}

/// Per-test outcomes, kept in the order the vectors were run.
///
/// Serializes as a JSON object keyed by test id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerificationResults {
    entries: Vec<(String, bool)>,
}

impl VerificationResults {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an outcome. A repeated id keeps its original position and takes the new value.
    pub fn insert(&mut self, id: impl Into<String>, passed: bool) {
        let id = id.into();
        match self.entries.iter_mut().find(|(k, _)| *k == id) {
            Some(entry) => entry.1 = passed,
            None => self.entries.push((id, passed)),
        }
    }

    pub fn get(&self, id: &str) -> Option<bool> {
        self.entries
            .iter()
            .find(|(k, _)| k == id)
            .map(|(_, passed)| *passed)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, bool)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Ids of failing tests, in run order
    pub fn failures(&self) -> Vec<&str> {
        self.iter()
            .filter(|(_, passed)| !passed)
            .map(|(id, _)| id)
            .collect()
    }
}

impl Serialize for VerificationResults {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (id, passed) in &self.entries {
            map.serialize_entry(id, passed)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for VerificationResults {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ResultsVisitor;

        impl<'de> Visitor<'de> for ResultsVisitor {
            type Value = VerificationResults;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of test id to boolean")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut results = VerificationResults::new();
                while let Some((id, passed)) = access.next_entry::<String, bool>()? {
                    results.insert(id, passed);
                }
                Ok(results)
            }
        }

        deserializer.deserialize_map(ResultsVisitor)
    }
}

/// Chaos scenario descriptor with its current activation state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChaosScenario {
    pub id: String,
    pub name: String,
    pub description: String,
    pub impact: String,
    pub active: bool,
}

/// Aggregates of a completed session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionMetrics {
    pub avg_bpm: u32,
    pub peak_rmssd: f64,
    pub signal_trust: f64,
    pub suffering_delta: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signal: Option<SignalMetrics>,
}

/// Exported record of one guided session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionArtifact {
    pub version: String,
    #[serde(rename = "sessionID")]
    pub session_id: String,
    pub timestamp: i64,
    pub metrics: SessionMetrics,
    pub dsp: DspConfig,
}
