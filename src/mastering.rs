//! Session mastering metrics
//!
//! Computes a reproducible statistical fingerprint of a finished session's
//! sample buffer. The function is pure: identical input always yields
//! bit-identical output, checksum included.
//!
//! The checksum is a coarse `mod 65535` fold of the RMS. It exists only for
//! regression comparison and carries no tamper-evidence or security guarantee.
//! `rt60_sec` is a deterministic placeholder derived from the crest factor,
//! not an acoustic measurement.

use crate::chaos::{ChaosRegistry, CHECKSUM_DRIFT};
use crate::error::SignalError;
use crate::types::SignalMetrics;
use std::sync::Arc;
use tracing::debug;

const CHECKSUM_MODULUS: f64 = 65535.0;

/// Compute mastering metrics over a finite sample sequence.
///
/// Fails with [`SignalError::EmptySampleSet`] on empty input and
/// [`SignalError::NonFiniteSample`] on NaN/infinite samples, so no `NaN`
/// ever reaches the returned metrics. Inputs large enough to push a derived
/// metric past the f64 range fail with [`SignalError::MetricOverflow`].
pub fn compute_master_metrics(samples: &[f64]) -> Result<SignalMetrics, SignalError> {
    if samples.is_empty() {
        return Err(SignalError::EmptySampleSet);
    }
    if let Some(index) = samples.iter().position(|s| !s.is_finite()) {
        return Err(SignalError::NonFiniteSample { index });
    }

    let peak = samples.iter().fold(0.0_f64, |acc, x| acc.max(x.abs()));
    let rms = scaled_rms(samples, peak);
    let crest_factor = peak / if rms != 0.0 { rms } else { 1.0 };
    let tail_rms_db = -20.0 - rms * 100.0;

    if !rms.is_finite() {
        return Err(SignalError::MetricOverflow { field: "rms" });
    }
    if !tail_rms_db.is_finite() {
        return Err(SignalError::MetricOverflow { field: "tail_rms_db" });
    }
    if !(rms * 10_000.0).is_finite() {
        return Err(SignalError::MetricOverflow { field: "checksum" });
    }

    Ok(SignalMetrics {
        rms,
        peak,
        crest_factor,
        rt60_sec: 0.5 + crest_factor * 0.1,
        tail_rms_db,
        checksum: format_checksum(checksum_value(rms)),
        hrv_modulation_depth: None,
    })
}

/// RMS taken relative to the peak, so squaring never overflows
fn scaled_rms(samples: &[f64], peak: f64) -> f64 {
    if peak == 0.0 {
        return 0.0;
    }
    let mean_sq = samples.iter().map(|x| (x / peak).powi(2)).sum::<f64>() / samples.len() as f64;
    peak * mean_sq.sqrt()
}

/// `|rms * 10000| mod 65535`, truncated to an integer
pub fn checksum_value(rms: f64) -> u16 {
    ((rms * 10_000.0).abs() % CHECKSUM_MODULUS) as u16
}

/// `0x` followed by at least four lowercase hex digits
pub fn format_checksum(value: u16) -> String {
    format!("0x{value:04x}")
}

/// Parse a checksum string produced by [`format_checksum`]
pub fn parse_checksum(checksum: &str) -> Option<u16> {
    let digits = checksum.strip_prefix("0x")?;
    u16::from_str_radix(digits, 16).ok()
}

/// Mastering stage with optional fault injection on its output
#[derive(Debug, Clone, Default)]
pub struct MasteringEngine {
    chaos: Option<Arc<ChaosRegistry>>,
}

impl MasteringEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_chaos(mut self, chaos: Arc<ChaosRegistry>) -> Self {
        self.chaos = Some(chaos);
        self
    }

    /// Compute metrics for a session buffer
    pub fn master(&self, samples: &[f64]) -> Result<SignalMetrics, SignalError> {
        let metrics = compute_master_metrics(samples)?;
        debug!(
            samples = samples.len(),
            rms = metrics.rms,
            checksum = %metrics.checksum,
            "mastering complete"
        );

        Ok(match &self.chaos {
            Some(chaos) => chaos.apply_if(metrics, CHECKSUM_DRIFT, drift_checksum),
            None => metrics,
        })
    }
}

fn drift_checksum(mut metrics: SignalMetrics) -> SignalMetrics {
    let value = checksum_value(metrics.rms) as u32;
    metrics.checksum = format_checksum(((value + 1) % CHECKSUM_MODULUS as u32) as u16);
    metrics
}
