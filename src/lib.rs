//! Pulse Integrity - deterministic signal-integrity core
//!
//! Extracts heart-rate metrics from a noisy scalar pulse stream, fingerprints
//! finished sessions with reproducible mastering statistics, and checks the
//! shared delta logic against a golden regression baseline:
//! pulse sample → biosignal processor → biometrics, session buffer → mastering
//! → signal metrics, golden vectors → verification harness → status.
//!
//! ## Modules
//!
//! - **Biosignal**: sliding-window peak detection, BPM, RMSSD and confidence
//! - **Mastering**: RMS/peak/crest statistics and a non-cryptographic checksum
//! - **Harness**: golden-baseline verification with per-vector results
//! - **Chaos**: injectable fault-injection registry for resilience testing
//! - **Session**: session buffers folded into exportable artifacts

pub mod biosignal;
pub mod chaos;
pub mod error;
pub mod harness;
pub mod mastering;
pub mod session;
pub mod types;
pub mod window;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use biosignal::{BiosignalProcessor, ProcessorConfig};
pub use chaos::ChaosRegistry;
pub use error::SignalError;
pub use harness::{golden_baseline, HarnessState, VerificationHarness};
pub use mastering::{compute_master_metrics, MasteringEngine};
pub use session::SessionRecorder;
pub use types::{
    BioMetrics, ChaosScenario, DspConfig, GoldenTest, SessionArtifact, SignalMetrics,
    VerificationStatus,
};
pub use window::SampleWindow;

/// Library version embedded in reports
pub const PULSE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for exported reports
pub const PRODUCER_NAME: &str = "pulse-integrity";
