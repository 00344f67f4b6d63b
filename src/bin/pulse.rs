//! Pulse CLI - Command-line interface for Pulse Integrity
//!
//! Commands:
//! - verify: Run golden-baseline verification
//! - master: Compute mastering metrics for a sample file
//! - process: Stream samples from stdin through the biosignal processor
//! - chaos: List the chaos scenario catalog
//! - doctor: Diagnose library health

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, BufRead, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use pulse_integrity::harness::{golden_baseline, load_vectors};
use pulse_integrity::mastering::MasteringEngine;
use pulse_integrity::{
    BiosignalProcessor, ChaosRegistry, ProcessorConfig, SignalError, VerificationHarness,
    PRODUCER_NAME, PULSE_VERSION,
};

/// Pulse - deterministic biosignal metrics and golden-baseline verification
#[derive(Parser)]
#[command(name = "pulse")]
#[command(version = PULSE_VERSION)]
#[command(about = "Deterministic signal-integrity toolkit", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run golden-baseline verification
    Verify {
        /// JSON array of golden vectors (defaults to the shipped baseline)
        #[arg(long)]
        vectors: Option<PathBuf>,

        /// Activate a chaos scenario for this run (repeatable)
        #[arg(long = "chaos")]
        chaos: Vec<String>,

        /// Print the status as JSON instead of the diagnostic log
        #[arg(long)]
        json: bool,
    },

    /// Compute mastering metrics for a sample file
    Master {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        format: InputFormat,

        /// Activate a chaos scenario (repeatable)
        #[arg(long = "chaos")]
        chaos: Vec<String>,

        /// Pretty-print the output
        #[arg(long)]
        pretty: bool,
    },

    /// Stream samples from stdin, one BioMetrics line per sample
    Process {
        /// Sampling rate in Hz
        #[arg(long, default_value = "60")]
        sample_rate: u32,

        /// Window length in seconds
        #[arg(long, default_value = "10")]
        window_seconds: u32,

        /// Activate a chaos scenario (repeatable)
        #[arg(long = "chaos")]
        chaos: Vec<String>,

    },

    /// List the chaos scenario catalog
    Chaos {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Diagnose library health
    Doctor {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, ValueEnum)]
enum InputFormat {
    /// One number per line
    Ndjson,
    /// JSON array of numbers
    Json,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), PulseCliError> {
    match cli.command {
        Commands::Verify {
            vectors,
            chaos,
            json,
        } => cmd_verify(vectors.as_deref(), &chaos, json),

        Commands::Master {
            input,
            format,
            chaos,
            pretty,
        } => cmd_master(&input, format, &chaos, pretty),

        Commands::Process {
            sample_rate,
            window_seconds,
            chaos,
        } => cmd_process(sample_rate, window_seconds, &chaos),

        Commands::Chaos { json } => cmd_chaos(json),

        Commands::Doctor { json } => cmd_doctor(json),
    }
}

fn cmd_verify(vectors: Option<&Path>, chaos: &[String], json: bool) -> Result<(), PulseCliError> {
    let vectors = match vectors {
        Some(path) => load_vectors(&read_input(path)?)?,
        None => golden_baseline(),
    };

    let mut harness = VerificationHarness::new().with_chaos(chaos_registry(chaos));
    let status = harness.run(&vectors);

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        for line in harness.log() {
            println!("{}", line);
        }
    }

    if status.passed {
        Ok(())
    } else {
        Err(PulseCliError::VerificationFailed(
            status.results.failures().len(),
        ))
    }
}

fn cmd_master(
    input: &Path,
    format: InputFormat,
    chaos: &[String],
    pretty: bool,
) -> Result<(), PulseCliError> {
    let data = read_input(input)?;
    let samples = match format {
        InputFormat::Ndjson => parse_sample_lines(&data)?,
        InputFormat::Json => serde_json::from_str::<Vec<f64>>(&data)?,
    };

    let engine = MasteringEngine::new().with_chaos(chaos_registry(chaos));
    let metrics = engine.master(&samples)?;

    if pretty {
        println!("{}", serde_json::to_string_pretty(&metrics)?);
    } else {
        println!("{}", serde_json::to_string(&metrics)?);
    }
    Ok(())
}

fn cmd_process(
    sample_rate: u32,
    window_seconds: u32,
    chaos: &[String],
) -> Result<(), PulseCliError> {
    let config = ProcessorConfig {
        sample_rate,
        window_seconds,
    };
    let mut processor = BiosignalProcessor::try_from_config(config)?.with_chaos(chaos_registry(chaos));

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for (index, line) in stdin.lock().lines().enumerate() {
        let line = line?;
        let Some(sample) = parse_sample(&line, index + 1)? else {
            continue;
        };

        let metrics = processor.process(sample);
        writeln!(stdout, "{}", serde_json::to_string(&metrics)?)?;
        stdout.flush()?;
    }

    Ok(())
}

fn cmd_chaos(json: bool) -> Result<(), PulseCliError> {
    let scenarios = ChaosRegistry::new().scenarios();

    if json {
        println!("{}", serde_json::to_string_pretty(&scenarios)?);
    } else {
        println!("Chaos Scenarios");
        println!("===============");
        for scenario in &scenarios {
            println!("  {} ({})", scenario.id, scenario.name);
            println!("    {}", scenario.description);
            println!("    Impact: {}", scenario.impact);
        }
    }
    Ok(())
}

fn cmd_doctor(json: bool) -> Result<(), PulseCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "pulse_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Pulse version {}", PULSE_VERSION),
    });

    let status = VerificationHarness::new().run(&golden_baseline());
    checks.push(if status.passed {
        DoctorCheck {
            name: "golden_baseline".to_string(),
            status: CheckStatus::Ok,
            message: format!("{} golden vectors verified", status.results.len()),
        }
    } else {
        DoctorCheck {
            name: "golden_baseline".to_string(),
            status: CheckStatus::Error,
            message: format!("Failing vectors: {}", status.results.failures().join(", ")),
        }
    });

    let stdin_check = if atty::is(atty::Stream::Stdin) {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Warning,
            message: "stdin is a TTY (process needs piped samples)".to_string(),
        }
    } else {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a pipe (streaming mode ready)".to_string(),
        }
    };
    checks.push(stdin_check);

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: PULSE_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Pulse Doctor Report");
        println!("===================");
        println!("Producer: {}", report.producer);
        println!("Version:  {}", report.version);
        println!("\nChecks:");

        for check in &report.checks {
            let status_icon = match check.status {
                CheckStatus::Ok => "[OK]",
                CheckStatus::Warning => "[WARN]",
                CheckStatus::Error => "[ERR]",
            };
            println!("  {} {}: {}", status_icon, check.name, check.message);
        }
    }

    let has_errors = report
        .checks
        .iter()
        .any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(PulseCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

// Helper functions

fn read_input(path: &Path) -> Result<String, PulseCliError> {
    if path.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(path)?)
    }
}

fn chaos_registry(scenarios: &[String]) -> Arc<ChaosRegistry> {
    let registry = ChaosRegistry::new();
    for id in scenarios {
        registry.activate(id);
    }
    Arc::new(registry)
}

/// Parse one sample line; blank lines yield `None`
fn parse_sample(line: &str, line_no: usize) -> Result<Option<f64>, PulseCliError> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    trimmed
        .parse::<f64>()
        .map(Some)
        .map_err(|e| PulseCliError::ParseError(format!("line {}: {}", line_no, e)))
}

fn parse_sample_lines(data: &str) -> Result<Vec<f64>, PulseCliError> {
    let mut samples = Vec::new();
    for (index, line) in data.lines().enumerate() {
        if let Some(sample) = parse_sample(line, index + 1)? {
            samples.push(sample);
        }
    }
    Ok(samples)
}

// Error types

#[derive(Debug)]
enum PulseCliError {
    Io(io::Error),
    Signal(SignalError),
    Json(serde_json::Error),
    ParseError(String),
    VerificationFailed(usize),
    DoctorFailed,
}

impl From<io::Error> for PulseCliError {
    fn from(e: io::Error) -> Self {
        PulseCliError::Io(e)
    }
}

impl From<SignalError> for PulseCliError {
    fn from(e: SignalError) -> Self {
        PulseCliError::Signal(e)
    }
}

impl From<serde_json::Error> for PulseCliError {
    fn from(e: serde_json::Error) -> Self {
        PulseCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<PulseCliError> for CliError {
    fn from(e: PulseCliError) -> Self {
        match e {
            PulseCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            PulseCliError::Signal(SignalError::EmptySampleSet) => CliError {
                code: "EMPTY_SAMPLE_SET".to_string(),
                message: SignalError::EmptySampleSet.to_string(),
                hint: Some("Provide at least one sample".to_string()),
            },
            PulseCliError::Signal(e) => CliError {
                code: "SIGNAL_ERROR".to_string(),
                message: e.to_string(),
                hint: None,
            },
            PulseCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            PulseCliError::ParseError(msg) => CliError {
                code: "PARSE_ERROR".to_string(),
                message: msg,
                hint: Some("Samples must be one decimal number per line".to_string()),
            },
            PulseCliError::VerificationFailed(count) => CliError {
                code: "VERIFICATION_FAILED".to_string(),
                message: format!("{} golden vectors failed", count),
                hint: Some("Run 'pulse verify' without --json for the diagnostic log".to_string()),
            },
            PulseCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct DoctorReport {
    producer: String,
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(serde::Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(serde::Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}
