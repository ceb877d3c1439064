use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use keycadence::charset::{scan_unsupported, validate_text};
use keycadence::config::TyperConfig;
use keycadence::injector::RetryingInjector;
use keycadence::model::{EngineState, SessionReport};
use keycadence::playback::{open_backend, print_progress_line, PlaybackBackend};
use keycadence::session::{SessionController, SessionEvent, SessionSettings};
use keycadence::textfile::{load_text, prepare_text, scrub_text};
use keycadence::timing::{estimate_total, speed_label};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum BackendArg {
    Auto,
    X11,
    DryRun,
}

impl BackendArg {
    fn to_library(self) -> PlaybackBackend {
        match self {
            BackendArg::Auto => PlaybackBackend::Auto,
            BackendArg::X11 => PlaybackBackend::X11,
            BackendArg::DryRun => PlaybackBackend::DryRun,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "keycadence")]
#[command(about = "Types text into the focused window with human-like keystroke timing", long_about = None)]
struct Cli {
    /// Debug logging (RUST_LOG overrides)
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Type a text file into the focused window
    Type {
        /// Input text file, or '-' for stdin
        #[arg(long, value_name = "PATH")]
        input: PathBuf,

        /// Typing speed, 1 (slowest) to 10 (fastest)
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..=10))]
        speed: Option<u32>,

        /// Countdown seconds before typing starts
        #[arg(long)]
        countdown: Option<u64>,

        /// Keystroke backend.
        ///
        /// - auto: choose a backend based on the runtime environment
        /// - x11: force X11 injection (XTEST)
        /// - dry-run: send nothing, only log keystrokes
        #[arg(long, value_enum, default_value_t = BackendArg::Auto)]
        backend: BackendArg,

        /// Pause automatically unless the focused window title contains this
        /// (case-insensitive; repeatable)
        #[arg(long = "focus-pattern", value_name = "PATTERN")]
        focus_patterns: Vec<String>,

        /// Attempts per keystroke before it is recorded as failed
        #[arg(long)]
        max_attempts: Option<u32>,

        /// Type anyway when the text contains unsupported characters
        #[arg(long)]
        allow_unsupported: bool,

        /// JSON config file
        #[arg(long, value_name = "PATH")]
        config: Option<PathBuf>,

        /// Write the session report (JSON) here
        #[arg(long, value_name = "PATH")]
        report: Option<PathBuf>,

        /// Optional RNG seed for timing variance (for debugging)
        #[arg(long)]
        seed: Option<u64>,

        /// Print every typed character (failures are always shown)
        #[arg(long)]
        trace: bool,
    },

    /// Print the duration estimate and validation summary without typing
    Estimate {
        /// Input text file, or '-' for stdin
        #[arg(long, value_name = "PATH")]
        input: PathBuf,

        #[arg(long, value_parser = clap::value_parser!(u32).range(1..=10))]
        speed: Option<u32>,

        #[arg(long, value_name = "PATH")]
        config: Option<PathBuf>,
    },
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<TyperConfig> {
    let config = match path {
        Some(path) => TyperConfig::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => TyperConfig::default(),
    };
    Ok(config)
}

fn format_duration(seconds: f64) -> String {
    let total = seconds.round() as u64;
    if total >= 60 {
        format!("{}m {:02}s", total / 60, total % 60)
    } else {
        format!("{seconds:.1}s")
    }
}

fn print_estimate(text: &str, speed: u32) {
    eprintln!(
        "{} characters at speed {}: ~{}",
        text.chars().count(),
        speed_label(speed),
        format_duration(estimate_total(text, speed))
    );
}

fn write_report(path: &Path, report: &SessionReport) -> Result<()> {
    let json = serde_json::to_string_pretty(report).context("failed to serialize report")?;
    fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))
}

fn print_summary(report: &SessionReport) {
    eprintln!(
        "{}: {}/{} characters typed, {} failed, {}",
        report.state,
        report.typed(),
        report.total_chars,
        report.failed.len(),
        format_duration(report.elapsed_ms as f64 / 1000.0)
    );
    for failed in report.failed.iter().take(10) {
        eprintln!("  failed {:?} at {}", failed.ch, failed.position);
    }
    if report.failed.len() > 10 {
        eprintln!("  ... and {} more", report.failed.len() - 10);
    }
}

#[allow(clippy::too_many_arguments)]
fn run_type(
    input: &Path,
    speed: Option<u32>,
    countdown: Option<u64>,
    backend: BackendArg,
    focus_patterns: Vec<String>,
    max_attempts: Option<u32>,
    allow_unsupported: bool,
    config_path: Option<&Path>,
    report_path: Option<&Path>,
    seed: Option<u64>,
    trace: bool,
) -> Result<()> {
    let mut config = load_config(config_path)?;
    if let Some(speed) = speed {
        config.speed = speed;
    }
    if let Some(countdown) = countdown {
        config.countdown_secs = countdown;
    }
    if let Some(max_attempts) = max_attempts {
        config.max_attempts = max_attempts;
    }
    config.focus_patterns.extend(focus_patterns);
    config.validate()?;

    // Fail fast on unsupported environments before reading the text.
    let opened = open_backend(backend.to_library())?;
    info!(backend = opened.kind.name(), "backend ready");
    let injector = RetryingInjector::new(opened.keys, config.retry_policy());
    let settings = SessionSettings {
        seed,
        ..SessionSettings::from(&config)
    };
    let mut controller = SessionController::new(injector, opened.focus, settings);

    let text = prepare_text(load_text(input)?, allow_unsupported)?;
    print_estimate(&text, config.speed);

    if config.countdown_secs > 0 {
        eprintln!(
            "Focus the target window. Starting in {}s (Ctrl+C to stop)...",
            config.countdown_secs
        );
    }

    let started = controller.start(&text, config.speed);
    scrub_text(text);
    let events = started?.ok_or_else(|| anyhow!("a typing session is already running"))?;

    {
        let signals = controller.signals();
        ctrlc::set_handler(move || signals.request_stop())
            .context("failed to install Ctrl+C handler")?;
    }

    #[cfg(feature = "hotkeys")]
    let _hotkeys = match keycadence::hotkeys::HotkeyListener::start(
        &config.pause_hotkey,
        &config.stop_hotkey,
        controller.signals(),
    ) {
        Ok(listener) => {
            eprintln!(
                "Hotkeys: {} toggles pause, {} stops.",
                config.pause_hotkey, config.stop_hotkey
            );
            Some(listener)
        }
        Err(err) => {
            warn!("global hotkeys unavailable: {err:#}");
            None
        }
    };

    let mut outcome: Option<(SessionReport, Option<String>)> = None;
    for event in events {
        match event {
            SessionEvent::Countdown { remaining } => eprintln!("{remaining}..."),
            SessionEvent::Started { estimate, .. } => {
                info!(estimate = %format_duration(estimate.as_secs_f64()), "typing");
            }
            SessionEvent::Observation(observation) => {
                if trace || !observation.success {
                    print_progress_line(&observation);
                }
            }
            SessionEvent::FocusLost { position } => {
                eprintln!("Target window lost focus at character {position}; paused until it returns.");
            }
            SessionEvent::FocusRestored => eprintln!("Target window focused again; resuming."),
            SessionEvent::Finished(report) => outcome = Some((report, None)),
            SessionEvent::Aborted { error, report } => outcome = Some((report, Some(error))),
        }
    }

    if !controller.shutdown() {
        warn!(
            timeout = ?Duration::from_millis(config.shutdown_timeout_ms),
            "typing worker did not exit in time"
        );
    }

    let (report, error) =
        outcome.ok_or_else(|| anyhow!("typing worker ended without a report"))?;
    print_summary(&report);
    if let Some(path) = report_path {
        write_report(path, &report)?;
        info!(path = %path.display(), "report written");
    }

    if let Some(error) = error {
        bail!("typing session aborted: {error}");
    }
    if report.state == EngineState::Stopped {
        bail!("typing stopped before the end of the text");
    }
    Ok(())
}

fn run_estimate(input: &Path, speed: Option<u32>, config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;
    let speed = speed.unwrap_or(config.speed);

    let text = load_text(input)?;
    print_estimate(&text, speed);

    let unsupported = scan_unsupported(&text);
    if unsupported.is_empty() {
        eprintln!("All characters are supported.");
    } else if let Err(err) = validate_text(&text) {
        eprintln!("{err}");
    }
    scrub_text(text);
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Type {
            input,
            speed,
            countdown,
            backend,
            focus_patterns,
            max_attempts,
            allow_unsupported,
            config,
            report,
            seed,
            trace,
        } => run_type(
            &input,
            speed,
            countdown,
            backend,
            focus_patterns,
            max_attempts,
            allow_unsupported,
            config.as_deref(),
            report.as_deref(),
            seed,
            trace,
        )?,
        Command::Estimate {
            input,
            speed,
            config,
        } => run_estimate(&input, speed, config.as_deref())?,
    }

    Ok(())
}
