//! KeyTrust Agent CLI
//!
//! Keystroke-dynamics authentication with continuous re-verification.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use keytrust_agent::{
    audit::{create_shared_log_with_file, last_scored_event, read_tail, SharedSecurityLog},
    collector::{
        spawn_event_reader, CaptureConfig, CaptureError, ChannelCapture, KeyStroke,
        KeystrokeSource, NoopCapture, ReplayCapture,
    },
    config::Config,
    core::{risk::dynamic_threshold, BaselineError, RiskAssessment, RiskBand},
    session::{SessionControl, SessionState},
    AuthError, BaselineStore, TrustAgent, PRIVACY_NOTICE, VERSION,
};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "keytrust")]
#[command(version = VERSION)]
#[command(
    about = "Keystroke-dynamics authentication with continuous re-verification",
    long_about = None
)]
struct Cli {
    /// Configuration file (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory for the baseline profile and the security log
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Play keystrokes back from a recording instead of the keyboard
    #[arg(long, global = true, conflicts_with = "events")]
    replay: Option<PathBuf>,

    /// Read live key events (JSON Lines) from a key hook pipe, or `-` for stdin
    #[arg(long, global = true)]
    events: Option<PathBuf>,

    /// Show informational diagnostics
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a new baseline typing profile
    Register {
        /// Phrase to type (defaults to the configured registration phrase)
        #[arg(long)]
        phrase: Option<String>,
    },

    /// Verify once against the registered profile
    Verify {
        /// Phrase to type (defaults to the configured verification phrase)
        #[arg(long)]
        phrase: Option<String>,
    },

    /// Verify, then keep re-verifying until locked or cancelled with Ctrl+C
    Session {
        /// Login phrase (defaults to the configured verification phrase)
        #[arg(long)]
        phrase: Option<String>,

        /// Re-verification phrase (defaults to the configured one)
        #[arg(long)]
        reverify_phrase: Option<String>,

        /// Seconds between re-verifications (defaults to the configured interval)
        #[arg(long)]
        interval: Option<u64>,
    },

    /// Show the most recent security events
    Logs {
        /// Number of events to show
        #[arg(long, short = 'n', default_value = "50")]
        lines: usize,
    },

    /// Show security event statistics
    Metrics,

    /// Show the registered profile and the last verification result
    Diagnostics,

    /// Show configuration
    Config,

    /// Display privacy notice
    Privacy,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "info" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Where keystrokes come from.
enum Input {
    Replay(PathBuf),
    Events(PathBuf),
    Unavailable,
}

fn run(cli: Cli) -> Result<ExitCode> {
    let config = load_config(&cli)?;
    let input = match (cli.replay, cli.events) {
        (Some(path), _) => Input::Replay(path),
        (None, Some(path)) => Input::Events(path),
        (None, None) => Input::Unavailable,
    };

    match cli.command {
        Commands::Register { phrase } => {
            let phrase = phrase.unwrap_or_else(|| config.phrases.registration.clone());
            cmd_register(config, input, &phrase)
        }
        Commands::Verify { phrase } => {
            let phrase = phrase.unwrap_or_else(|| config.phrases.verification.clone());
            cmd_verify(config, input, &phrase)
        }
        Commands::Session {
            phrase,
            reverify_phrase,
            interval,
        } => {
            let phrase = phrase.unwrap_or_else(|| config.phrases.verification.clone());
            let reverify_phrase =
                reverify_phrase.unwrap_or_else(|| config.phrases.reverification.clone());
            let interval = interval
                .map(Duration::from_secs)
                .unwrap_or(config.reverify_interval);
            cmd_session(config, input, &phrase, &reverify_phrase, interval)
        }
        Commands::Logs { lines } => cmd_logs(&config, lines),
        Commands::Metrics => cmd_metrics(&config),
        Commands::Diagnostics => cmd_diagnostics(&config),
        Commands::Config => cmd_config(&config),
        Commands::Privacy => {
            println!("{PRIVACY_NOTICE}");
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("failed to load configuration from {}", path.display()))?,
        None => Config::load().context("failed to load configuration")?,
    };

    if let Some(dir) = &cli.data_dir {
        config.data_path = dir.clone();
    }
    Ok(config)
}

/// Prints the phrase to type before every capture.
struct PromptingSource<S> {
    inner: S,
}

impl<S: KeystrokeSource> KeystrokeSource for PromptingSource<S> {
    fn capture(&mut self, phrase: &str) -> Result<Vec<KeyStroke>, CaptureError> {
        println!();
        println!("Type the following phrase and press Enter:");
        println!("  \"{phrase}\"");
        self.inner.capture(phrase)
    }
}

fn capture_source(
    input: Input,
    config: &Config,
) -> Result<PromptingSource<Box<dyn KeystrokeSource>>> {
    let inner: Box<dyn KeystrokeSource> = match input {
        Input::Replay(path) => Box::new(
            ReplayCapture::from_file(&path)
                .with_context(|| format!("failed to read recording {}", path.display()))?,
        ),
        Input::Events(path) => {
            let (tx, rx) = crossbeam_channel::unbounded();
            if path == Path::new("-") {
                spawn_event_reader(BufReader::new(std::io::stdin()), tx);
            } else {
                let feed = std::fs::File::open(&path)
                    .with_context(|| format!("failed to open key event feed {}", path.display()))?;
                spawn_event_reader(BufReader::new(feed), tx);
            }
            Box::new(ChannelCapture::new(CaptureConfig::from_config(config), rx))
        }
        Input::Unavailable => {
            eprintln!("Warning: no keyboard collector is available in this build.");
            eprintln!("Use --events <pipe> to read a key hook, or --replay <file> for recordings.");
            Box::new(NoopCapture::new())
        }
    };
    Ok(PromptingSource { inner })
}

fn build_agent(
    config: Config,
    input: Input,
) -> Result<(
    TrustAgent<PromptingSource<Box<dyn KeystrokeSource>>, SharedSecurityLog>,
    SharedSecurityLog,
)> {
    config
        .ensure_directories()
        .context("failed to create data directory")?;

    let log = create_shared_log_with_file(config.security_log_path());
    let source = capture_source(input, &config)?;
    let agent = TrustAgent::new(config, source, log.clone()).context("invalid configuration")?;
    Ok((agent, log))
}

fn cmd_register(config: Config, input: Input, phrase: &str) -> Result<ExitCode> {
    println!("KeyTrust Agent v{VERSION}");
    println!("Registering a new baseline profile.");

    let (mut agent, _log) = build_agent(config, input)?;

    match agent.register(phrase) {
        Ok(baseline) => {
            println!();
            println!("Baseline profile saved to {}", agent.store().path().display());
            println!("  Mean flight time: {:.4}s", baseline.flight_avg);
            println!("  Flight time std:  {:.4}s", baseline.flight_std);
            println!("  Mean dwell time:  {:.4}s", baseline.dwell_avg);
            println!("  Bigrams tracked:  {}", baseline.bigram_avg.len());
            Ok(ExitCode::SUCCESS)
        }
        Err(AuthError::Baseline(e)) => {
            eprintln!("Registration failed: {e}");
            eprintln!("Type the whole phrase at a steady pace and try again.");
            Ok(ExitCode::FAILURE)
        }
        Err(e) => Err(e).context("registration failed"),
    }
}

fn cmd_verify(config: Config, input: Input, phrase: &str) -> Result<ExitCode> {
    let (mut agent, _log) = build_agent(config, input)?;

    let outcome = agent.verify(phrase).context("verification failed")?;

    println!();
    match &outcome.last_assessment {
        Some(assessment) => print_assessment(assessment),
        None => println!("No keystroke data was captured."),
    }
    println!();
    println!("Result: {}", outcome.final_state);

    Ok(if outcome.is_trusted() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(2)
    })
}

fn cmd_session(
    config: Config,
    input: Input,
    phrase: &str,
    reverify_phrase: &str,
    interval: Duration,
) -> Result<ExitCode> {
    let (mut agent, _log) = build_agent(config, input)?;

    let control = SessionControl::new();
    let canceller = control.canceller();
    ctrlc::set_handler(move || {
        canceller.cancel();
    })
    .context("failed to install Ctrl+C handler")?;

    println!("Starting continuous session (re-verification every {}s).", interval.as_secs());
    println!("Press Ctrl+C to end the session.");

    let outcome = agent
        .start_session(phrase, reverify_phrase, interval, &control)
        .context("session failed")?;

    println!();
    if let Some(assessment) = &outcome.last_assessment {
        print_assessment(assessment);
        println!();
    }
    println!(
        "Session {} ended in {} after {} re-verifications.",
        outcome.session_id, outcome.final_state, outcome.rechecks
    );

    Ok(match outcome.final_state {
        SessionState::Idle => ExitCode::SUCCESS,
        _ => ExitCode::from(2),
    })
}

fn print_assessment(assessment: &RiskAssessment) {
    println!("Risk Assessment");
    println!("===============");
    println!("  Flight deviation:  {:.4}", assessment.flight_dev);
    println!("  Dwell deviation:   {:.4}", assessment.dwell_dev);
    println!("  Bigram deviation:  {:.4}", assessment.bigram_dev);
    println!("  Rhythm distance:   {:.4}", assessment.vector_dist);
    println!("  Cosine similarity: {:.4}", assessment.cosine_sim);
    println!();
    println!("  Risk score:        {:.4}", assessment.risk_score);
    println!("  Threshold:         {:.4}", assessment.threshold);
    println!(
        "  Risk level:        {} ({:.0}% of threshold)",
        assessment.band(),
        assessment.ratio() * 100.0
    );
    println!("  Status:            {}", assessment.status);
}

fn cmd_logs(config: &Config, lines: usize) -> Result<ExitCode> {
    let path = config.security_log_path();
    let events = read_tail(&path, lines)
        .with_context(|| format!("failed to read security log {}", path.display()))?;

    if events.is_empty() {
        println!("No security events recorded yet.");
    }
    for event in events {
        println!("{event}");
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_metrics(config: &Config) -> Result<ExitCode> {
    let log = create_shared_log_with_file(config.security_log_path());

    println!("KeyTrust Agent Metrics");
    println!("======================");
    println!();
    println!("Security log: {}", config.security_log_path().display());
    println!(
        "Baseline profile: {}",
        if config.baseline_path().exists() {
            "registered"
        } else {
            "not registered"
        }
    );
    println!();
    println!("{}", log.summary());
    Ok(ExitCode::SUCCESS)
}

fn cmd_diagnostics(config: &Config) -> Result<ExitCode> {
    println!("Trust Diagnostics");
    println!("=================");
    println!();

    let store = BaselineStore::new(config.baseline_path(), config.features.rhythm_bins);
    match store.load() {
        Ok(baseline) => {
            let threshold = dynamic_threshold(
                baseline.flight_std,
                config.risk.floor_std,
                config.risk.threshold_k,
            );
            println!("Baseline profile: {}", store.path().display());
            println!("  Mean flight time:   {:.4}s", baseline.flight_avg);
            println!("  Flight time std:    {:.4}s", baseline.flight_std);
            println!("  Mean dwell time:    {:.4}s", baseline.dwell_avg);
            println!("  Dwell time std:     {:.4}s", baseline.dwell_std);
            println!("  Adaptive threshold: {threshold:.4}");
            println!("  Rhythm vector:      {} bins", baseline.rhythm_vector.len());
            println!("  Bigrams tracked:    {}", baseline.bigram_avg.len());
            for (bigram, avg) in baseline.bigram_avg.iter().take(10) {
                println!("    {bigram:?}: {avg:.4}s");
            }
        }
        Err(BaselineError::NotFound(_)) => {
            println!("No baseline profile registered. Run `keytrust register` first.");
        }
        Err(e) => {
            eprintln!("Baseline profile is unusable: {e}");
            return Ok(ExitCode::FAILURE);
        }
    }

    println!();
    let path = config.security_log_path();
    let last = last_scored_event(&path)
        .with_context(|| format!("failed to read security log {}", path.display()))?;
    match last {
        Some(event) => {
            println!("Last verification: {} [{}] {}", event.timestamp, event.level, event.message);
            if let (Some(risk), Some(threshold)) = (event.risk, event.threshold) {
                println!("  Risk score: {risk:.4}");
                println!("  Threshold:  {threshold:.4}");
                println!("  Risk level: {}", RiskBand::classify(risk, threshold));
            }
        }
        None => println!("No verification has been scored yet."),
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_config(config: &Config) -> Result<ExitCode> {
    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!(
        "{}",
        serde_json::to_string_pretty(config).context("failed to serialize configuration")?
    );
    Ok(ExitCode::SUCCESS)
}
