//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use serde::Serialize;
use tracing::{error, info, warn};

use alphawatch_core::{Monitor, liveness};
use alphawatch_detector::Detector;
use alphawatch_net::{PageFetcher, TelegramNotifier};
use alphawatch_shared::{
    AlphaWatchError, AnnouncementRecord, AppConfig, MonitorConfig, init_config, load_config,
    load_config_from, resolve_bot_token,
};
use alphawatch_storage::DetectedStore;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// AlphaWatch: Binance Alpha airdrop monitor.
#[derive(Parser)]
#[command(
    name = "alphawatch",
    version,
    about = "Poll the Binance Alpha feed and alert Telegram chats about new airdrops.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file (defaults to ~/.alphawatch/alphawatch.toml).
    #[arg(long, global = true, env = "ALPHAWATCH_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Run the monitor until interrupted.
    Run,

    /// Run detection over a saved HTML page and print every record as JSON.
    Scan {
        /// Path to the HTML file.
        file: PathBuf,
    },

    /// Inspect or edit the detected set.
    State {
        #[command(subcommand)]
        action: StateAction,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Detected-set subcommands.
#[derive(Subcommand)]
pub(crate) enum StateAction {
    /// List already-notified identifiers.
    List,
    /// Remove an identifier so it is notified again.
    Forget {
        identifier: String,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "alphawatch=info",
        1 => "alphawatch=debug",
        _ => "alphawatch=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => cmd_run(&load(config_path)?).await,
        Command::Scan { file } => cmd_scan(&load(config_path)?, &file),
        Command::State { action } => {
            let config = load(config_path)?;
            match action {
                StateAction::List => cmd_state_list(&config),
                StateAction::Forget { identifier } => cmd_state_forget(&config, &identifier),
            }
        }
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(config_path),
        },
    }
}

fn load(path: Option<&Path>) -> Result<AppConfig> {
    let config = match path {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    Ok(config)
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_run(config: &AppConfig) -> Result<()> {
    // Everything that can be misconfigured fails here, before the loop starts.
    config.validate()?;
    let token = resolve_bot_token(&config.telegram)?;
    let detector = Detector::new(&config.detector)?;
    let monitor_config = MonitorConfig::from(config);
    let fetcher = PageFetcher::new(&monitor_config)?;
    let notifier = TelegramNotifier::new(&config.telegram, &token)?;
    let store = DetectedStore::open(&monitor_config.detected_file);

    if config.liveness.enabled {
        let address = config.liveness.address();
        tokio::spawn(async move {
            let result = match liveness::bind(&address).await {
                Ok(listener) => liveness::serve(listener).await,
                Err(e) => Err(e),
            };
            if let Err(e) = result {
                error!(error = %e, "liveness endpoint stopped");
            }
        });
    }

    info!(
        recipients = config.telegram.chat_ids.len(),
        known = store.len(),
        "starting AlphaWatch"
    );

    let mut monitor = Monitor::new(
        fetcher,
        notifier,
        detector,
        store,
        monitor_config,
        config.telegram.button_text.clone(),
    );
    monitor.run(shutdown_signal()).await;

    Ok(())
}

/// Resolves on Ctrl-C. Never resolves if the signal cannot be installed.
async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("interrupt received, shutting down"),
        Err(e) => {
            warn!(error = %e, "cannot listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    }
}

/// One `scan` output entry.
#[derive(Serialize)]
struct ScannedRecord {
    #[serde(flatten)]
    record: AnnouncementRecord,
    actionable: bool,
}

fn cmd_scan(config: &AppConfig, file: &Path) -> Result<()> {
    let bytes = std::fs::read(file).map_err(|e| AlphaWatchError::io(file, e))?;
    let html = String::from_utf8(bytes)
        .map_err(|e| AlphaWatchError::parse(format!("{}: {e}", file.display())))?;

    let detector = Detector::new(&config.detector)?;
    let records: Vec<ScannedRecord> = detector
        .scan(&html)
        .into_iter()
        .map(|record| ScannedRecord {
            actionable: record.is_actionable(),
            record,
        })
        .collect();

    info!(
        file = %file.display(),
        records = records.len(),
        actionable = records.iter().filter(|r| r.actionable).count(),
        "scan complete"
    );
    println!("{}", serde_json::to_string_pretty(&records)?);
    Ok(())
}

fn cmd_state_list(config: &AppConfig) -> Result<()> {
    let store = DetectedStore::open(&config.monitor.detected_file);
    if store.is_empty() {
        println!("No notified announcements in {}", store.path().display());
        return Ok(());
    }

    for identifier in store.identifiers() {
        println!("{identifier}");
    }
    println!();
    println!("  {} identifier(s) in {}", store.len(), store.path().display());
    Ok(())
}

fn cmd_state_forget(config: &AppConfig, identifier: &str) -> Result<()> {
    let mut store = DetectedStore::open(&config.monitor.detected_file);
    if !store.forget(identifier)? {
        return Err(eyre!(
            "'{identifier}' is not in {}",
            store.path().display()
        ));
    }
    println!("Forgot '{identifier}'; it will be notified again when next seen.");
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(path: Option<&Path>) -> Result<()> {
    let config = load(path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
