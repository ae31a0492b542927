//! Application configuration for AlphaWatch.
//!
//! User config lives at `~/.alphawatch/alphawatch.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{AlphaWatchError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "alphawatch.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".alphawatch";

/// Environment variable that overrides the liveness port.
const PORT_ENV: &str = "PORT";

/// Upper bound for the poll interval and both backoffs (one day).
pub const MAX_INTERVAL_SECS: u64 = 86_400;

/// Upper bound for the poll jitter (one hour).
pub const MAX_JITTER_SECS: f64 = 3_600.0;

// ---------------------------------------------------------------------------
// Config structs (matching alphawatch.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Poll loop settings.
    #[serde(default)]
    pub monitor: MonitorSection,

    /// Block detection and field extraction patterns.
    #[serde(default)]
    pub detector: DetectorConfig,

    /// Notification transport.
    #[serde(default)]
    pub telegram: TelegramConfig,

    /// Uptime-check responder.
    #[serde(default)]
    pub liveness: LivenessConfig,
}

/// `[monitor]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorSection {
    /// Page to poll.
    #[serde(default = "default_url")]
    pub url: Url,

    /// Base delay between polls.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Uniform jitter applied to the delay, in both directions.
    #[serde(default = "default_jitter_secs")]
    pub jitter_secs: f64,

    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,

    /// Delay after a failed fetch.
    #[serde(default = "default_backoff_secs")]
    pub fetch_backoff_secs: u64,

    /// Delay after any other cycle failure.
    #[serde(default = "default_backoff_secs")]
    pub error_backoff_secs: u64,

    /// Pause between consecutive alerts within one cycle.
    #[serde(default = "default_dispatch_pause_ms")]
    pub dispatch_pause_ms: u64,

    /// `Accept-Language` header sent with every fetch.
    #[serde(default = "default_accept_language")]
    pub accept_language: String,

    /// User-Agent pool; one is picked at random per fetch.
    #[serde(default = "default_user_agents")]
    pub user_agents: Vec<String>,

    /// JSON file holding already-notified identifiers.
    #[serde(default = "default_detected_file")]
    pub detected_file: PathBuf,

    /// Send a "monitor started" notice to all recipients on startup.
    #[serde(default = "default_true")]
    pub announce_startup: bool,
}

impl Default for MonitorSection {
    fn default() -> Self {
        Self {
            url: default_url(),
            interval_secs: default_interval_secs(),
            jitter_secs: default_jitter_secs(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            fetch_backoff_secs: default_backoff_secs(),
            error_backoff_secs: default_backoff_secs(),
            dispatch_pause_ms: default_dispatch_pause_ms(),
            accept_language: default_accept_language(),
            user_agents: default_user_agents(),
            detected_file: default_detected_file(),
            announce_startup: true,
        }
    }
}

impl MonitorSection {
    /// Reject timing values the poll loop cannot schedule.
    pub fn validate(&self) -> Result<()> {
        if !self.jitter_secs.is_finite() || self.jitter_secs.abs() > MAX_JITTER_SECS {
            return Err(AlphaWatchError::config(format!(
                "monitor.jitter_secs must be a finite number within ±{MAX_JITTER_SECS}, got {}",
                self.jitter_secs
            )));
        }

        for (name, value) in [
            ("interval_secs", self.interval_secs),
            ("fetch_backoff_secs", self.fetch_backoff_secs),
            ("error_backoff_secs", self.error_backoff_secs),
        ] {
            if value > MAX_INTERVAL_SECS {
                return Err(AlphaWatchError::config(format!(
                    "monitor.{name} must be at most {MAX_INTERVAL_SECS}, got {value}"
                )));
            }
        }

        Ok(())
    }
}

fn default_url() -> Url {
    Url::parse("https://www.binance.com/ru/feed/alpha").expect("valid default URL")
}
fn default_interval_secs() -> u64 {
    5
}
fn default_jitter_secs() -> f64 {
    1.0
}
fn default_fetch_timeout_secs() -> u64 {
    12
}
fn default_backoff_secs() -> u64 {
    5
}
fn default_dispatch_pause_ms() -> u64 {
    600
}
fn default_accept_language() -> String {
    "ru-RU,ru;q=0.8".into()
}
fn default_user_agents() -> Vec<String> {
    vec![
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64)".into(),
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7)".into(),
        "Mozilla/5.0 (X11; Linux x86_64)".into(),
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/117 Safari/537.36".into(),
    ]
}
fn default_detected_file() -> PathBuf {
    PathBuf::from("detected_airdrops.json")
}
fn default_true() -> bool {
    true
}

/// `[detector]` section.
///
/// Every phrase is a case-insensitive regular expression. The defaults match
/// the Russian-language Binance Alpha feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Any match marks a text node as part of a candidate block.
    #[serde(default = "default_keywords")]
    pub keywords: Vec<String>,

    /// "Hurry to participate".
    #[serde(default = "default_urgent")]
    pub urgent: String,

    /// "Amount receivable"; precedes the reward.
    #[serde(default = "default_reward_marker")]
    pub reward_marker: String,

    /// "Required points"; precedes the points value.
    #[serde(default = "default_points_marker")]
    pub points_marker: String,

    /// The bare "points" unit following a number.
    #[serde(default = "default_points_unit")]
    pub points_unit: String,

    /// "Completed"; flips the status.
    #[serde(default = "default_finished")]
    pub finished: String,

    /// Blocks shorter than this (in characters) are never emitted.
    #[serde(default = "default_min_block_chars")]
    pub min_block_chars: usize,

    /// Prefix length used for block fingerprints.
    #[serde(default = "default_prefix_chars")]
    pub fingerprint_chars: usize,

    /// How many ancestors to climb from a matching node.
    #[serde(default = "default_max_ascent")]
    pub max_ascent: usize,

    #[serde(default = "default_project_max_chars")]
    pub project_max_chars: usize,

    #[serde(default = "default_reward_max_chars")]
    pub reward_max_chars: usize,

    #[serde(default = "default_identifier_max_chars")]
    pub identifier_max_chars: usize,

    #[serde(default = "default_prefix_chars")]
    pub excerpt_chars: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            keywords: default_keywords(),
            urgent: default_urgent(),
            reward_marker: default_reward_marker(),
            points_marker: default_points_marker(),
            points_unit: default_points_unit(),
            finished: default_finished(),
            min_block_chars: default_min_block_chars(),
            fingerprint_chars: default_prefix_chars(),
            max_ascent: default_max_ascent(),
            project_max_chars: default_project_max_chars(),
            reward_max_chars: default_reward_max_chars(),
            identifier_max_chars: default_identifier_max_chars(),
            excerpt_chars: default_prefix_chars(),
        }
    }
}

fn default_keywords() -> Vec<String> {
    vec![
        r"Успейте\s*принять\s*участие".into(),
        r"Сумма\s*получения".into(),
        r"Требуемые\s*баллы".into(),
        r"Этапы\s*аирдропа".into(),
        r"\b15\s*балл".into(),
        r"\b190\s*балл".into(),
        r"Завершен".into(),
        r"Завершено".into(),
    ]
}
fn default_urgent() -> String {
    r"Успейте\s*принять\s*участие".into()
}
fn default_reward_marker() -> String {
    r"Сумма\s*получения".into()
}
fn default_points_marker() -> String {
    r"Требуемые\s*балл".into()
}
fn default_points_unit() -> String {
    "балл".into()
}
fn default_finished() -> String {
    "Завершен".into()
}
fn default_min_block_chars() -> usize {
    20
}
fn default_prefix_chars() -> usize {
    400
}
fn default_max_ascent() -> usize {
    4
}
fn default_project_max_chars() -> usize {
    120
}
fn default_reward_max_chars() -> usize {
    80
}
fn default_identifier_max_chars() -> usize {
    180
}

/// `[telegram]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// Bot API base URL.
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Name of the env var holding the bot token (never store the token itself).
    #[serde(default = "default_token_env")]
    pub token_env: String,

    /// Recipients, notified sequentially in this order.
    #[serde(default)]
    pub chat_ids: Vec<String>,

    #[serde(default = "default_send_timeout_secs")]
    pub send_timeout_secs: u64,

    /// Label of the inline button linking to the monitored page.
    #[serde(default = "default_button_text")]
    pub button_text: String,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            token_env: default_token_env(),
            chat_ids: Vec::new(),
            send_timeout_secs: default_send_timeout_secs(),
            button_text: default_button_text(),
        }
    }
}

fn default_api_base() -> String {
    "https://api.telegram.org".into()
}
fn default_token_env() -> String {
    "ALPHAWATCH_BOT_TOKEN".into()
}
fn default_send_timeout_secs() -> u64 {
    8
}
fn default_button_text() -> String {
    "Открыть Binance Alpha".into()
}

/// `[liveness]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LivenessConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_bind")]
    pub bind: String,

    /// Listening port; the `PORT` env var takes precedence.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind: default_bind(),
            port: default_port(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    3000
}

impl LivenessConfig {
    /// Effective port: `PORT` if set and numeric, else the configured one.
    pub fn effective_port(&self) -> u16 {
        match std::env::var(PORT_ENV) {
            Ok(val) => val.trim().parse().unwrap_or_else(|_| {
                tracing::warn!(value = %val, "ignoring non-numeric PORT");
                self.port
            }),
            Err(_) => self.port,
        }
    }

    /// `bind:port` socket address string.
    pub fn address(&self) -> String {
        format!("{}:{}", self.bind, self.effective_port())
    }
}

// ---------------------------------------------------------------------------
// Monitor config (runtime, derived from the config file)
// ---------------------------------------------------------------------------

/// Runtime poll-loop configuration.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub url: Url,
    pub interval: Duration,
    pub jitter_secs: f64,
    pub fetch_timeout: Duration,
    pub fetch_backoff: Duration,
    pub error_backoff: Duration,
    pub dispatch_pause: Duration,
    pub accept_language: String,
    pub user_agents: Vec<String>,
    pub detected_file: PathBuf,
    pub announce_startup: bool,
}

impl From<&AppConfig> for MonitorConfig {
    fn from(config: &AppConfig) -> Self {
        let m = &config.monitor;
        Self {
            url: m.url.clone(),
            interval: Duration::from_secs(m.interval_secs),
            jitter_secs: m.jitter_secs.abs(),
            fetch_timeout: Duration::from_secs(m.fetch_timeout_secs),
            fetch_backoff: Duration::from_secs(m.fetch_backoff_secs),
            error_backoff: Duration::from_secs(m.error_backoff_secs),
            dispatch_pause: Duration::from_millis(m.dispatch_pause_ms),
            accept_language: m.accept_language.clone(),
            user_agents: m.user_agents.clone(),
            detected_file: m.detected_file.clone(),
            announce_startup: m.announce_startup,
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.alphawatch/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| AlphaWatchError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.alphawatch/alphawatch.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| AlphaWatchError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        AlphaWatchError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| AlphaWatchError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| AlphaWatchError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| AlphaWatchError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Read the bot token from the env var named in the config.
pub fn resolve_bot_token(config: &TelegramConfig) -> Result<String> {
    let var_name = &config.token_env;
    match std::env::var(var_name) {
        Ok(val) if !val.trim().is_empty() => Ok(val.trim().to_string()),
        _ => Err(AlphaWatchError::config(format!(
            "bot token not found. Set the {var_name} environment variable."
        ))),
    }
}

impl AppConfig {
    /// Check values that deserialize fine but cannot run.
    pub fn validate(&self) -> Result<()> {
        self.monitor.validate()
    }
}
