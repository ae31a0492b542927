//! Shared types, error model, and configuration for AlphaWatch.
//!
//! This crate is the foundation depended on by all other AlphaWatch crates.
//! It provides:
//! - [`AlphaWatchError`]: the unified error type
//! - Domain types ([`AnnouncementRecord`], [`Status`])
//! - Configuration ([`AppConfig`], [`MonitorConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DetectorConfig, LivenessConfig, MAX_INTERVAL_SECS, MAX_JITTER_SECS, MonitorConfig,
    MonitorSection, TelegramConfig, config_dir, config_file_path, init_config, load_config,
    load_config_from, resolve_bot_token,
};
pub use error::{AlphaWatchError, Result};
pub use types::{AnnouncementRecord, SENTINEL, Status, UNKNOWN_PROJECT};
