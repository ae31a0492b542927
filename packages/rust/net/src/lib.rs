//! Network collaborators of the poll loop.
//!
//! This crate provides:
//! - [`PageFetcher`]: GETs the monitored page with a rotating User-Agent
//! - [`TelegramNotifier`]: delivers alerts to every configured chat

pub mod fetch;
pub mod telegram;

pub use fetch::PageFetcher;
pub use telegram::{DispatchReport, LinkButton, OutboundMessage, TelegramNotifier};
