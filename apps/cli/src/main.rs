//! AlphaWatch CLI: Binance Alpha airdrop monitor.
//!
//! Polls the feed, detects new actionable announcements, and alerts the
//! configured Telegram chats exactly once per announcement.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
