//! Relay Bot - Main entry point.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use relay_bot::{
    prompt, run_channel, CliChannel, CompatibleClient, Orchestrator, SessionStore, TelegramChannel,
};
use relay_common::config::{load_env_file, Config};
use relay_common::logging::init_logging;
use relay_common::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Transport {
    /// Telegram Bot API long polling
    Telegram,
    /// Interactive stdin/stdout session
    Cli,
}

/// Conversational relay between a chat transport and an LLM endpoint.
#[derive(Parser, Debug)]
#[command(name = "relay-bot", version, about, long_about = None)]
struct Args {
    /// Transport to serve
    #[arg(long, value_enum, default_value_t = Transport::Telegram)]
    transport: Transport,

    /// Load environment variables from this file instead of ./.env
    #[arg(long)]
    env_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load and validate configuration before anything else
    load_env_file(args.env_file.as_deref())?;
    let config = Config::from_env()?;
    if args.transport == Transport::Telegram {
        config.telegram.validate()?;
    }

    let _log_guard = init_logging(
        &config.observability.log_level,
        &config.observability.log_format,
        config.observability.log_file.as_deref(),
    )?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        transport = ?args.transport,
        model = %config.completion.model,
        context_window = config.conversation.context_window,
        "Relay Bot starting"
    );

    let directive = prompt::load(&config.conversation.system_prompt_path);
    let store = Arc::new(SessionStore::new());
    let client = Arc::new(CompatibleClient::from_config(&config.completion));
    let orchestrator = Arc::new(Orchestrator::from_config(
        &config.conversation,
        store,
        client,
        directive,
    ));

    match args.transport {
        Transport::Telegram => {
            run_channel(TelegramChannel::from_config(&config.telegram)?, orchestrator).await?;
        }
        Transport::Cli => run_channel(CliChannel::new(), orchestrator).await?,
    }

    tracing::info!("Relay Bot stopped");
    Ok(())
}
