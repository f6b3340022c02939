// src/main.rs — zabot entry point

use clap::Parser;

use zabot::cli::{self, Cli, Commands};
use zabot::infra::config::Config;
use zabot::infra::logger;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load config (falls back to defaults if no zabot.toml)
    let config = Config::load(cli.config.as_deref())?;
    logger::init_logging(&config.log_level);

    match cli.command.unwrap_or_default() {
        Commands::Serve => cli::serve::run_serve(config).await,
        Commands::Plugins => cli::plugins::run_plugins(&config),
    }
}
