// src/cli/mod.rs — CLI definition (clap derive)

pub mod plugins;
pub mod serve;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "zabot", about = "Plugin-based Slack bot with an admin dashboard", version)]
pub struct Cli {
    /// Config file path (defaults to ./zabot.toml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Clone, Debug, Default, PartialEq, Eq)]
pub enum Commands {
    /// Run the bot and its HTTP server (default)
    #[default]
    Serve,
    /// List the plugins discovery would load
    Plugins,
}
