use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Conduit streaming completion client
#[derive(Debug, Parser)]
#[command(name = "conduit", about = "Stream chat completions from an OpenAI-compatible model server")]
pub struct Args {
    /// Path to configuration file; built-in defaults are used when omitted
    #[arg(short, long, env = "CONDUIT_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Send a prompt and stream the reply to stdout
    Chat(ChatArgs),

    /// List the models the server offers
    Models {
        /// Bypass the cached listing
        #[arg(long)]
        refresh: bool,
    },
}

#[derive(Debug, clap::Args)]
pub struct ChatArgs {
    /// User prompt
    pub prompt: String,

    /// Model id; defaults to the first model the server lists
    #[arg(short, long, env = "CONDUIT_MODEL")]
    pub model: Option<String>,

    /// System instruction sent ahead of the prompt
    #[arg(short, long)]
    pub system: Option<String>,

    /// JSON file holding an array of tool definitions
    #[arg(long)]
    pub tools: Option<PathBuf>,

    /// Require the model to call at least one tool
    #[arg(long, requires = "tools")]
    pub require_tool: bool,
}
