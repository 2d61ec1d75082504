//! chunkpipe CLI - run a prompt over large text files
//!
//! Splits files that exceed a model's context into ordered chunks, sends
//! them through a rate-limited chat-completion API and writes the joined
//! results next to the inputs.

mod commands;
mod output;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use chunkpipe_core::config::{expand_path, get_models_path, ENV_MODELS_PATH};
use chunkpipe_core::ModelRegistry;

#[derive(Parser)]
#[command(name = "chunkpipe")]
#[command(author, version, about = "Chunked, rate-limited prompt processing for large files", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format: table (default) or json
    #[arg(long, global = true, default_value = "table")]
    format: output::OutputFormat,

    /// Suppress progress messages
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Model capability file (or set CHUNKPIPE_MODELS env var)
    #[arg(long, env = ENV_MODELS_PATH, global = true)]
    models: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a prompt over one or more files
    Process(commands::process::ProcessArgs),

    /// List the models in the capability file
    Models,

    /// Show how a file would be chunked for a model, without calling the API
    Estimate {
        /// File to inspect
        file: PathBuf,

        /// Model key from the capability file
        #[arg(short, long)]
        model: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.quiet { "warn" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let models_path = match &cli.models {
        Some(path) => expand_path(path),
        None => get_models_path(),
    };
    let registry = ModelRegistry::load(&models_path);

    let ctx = commands::Context {
        registry: Arc::new(registry),
        models_path,
        format: cli.format,
        quiet: cli.quiet,
    };

    match cli.command {
        Commands::Process(args) => commands::process::execute(&ctx, args).await,
        Commands::Models => commands::models::execute(&ctx).await,
        Commands::Estimate { file, model } => commands::estimate::execute(&ctx, file, model).await,
    }
}
