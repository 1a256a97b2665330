//! cadenza CLI - renders and plays the voice engine.

mod commands;
mod phrase;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cadenza")]
#[command(author, version, about = "cadenza voice engine CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render the demo phrase to a WAV file
    Render(commands::render::RenderArgs),

    /// Play the demo phrase in a loop on an audio device
    Play(commands::play::PlayArgs),

    /// List audio output devices
    Devices,

    /// Print or write the default configuration
    Config(commands::config::ConfigArgs),
}

fn main() -> anyhow::Result<()> {
    // Logs go to stderr so `cadenza config` output stays clean.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Render(args) => commands::render::run(args),
        Commands::Play(args) => commands::play::run(args),
        Commands::Devices => commands::devices::run(),
        Commands::Config(args) => commands::config::run(args),
    }
}
