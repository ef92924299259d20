use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod config;
mod logging;

use commands::{ConfigCommand, HealthCommand, RoomCommand, ShareCommand};
use config::Config;

#[derive(Parser)]
#[command(name = "roomshare")]
#[command(version)]
#[command(
    about = "Share clipboard text and files between devices through rooms",
    long_about = None
)]
struct Cli {
    /// Path to config file
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Check the room service health
    Health(HealthCommand),

    /// Create, inspect, join and delete rooms
    Room(RoomCommand),

    /// Join a room and share content interactively
    Share(ShareCommand),

    /// Manage configuration
    Config(ConfigCommand),
}

fn main() {
    logging::init();

    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Save config path for init command
    let cli_config_path = cli.config.clone();

    // Load configuration
    let config = Config::load(cli.config)?;

    match cli.command {
        Some(Commands::Health(cmd)) => cmd.run(&config)?,
        Some(Commands::Room(cmd)) => cmd.run(&config)?,
        Some(Commands::Share(cmd)) => cmd.run(&config)?,
        Some(Commands::Config(cmd)) => cmd.run(&config, cli_config_path)?,
        None => {
            println!("Use --help to see available commands");
        }
    }

    Ok(())
}
