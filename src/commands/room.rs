use chrono::DateTime;
use clap::{Args, Subcommand, ValueEnum};
use std::io::{self, Write};

use roomshare_core::{RoomId, RoomStatus};

use super::open_session;
use crate::config::Config;

#[derive(Clone, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Args)]
pub struct RoomCommand {
    #[command(subcommand)]
    pub command: RoomSubcommand,
}

#[derive(Subcommand)]
pub enum RoomSubcommand {
    /// Create a new room
    Create {
        /// Name of the room
        name: String,
    },

    /// Show a room's name and connected devices
    Status {
        /// Room ID
        id: RoomId,

        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Delete an empty room
    Delete {
        /// Room ID
        id: RoomId,

        /// Skip confirmation prompt
        #[arg(long, short)]
        force: bool,
    },

    /// Connect this device to a room
    Join {
        /// Room ID
        id: RoomId,

        /// Device name (defaults to the configured device name)
        #[arg(long)]
        device: Option<String>,
    },

    /// Disconnect this device from a room
    Leave {
        /// Room ID
        id: RoomId,

        /// Device name (defaults to the configured device name)
        #[arg(long)]
        device: Option<String>,
    },
}

impl RoomCommand {
    pub fn run(&self, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
        let session = open_session(config)?;

        match &self.command {
            RoomSubcommand::Create { name } => {
                let id = session.create_room(name)?;
                println!("Created room '{}' with id {}", name, id);
                Ok(())
            }

            RoomSubcommand::Status { id, format } => {
                let status = session.get_room_status(*id)?;
                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(&status)?);
                    }
                    OutputFormat::Text => print_status(&status),
                }
                Ok(())
            }

            RoomSubcommand::Delete { id, force } => {
                // Confirm deletion unless --force is used
                if !force {
                    print!("Delete room {}? [y/N] ", id);
                    io::stdout().flush()?;

                    let mut input = String::new();
                    io::stdin().read_line(&mut input)?;

                    if !input.trim().eq_ignore_ascii_case("y") {
                        println!("Deletion cancelled.");
                        return Ok(());
                    }
                }

                session.delete_room(*id)?;
                println!("Deleted room {}", id);
                Ok(())
            }

            RoomSubcommand::Join { id, device } => {
                let device = device.as_deref().unwrap_or(&config.device_name.value);
                session.connect_room(*id, device)?;
                println!("Joined room {} as '{}'", id, device);
                Ok(())
            }

            RoomSubcommand::Leave { id, device } => {
                let device = device.as_deref().unwrap_or(&config.device_name.value);
                session.disconnect_room(*id, device)?;
                println!("Left room {} as '{}'", id, device);
                Ok(())
            }
        }
    }
}

pub(crate) fn print_status(status: &RoomStatus) {
    println!("{} (id {})", status.name, status.id);
    if status.devices.is_empty() {
        println!("  no devices connected");
        return;
    }
    println!("  {:<24}  JOINED", "DEVICE");
    for device in &status.devices {
        println!("  {:<24}  {}", device.name, format_timestamp(device.timestamp));
    }
}

/// Renders seconds since the epoch as UTC, falling back to the raw number.
pub(crate) fn format_timestamp(secs: u64) -> String {
    i64::try_from(secs)
        .ok()
        .and_then(|s| DateTime::from_timestamp(s, 0))
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| secs.to_string())
}
