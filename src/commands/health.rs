use clap::Args;

use roomshare_core::Health;

use super::open_session;
use crate::config::Config;

/// Check the room service health
#[derive(Args)]
pub struct HealthCommand {}

impl HealthCommand {
    pub fn run(&self, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
        let session = open_session(config)?;
        let result = session.health()?;

        let label = match result.health {
            Health::Healthy => "healthy",
            Health::Degraded => "degraded",
            Health::Faulty => "faulty",
        };
        match result.message {
            Some(message) if !message.is_empty() => {
                println!("{} ({}): {}", config.origin.value, label, message)
            }
            _ => println!("{} ({})", config.origin.value, label),
        }
        Ok(())
    }
}
