mod config_cmd;
mod health;
mod room;
mod share;

pub use config_cmd::ConfigCommand;
pub use health::HealthCommand;
pub use room::RoomCommand;
pub use share::ShareCommand;

use roomshare_core::{ClientError, ClientSession};

use crate::config::Config;

/// Opens a session with the loaded configuration.
pub(crate) fn open_session(config: &Config) -> Result<ClientSession, ClientError> {
    ClientSession::with_config(config.client_config())
}
