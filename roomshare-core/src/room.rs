//! Room identity, membership snapshots and the per-device membership state machine.

use std::fmt;
use std::num::NonZeroU64;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{codes, ClientError};

/// Service-assigned room identifier. Zero is never a valid id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(NonZeroU64);

impl RoomId {
    /// Returns `None` for the invalid id `0`.
    pub fn new(id: u64) -> Option<Self> {
        NonZeroU64::new(id).map(Self)
    }

    pub fn get(&self) -> u64 {
        self.0.get()
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RoomId {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u64>()
            .ok()
            .and_then(RoomId::new)
            .ok_or_else(|| {
                ClientError::validation(
                    codes::INVALID_REQUEST,
                    format!("'{}' is not a valid room id", s),
                )
            })
    }
}

/// One member of a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub name: String,
    /// Seconds since the Unix epoch at which the device connected.
    pub timestamp: u64,
}

/// Point-in-time snapshot of a room. Owned by the caller once returned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomStatus {
    pub name: String,
    pub id: RoomId,
    pub devices: Vec<Device>,
}

impl RoomStatus {
    pub fn has_device(&self, name: &str) -> bool {
        self.devices.iter().any(|d| d.name == name)
    }

    pub fn device_names(&self) -> Vec<&str> {
        self.devices.iter().map(|d| d.name.as_str()).collect()
    }
}

/// The room and device a session is currently connected as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    pub room: RoomId,
    pub device: String,
}

/// Membership of one device in one room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Membership {
    #[default]
    Disconnected,
    Connected,
}

impl Membership {
    /// `Disconnected -> Connected`. Fails with a conflict if already connected.
    pub fn connect(&mut self, device: &str) -> Result<(), ClientError> {
        match self {
            Membership::Disconnected => {
                *self = Membership::Connected;
                Ok(())
            }
            Membership::Connected => Err(ClientError::conflict(
                codes::DEVICE_ALREADY_CONNECTED,
                format!("device '{}' is already connected to this room", device),
            )),
        }
    }

    /// `Connected -> Disconnected`. Fails with a conflict if not connected.
    pub fn disconnect(&mut self, device: &str) -> Result<(), ClientError> {
        match self {
            Membership::Connected => {
                *self = Membership::Disconnected;
                Ok(())
            }
            Membership::Disconnected => Err(ClientError::conflict(
                codes::DEVICE_NOT_CONNECTED,
                format!("device '{}' is not connected to this room", device),
            )),
        }
    }

    pub fn is_connected(&self) -> bool {
        *self == Membership::Connected
    }
}
