//! JSON bodies exchanged with the room service.
//!
//! Both the HTTP transport and the in-process service speak these types, so
//! each derives `Serialize` and `Deserialize`.

use serde::{Deserialize, Serialize};

use crate::content::ContentKind;
use crate::room::Device;

/// Body of `POST /room`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRoomRequest {
    pub name: String,
}

/// Response of `POST /room`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRoomResponse {
    pub id: u64,
}

/// Response of `GET /room/{id}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomStatusResponse {
    pub id: u64,
    pub name: String,
    pub devices: Vec<Device>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MembershipAction {
    Connect,
    Disconnect,
}

/// Body of `POST /room/{id}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MembershipRequest {
    pub name: String,
    pub action: MembershipAction,
}

/// Content metadata, stored and fetched separately from the body
/// (`/room/{id}/status`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentStatus {
    pub device: String,
    pub timestamp: u64,
    #[serde(rename = "type")]
    pub kind: ContentKind,
    #[serde(default)]
    pub name: String,
    pub mime: String,
    /// Hex SHA-256 of the body.
    pub hash: String,
}

/// Error body returned with every non-success status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub reason: String,
}

/// Service health as reported by `GET /health`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Health {
    Healthy,
    Degraded,
    Faulty,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResult {
    pub health: Health,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}
