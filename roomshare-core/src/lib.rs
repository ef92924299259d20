//! Roomshare Core Library
//!
//! Client session, content model and transports for a room-based
//! content-synchronization service.

pub mod bundle;
pub mod config;
pub mod content;
pub mod error;
pub mod protocol;
pub mod retry;
pub mod room;
pub mod session;
pub mod transport;

mod bridge;

pub use config::ClientConfig;
pub use content::{
    content_hash, Content, ContentData, ContentKind, FileEntry, RawContent, BUNDLE_MIME, TEXT_MIME,
};
pub use error::{codes, ClientError, ErrorKind, LastError, Result};
pub use protocol::{Health, HealthResult};
pub use retry::RetryPolicy;
pub use room::{Connection, Device, Membership, RoomId, RoomStatus};
pub use session::ClientSession;
pub use transport::{
    HttpTransport, MemoryService, MemoryTransport, Method, Request, Response, Transport,
};

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Seconds since the Unix epoch.
pub(crate) fn unix_now() -> u64 {
    chrono::Utc::now().timestamp().max(0) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!version().is_empty());
    }

    #[test]
    fn test_unix_now_is_recent() {
        // 2023-11-14
        assert!(unix_now() > 1_700_000_000);
    }
}
