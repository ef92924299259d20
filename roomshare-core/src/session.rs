//! Client session: the stateful handle every room operation goes through.
//!
//! A session is bound to one set of credentials. It records the most recent
//! failure, tracks which room and device it is connected as, and caches the
//! service health check. All state sits behind a mutex, so one session can be
//! shared between threads.
//!
//! Operations block the calling thread until the service answers. They work
//! from inside a tokio runtime too, but stall that runtime's worker while they
//! wait, so async code should call them through `tokio::task::spawn_blocking`.
//!
//! A session is released exactly once, by dropping it or calling
//! [`ClientSession::close`]. Using it afterwards does not compile:
//!
//! ```compile_fail
//! use roomshare_core::{ClientConfig, ClientSession, MemoryService};
//!
//! let service = MemoryService::new("mock");
//! let config = ClientConfig::new("mock", "http://localhost:3000", "/api/v1");
//! let session = ClientSession::with_transport(config, service.transport("mock")).unwrap();
//! session.close();
//! session.get_last_error();
//! ```

use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::bridge::ApiBridge;
use crate::config::ClientConfig;
use crate::content::{content_hash, Content, ContentData};
use crate::error::{codes, ClientError, ErrorKind, LastError};
use crate::protocol::{ContentStatus, Health, HealthResult, MembershipAction};
use crate::room::{Connection, RoomId, RoomStatus};
use crate::transport::{HttpTransport, Transport};

struct HealthCache {
    result: HealthResult,
    checked_at: Instant,
}

struct SessionState {
    last_error: LastError,
    scope: Option<Connection>,
    health: Option<HealthCache>,
    timeout: Option<Duration>,
}

/// Session bound to `(token, origin, base_url)`.
pub struct ClientSession {
    config: ClientConfig,
    bridge: ApiBridge,
    state: Mutex<SessionState>,
}

impl ClientSession {
    /// Creates a session over HTTP with default tuning.
    ///
    /// Validates the credentials, prepares the transport and checks the
    /// service health before returning. Every failure is reported as
    /// [`ErrorKind::Initialization`].
    pub fn create(
        token: impl Into<String>,
        origin: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self, ClientError> {
        Self::with_config(ClientConfig::new(token, origin, base_url))
    }

    /// Creates a session over HTTP.
    pub fn with_config(config: ClientConfig) -> Result<Self, ClientError> {
        config.validate()?;
        let transport = HttpTransport::new(&config).map_err(ClientError::into_initialization)?;
        Self::with_transport(config, transport)
    }

    /// Creates a session over any transport.
    pub fn with_transport(
        config: ClientConfig,
        transport: impl Transport + 'static,
    ) -> Result<Self, ClientError> {
        config.validate()?;

        let bridge = ApiBridge::new(Box::new(transport));
        bridge.init().map_err(ClientError::into_initialization)?;

        let session = Self {
            state: Mutex::new(SessionState {
                last_error: LastError::none(),
                scope: None,
                health: None,
                timeout: config.request_timeout,
            }),
            config,
            bridge,
        };
        session
            .ensure_healthy()
            .map_err(ClientError::into_initialization)?;

        info!(
            origin = %session.config.origin,
            base_url = %session.config.base_url,
            "room service session established"
        );
        Ok(session)
    }

    /// Releases the session. Equivalent to dropping it.
    pub fn close(self) {
        drop(self);
    }

    /// The most recent failure, or the `OK` sentinel if nothing has failed.
    pub fn get_last_error(&self) -> LastError {
        self.lock().last_error.clone()
    }

    pub fn clear_last_error(&self) {
        self.lock().last_error = LastError::none();
    }

    /// The room and device this session is connected as, if any.
    pub fn connection(&self) -> Option<Connection> {
        self.lock().scope.clone()
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.lock().timeout
    }

    /// Deadline applied to each subsequent request. `None` waits indefinitely.
    pub fn set_request_timeout(&self, timeout: Option<Duration>) {
        self.lock().timeout = timeout;
    }

    /// Fetches the service health, bypassing and refreshing the cache.
    pub fn health(&self) -> Result<HealthResult, ClientError> {
        self.record(self.fetch_health())
    }

    /// Creates a room and returns the id the service assigned.
    pub fn create_room(&self, name: &str) -> Result<RoomId, ClientError> {
        self.record((|| {
            if name.trim().is_empty() {
                return Err(ClientError::validation(
                    codes::INVALID_REQUEST,
                    "room name must not be empty",
                ));
            }
            self.ensure_healthy()?;
            let id = self.bridge.create_room(name, self.request_timeout())?;
            info!(room = %id, room_name = name, "room created");
            Ok(id)
        })())
    }

    /// Joins `id` as `device_name` and scopes content operations to it.
    pub fn connect_room(&self, id: RoomId, device_name: &str) -> Result<(), ClientError> {
        self.record((|| {
            if device_name.trim().is_empty() {
                return Err(ClientError::validation(
                    codes::INVALID_REQUEST,
                    "device name must not be empty",
                ));
            }
            if let Some(scope) = self.connection() {
                if scope.room != id {
                    return Err(ClientError::conflict(
                        codes::ROOM_ALREADY_CONNECTED,
                        format!(
                            "already connected to room {} as '{}'",
                            scope.room, scope.device
                        ),
                    ));
                }
            }

            self.ensure_healthy()?;
            self.bridge
                .membership(id, device_name, MembershipAction::Connect, self.request_timeout())
                .inspect_err(|e| self.forget_missing_room(id, e))?;

            self.lock().scope = Some(Connection {
                room: id,
                device: device_name.to_string(),
            });
            info!(room = %id, device = device_name, "connected to room");
            Ok(())
        })())
    }

    /// Leaves `id` as `device_name`. Clears the scope if it matched.
    pub fn disconnect_room(&self, id: RoomId, device_name: &str) -> Result<(), ClientError> {
        self.record((|| {
            if device_name.trim().is_empty() {
                return Err(ClientError::validation(
                    codes::INVALID_REQUEST,
                    "device name must not be empty",
                ));
            }
            self.ensure_healthy()?;
            self.bridge
                .membership(
                    id,
                    device_name,
                    MembershipAction::Disconnect,
                    self.request_timeout(),
                )
                .inspect_err(|e| self.forget_missing_room(id, e))?;

            let mut state = self.lock();
            if state
                .scope
                .as_ref()
                .is_some_and(|s| s.room == id && s.device == device_name)
            {
                state.scope = None;
            }
            drop(state);
            info!(room = %id, device = device_name, "disconnected from room");
            Ok(())
        })())
    }

    /// Snapshot of a room's name and connected devices.
    pub fn get_room_status(&self, id: RoomId) -> Result<RoomStatus, ClientError> {
        self.record((|| {
            self.ensure_healthy()?;
            self.query(|| self.bridge.room_status(id, self.request_timeout()))
                .inspect_err(|e| self.forget_missing_room(id, e))
        })())
    }

    /// Deletes an empty room.
    pub fn delete_room(&self, id: RoomId) -> Result<(), ClientError> {
        self.record((|| {
            self.ensure_healthy()?;
            self.bridge
                .delete_room(id, self.request_timeout())
                .inspect_err(|e| self.forget_missing_room(id, e))?;
            self.forget_room(id);
            info!(room = %id, "room deleted");
            Ok(())
        })())
    }

    /// Downloads the content shared in the connected room.
    pub fn get_content(&self) -> Result<Content, ClientError> {
        self.record((|| {
            let scope = self.require_scope()?;
            self.ensure_healthy()?;

            let room = scope.room;
            let status = self
                .query(|| self.bridge.content_status(room, self.request_timeout()))
                .inspect_err(|e| self.forget_missing_room(room, e))?;
            let body = self
                .query(|| self.bridge.content_body(room, self.request_timeout()))
                .inspect_err(|e| self.forget_missing_room(room, e))?;

            let actual = content_hash(&body);
            if !actual.eq_ignore_ascii_case(&status.hash) {
                return Err(ClientError::invalid_response(format!(
                    "content hash mismatch: status says {} but body hashes to {}",
                    status.hash, actual
                )));
            }

            let data = ContentData::decode_body(status.kind, body)?;
            debug!(room = %room, kind = %status.kind, "content downloaded");
            Ok(Content {
                device: status.device,
                timestamp: status.timestamp,
                name: status.name,
                mime: status.mime,
                data,
            })
        })())
    }

    /// Replaces the content shared in the connected room.
    pub fn upload_content(&self, content: &Content) -> Result<(), ClientError> {
        self.record((|| {
            content.validate()?;
            let scope = self.require_scope()?;
            self.ensure_healthy()?;

            let body = content.data.encode_body()?;
            let status = ContentStatus {
                device: content.device.clone(),
                timestamp: content.timestamp,
                kind: content.kind(),
                name: content.name.clone(),
                mime: content.mime.clone(),
                hash: content_hash(&body),
            };
            let size = body.len();
            self.bridge
                .put_content(scope.room, &status, body, self.request_timeout())
                .inspect_err(|e| self.forget_missing_room(scope.room, e))?;
            debug!(room = %scope.room, kind = %status.kind, size, "content uploaded");
            Ok(())
        })())
    }

    /// Uploads `text` as clipboard content stamped with `device` and the current time.
    pub fn upload_text(&self, device: &str, text: &str) -> Result<(), ClientError> {
        self.upload_content(&Content::text(device, text))
    }

    /// Clears the content shared in the connected room.
    pub fn delete_content(&self) -> Result<(), ClientError> {
        self.record((|| {
            let scope = self.require_scope()?;
            self.ensure_healthy()?;
            self.bridge
                .delete_content(scope.room, self.request_timeout())
                .inspect_err(|e| self.forget_missing_room(scope.room, e))?;
            debug!(room = %scope.room, "content deleted");
            Ok(())
        })())
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Stores a failure as the last error before handing the result back.
    fn record<T>(&self, result: Result<T, ClientError>) -> Result<T, ClientError> {
        if let Err(e) = &result {
            debug!(code = e.code(), reason = e.reason(), "operation failed");
            self.lock().last_error = LastError::from(e);
        }
        result
    }

    fn require_scope(&self) -> Result<Connection, ClientError> {
        self.connection().ok_or_else(|| {
            ClientError::conflict(codes::ROOM_DISCONNECTED, "not connected to any room")
        })
    }

    fn forget_room(&self, id: RoomId) {
        let mut state = self.lock();
        if state.scope.as_ref().is_some_and(|s| s.room == id) {
            state.scope = None;
        }
    }

    /// The service is authoritative: a vanished room ends the scope.
    fn forget_missing_room(&self, id: RoomId, error: &ClientError) {
        if error.kind() == ErrorKind::NotFound && error.code() == codes::ROOM_NOT_FOUND {
            self.forget_room(id);
        }
    }

    /// Runs a read-only request under the query retry policy.
    fn query<T>(&self, op: impl Fn() -> Result<T, ClientError>) -> Result<T, ClientError> {
        let policy = self.config.query_retry;
        let mut attempt = 0;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt + 1 < policy.max_attempts() => {
                    let delay = policy.delay_for_attempt(attempt);
                    warn!(
                        code = e.code(),
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        "query failed, retrying"
                    );
                    std::thread::sleep(delay);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn fetch_health(&self) -> Result<HealthResult, ClientError> {
        let result = self.query(|| self.bridge.health(self.request_timeout()))?;
        if result.health == Health::Faulty {
            self.lock().health = None;
        } else {
            self.lock().health = Some(HealthCache {
                result: result.clone(),
                checked_at: Instant::now(),
            });
        }
        Ok(result)
    }

    /// Fails with `ERR_SERVER_HEALTH_STATUS_FAULTY` when the service reports
    /// itself faulty. Healthy answers are reused for the configured interval.
    fn ensure_healthy(&self) -> Result<(), ClientError> {
        let cached = self
            .lock()
            .health
            .as_ref()
            .filter(|c| c.checked_at.elapsed() < self.config.health_check_interval)
            .map(|c| c.result.clone());
        let result = match cached {
            Some(result) => result,
            None => self.fetch_health()?,
        };

        match result.health {
            Health::Healthy => Ok(()),
            Health::Degraded => {
                warn!(
                    message = result.message.as_deref().unwrap_or(""),
                    "room service reports degraded health"
                );
                Ok(())
            }
            Health::Faulty => Err(ClientError::transport(
                codes::SERVER_HEALTH_STATUS_FAULTY,
                result
                    .message
                    .unwrap_or_else(|| "room service reports faulty health".to_string()),
            )),
        }
    }
}

impl Drop for ClientSession {
    fn drop(&mut self) {
        debug!(origin = %self.config.origin, "room service session released");
    }
}
