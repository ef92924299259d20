//! In-process room service.
//!
//! [`MemoryService`] holds rooms, membership and shared content in memory and
//! answers the same endpoints a remote service does. It is cheap to clone;
//! clones share state. [`MemoryTransport`] binds a service to a token so a
//! session can talk to it without a network.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use super::{Method, Request, Response, Transport};
use crate::error::{codes, ClientError};
use crate::protocol::{
    ContentStatus, CreateRoomRequest, CreateRoomResponse, ErrorBody, Health, HealthResult,
    MembershipAction, MembershipRequest, RoomStatusResponse,
};
use crate::room::{Device, Membership};

/// Successful mutation replies kept for idempotent replay. Oldest go first.
const MAX_REPLIES: usize = 1024;

struct Member {
    name: String,
    joined_at: u64,
    membership: Membership,
}

struct Room {
    name: String,
    members: Vec<Member>,
    status: Option<ContentStatus>,
    body: Option<(Option<String>, Vec<u8>)>,
}

impl Room {
    fn new(name: String) -> Self {
        Self {
            name,
            members: Vec::new(),
            status: None,
            body: None,
        }
    }

    fn connected(&self) -> impl Iterator<Item = &Member> {
        self.members.iter().filter(|m| m.membership.is_connected())
    }
}

struct ServiceState {
    token: String,
    next_id: u64,
    rooms: BTreeMap<u64, Room>,
    health: HealthResult,
    health_checks: usize,
    replies: HashMap<String, Response>,
    reply_order: VecDeque<String>,
    pending_outages: usize,
}

impl ServiceState {
    fn remember(&mut self, key: String, response: &Response) {
        if self.replies.contains_key(&key) {
            return;
        }
        if self.reply_order.len() == MAX_REPLIES {
            if let Some(oldest) = self.reply_order.pop_front() {
                self.replies.remove(&oldest);
            }
        }
        self.replies.insert(key.clone(), response.clone());
        self.reply_order.push_back(key);
    }
}

/// Shared in-memory room service.
#[derive(Clone)]
pub struct MemoryService {
    state: Arc<Mutex<ServiceState>>,
}

impl MemoryService {
    /// A healthy, empty service accepting `token`.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            state: Arc::new(Mutex::new(ServiceState {
                token: token.into(),
                next_id: 1,
                rooms: BTreeMap::new(),
                health: HealthResult {
                    health: Health::Healthy,
                    message: None,
                },
                health_checks: 0,
                replies: HashMap::new(),
                reply_order: VecDeque::new(),
                pending_outages: 0,
            })),
        }
    }

    /// A transport that presents `token` to this service.
    pub fn transport(&self, token: impl Into<String>) -> MemoryTransport {
        MemoryTransport {
            service: self.clone(),
            token: token.into(),
        }
    }

    pub fn set_health(&self, health: Health, message: Option<&str>) {
        self.lock().health = HealthResult {
            health,
            message: message.map(str::to_string),
        };
    }

    /// Number of `/health` requests served.
    pub fn health_checks(&self) -> usize {
        self.lock().health_checks
    }

    /// Number of successful mutation replies held for replay.
    pub fn idempotency_keys(&self) -> usize {
        self.lock().replies.len()
    }

    /// Makes the next `count` transport sends fail as if the network dropped.
    pub fn inject_outage(&self, count: usize) {
        self.lock().pending_outages = count;
    }

    pub fn room_count(&self) -> usize {
        self.lock().rooms.len()
    }

    fn lock(&self) -> MutexGuard<'_, ServiceState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn take_outage(&self) -> bool {
        let mut state = self.lock();
        if state.pending_outages > 0 {
            state.pending_outages -= 1;
            true
        } else {
            false
        }
    }

    /// Serves one request. `token` is the bearer token presented, if any.
    ///
    /// A mutation whose idempotency key already produced a 2xx reply gets that
    /// reply again without being re-applied. Failed mutations are not cached,
    /// so retrying with the same key is evaluated afresh.
    pub fn handle(&self, token: Option<&str>, request: Request) -> Response {
        let mut state = self.lock();

        if token != Some(state.token.as_str()) {
            return error(401, codes::UNAUTHORIZED, "invalid or missing token");
        }

        if let Some(key) = &request.idempotency_key {
            if let Some(reply) = state.replies.get(key) {
                return reply.clone();
            }
        }

        let key = request.idempotency_key.clone();
        let response = route(&mut state, request);
        if let Some(key) = key.filter(|_| response.is_success()) {
            state.remember(key, &response);
        }
        response
    }
}

/// Transport bound to a [`MemoryService`].
#[derive(Clone)]
pub struct MemoryTransport {
    service: MemoryService,
    token: String,
}

impl Transport for MemoryTransport {
    fn init(&self) -> Result<(), ClientError> {
        Ok(())
    }

    fn send(&self, request: Request, _timeout: Option<Duration>) -> Result<Response, ClientError> {
        if self.service.take_outage() {
            return Err(ClientError::transport(
                codes::CONNECTION_FAILED,
                "connection to room service was reset",
            ));
        }
        Ok(self.service.handle(Some(&self.token), request))
    }
}

fn error(status: u16, code: &str, reason: impl Into<String>) -> Response {
    Response::json(
        status,
        &ErrorBody {
            code: code.to_string(),
            reason: reason.into(),
        },
    )
}

fn room_not_found(id: u64) -> Response {
    error(404, codes::ROOM_NOT_FOUND, format!("room {} does not exist", id))
}

fn content_not_found(id: u64) -> Response {
    error(
        404,
        codes::CONTENT_NOT_FOUND,
        format!("room {} has no shared content", id),
    )
}

fn route(state: &mut ServiceState, request: Request) -> Response {
    let segments: Vec<&str> = request
        .path
        .trim_matches('/')
        .split('/')
        .filter(|s| !s.is_empty())
        .collect();

    match (request.method, segments.as_slice()) {
        (Method::Get, ["health"]) => {
            state.health_checks += 1;
            Response::json(200, &state.health)
        }
        (Method::Post, ["room"]) => create_room(state, &request),
        (method, ["room", id, rest @ ..]) => {
            let Some(id) = id.parse::<u64>().ok().filter(|id| *id > 0) else {
                return error(
                    400,
                    codes::INVALID_REQUEST,
                    format!("'{}' is not a valid room id", id),
                );
            };
            match (method, rest) {
                (Method::Get, []) => room_status(state, id),
                (Method::Delete, []) => delete_room(state, id),
                (Method::Post, []) => membership(state, id, &request),
                (Method::Get, ["status"]) => get_status(state, id),
                (Method::Put, ["status"]) => put_status(state, id, &request),
                (Method::Delete, ["status"]) => delete_status(state, id),
                (Method::Get, ["content"]) => get_body(state, id),
                (Method::Put, ["content"]) => put_body(state, id, &request),
                (Method::Delete, ["content"]) => delete_body(state, id),
                _ => not_routed(&request),
            }
        }
        _ => not_routed(&request),
    }
}

fn not_routed(request: &Request) -> Response {
    error(
        404,
        codes::INVALID_REQUEST,
        format!("no endpoint for {} {}", request.method, request.path),
    )
}

fn parse_body<T: serde::de::DeserializeOwned>(request: &Request) -> Result<T, Response> {
    serde_json::from_slice(&request.body).map_err(|e| {
        error(
            400,
            codes::JSON_PARSE_FAILED,
            format!("malformed request body: {}", e),
        )
    })
}

fn create_room(state: &mut ServiceState, request: &Request) -> Response {
    let body: CreateRoomRequest = match parse_body(request) {
        Ok(body) => body,
        Err(response) => return response,
    };
    if body.name.trim().is_empty() {
        return error(400, codes::INVALID_REQUEST, "room name must not be empty");
    }

    let id = state.next_id;
    state.next_id += 1;
    state.rooms.insert(id, Room::new(body.name));
    Response::json(201, &CreateRoomResponse { id })
}

fn room_status(state: &ServiceState, id: u64) -> Response {
    let Some(room) = state.rooms.get(&id) else {
        return room_not_found(id);
    };
    let devices = room
        .connected()
        .map(|m| Device {
            name: m.name.clone(),
            timestamp: m.joined_at,
        })
        .collect();
    Response::json(
        200,
        &RoomStatusResponse {
            id,
            name: room.name.clone(),
            devices,
        },
    )
}

fn delete_room(state: &mut ServiceState, id: u64) -> Response {
    let Some(room) = state.rooms.get(&id) else {
        return room_not_found(id);
    };
    let connected = room.connected().count();
    if connected > 0 {
        return error(
            409,
            codes::ROOM_NOT_EMPTY,
            format!("room {} still has {} connected device(s)", id, connected),
        );
    }
    state.rooms.remove(&id);
    Response::empty(204)
}

fn membership(state: &mut ServiceState, id: u64, request: &Request) -> Response {
    let body: MembershipRequest = match parse_body(request) {
        Ok(body) => body,
        Err(response) => return response,
    };
    if body.name.trim().is_empty() {
        return error(400, codes::INVALID_REQUEST, "device name must not be empty");
    }
    let Some(room) = state.rooms.get_mut(&id) else {
        return room_not_found(id);
    };

    let position = room.members.iter().position(|m| m.name == body.name);
    let result = match (body.action, position) {
        (MembershipAction::Connect, Some(index)) => {
            let member = &mut room.members[index];
            member.membership.connect(&body.name).map(|()| {
                member.joined_at = crate::unix_now();
            })
        }
        (MembershipAction::Connect, None) => {
            let mut membership = Membership::default();
            membership.connect(&body.name).map(|()| {
                room.members.push(Member {
                    name: body.name.clone(),
                    joined_at: crate::unix_now(),
                    membership,
                });
            })
        }
        // Members that leave are forgotten; only connected devices are kept.
        (MembershipAction::Disconnect, Some(index)) => room.members[index]
            .membership
            .disconnect(&body.name)
            .map(|()| {
                room.members.remove(index);
            }),
        (MembershipAction::Disconnect, None) => Membership::default().disconnect(&body.name),
    };
    match result {
        Ok(()) => Response::empty(204),
        Err(e) => error(409, e.code(), e.reason()),
    }
}

fn get_status(state: &ServiceState, id: u64) -> Response {
    match state.rooms.get(&id) {
        None => room_not_found(id),
        Some(Room {
            status: Some(status),
            ..
        }) => Response::json(200, status),
        Some(_) => content_not_found(id),
    }
}

fn put_status(state: &mut ServiceState, id: u64, request: &Request) -> Response {
    let status: ContentStatus = match parse_body(request) {
        Ok(status) => status,
        Err(response) => return response,
    };
    let Some(room) = state.rooms.get_mut(&id) else {
        return room_not_found(id);
    };
    room.status = Some(status);
    room.body = None;
    Response::empty(204)
}

fn delete_status(state: &mut ServiceState, id: u64) -> Response {
    let Some(room) = state.rooms.get_mut(&id) else {
        return room_not_found(id);
    };
    if room.status.take().is_none() {
        return content_not_found(id);
    }
    Response::empty(204)
}

fn get_body(state: &ServiceState, id: u64) -> Response {
    match state.rooms.get(&id) {
        None => room_not_found(id),
        Some(Room {
            body: Some((content_type, body)),
            ..
        }) => Response {
            status: 200,
            content_type: content_type.clone(),
            body: body.clone(),
        },
        Some(_) => content_not_found(id),
    }
}

fn put_body(state: &mut ServiceState, id: u64, request: &Request) -> Response {
    let Some(room) = state.rooms.get_mut(&id) else {
        return room_not_found(id);
    };
    if room.status.is_none() {
        return error(
            409,
            codes::CONTENT_MISMATCH,
            "content status must be uploaded before the body",
        );
    }
    room.body = Some((request.content_type.clone(), request.body.clone()));
    Response::empty(204)
}

fn delete_body(state: &mut ServiceState, id: u64) -> Response {
    let Some(room) = state.rooms.get_mut(&id) else {
        return room_not_found(id);
    };
    room.body = None;
    Response::empty(204)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::ContentKind;

    fn send(service: &MemoryService, request: Request) -> Response {
        service.handle(Some("mock"), request)
    }

    fn create(service: &MemoryService, name: &str) -> u64 {
        let req = Request::json(
            Method::Post,
            "/room",
            &CreateRoomRequest {
                name: name.to_string(),
            },
        )
        .unwrap();
        let resp = send(service, req);
        assert_eq!(resp.status, 201);
        resp.parse_json::<CreateRoomResponse>().unwrap().id
    }

    fn member(service: &MemoryService, id: u64, name: &str, action: MembershipAction) -> Response {
        let req = Request::json(
            Method::Post,
            format!("/room/{}", id),
            &MembershipRequest {
                name: name.to_string(),
                action,
            },
        )
        .unwrap();
        send(service, req)
    }

    fn error_code(resp: &Response) -> String {
        resp.parse_json::<ErrorBody>().unwrap().code
    }

    #[test]
    fn test_wrong_token_is_unauthorized() {
        let service = MemoryService::new("mock");
        let resp = service.handle(Some("other"), Request::get("/health"));
        assert_eq!(resp.status, 401);
        assert_eq!(error_code(&resp), codes::UNAUTHORIZED);
        assert_eq!(service.handle(None, Request::get("/health")).status, 401);
    }

    #[test]
    fn test_room_ids_are_positive_and_distinct() {
        let service = MemoryService::new("mock");
        let a = create(&service, "a");
        let b = create(&service, "b");
        assert!(a > 0);
        assert_ne!(a, b);
        assert_eq!(service.room_count(), 2);
    }

    #[test]
    fn test_membership_lifecycle() {
        let service = MemoryService::new("mock");
        let id = create(&service, "team-a");

        assert_eq!(member(&service, id, "laptop", MembershipAction::Connect).status, 204);
        let resp = member(&service, id, "laptop", MembershipAction::Connect);
        assert_eq!(resp.status, 409);
        assert_eq!(error_code(&resp), codes::DEVICE_ALREADY_CONNECTED);

        let status: RoomStatusResponse = send(&service, Request::get(format!("/room/{}", id)))
            .parse_json()
            .unwrap();
        assert_eq!(status.devices.len(), 1);
        assert_eq!(status.devices[0].name, "laptop");
        assert!(status.devices[0].timestamp > 0);

        assert_eq!(member(&service, id, "laptop", MembershipAction::Disconnect).status, 204);
        let resp = member(&service, id, "laptop", MembershipAction::Disconnect);
        assert_eq!(error_code(&resp), codes::DEVICE_NOT_CONNECTED);

        let resp = member(&service, id, "ghost", MembershipAction::Disconnect);
        assert_eq!(resp.status, 409);
    }

    #[test]
    fn test_delete_room_requires_no_members() {
        let service = MemoryService::new("mock");
        let id = create(&service, "team-a");
        member(&service, id, "laptop", MembershipAction::Connect);

        let resp = send(&service, Request::delete(format!("/room/{}", id)));
        assert_eq!(resp.status, 409);
        assert_eq!(error_code(&resp), codes::ROOM_NOT_EMPTY);

        member(&service, id, "laptop", MembershipAction::Disconnect);
        assert_eq!(send(&service, Request::delete(format!("/room/{}", id))).status, 204);

        let resp = send(&service, Request::get(format!("/room/{}", id)));
        assert_eq!(resp.status, 404);
        assert_eq!(error_code(&resp), codes::ROOM_NOT_FOUND);
    }

    #[test]
    fn test_content_status_then_body() {
        let service = MemoryService::new("mock");
        let id = create(&service, "team-a");

        let resp = send(&service, Request::get(format!("/room/{}/status", id)));
        assert_eq!(error_code(&resp), codes::CONTENT_NOT_FOUND);

        let body = Request::new(Method::Put, format!("/room/{}/content", id))
            .with_body("text/plain", b"hi".to_vec());
        let resp = send(&service, body.clone());
        assert_eq!(resp.status, 409);
        assert_eq!(error_code(&resp), codes::CONTENT_MISMATCH);

        let status = ContentStatus {
            device: "laptop".to_string(),
            timestamp: 1,
            kind: ContentKind::Clipboard,
            name: String::new(),
            mime: "text/plain".to_string(),
            hash: "x".to_string(),
        };
        let req = Request::json(Method::Put, format!("/room/{}/status", id), &status).unwrap();
        assert_eq!(send(&service, req).status, 204);
        // Same key as the rejected upload: re-evaluated now the status exists.
        assert_eq!(send(&service, body).status, 204);

        let resp = send(&service, Request::get(format!("/room/{}/content", id)));
        assert_eq!(resp.body, b"hi");
        assert_eq!(resp.content_type.as_deref(), Some("text/plain"));

        assert_eq!(send(&service, Request::delete(format!("/room/{}/status", id))).status, 204);
        assert_eq!(send(&service, Request::delete(format!("/room/{}/status", id))).status, 404);
    }

    #[test]
    fn test_replayed_mutation_returns_first_reply() {
        let service = MemoryService::new("mock");
        let req = Request::json(
            Method::Post,
            "/room",
            &CreateRoomRequest {
                name: "once".to_string(),
            },
        )
        .unwrap();
        let first = send(&service, req.clone());
        let second = send(&service, req);
        assert_eq!(first, second);
        assert_eq!(service.room_count(), 1);
        assert_eq!(service.idempotency_keys(), 1);
    }

    #[test]
    fn test_failed_mutations_are_not_replayed() {
        let service = MemoryService::new("mock");
        let req = Request::json(
            Method::Post,
            "/room",
            &CreateRoomRequest {
                name: " ".to_string(),
            },
        )
        .unwrap();
        assert_eq!(send(&service, req).status, 400);
        assert_eq!(service.idempotency_keys(), 0);

        for _ in 0..3 {
            send(&service, Request::delete("/room/42"));
        }
        assert_eq!(service.idempotency_keys(), 0);
    }

    #[test]
    fn test_replay_cache_is_bounded() {
        let service = MemoryService::new("mock");
        let first = Request::json(
            Method::Post,
            "/room",
            &CreateRoomRequest {
                name: "first".to_string(),
            },
        )
        .unwrap();
        send(&service, first.clone());
        for i in 0..MAX_REPLIES {
            create(&service, &format!("room-{}", i));
        }
        assert_eq!(service.idempotency_keys(), MAX_REPLIES);

        // The oldest key was evicted, so resending it creates another room.
        let rooms = service.room_count();
        send(&service, first);
        assert_eq!(service.room_count(), rooms + 1);
    }

    #[test]
    fn test_disconnect_unknown_device_leaves_no_record() {
        let service = MemoryService::new("mock");
        let id = create(&service, "team-a");
        for _ in 0..3 {
            let resp = member(&service, id, "ghost", MembershipAction::Disconnect);
            assert_eq!(error_code(&resp), codes::DEVICE_NOT_CONNECTED);
        }
        member(&service, id, "laptop", MembershipAction::Connect);
        member(&service, id, "laptop", MembershipAction::Disconnect);
        assert!(service.lock().rooms[&id].members.is_empty());
    }

    #[test]
    fn test_bad_paths() {
        let service = MemoryService::new("mock");
        assert_eq!(send(&service, Request::get("/room/0")).status, 400);
        assert_eq!(send(&service, Request::get("/room/abc")).status, 400);
        assert_eq!(send(&service, Request::get("/nowhere")).status, 404);
    }

    #[test]
    fn test_outage_fails_transport_sends() {
        let service = MemoryService::new("mock");
        let transport = service.transport("mock");
        service.inject_outage(1);
        let err = transport.send(Request::get("/health"), None).unwrap_err();
        assert_eq!(err.code(), codes::CONNECTION_FAILED);
        assert!(transport.send(Request::get("/health"), None).is_ok());
        assert_eq!(service.health_checks(), 1);
    }
}
