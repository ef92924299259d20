//! Maps logical room operations onto transport requests.

use std::time::Duration;

use serde::de::DeserializeOwned;

use crate::error::{ClientError, ErrorKind};
use crate::protocol::{
    ContentStatus, CreateRoomRequest, CreateRoomResponse, ErrorBody, HealthResult,
    MembershipAction, MembershipRequest, RoomStatusResponse,
};
use crate::room::{RoomId, RoomStatus};
use crate::transport::{Method, Request, Response, Transport};

/// Longest slice of a non-JSON error body quoted in a reason.
const MAX_QUOTED_BODY: usize = 200;

pub(crate) struct ApiBridge {
    transport: Box<dyn Transport>,
}

impl ApiBridge {
    pub(crate) fn new(transport: Box<dyn Transport>) -> Self {
        Self { transport }
    }

    pub(crate) fn init(&self) -> Result<(), ClientError> {
        self.transport.init()
    }

    fn call(&self, request: Request, timeout: Option<Duration>) -> Result<Response, ClientError> {
        let response = self.transport.send(request, timeout)?;
        check_status(response)
    }

    fn call_json<T: DeserializeOwned>(
        &self,
        request: Request,
        timeout: Option<Duration>,
    ) -> Result<T, ClientError> {
        self.call(request, timeout)?.parse_json()
    }

    pub(crate) fn health(&self, timeout: Option<Duration>) -> Result<HealthResult, ClientError> {
        self.call_json(Request::get("/health"), timeout)
    }

    pub(crate) fn create_room(
        &self,
        name: &str,
        timeout: Option<Duration>,
    ) -> Result<RoomId, ClientError> {
        let request = Request::json(
            Method::Post,
            "/room",
            &CreateRoomRequest {
                name: name.to_string(),
            },
        )?;
        let created: CreateRoomResponse = self.call_json(request, timeout)?;
        RoomId::new(created.id)
            .ok_or_else(|| ClientError::invalid_response("service assigned room id 0"))
    }

    pub(crate) fn room_status(
        &self,
        id: RoomId,
        timeout: Option<Duration>,
    ) -> Result<RoomStatus, ClientError> {
        let body: RoomStatusResponse = self.call_json(Request::get(room_path(id, "")), timeout)?;
        let reported = RoomId::new(body.id).ok_or_else(|| {
            ClientError::invalid_response(format!("status for room {} reported id 0", id))
        })?;
        if reported != id {
            return Err(ClientError::invalid_response(format!(
                "asked for room {} but service answered for room {}",
                id, reported
            )));
        }
        Ok(RoomStatus {
            name: body.name,
            id,
            devices: body.devices,
        })
    }

    pub(crate) fn delete_room(
        &self,
        id: RoomId,
        timeout: Option<Duration>,
    ) -> Result<(), ClientError> {
        self.call(Request::delete(room_path(id, "")), timeout).map(|_| ())
    }

    pub(crate) fn membership(
        &self,
        id: RoomId,
        device: &str,
        action: MembershipAction,
        timeout: Option<Duration>,
    ) -> Result<(), ClientError> {
        let request = Request::json(
            Method::Post,
            room_path(id, ""),
            &MembershipRequest {
                name: device.to_string(),
                action,
            },
        )?;
        self.call(request, timeout).map(|_| ())
    }

    pub(crate) fn content_status(
        &self,
        id: RoomId,
        timeout: Option<Duration>,
    ) -> Result<ContentStatus, ClientError> {
        self.call_json(Request::get(room_path(id, "/status")), timeout)
    }

    pub(crate) fn content_body(
        &self,
        id: RoomId,
        timeout: Option<Duration>,
    ) -> Result<Vec<u8>, ClientError> {
        self.call(Request::get(room_path(id, "/content")), timeout)
            .map(|r| r.body)
    }

    pub(crate) fn put_content(
        &self,
        id: RoomId,
        status: &ContentStatus,
        body: Vec<u8>,
        timeout: Option<Duration>,
    ) -> Result<(), ClientError> {
        let request = Request::json(Method::Put, room_path(id, "/status"), status)?;
        self.call(request, timeout)?;

        let request = Request::new(Method::Put, room_path(id, "/content"))
            .with_body(status.mime.clone(), body);
        self.call(request, timeout).map(|_| ())
    }

    pub(crate) fn delete_content(
        &self,
        id: RoomId,
        timeout: Option<Duration>,
    ) -> Result<(), ClientError> {
        self.call(Request::delete(room_path(id, "/status")), timeout)?;
        self.call(Request::delete(room_path(id, "/content")), timeout).map(|_| ())
    }
}

fn room_path(id: RoomId, suffix: &str) -> String {
    format!("/room/{}{}", id, suffix)
}

/// Passes successful responses through and turns the rest into errors.
pub(crate) fn check_status(response: Response) -> Result<Response, ClientError> {
    if response.is_success() {
        return Ok(response);
    }

    let kind = ErrorKind::from_http_status(response.status);
    match serde_json::from_slice::<ErrorBody>(&response.body) {
        Ok(body) => Err(ClientError::new(kind, body.code, body.reason)),
        Err(_) => {
            let text = String::from_utf8_lossy(&response.body);
            let quoted: String = text.chars().take(MAX_QUOTED_BODY).collect();
            Err(ClientError::invalid_response(format!(
                "service returned status {}: {}",
                response.status,
                quoted.trim()
            )))
        }
    }
}
