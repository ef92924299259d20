//! Request transports.
//!
//! A [`Transport`] moves one [`Request`] to the room service and brings back
//! the raw [`Response`]. Status interpretation happens above this layer.
//!
//! - [`HttpTransport`] talks to a remote service over HTTP.
//! - [`MemoryTransport`] talks to an in-process [`MemoryService`].

mod http;
mod memory;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{codes, ClientError};

pub use http::HttpTransport;
pub use memory::{MemoryService, MemoryTransport};

/// Header carrying the per-mutation deduplication key.
pub const IDEMPOTENCY_KEY_HEADER: &str = "Idempotency-Key";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }

    pub fn is_mutation(&self) -> bool {
        !matches!(self, Method::Get)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "DELETE" => Ok(Method::Delete),
            other => Err(ClientError::validation(
                codes::INVALID_REQUEST,
                format!("unsupported method {}", other),
            )),
        }
    }
}

/// One request to the room service. `path` is relative to the base url.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: Method,
    pub path: String,
    pub content_type: Option<String>,
    pub idempotency_key: Option<String>,
    pub body: Vec<u8>,
}

impl Request {
    /// Mutating requests get a fresh idempotency key.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        let idempotency_key = method
            .is_mutation()
            .then(|| uuid::Uuid::new_v4().to_string());
        Self {
            method,
            path: path.into(),
            content_type: None,
            idempotency_key,
            body: Vec::new(),
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::Delete, path)
    }

    /// A request with a JSON body.
    pub fn json<T: Serialize>(
        method: Method,
        path: impl Into<String>,
        body: &T,
    ) -> Result<Self, ClientError> {
        let body = serde_json::to_vec(body).map_err(|e| {
            ClientError::validation(
                codes::INVALID_REQUEST,
                format!("failed to encode request body: {}", e),
            )
        })?;
        Ok(Self::new(method, path).with_body("application/json", body))
    }

    pub fn with_body(mut self, content_type: impl Into<String>, body: Vec<u8>) -> Self {
        self.content_type = Some(content_type.into());
        self.body = body;
        self
    }
}

/// Raw service response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl Response {
    pub fn empty(status: u16) -> Self {
        Self {
            status,
            content_type: None,
            body: Vec::new(),
        }
    }

    pub fn bytes(status: u16, content_type: impl Into<String>, body: Vec<u8>) -> Self {
        Self {
            status,
            content_type: Some(content_type.into()),
            body,
        }
    }

    /// Serializes `body` as JSON. Serialization of the crate's wire types
    /// cannot fail; should it ever, the response degrades to a bare 500.
    pub fn json<T: Serialize>(status: u16, body: &T) -> Self {
        match serde_json::to_vec(body) {
            Ok(bytes) => Self::bytes(status, "application/json", bytes),
            Err(_) => Self::empty(500),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Decodes a JSON body.
    pub fn parse_json<T: DeserializeOwned>(&self) -> Result<T, ClientError> {
        serde_json::from_slice(&self.body).map_err(|e| {
            ClientError::transport(
                codes::JSON_PARSE_FAILED,
                format!("failed to parse service response: {}", e),
            )
        })
    }
}

/// Moves requests to the room service.
pub trait Transport: Send + Sync {
    /// Prepares the transport. Called once when a session is created.
    fn init(&self) -> Result<(), ClientError>;

    /// Sends one request, waiting at most `timeout` when one is given.
    fn send(&self, request: Request, timeout: Option<Duration>) -> Result<Response, ClientError>;
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn init(&self) -> Result<(), ClientError> {
        (**self).init()
    }

    fn send(&self, request: Request, timeout: Option<Duration>) -> Result<Response, ClientError> {
        (**self).send(request, timeout)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn init(&self) -> Result<(), ClientError> {
        (**self).init()
    }

    fn send(&self, request: Request, timeout: Option<Duration>) -> Result<Response, ClientError> {
        (**self).send(request, timeout)
    }
}
