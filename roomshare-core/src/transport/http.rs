use std::thread;
use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use tokio::runtime::{Handle, Runtime};
use tracing::debug;

use super::{Method, Request, Response, Transport, IDEMPOTENCY_KEY_HEADER};
use crate::config::ClientConfig;
use crate::error::{codes, ClientError};

/// HTTP transport. Owns a single-threaded tokio runtime so the session can
/// stay synchronous, plus a pooled `reqwest` client.
///
/// Calls made on a thread that already belongs to a tokio runtime are driven
/// from a short-lived helper thread, since tokio refuses to nest `block_on`.
/// The caller still blocks, so async code should prefer
/// `tokio::task::spawn_blocking`.
#[derive(Debug)]
pub struct HttpTransport {
    /// Only `None` while dropping.
    runtime: Option<Runtime>,
    client: reqwest::Client,
    config: ClientConfig,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| {
                ClientError::initialization(
                    codes::API_CLIENT_INITIALIZATION_FAILED,
                    format!("failed to start I/O runtime: {}", e),
                )
            })?;
        let client = reqwest::Client::builder().build().map_err(|e| {
            ClientError::initialization(
                codes::API_CLIENT_INITIALIZATION_FAILED,
                format!("failed to build HTTP client: {}", e),
            )
        })?;

        Ok(Self {
            runtime: Some(runtime),
            client,
            config: config.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        self.config.endpoint_url(path)
    }
}

impl Transport for HttpTransport {
    fn init(&self) -> Result<(), ClientError> {
        let url = self.url("/health");
        reqwest::Url::parse(&url).map(|_| ()).map_err(|e| {
            ClientError::initialization(
                codes::INVALID_CREDENTIALS,
                format!("cannot build service url '{}': {}", url, e),
            )
        })
    }

    fn send(&self, request: Request, timeout: Option<Duration>) -> Result<Response, ClientError> {
        let Some(runtime) = &self.runtime else {
            return Err(ClientError::transport(
                codes::CONNECTION_FAILED,
                "HTTP transport is shutting down",
            ));
        };
        let url = self.url(&request.path);
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        };

        let mut builder = self
            .client
            .request(method, &url)
            .bearer_auth(&self.config.token);
        if let Some(content_type) = &request.content_type {
            builder = builder.header(CONTENT_TYPE, content_type);
        }
        if let Some(key) = &request.idempotency_key {
            builder = builder.header(IDEMPOTENCY_KEY_HEADER, key);
        }
        if !request.body.is_empty() {
            builder = builder.body(request.body);
        }
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        let exchange = async move {
            let response = builder.send().await.map_err(map_reqwest_error)?;
            let status = response.status().as_u16();
            let content_type = response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let body = response.bytes().await.map_err(map_reqwest_error)?;
            Ok::<_, ClientError>(Response {
                status,
                content_type,
                body: body.to_vec(),
            })
        };

        let response = if in_async_context() {
            thread::scope(|scope| scope.spawn(|| runtime.block_on(exchange)).join()).map_err(
                |_| ClientError::transport(codes::CONNECTION_FAILED, "request thread panicked"),
            )?
        } else {
            runtime.block_on(exchange)
        }?;

        debug!(
            method = %request.method,
            path = %request.path,
            status = response.status,
            "room service request"
        );
        Ok(response)
    }
}

impl Drop for HttpTransport {
    fn drop(&mut self) {
        // A blocking shutdown panics inside another runtime.
        if let Some(runtime) = self.runtime.take() {
            if in_async_context() {
                runtime.shutdown_background();
            }
        }
    }
}

fn in_async_context() -> bool {
    Handle::try_current().is_ok()
}

fn map_reqwest_error(e: reqwest::Error) -> ClientError {
    if e.is_timeout() {
        ClientError::transport(codes::TIMEOUT, format!("request timed out: {}", e))
    } else if e.is_connect() {
        ClientError::transport(
            codes::CONNECTION_FAILED,
            format!("failed to connect to room service: {}", e),
        )
    } else {
        ClientError::transport(
            codes::CONNECTION_FAILED,
            format!("room service request failed: {}", e),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_url_joins_origin_and_base() {
        let config = ClientConfig::new("t", "http://localhost:3000", "/api/v1");
        let transport = HttpTransport::new(&config).unwrap();
        assert_eq!(transport.url("/room/5/status"), "http://localhost:3000/api/v1/room/5/status");
        assert!(transport.init().is_ok());
    }

    #[test]
    fn test_unreachable_service_is_connection_failure() {
        // Port 9 (discard) is closed on test hosts.
        let config = ClientConfig::new("t", "http://127.0.0.1:9", "");
        let transport = HttpTransport::new(&config).unwrap();
        let err = transport
            .send(Request::get("/health"), Some(Duration::from_secs(5)))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transport);
        assert!(err.code() == codes::CONNECTION_FAILED || err.code() == codes::TIMEOUT);
    }

    #[tokio::test]
    async fn test_new_send_and_drop_inside_async_runtime() {
        let config = ClientConfig::new("t", "http://127.0.0.1:9", "");
        let transport = HttpTransport::new(&config).unwrap();
        let err = transport
            .send(Request::get("/health"), Some(Duration::from_secs(5)))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transport);
        drop(transport);
    }

    #[test]
    fn test_transport_moved_into_async_runtime() {
        let config = ClientConfig::new("t", "http://127.0.0.1:9", "");
        let transport = HttpTransport::new(&config).unwrap();

        let outer = tokio::runtime::Runtime::new().unwrap();
        outer.block_on(async move {
            let err = transport
                .send(Request::get("/health"), Some(Duration::from_secs(5)))
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Transport);
            drop(transport);
        });
    }
}
