//! Session configuration.

use std::time::Duration;

use crate::error::{codes, ClientError};
use crate::retry::RetryPolicy;

/// Default per-request deadline.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// Default interval between service health checks.
pub const DEFAULT_HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(1800);

/// Credentials and tuning for a [`ClientSession`](crate::ClientSession).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub token: String,
    /// Scheme and authority, e.g. `http://localhost:3000`.
    pub origin: String,
    /// Path prefix for every endpoint, e.g. `/api/v1`. May be empty.
    pub base_url: String,
    pub request_timeout: Option<Duration>,
    pub health_check_interval: Duration,
    pub query_retry: RetryPolicy,
}

impl ClientConfig {
    pub fn new(
        token: impl Into<String>,
        origin: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            token: token.into(),
            origin: origin.into(),
            base_url: base_url.into(),
            request_timeout: Some(DEFAULT_REQUEST_TIMEOUT),
            health_check_interval: DEFAULT_HEALTH_CHECK_INTERVAL,
            query_retry: RetryPolicy::default(),
        }
    }

    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_health_check_interval(mut self, interval: Duration) -> Self {
        self.health_check_interval = interval;
        self
    }

    pub fn with_query_retry(mut self, policy: RetryPolicy) -> Self {
        self.query_retry = policy;
        self
    }

    /// Checks the credentials are usable. Failures are initialization errors.
    pub fn validate(&self) -> Result<(), ClientError> {
        if self.token.trim().is_empty() {
            return Err(invalid_credentials("token must not be empty"));
        }

        let origin = reqwest::Url::parse(&self.origin).map_err(|e| {
            invalid_credentials(format!("origin '{}' is not a URL: {}", self.origin, e))
        })?;
        if !matches!(origin.scheme(), "http" | "https") || !origin.has_host() {
            return Err(invalid_credentials(format!(
                "origin '{}' must be an absolute http(s) URL",
                self.origin
            )));
        }

        if !self.base_url.is_empty() && !self.base_url.starts_with('/') {
            return Err(invalid_credentials(format!(
                "base url '{}' must be empty or start with '/'",
                self.base_url
            )));
        }

        Ok(())
    }

    /// Full URL for an endpoint path such as `/room/3`.
    pub fn endpoint_url(&self, path: &str) -> String {
        format!(
            "{}{}{}",
            self.origin.trim_end_matches('/'),
            self.base_url.trim_end_matches('/'),
            path
        )
    }
}

fn invalid_credentials(reason: impl Into<String>) -> ClientError {
    ClientError::initialization(codes::INVALID_CREDENTIALS, reason)
}
