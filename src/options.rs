use std::time::Duration;

use serde::Serialize;

use crate::{
    types::{insert_header, Headers},
    ApiError, Method, Result,
};

/// Engine-wide defaults for timeout and retry behavior.
///
/// Each field can be overridden per call through [`RequestConfig`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EngineOptions {
    /// Timeout in milliseconds for a whole call, retries included.
    pub timeout_ms: u64,
    /// Number of additional attempts after a transport failure.
    pub retries: u32,
    /// Delay in milliseconds before the first retry (doubled for each next one).
    pub retry_delay_ms: u64,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            retries: 0,
            retry_delay_ms: 1_000,
        }
    }
}

/// Per-call request settings.
///
/// The verb entry points of [`RequestEngine`](crate::RequestEngine) fix
/// `method` and `body`; only headers, timeout and retry settings are
/// meaningful overrides there.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RequestConfig {
    pub method: Method,
    pub headers: Headers,
    /// JSON payload; never sent with `GET`.
    pub body: Option<serde_json::Value>,
    pub timeout: Option<Duration>,
    pub retries: Option<u32>,
    pub retry_delay: Option<Duration>,
}

impl RequestConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        insert_header(&mut self.headers, name, value);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn retries(mut self, retries: u32) -> Self {
        self.retries = Some(retries);
        self
    }

    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = Some(delay);
        self
    }

    pub(crate) fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub(crate) fn with_body<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }

    /// Serialized body as sent on the wire; always `None` for `GET`.
    pub(crate) fn encoded_body(&self) -> Result<Option<String>> {
        match (&self.body, self.method) {
            (_, Method::Get) | (None, _) => Ok(None),
            (Some(body), _) => serde_json::to_string(body)
                .map(Some)
                .map_err(ApiError::from),
        }
    }

    pub(crate) fn effective_timeout(&self, options: &EngineOptions) -> Duration {
        self.timeout
            .unwrap_or(Duration::from_millis(options.timeout_ms))
    }

    pub(crate) fn effective_retries(&self, options: &EngineOptions) -> u32 {
        self.retries.unwrap_or(options.retries)
    }

    pub(crate) fn effective_retry_delay(&self, options: &EngineOptions) -> Duration {
        self.retry_delay
            .unwrap_or(Duration::from_millis(options.retry_delay_ms))
    }
}

impl From<()> for RequestConfig {
    fn from(_: ()) -> Self {
        Self::default()
    }
}
