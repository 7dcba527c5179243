use std::{fmt, sync::Arc, time::Duration};

use serde::{de::DeserializeOwned, Serialize};
use tokio::time::{sleep, timeout};

use crate::{
    cache::{cache_key, ResponseCache},
    types::{insert_header, merge_headers},
    ApiError, ApiResponse, EngineOptions, Headers, Method, RequestConfig, ReqwestTransport,
    Result, Transport, TransportError, TransportRequest, TransportResponse,
};

/// Request engine for a JSON API rooted at one base address.
///
/// Clones share the transport and the response cache.
#[derive(Clone)]
pub struct RequestEngine<C = ReqwestTransport> {
    transport: C,
    base_url: String,
    default_headers: Headers,
    options: EngineOptions,
    cache: Arc<ResponseCache>,
}

impl<C> fmt::Debug for RequestEngine<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let headers: Headers = self
            .default_headers
            .iter()
            .map(|(name, value)| {
                let value = if name == "authorization" {
                    "<redacted>".to_owned()
                } else {
                    value.clone()
                };
                (name.clone(), value)
            })
            .collect();

        f.debug_struct("RequestEngine")
            .field("base_url", &self.base_url)
            .field("default_headers", &headers)
            .field("options", &self.options)
            .field("cached_entries", &self.cache.len())
            .finish()
    }
}

impl RequestEngine {
    /// Creates an engine using the `reqwest` transport and no extra headers.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_transport(base_url, Headers::new(), ReqwestTransport::default())
    }

    /// Creates an engine using the `reqwest` transport and default headers.
    ///
    /// Default headers are sent with every call unless the call supplies a
    /// header with the same (case-insensitive) name.
    pub fn with_headers<I, K, V>(base_url: impl Into<String>, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        Self::with_transport(base_url, headers, ReqwestTransport::default())
    }

    /// Creates an engine from environment variables.
    ///
    /// Reads:
    /// - `API_BASE_URL` — base address every endpoint is appended to (required)
    /// - `API_TIMEOUT_MS` — default call timeout in milliseconds
    /// - `API_RETRIES` — default number of retries on transport failure
    /// - `API_RETRY_DELAY_MS` — default delay before the first retry
    ///
    /// # Example
    ///
    /// ```no_run
    /// use api_engine_http::RequestEngine;
    ///
    /// let api = RequestEngine::from_env().expect("missing API_BASE_URL");
    /// ```
    pub fn from_env() -> std::result::Result<Self, String> {
        let base_url = std::env::var("API_BASE_URL")
            .map_err(|_| "missing API_BASE_URL environment variable".to_owned())?;
        if base_url.trim().is_empty() {
            return Err("API_BASE_URL is set but empty".to_owned());
        }

        let defaults = EngineOptions::default();
        let options = EngineOptions {
            timeout_ms: env_number("API_TIMEOUT_MS")?.unwrap_or(defaults.timeout_ms),
            retries: env_number("API_RETRIES")?.unwrap_or(defaults.retries),
            retry_delay_ms: env_number("API_RETRY_DELAY_MS")?.unwrap_or(defaults.retry_delay_ms),
        };

        Ok(Self::new(base_url.trim()).with_options(options))
    }
}

impl<C: Transport> RequestEngine<C> {
    /// Creates an engine on top of a caller supplied [`Transport`].
    ///
    /// A single trailing slash on `base_url` is dropped.
    pub fn with_transport<I, K, V>(base_url: impl Into<String>, headers: I, transport: C) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut base_url = base_url.into();
        if base_url.ends_with('/') {
            base_url.pop();
        }

        let mut default_headers = Headers::new();
        insert_header(&mut default_headers, "content-type", "application/json");
        for (name, value) in headers {
            insert_header(&mut default_headers, name.as_ref(), value);
        }

        Self {
            transport,
            base_url,
            default_headers,
            options: EngineOptions::default(),
            cache: Arc::default(),
        }
    }

    /// Applies engine-wide timeout and retry defaults.
    pub fn with_options(mut self, options: EngineOptions) -> Self {
        self.options = options;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Performs a `GET` call.
    ///
    /// With `cache_ttl` set to a non-zero duration, a live cached payload for
    /// the same endpoint is returned without touching the network; otherwise
    /// a successful response is cached for `cache_ttl`. `None` or a zero
    /// duration bypasses the cache entirely.
    pub async fn get<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        config: impl Into<RequestConfig>,
        cache_ttl: Option<Duration>,
    ) -> Result<T> {
        let config = config.into().with_method(Method::Get);
        let ttl = match cache_ttl {
            Some(ttl) if !ttl.is_zero() => ttl,
            _ => return Ok(self.send(endpoint, config).await?.data),
        };

        let body = config.body.as_ref().map(|body| body.to_string());
        let key = cache_key(Method::Get, endpoint, body.as_deref());
        if let Some(data) = self.cache.get(&key) {
            #[cfg(feature = "tracing")]
            tracing::debug!(key = %key, "serving cached response");
            return Ok(serde_json::from_value(data)?);
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(key = %key, "cache miss");

        let response = self.send::<serde_json::Value>(endpoint, config).await?;
        let data = T::deserialize(&response.data)?;
        #[cfg(feature = "tracing")]
        tracing::debug!(key = %key, ttl_ms = ttl.as_millis() as u64, "caching response");
        self.cache.insert(key, response.data, ttl);
        Ok(data)
    }

    /// Performs a `POST` call with a JSON body.
    pub async fn post<T, B>(
        &self,
        endpoint: &str,
        body: &B,
        config: impl Into<RequestConfig>,
    ) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.send_with_body(Method::Post, endpoint, body, config.into())
            .await
    }

    /// Performs a `PUT` call with a JSON body.
    pub async fn put<T, B>(
        &self,
        endpoint: &str,
        body: &B,
        config: impl Into<RequestConfig>,
    ) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.send_with_body(Method::Put, endpoint, body, config.into())
            .await
    }

    /// Performs a `PATCH` call; `body` usually carries a subset of fields.
    pub async fn patch<T, B>(
        &self,
        endpoint: &str,
        body: &B,
        config: impl Into<RequestConfig>,
    ) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.send_with_body(Method::Patch, endpoint, body, config.into())
            .await
    }

    /// Performs a `DELETE` call.
    pub async fn delete<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        config: impl Into<RequestConfig>,
    ) -> Result<T> {
        let config = config.into().with_method(Method::Delete);
        Ok(self.send(endpoint, config).await?.data)
    }

    /// Runs one call end to end and returns the full response.
    ///
    /// The timeout covers the whole call, retry delays included. A call that
    /// times out is aborted and is not retried.
    pub async fn send<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        config: RequestConfig,
    ) -> Result<ApiResponse<T>> {
        let limit = config.effective_timeout(&self.options);
        match timeout(limit, self.execute(endpoint, &config)).await {
            Ok(result) => result,
            Err(_elapsed) => {
                #[cfg(feature = "tracing")]
                tracing::debug!(
                    method = %config.method,
                    endpoint,
                    timeout_ms = limit.as_millis() as u64,
                    "request timed out"
                );
                Err(ApiError::timeout())
            }
        }
    }

    /// Empties the response cache.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Number of cached entries, expired ones not yet evicted included.
    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    async fn send_with_body<T, B>(
        &self,
        method: Method,
        endpoint: &str,
        body: &B,
        config: RequestConfig,
    ) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let config = config.with_method(method).with_body(body)?;
        Ok(self.send(endpoint, config).await?.data)
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        config: &RequestConfig,
    ) -> Result<ApiResponse<T>> {
        let request = TransportRequest {
            method: config.method,
            url: format!("{}{endpoint}", self.base_url),
            headers: merge_headers(&self.default_headers, &config.headers),
            body: config.encoded_body()?,
        };

        let response = self
            .send_with_retry(
                &request,
                config.effective_retries(&self.options),
                config.effective_retry_delay(&self.options),
            )
            .await
            .map_err(|err| ApiError::transport(err.to_string()))?;

        let body = parse_body(&response.body);
        if !response.is_success() {
            #[cfg(feature = "tracing")]
            tracing::debug!(
                method = %request.method,
                url = %request.url,
                status = response.status,
                "server returned error status"
            );
            return Err(ApiError::server(
                response.status,
                &response.status_text,
                body,
            ));
        }

        let TransportResponse {
            status,
            status_text,
            headers,
            ..
        } = response;

        Ok(ApiResponse {
            data: serde_json::from_value(body)?,
            status,
            status_text,
            headers,
        })
    }

    /// Retries transport failures that happened before the server answered;
    /// any response from the server is final.
    async fn send_with_retry(
        &self,
        request: &TransportRequest,
        mut retries: u32,
        mut delay: Duration,
    ) -> std::result::Result<TransportResponse, TransportError> {
        loop {
            match self.transport.send(request.clone()).await {
                Ok(response) => return Ok(response),
                Err(err) if retries > 0 && err.is_retryable() => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(
                        error = %err,
                        retries_left = retries,
                        delay_ms = delay.as_millis() as u64,
                        "transport failure, retrying"
                    );
                    drop(err);

                    sleep(delay).await;
                    retries -= 1;
                    delay = delay.saturating_mul(2);
                }
                Err(err) => return Err(err),
            }
        }
    }
}

fn parse_body(body: &[u8]) -> serde_json::Value {
    if body.iter().all(u8::is_ascii_whitespace) {
        return serde_json::Value::Null;
    }
    serde_json::from_slice(body)
        .unwrap_or_else(|_| serde_json::Value::String(String::from_utf8_lossy(body).into_owned()))
}

fn env_number<N: std::str::FromStr>(name: &str) -> std::result::Result<Option<N>, String> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| format!("{name} must be a non-negative integer, got '{value}'")),
        _ => Ok(None),
    }
}
