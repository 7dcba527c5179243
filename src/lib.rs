//! `api-engine-http` is an async HTTP request engine for JSON APIs.
//!
//! A [`RequestEngine`] owns a base address and default headers, and runs
//! every call through the same pipeline:
//! - a per-call timeout covering the whole call, retries included
//! - retry with exponential backoff on transport failures
//! - an optional TTL cache for `GET` calls, see [`RequestEngine::get`]
//!
//! All failures surface as [`ApiError`], classified by its `status` field.

mod cache;
mod engine;
mod error;
mod options;
mod transport;
mod types;

pub use cache::{cache_key, CacheEntry};
pub use engine::RequestEngine;
pub use error::{ApiError, ErrorKind};
pub use options::{EngineOptions, RequestConfig};
pub use transport::{
    ReqwestTransport, Transport, TransportError, TransportRequest, TransportResponse,
};
pub use types::{ApiResponse, Headers, Method};

pub type Result<T> = std::result::Result<T, ApiError>;
