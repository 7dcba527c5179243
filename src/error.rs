/// Error type returned by this crate.
///
/// Every failure has the same shape and is told apart by `status`:
/// `408` for a timeout, `0` for a transport or unknown failure, anything
/// else is the status code a reachable server answered with.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
#[error("{message}")]
pub struct ApiError {
    /// Human readable failure description.
    pub message: String,
    /// Classification status, see the type docs.
    pub status: u16,
    /// Parsed error body returned by the server, if any.
    pub response: Option<serde_json::Value>,
}

/// Coarse classification of an [`ApiError`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    /// The call did not settle before its timeout.
    Timeout,
    /// The round trip could not be completed, retries included.
    Transport,
    /// The server answered with a non-success status.
    Server,
}

impl ApiError {
    pub const TIMEOUT_STATUS: u16 = 408;
    pub const TRANSPORT_STATUS: u16 = 0;

    pub fn new(message: impl Into<String>, status: u16) -> Self {
        Self {
            message: message.into(),
            status,
            response: None,
        }
    }

    pub fn timeout() -> Self {
        Self::new("Request timeout", Self::TIMEOUT_STATUS)
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(message, Self::TRANSPORT_STATUS)
    }

    pub(crate) fn server(status: u16, status_text: &str, body: serde_json::Value) -> Self {
        let message = if status_text.is_empty() {
            format!("HTTP {status}")
        } else {
            format!("HTTP {status}: {status_text}")
        };
        Self {
            message,
            status,
            response: Some(body),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self.status {
            Self::TIMEOUT_STATUS => ErrorKind::Timeout,
            Self::TRANSPORT_STATUS => ErrorKind::Transport,
            _ => ErrorKind::Server,
        }
    }

    pub fn is_timeout(&self) -> bool {
        self.kind() == ErrorKind::Timeout
    }

    pub fn is_transport(&self) -> bool {
        self.kind() == ErrorKind::Transport
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        Self::transport(err.to_string())
    }
}
