//! Uniform error shape for the client. Every failure a caller can observe is
//! normalized into [`Error`] before it leaves this crate; token decode
//! failures never surface here, they read as an absent or expired token.

use serde_json::Value;
use thiserror::Error;

/// Maximum number of error body characters surfaced to callers.
const MAX_ERROR_CHARS: usize = 200;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("unsupported role: {0}")]
    InvalidRole(String),
    #[error("request failed ({status}): {message}")]
    Http {
        status: u16,
        message: String,
        code: Option<String>,
        details: Option<Value>,
    },
    #[error("request timed out")]
    Timeout,
    #[error("unable to reach the server: {0}")]
    Network(String),
    #[error("failed to encode request: {0}")]
    Encode(String),
    #[error("failed to decode response: {0}")]
    Decode(String),
}

impl Error {
    /// HTTP status carried by this error, if any.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }

    #[must_use]
    pub fn is_client_error(&self) -> bool {
        self.status().is_some_and(|status| (400..500).contains(&status))
    }

    #[must_use]
    pub fn is_server_error(&self) -> bool {
        self.status().is_some_and(|status| status >= 500)
    }

    pub(crate) fn unauthorized(message: impl Into<String>) -> Self {
        Self::Http {
            status: 401,
            message: message.into(),
            code: None,
            details: None,
        }
    }

    /// Builds an HTTP error from a status and raw response body. Bodies that
    /// parse as the API's JSON error envelope contribute `message`, `code`
    /// and `details`; anything else is trimmed and truncated verbatim.
    pub(crate) fn from_status(status: u16, body: &str) -> Self {
        if let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(body) {
            if let Some(message) = envelope.message.or(envelope.error) {
                return Self::Http {
                    status,
                    message,
                    code: envelope.code,
                    details: envelope.details,
                };
            }
        }

        Self::Http {
            status,
            message: sanitize_body(body),
            code: None,
            details: None,
        }
    }

    pub(crate) fn from_reqwest(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Network(err.to_string())
        }
    }
}

/// Error envelope shape returned by the API for non-2xx responses.
#[derive(serde::Deserialize)]
struct ErrorEnvelope {
    message: Option<String>,
    error: Option<String>,
    code: Option<String>,
    details: Option<Value>,
}

fn sanitize_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        "Request failed.".to_string()
    } else {
        trimmed.chars().take(MAX_ERROR_CHARS).collect()
    }
}
