//! Wire Client - The Core Communication Layer
//!
//! Design decisions:
//! 1. `Transport` is the only seam between the harness and the network
//! 2. Responses are unwrapped to their `value` member before anyone sees them
//! 3. Server-reported errors keep their W3C error code for classification
//! 4. Fail fast - no retries here. Waiting and retrying is the wait engine's job.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;
use url::Url;

use super::protocol::{codes, ErrorBody, Method};

#[derive(Error, Debug)]
pub enum WireError {
    #[error("Automation server unreachable: {0}")]
    Unreachable(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Server error: {code} - {message}")]
    Protocol { code: String, message: String },

    #[error("Request timeout")]
    Timeout,

    #[error("Invalid request path: {0}")]
    InvalidPath(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl WireError {
    pub fn protocol(code: impl Into<String>, message: impl Into<String>) -> Self {
        WireError::Protocol {
            code: code.into(),
            message: message.into(),
        }
    }

    /// W3C error code, when the server reported one
    pub fn code(&self) -> Option<&str> {
        match self {
            WireError::Protocol { code, .. } => Some(code),
            _ => None,
        }
    }

    pub fn is_no_such_element(&self) -> bool {
        self.code() == Some(codes::NO_SUCH_ELEMENT)
    }

    pub fn is_stale_element(&self) -> bool {
        self.code() == Some(codes::STALE_ELEMENT)
    }

    pub fn is_not_interactable(&self) -> bool {
        self.code() == Some(codes::NOT_INTERACTABLE)
    }

    /// Network-level failure: the request never got a server answer
    pub fn is_unreachable(&self) -> bool {
        matches!(self, WireError::Unreachable(_) | WireError::Timeout)
    }
}

/// Result type for wire operations
pub type Result<T> = std::result::Result<T, WireError>;

/// Sends one wire command and returns the unwrapped `value`
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value>;
}

/// reqwest-backed transport for a real automation server
pub struct HttpTransport {
    base: Url,
    http: reqwest::Client,
}

impl HttpTransport {
    pub fn new(endpoint: &Url, request_timeout: Duration) -> Result<Self> {
        // Url::join replaces the last path segment unless the base ends in '/'
        let mut base = endpoint.clone();
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()?;

        Ok(Self { base, http })
    }

    pub fn endpoint(&self) -> &Url {
        &self.base
    }

    fn url(&self, path: &str) -> Result<Url> {
        self.base
            .join(path.trim_start_matches('/'))
            .map_err(|e| WireError::InvalidPath(format!("{}: {}", path, e)))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value> {
        let url = self.url(path)?;
        tracing::trace!(method = method.as_str(), %url, "wire request");

        let request = match method {
            Method::Get => self.http.get(url),
            Method::Post => self.http.post(url).json(&body.unwrap_or_else(|| json!({}))),
            Method::Delete => self.http.delete(url),
        };

        let response = request.send().await.map_err(classify_send_error)?;
        let status = response.status().as_u16();
        let text = response.text().await.map_err(classify_send_error)?;

        decode_response(status, &text)
    }
}

fn classify_send_error(err: reqwest::Error) -> WireError {
    if err.is_timeout() {
        WireError::Timeout
    } else if err.is_connect() {
        WireError::Unreachable(err.to_string())
    } else {
        WireError::Http(err)
    }
}

/// Unwrap a server response body into its `value`, or the error it carries
pub fn decode_response(status: u16, body: &str) -> Result<Value> {
    let success = (200..300).contains(&status);
    if body.trim().is_empty() {
        return if success {
            Ok(Value::Null)
        } else {
            Err(WireError::protocol(format!("http {}", status), ""))
        };
    }

    let parsed: Value = match serde_json::from_str(body) {
        Ok(parsed) => parsed,
        Err(_) if !success => {
            return Err(WireError::protocol(
                format!("http {}", status),
                locator::utils::cap_text_length(body, 200),
            ))
        }
        Err(e) => return Err(WireError::Json(e)),
    };

    let value = match parsed {
        Value::Object(mut map) => map.remove("value").unwrap_or(Value::Null),
        other => other,
    };

    if value.get("error").map_or(false, Value::is_string) {
        let error: ErrorBody = serde_json::from_value(value)?;
        return Err(WireError::Protocol {
            code: error.error,
            message: error.message,
        });
    }

    if !success {
        return Err(WireError::protocol(format!("http {}", status), value.to_string()));
    }

    Ok(value)
}
