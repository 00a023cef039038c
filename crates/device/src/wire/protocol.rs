//! Wire Protocol Types
//!
//! The minimal subset of W3C WebDriver plus Appium extensions the harness needs:
//! capability negotiation, element lookup, element actions, app lifecycle.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Session ID assigned by the automation server
pub type SessionId = String;

/// Opaque element reference assigned by the automation server
pub type ElementId = String;

/// W3C element reference key
pub const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

/// Error codes the interaction layer cares about
pub mod codes {
    pub const NO_SUCH_ELEMENT: &str = "no such element";
    pub const STALE_ELEMENT: &str = "stale element reference";
    pub const NOT_INTERACTABLE: &str = "element not interactable";
    pub const INVALID_SELECTOR: &str = "invalid selector";
    pub const SESSION_NOT_CREATED: &str = "session not created";
    pub const INVALID_SESSION: &str = "invalid session id";
}

/// HTTP verb of a wire command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Delete => "DELETE",
        }
    }
}

/// Element reference as returned by find-element
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ElementRef {
    #[serde(rename = "element-6066-11e4-a52e-4f735466cecf", alias = "ELEMENT")]
    pub id: ElementId,
}

/// Error body: `{"value": {"error": .., "message": ..}}`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub stacktrace: Option<String>,
}

/// Result of new-session
#[derive(Debug, Clone, Deserialize)]
pub struct NewSessionResult {
    #[serde(rename = "sessionId")]
    pub session_id: SessionId,
    #[serde(default)]
    pub capabilities: Value,
}
