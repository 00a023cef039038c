//! Remote Session - Represents one automation session on the server
//!
//! Design: Lightweight wrapper around a `Transport` with the session id baked in.
//! This is the connection handle the Session Manager owns.

use serde_json::{json, Value};
use std::sync::Arc;

use super::client::{Result, Transport, WireError};
use super::protocol::{ElementId, ElementRef, Method, NewSessionResult, SessionId};
use locator::Locator;

/// Automation session bound to one device
#[derive(Clone)]
pub struct RemoteSession {
    transport: Arc<dyn Transport>,

    /// Session ID assigned by the server
    pub session_id: SessionId,
}

impl RemoteSession {
    /// Negotiate capabilities and create the session
    pub async fn create(transport: Arc<dyn Transport>, capabilities: Value) -> Result<Self> {
        let result = transport
            .send(
                Method::Post,
                "/session",
                Some(json!({
                    "capabilities": {
                        "alwaysMatch": capabilities,
                        "firstMatch": [{}],
                    }
                })),
            )
            .await?;

        let created: NewSessionResult = serde_json::from_value(result)?;

        Ok(Self {
            transport,
            session_id: created.session_id,
        })
    }

    /// Send command within this session's context
    pub async fn send(&self, method: Method, command: &str, body: Option<Value>) -> Result<Value> {
        let path = format!("/session/{}/{}", self.session_id, command);
        self.transport.send(method, &path, body).await
    }

    pub async fn find_element(&self, locator: &Locator) -> Result<ElementId> {
        let value = self
            .send(Method::Post, "element", Some(serde_json::to_value(locator)?))
            .await?;
        let element: ElementRef = serde_json::from_value(value)?;
        Ok(element.id)
    }

    /// Find all matches; an empty list is not an error
    pub async fn find_elements(&self, locator: &Locator) -> Result<Vec<ElementId>> {
        let value = self
            .send(Method::Post, "elements", Some(serde_json::to_value(locator)?))
            .await?;
        let elements: Vec<ElementRef> = serde_json::from_value(value)?;
        Ok(elements.into_iter().map(|e| e.id).collect())
    }

    pub async fn click(&self, element: &ElementId) -> Result<()> {
        self.send(Method::Post, &format!("element/{}/click", element), None)
            .await?;
        Ok(())
    }

    pub async fn text(&self, element: &ElementId) -> Result<String> {
        let value = self
            .send(Method::Get, &format!("element/{}/text", element), None)
            .await?;
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| WireError::InvalidResponse(format!("text is not a string: {}", value)))
    }

    pub async fn is_displayed(&self, element: &ElementId) -> Result<bool> {
        self.flag(element, "displayed").await
    }

    pub async fn is_enabled(&self, element: &ElementId) -> Result<bool> {
        self.flag(element, "enabled").await
    }

    async fn flag(&self, element: &ElementId, name: &str) -> Result<bool> {
        let value = self
            .send(Method::Get, &format!("element/{}/{}", element, name), None)
            .await?;
        value
            .as_bool()
            .ok_or_else(|| WireError::InvalidResponse(format!("{} is not a bool: {}", name, value)))
    }

    /// Bring the app to the foreground, launching it if needed
    pub async fn activate_app(&self, package: &str) -> Result<()> {
        self.send(
            Method::Post,
            "appium/device/activate_app",
            Some(json!({ "appId": package })),
        )
        .await?;
        Ok(())
    }

    pub async fn terminate_app(&self, package: &str) -> Result<()> {
        self.send(
            Method::Post,
            "appium/device/terminate_app",
            Some(json!({ "appId": package })),
        )
        .await?;
        Ok(())
    }

    /// Run a script or `mobile:` extension command
    pub async fn execute(&self, script: &str, args: Vec<Value>) -> Result<Value> {
        self.send(
            Method::Post,
            "execute/sync",
            Some(json!({ "script": script, "args": args })),
        )
        .await
    }

    /// Ask the platform to route a URI to the given package
    pub async fn deep_link(&self, uri: &str, package: &str) -> Result<()> {
        self.execute(
            "mobile: deepLink",
            vec![json!({ "url": uri, "package": package })],
        )
        .await?;
        Ok(())
    }

    /// Release the session on the server
    pub async fn delete(&self) -> Result<()> {
        self.transport
            .send(Method::Delete, &format!("/session/{}", self.session_id), None)
            .await?;
        Ok(())
    }
}
