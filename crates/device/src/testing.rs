//! In-memory device for tests
//!
//! `FakeDevice` implements `Transport` and answers the wire calls the harness
//! makes the way an Appium server would, against a scripted screen. Elements
//! can appear late, be hidden or disabled, or only show up after a deep link.

use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::wire::client::Result;
use crate::wire::protocol::{codes, ELEMENT_KEY};
use crate::wire::{Method, Transport, WireError};
use locator::Locator;

/// (using, value) as sent in a find-element body
type ElementKey = (String, String);

fn key_of(locator: &Locator) -> ElementKey {
    (
        locator.strategy().as_wire().to_string(),
        locator.value().to_string(),
    )
}

/// Scripted UI element
#[derive(Debug, Clone)]
pub struct FakeElement {
    text: String,
    displayed: bool,
    enabled: bool,
    count: usize,
    appears_after: Duration,
    present: bool,
}

impl FakeElement {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            displayed: true,
            enabled: true,
            count: 1,
            appears_after: Duration::ZERO,
            present: true,
        }
    }

    pub fn displayed(mut self, displayed: bool) -> Self {
        self.displayed = displayed;
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Number of matches for find-elements
    pub fn count(mut self, count: usize) -> Self {
        self.count = count;
        self
    }

    /// Not findable until this long after registration
    pub fn appears_after(mut self, delay: Duration) -> Self {
        self.appears_after = delay;
        self
    }

    /// Not findable until revealed by a deep link
    pub fn hidden_until_deep_link(mut self) -> Self {
        self.present = false;
        self
    }
}

struct Entry {
    element: FakeElement,
    since: Instant,
}

impl Entry {
    fn is_present(&self) -> bool {
        self.element.present && self.since.elapsed() >= self.element.appears_after
    }
}

/// Scripted automation server
pub struct FakeDevice {
    reachable: AtomicBool,
    refuse_sessions: AtomicBool,
    fail_activate: AtomicBool,
    hang_activate: AtomicBool,
    fail_terminate: AtomicBool,
    reject_deep_links: AtomicBool,
    find_latency_ms: AtomicU64,
    next_id: AtomicU64,
    elements: DashMap<ElementKey, Entry>,
    handles: DashMap<String, ElementKey>,
    clicks: DashMap<ElementKey, usize>,
    deep_link_reveals: DashMap<String, Vec<ElementKey>>,
    sessions: DashSet<String>,
    calls: Mutex<Vec<String>>,
}

impl FakeDevice {
    pub fn new() -> Self {
        Self {
            reachable: AtomicBool::new(true),
            refuse_sessions: AtomicBool::new(false),
            fail_activate: AtomicBool::new(false),
            hang_activate: AtomicBool::new(false),
            fail_terminate: AtomicBool::new(false),
            reject_deep_links: AtomicBool::new(false),
            find_latency_ms: AtomicU64::new(0),
            next_id: AtomicU64::new(1),
            elements: DashMap::new(),
            handles: DashMap::new(),
            clicks: DashMap::new(),
            deep_link_reveals: DashMap::new(),
            sessions: DashSet::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Put an element on screen
    pub fn add(&self, locator: &Locator, element: FakeElement) {
        self.elements.insert(
            key_of(locator),
            Entry {
                element,
                since: Instant::now(),
            },
        );
    }

    pub fn remove(&self, locator: &Locator) {
        self.elements.remove(&key_of(locator));
    }

    /// A deep link to `uri` makes these elements present
    pub fn on_deep_link(&self, uri: &str, reveals: &[&Locator]) {
        self.deep_link_reveals
            .insert(uri.to_string(), reveals.iter().map(|l| key_of(l)).collect());
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    pub fn refuse_sessions(&self, refuse: bool) {
        self.refuse_sessions.store(refuse, Ordering::SeqCst);
    }

    pub fn fail_activate(&self, fail: bool) {
        self.fail_activate.store(fail, Ordering::SeqCst);
    }

    /// Activation never answers
    pub fn hang_activate(&self, hang: bool) {
        self.hang_activate.store(hang, Ordering::SeqCst);
    }

    pub fn fail_terminate(&self, fail: bool) {
        self.fail_terminate.store(fail, Ordering::SeqCst);
    }

    /// The platform refuses to route deep links
    pub fn reject_deep_links(&self, reject: bool) {
        self.reject_deep_links.store(reject, Ordering::SeqCst);
    }

    /// Element lookups answer only after `delay`
    pub fn find_latency(&self, delay: Duration) {
        self.find_latency_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    /// Sessions created and not yet deleted
    pub fn live_sessions(&self) -> usize {
        self.sessions.len()
    }

    pub fn clicks(&self, locator: &Locator) -> usize {
        self.clicks.get(&key_of(locator)).map_or(0, |c| *c)
    }

    /// Every call received, as "METHOD path"
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn record(&self, method: Method, path: &str) {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(format!("{} {}", method.as_str(), path));
    }

    fn next(&self, prefix: &str) -> String {
        format!("{}-{}", prefix, self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    fn new_session(&self, body: Option<Value>) -> Result<Value> {
        if self.refuse_sessions.load(Ordering::SeqCst) {
            return Err(WireError::protocol(
                codes::SESSION_NOT_CREATED,
                "Could not find a connected Android device",
            ));
        }
        let session_id = self.next("fake");
        self.sessions.insert(session_id.clone());
        let capabilities = body
            .and_then(|b| b.pointer("/capabilities/alwaysMatch").cloned())
            .unwrap_or(Value::Null);
        Ok(json!({ "sessionId": session_id, "capabilities": capabilities }))
    }

    async fn session_command(
        &self,
        method: Method,
        session_id: &str,
        command: &[&str],
        body: Option<Value>,
    ) -> Result<Value> {
        if !self.sessions.contains(session_id) {
            return Err(WireError::protocol(codes::INVALID_SESSION, session_id));
        }

        if matches!(command, ["element"] | ["elements"]) {
            let latency = self.find_latency_ms.load(Ordering::SeqCst);
            if latency > 0 {
                tokio::time::sleep(Duration::from_millis(latency)).await;
            }
        }

        match (method, command) {
            (Method::Delete, []) => {
                self.sessions.remove(session_id);
                Ok(Value::Null)
            }
            (Method::Post, ["element"]) => {
                let key = self.present_key(body)?;
                Ok(self.handle_for(key))
            }
            (Method::Post, ["elements"]) => {
                let key = parse_key(body)?;
                let count = self
                    .elements
                    .get(&key)
                    .filter(|entry| entry.is_present())
                    .map_or(0, |entry| entry.element.count);
                Ok(Value::Array(
                    (0..count).map(|_| self.handle_for(key.clone())).collect(),
                ))
            }
            (Method::Post, ["element", handle, "click"]) => {
                let (key, element) = self.resolve_handle(handle)?;
                if !element.displayed || !element.enabled {
                    return Err(WireError::protocol(codes::NOT_INTERACTABLE, handle.to_string()));
                }
                *self.clicks.entry(key).or_insert(0) += 1;
                Ok(Value::Null)
            }
            (Method::Get, ["element", handle, "text"]) => {
                Ok(json!(self.resolve_handle(handle)?.1.text))
            }
            (Method::Get, ["element", handle, "displayed"]) => {
                Ok(json!(self.resolve_handle(handle)?.1.displayed))
            }
            (Method::Get, ["element", handle, "enabled"]) => {
                Ok(json!(self.resolve_handle(handle)?.1.enabled))
            }
            (Method::Post, ["appium", "device", "activate_app"]) => {
                if self.hang_activate.load(Ordering::SeqCst) {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                }
                if self.fail_activate.load(Ordering::SeqCst) {
                    return Err(WireError::protocol(
                        "unknown error",
                        "Activity used to start app doesn't exist",
                    ));
                }
                Ok(Value::Null)
            }
            (Method::Post, ["appium", "device", "terminate_app"]) => {
                if self.fail_terminate.load(Ordering::SeqCst) {
                    return Err(WireError::protocol("unknown error", "app is not running"));
                }
                Ok(json!(true))
            }
            (Method::Post, ["execute", "sync"]) => self.execute(body),
            _ => Err(WireError::protocol(
                "unknown command",
                format!("{} {}", method.as_str(), command.join("/")),
            )),
        }
    }

    fn execute(&self, body: Option<Value>) -> Result<Value> {
        let body = body.unwrap_or(Value::Null);
        if body["script"] != "mobile: deepLink" {
            return Err(WireError::protocol("unsupported operation", body["script"].to_string()));
        }
        if self.reject_deep_links.load(Ordering::SeqCst) {
            return Err(WireError::protocol(
                "unknown error",
                "No activity found to handle the intent",
            ));
        }

        let uri = body["args"][0]["url"].as_str().unwrap_or_default();
        if let Some(reveals) = self.deep_link_reveals.get(uri) {
            for key in reveals.iter() {
                if let Some(mut entry) = self.elements.get_mut(key) {
                    entry.element.present = true;
                    entry.since = Instant::now();
                    entry.element.appears_after = Duration::ZERO;
                }
            }
        }
        Ok(Value::Null)
    }

    fn present_key(&self, body: Option<Value>) -> Result<ElementKey> {
        let key = parse_key(body)?;
        match self.elements.get(&key) {
            Some(entry) if entry.is_present() => Ok(key),
            _ => Err(WireError::protocol(codes::NO_SUCH_ELEMENT, key.1)),
        }
    }

    fn handle_for(&self, key: ElementKey) -> Value {
        let handle = self.next("el");
        self.handles.insert(handle.clone(), key);
        json!({ ELEMENT_KEY: handle })
    }

    fn resolve_handle(&self, handle: &str) -> Result<(ElementKey, FakeElement)> {
        let stale = || WireError::protocol(codes::STALE_ELEMENT, handle.to_string());
        let key = self.handles.get(handle).map(|k| k.value().clone()).ok_or_else(stale)?;
        let entry = self.elements.get(&key).ok_or_else(stale)?;
        if !entry.is_present() {
            return Err(stale());
        }
        let element = entry.element.clone();
        drop(entry);
        Ok((key, element))
    }
}

impl Default for FakeDevice {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_key(body: Option<Value>) -> Result<ElementKey> {
    let body = body.unwrap_or(Value::Null);
    match (body["using"].as_str(), body["value"].as_str()) {
        (Some(using), Some(value)) => Ok((using.to_string(), value.to_string())),
        _ => Err(WireError::protocol(codes::INVALID_SELECTOR, body.to_string())),
    }
}

#[async_trait]
impl Transport for FakeDevice {
    async fn send(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value> {
        if !self.reachable.load(Ordering::SeqCst) {
            return Err(WireError::Unreachable("connection refused".to_string()));
        }
        self.record(method, path);

        let segments: Vec<&str> = path.trim_matches('/').split('/').collect();
        match segments.as_slice() {
            ["session"] if method == Method::Post => self.new_session(body),
            ["session", session_id, command @ ..] => {
                self.session_command(method, session_id, command, body).await
            }
            _ => Err(WireError::protocol("unknown command", path.to_string())),
        }
    }
}
