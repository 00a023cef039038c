//! Event Bus - Session lifecycle events
//!
//! Each `SessionManager` owns one bus and hands a clone to every session it
//! opens. Subscribers see what happened to *their* sessions only; there is no
//! process-wide state.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::scenario::Classification;

/// Lifecycle events published by sessions and the orchestrator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SessionEvent {
    Opened { session_id: String, remote_id: String },
    AppActivated { session_id: String, package: String },
    AppTerminated { session_id: String, package: String },
    TeardownWarning { session_id: String, message: String },
    Closed { session_id: String },
    DeepLinkDispatched { session_id: String, uri: String },
    ScenarioFinished {
        name: String,
        classification: Classification,
        reason: String,
    },
}

/// Simple event bus using tokio broadcast channel
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<SessionEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(256);
        Self { tx }
    }

    /// Publish an event
    pub fn publish(&self, event: SessionEvent) {
        let _ = self.tx.send(event); // Ignore error if no subscribers
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
