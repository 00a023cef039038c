//! Device Session Management and Resilient Interactions
//!
//! Drives end-to-end checks against an installed mobile app through an
//! Appium-style automation server.
//!
//! # Layers
//!
//! 1. **Wire**: `Transport` + `RemoteSession`, one HTTP/JSON command at a time
//! 2. **Wait**: `wait_until` is the only code that knows about durations
//! 3. **Interaction**: hard primitives return `Err`, soft ones return `bool`
//! 4. **Session**: `open` → Active, `close` → Terminated, never fails
//! 5. **Scenario**: classifies a run as Pass / DegradedPass / EnvironmentSkip / Fail

pub mod config;
pub mod deep_link;
pub mod error;
pub mod events;
pub mod interaction;
pub mod scenario;
pub mod session;
pub mod testing;
pub mod wait;
pub mod wire;

pub use config::{ConfigError, SessionConfig, WaitSettings};
pub use deep_link::{DeepLink, DeepLinkOutcome, Landing, LandingIndicators};
pub use error::{HarnessError, Result, TeardownStage, TeardownWarning};
pub use events::{EventBus, SessionEvent};
pub use interaction::{InteractionOutcome, Interactions};
pub use scenario::{
    classify, Classification, Orchestrator, Scenario, ScenarioContext, ScenarioReport, Verdict,
};
pub use session::{DeviceSession, SessionManager, SessionState};
pub use wait::{wait_until, PolicyKind, WaitOutcome, WaitPolicies, WaitPolicy};
pub use wire::{HttpTransport, RemoteSession, Transport, WireError};
