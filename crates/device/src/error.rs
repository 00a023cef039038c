//! Harness error taxonomy
//!
//! Hard failures are `HarnessError`. Teardown problems are `TeardownWarning`,
//! a plain value that is logged and reported but never propagated.

use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::config::ConfigError;
use crate::session::SessionState;
use crate::wire::WireError;
use locator::{Locator, LocatorError};

pub type Result<T> = std::result::Result<T, HarnessError>;

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("Cannot reach automation server at {endpoint}: {source}")]
    Connection {
        endpoint: String,
        #[source]
        source: WireError,
    },

    #[error("Failed to launch {package}: {reason}")]
    Launch { package: String, reason: String },

    #[error("Element {locator} not found within {waited:?}")]
    ElementNotFound { locator: Locator, waited: Duration },

    #[error("Element {locator} not interactable within {waited:?}")]
    ElementNotInteractable { locator: Locator, waited: Duration },

    #[error("Collection {locator} stayed at {last_count} elements (needed more than {above}) for {waited:?}")]
    CollectionTimeout {
        locator: Locator,
        above: usize,
        last_count: usize,
        waited: Duration,
    },

    #[error("Invalid locator: {0}")]
    InvalidLocator(#[from] LocatorError),

    #[error("Session is {0}, actions need an active session")]
    SessionNotActive(SessionState),

    #[error("Invalid deep link: {0}")]
    InvalidDeepLink(String),

    #[error("Deep link {uri} resolved to no known screen")]
    DeepLinkUnresolved { uri: String },

    #[error("Transport error: {0}")]
    Transport(#[from] WireError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl HarnessError {
    /// Stable taxonomy name used in scenario reports
    pub fn kind(&self) -> &'static str {
        match self {
            HarnessError::Connection { .. } => "ConnectionError",
            HarnessError::Launch { .. } => "LaunchError",
            HarnessError::ElementNotFound { .. } => "ElementNotFound",
            HarnessError::ElementNotInteractable { .. } => "ElementNotInteractable",
            HarnessError::CollectionTimeout { .. } => "CollectionTimeout",
            HarnessError::InvalidLocator(_) => "InvalidLocatorError",
            HarnessError::SessionNotActive(_) => "SessionNotActive",
            HarnessError::InvalidDeepLink(_) => "InvalidDeepLink",
            HarnessError::DeepLinkUnresolved { .. } => "DeepLinkUnresolved",
            HarnessError::Transport(_) => "TransportError",
            HarnessError::Config(_) => "ConfigError",
        }
    }
}

/// Which teardown step failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeardownStage {
    TerminateApp,
    ReleaseConnection,
}

/// Non-fatal teardown failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeardownWarning {
    pub stage: TeardownStage,
    pub message: String,
}

impl fmt::Display for TeardownWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stage = match self.stage {
            TeardownStage::TerminateApp => "terminate app",
            TeardownStage::ReleaseConnection => "release connection",
        };
        write!(f, "TeardownWarning ({}): {}", stage, self.message)
    }
}
