//! Scenario Orchestrator
//!
//! Runs one named check inside one session and classifies how it went.
//! The classification is a value the test runner can assert on, not a log line.

use async_trait::async_trait;
use futures_util::FutureExt;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::time::{Duration, Instant};

use crate::config::SessionConfig;
use crate::error::{Result, TeardownWarning};
use crate::events::SessionEvent;
use crate::interaction::Interactions;
use crate::session::SessionManager;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Classification {
    /// Every hard check held
    Pass,
    /// Hard checks held, an optional branch was unavailable
    DegradedPass,
    /// A precondition made the scenario inapplicable
    EnvironmentSkip,
    /// A hard check failed
    Fail,
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Classification::Pass => "Pass",
            Classification::DegradedPass => "DegradedPass",
            Classification::EnvironmentSkip => "EnvironmentSkip",
            Classification::Fail => "Fail",
        };
        f.write_str(name)
    }
}

/// How a scenario body ended, when it did not fail
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Completed,
    Skipped(String),
}

/// Per-run state handed to a scenario
pub struct ScenarioContext<'s> {
    ui: Interactions<'s>,
    notes: Vec<String>,
}

impl<'s> ScenarioContext<'s> {
    pub fn new(ui: Interactions<'s>) -> Self {
        Self {
            ui,
            notes: Vec::new(),
        }
    }

    pub fn ui(&self) -> &Interactions<'s> {
        &self.ui
    }

    /// Record that an optional branch was unavailable
    pub fn degrade(&mut self, reason: impl Into<String>) {
        let reason = reason.into();
        tracing::warn!(session = %self.ui.session().id(), %reason, "optional branch unavailable");
        self.notes.push(reason);
    }

    /// The scenario does not apply on this device
    pub fn skip(&self, reason: impl Into<String>) -> Verdict {
        let reason = reason.into();
        tracing::info!(session = %self.ui.session().id(), %reason, "scenario skipped");
        Verdict::Skipped(reason)
    }

    pub fn notes(&self) -> &[String] {
        &self.notes
    }
}

/// A named end-to-end check
#[async_trait]
pub trait Scenario: Send + Sync {
    fn name(&self) -> &str;

    async fn run(&self, ctx: &mut ScenarioContext<'_>) -> Result<Verdict>;
}

#[derive(Debug, Clone)]
pub struct ScenarioReport {
    pub name: String,
    pub classification: Classification,
    pub reason: String,
    /// Optional branches that were skipped
    pub notes: Vec<String>,
    pub teardown_warnings: Vec<TeardownWarning>,
    pub duration: Duration,
}

/// Deterministic mapping from a scenario's result to its classification
pub fn classify(result: &Result<Verdict>, notes: &[String]) -> (Classification, String) {
    match result {
        Err(err) => (Classification::Fail, format!("{}: {}", err.kind(), err)),
        Ok(Verdict::Skipped(reason)) => (Classification::EnvironmentSkip, reason.clone()),
        Ok(Verdict::Completed) if !notes.is_empty() => {
            (Classification::DegradedPass, notes.join("; "))
        }
        Ok(Verdict::Completed) => (Classification::Pass, "all checks held".to_string()),
    }
}

/// Brackets each scenario with its own session
pub struct Orchestrator {
    manager: SessionManager,
}

impl Orchestrator {
    pub fn new(manager: SessionManager) -> Self {
        Self { manager }
    }

    pub fn manager(&self) -> &SessionManager {
        &self.manager
    }

    /// Open a session, run the scenario, close the session, classify
    pub async fn run(&self, config: SessionConfig, scenario: &dyn Scenario) -> ScenarioReport {
        let started = Instant::now();
        let name = scenario.name().to_string();
        tracing::info!(scenario = %name, session = %config.id, "scenario started");

        let mut session = match self.manager.open(config).await {
            Ok(session) => session,
            Err(err) => {
                let (classification, reason) = classify(&Err(err), &[]);
                return self.finish(name, classification, reason, Vec::new(), Vec::new(), started);
            }
        };

        let (result, notes) = match session.interact() {
            Ok(ui) => {
                let mut ctx = ScenarioContext::new(ui);
                let result = AssertUnwindSafe(scenario.run(&mut ctx)).catch_unwind().await;
                (result, ctx.notes)
            }
            Err(err) => (Ok(Err(err)), Vec::new()),
        };

        let teardown_warnings = session.close().await;

        let (classification, reason) = match result {
            Ok(result) => classify(&result, &notes),
            Err(panic) => (Classification::Fail, format!("panic: {}", panic_message(&*panic))),
        };

        self.finish(name, classification, reason, notes, teardown_warnings, started)
    }

    fn finish(
        &self,
        name: String,
        classification: Classification,
        reason: String,
        notes: Vec<String>,
        teardown_warnings: Vec<TeardownWarning>,
        started: Instant,
    ) -> ScenarioReport {
        match classification {
            Classification::Fail => tracing::error!(scenario = %name, %reason, "scenario failed"),
            _ => tracing::info!(scenario = %name, %classification, %reason, "scenario finished"),
        }

        self.manager.events().publish(SessionEvent::ScenarioFinished {
            name: name.clone(),
            classification,
            reason: reason.clone(),
        });

        ScenarioReport {
            name,
            classification,
            reason,
            notes,
            teardown_warnings,
            duration: started.elapsed(),
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
