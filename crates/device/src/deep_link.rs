//! Deep-link dispatch
//!
//! A deep link is one request to the server, not a polled wait. What comes
//! after it is polled: something must be on screen, and it must be one of
//! the screens the app is allowed to land on.

use url::Url;

use crate::error::{HarnessError, Result};
use crate::events::SessionEvent;
use crate::interaction::{probe_visible, Interactions};
use crate::scenario::Verdict;
use crate::wait::{wait_until, PendingReason, PolicyKind, Probe, WaitOutcome};
use locator::{any_element, Locator};

/// Fixed scheme/host prefix plus owning package
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeepLink {
    prefix: String,
    package: String,
}

impl DeepLink {
    pub fn new(prefix: impl Into<String>, package: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            package: package.into(),
        }
    }

    pub fn package(&self) -> &str {
        &self.package
    }

    /// Prefix + target id, checked to be a well-formed URI
    pub fn uri(&self, target: &str) -> Result<Url> {
        if target.is_empty() || target.chars().any(char::is_whitespace) {
            return Err(HarnessError::InvalidDeepLink(format!(
                "bad target id {:?}",
                target
            )));
        }
        let raw = format!("{}{}", self.prefix, target);
        Url::parse(&raw).map_err(|e| HarnessError::InvalidDeepLink(format!("{}: {}", raw, e)))
    }
}

/// Screens a deep link may legitimately land on
#[derive(Debug, Clone)]
pub struct LandingIndicators {
    pub error: Locator,
    pub home: Locator,
    pub dismiss: Locator,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Landing {
    Error,
    Home,
    Dismiss,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeepLinkOutcome {
    /// The app handled the link and landed on a known screen
    Accepted(Landing),
    /// The platform declined to route the link
    Rejected(String),
    /// Nothing recognisable showed up
    Ambiguous,
}

impl DeepLinkOutcome {
    /// Rejection is an environment issue, ambiguity is a defect
    pub fn into_verdict(self, uri: &Url) -> Result<Verdict> {
        match self {
            DeepLinkOutcome::Accepted(_) => Ok(Verdict::Completed),
            DeepLinkOutcome::Rejected(reason) => Ok(Verdict::Skipped(format!(
                "platform declined deep link {}: {}",
                uri, reason
            ))),
            DeepLinkOutcome::Ambiguous => Err(HarnessError::DeepLinkUnresolved {
                uri: uri.to_string(),
            }),
        }
    }
}

impl<'s> Interactions<'s> {
    /// Send `uri` to the app owning `link` and classify where it landed
    pub async fn dispatch_deep_link(
        &self,
        uri: &Url,
        link: &DeepLink,
        landing: &LandingIndicators,
    ) -> DeepLinkOutcome {
        let session = self.session();
        let remote = self.remote();
        tracing::info!(session = %session.id(), %uri, package = link.package(), "dispatching deep link");

        if let Err(err) = remote.deep_link(uri.as_str(), link.package()).await {
            tracing::info!(session = %session.id(), %uri, error = %err, "deep link rejected");
            return DeepLinkOutcome::Rejected(err.to_string());
        }
        session.events().publish(SessionEvent::DeepLinkDispatched {
            session_id: session.id().to_string(),
            uri: uri.to_string(),
        });

        let policy = self.policy(PolicyKind::Default);

        // Something visible on screen before looking for specific screens
        let any = &any_element();
        match wait_until(policy, || async move { probe_visible(remote, any).await }).await {
            WaitOutcome::Success(_) => {}
            WaitOutcome::Timeout { .. } => return DeepLinkOutcome::Ambiguous,
            WaitOutcome::Aborted(err) => return DeepLinkOutcome::Rejected(err.to_string()),
        }

        let outcome = wait_until(policy, || async move {
            for (which, locator) in [
                (Landing::Error, &landing.error),
                (Landing::Home, &landing.home),
                (Landing::Dismiss, &landing.dismiss),
            ] {
                match present(self, locator).await {
                    Probe::Ready(()) => return Probe::Ready(which),
                    Probe::Abort(err) => return Probe::Abort(err),
                    Probe::Pending(_) => {}
                }
            }
            Probe::Pending(PendingReason::NotFound)
        })
        .await;

        match outcome {
            WaitOutcome::Success(which) => {
                tracing::info!(session = %session.id(), %uri, ?which, "deep link handled");
                DeepLinkOutcome::Accepted(which)
            }
            WaitOutcome::Timeout { .. } => {
                tracing::warn!(session = %session.id(), %uri, "deep link landed nowhere recognisable");
                DeepLinkOutcome::Ambiguous
            }
            WaitOutcome::Aborted(err) => DeepLinkOutcome::Rejected(err.to_string()),
        }
    }
}

async fn present(ui: &Interactions<'_>, locator: &Locator) -> Probe<()> {
    match ui.remote().find_element(locator).await {
        Ok(_) => Probe::Ready(()),
        Err(err) if err.is_no_such_element() || err.is_stale_element() => {
            Probe::Pending(PendingReason::NotFound)
        }
        Err(err) => Probe::Abort(err),
    }
}
