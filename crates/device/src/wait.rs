//! Wait Policy Engine
//!
//! The only place timeout durations are consumed. Call sites pick a
//! `PolicyKind`; the table in `WaitPolicies` decides how long that is.

use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

use crate::config::WaitSettings;
use crate::wire::WireError;

/// Named wait presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PolicyKind {
    /// Short, for transient UI feedback
    Default,
    /// Long, for content gated behind network or ads
    Extended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl WaitPolicy {
    pub fn new(timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            timeout,
            poll_interval,
        }
    }

    /// Probe exactly once
    pub fn immediate() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }
}

/// Policy table, built from configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitPolicies {
    default: WaitPolicy,
    extended: WaitPolicy,
}

impl WaitPolicies {
    pub fn from_settings(settings: &WaitSettings) -> Self {
        let poll = Duration::from_millis(settings.poll_interval_ms);
        Self {
            default: WaitPolicy::new(Duration::from_millis(settings.default_timeout_ms), poll),
            extended: WaitPolicy::new(Duration::from_millis(settings.extended_timeout_ms), poll),
        }
    }

    pub fn get(&self, kind: PolicyKind) -> WaitPolicy {
        match kind {
            PolicyKind::Default => self.default,
            PolicyKind::Extended => self.extended,
        }
    }
}

impl Default for WaitPolicies {
    fn default() -> Self {
        Self::from_settings(&WaitSettings::default())
    }
}

/// Why a probe is not ready yet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingReason {
    NotFound,
    NotDisplayed,
    NotInteractable,
    /// Collection size seen on the last probe
    CountAtMost(usize),
}

/// Result of polling the condition once
#[derive(Debug)]
pub enum Probe<T> {
    Ready(T),
    Pending(PendingReason),
    /// Non-transient failure, stop waiting
    Abort(WireError),
}

#[derive(Debug)]
pub enum WaitOutcome<T> {
    Success(T),
    Timeout {
        waited: Duration,
        last: PendingReason,
    },
    Aborted(WireError),
}

impl<T> WaitOutcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, WaitOutcome::Success(_))
    }
}

/// Poll `probe` until it is ready or `policy.timeout` elapses
///
/// The probe always runs at least once, and once more at the deadline.
/// A probe still in flight at the deadline is dropped and the wait times out
/// with the last reason seen.
pub async fn wait_until<T, F, Fut>(policy: WaitPolicy, mut probe: F) -> WaitOutcome<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Probe<T>>,
{
    let started = Instant::now();
    let deadline = started + policy.timeout;
    let mut last = PendingReason::NotFound;

    loop {
        let probed = match tokio::time::timeout_at(deadline, probe()).await {
            Ok(probed) => probed,
            Err(_) => {
                let waited = started.elapsed();
                tracing::debug!(reason = ?last, ?waited, "wait timed out during probe");
                return WaitOutcome::Timeout { waited, last };
            }
        };

        match probed {
            Probe::Ready(value) => return WaitOutcome::Success(value),
            Probe::Abort(err) => {
                tracing::debug!(error = %err, "wait aborted");
                return WaitOutcome::Aborted(err);
            }
            Probe::Pending(reason) => {
                last = reason;
                let waited = started.elapsed();
                if waited >= policy.timeout {
                    tracing::debug!(?reason, ?waited, "wait timed out");
                    return WaitOutcome::Timeout {
                        waited,
                        last: reason,
                    };
                }
                let remaining = policy.timeout - waited;
                tokio::time::sleep(policy.poll_interval.min(remaining)).await;
            }
        }
    }
}
