//! Interaction Layer
//!
//! Every primitive declares up front whether a missing element is a defect
//! (hard: returns `Err`) or a branch condition (soft: returns `bool`/`Option`).
//!
//! | Primitive          | Not found               | Not interactable          |
//! |--------------------|-------------------------|---------------------------|
//! | `click`            | `ElementNotFound`       | `ElementNotInteractable`  |
//! | `click_soft`       | `false`                 | `false`                   |
//! | `is_visible`       | `false`                 | n/a                       |
//! | `read_text`        | `ElementNotFound`       | n/a                       |
//! | `wait_count_above` | `CollectionTimeout`     | n/a                       |
//!
//! Soft primitives go through `InteractionOutcome::soften`, the one place
//! where failures turn into booleans.

use std::future::Future;
use std::time::Duration;

use crate::error::{HarnessError, Result};
use crate::session::DeviceSession;
use crate::wait::{wait_until, PendingReason, PolicyKind, Probe, WaitOutcome, WaitPolicy};
use crate::wire::{ElementId, RemoteSession, WireError};
use locator::Locator;

/// What happened to one interaction attempt
#[derive(Debug)]
pub enum InteractionOutcome<T> {
    Success(T),
    NotFound,
    NotInteractable,
    TransportError(WireError),
}

impl<T> InteractionOutcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, InteractionOutcome::Success(_))
    }

    fn from_wait(outcome: WaitOutcome<T>) -> Self {
        match outcome {
            WaitOutcome::Success(value) => InteractionOutcome::Success(value),
            WaitOutcome::Timeout {
                last: PendingReason::NotInteractable,
                ..
            } => InteractionOutcome::NotInteractable,
            WaitOutcome::Timeout { .. } => InteractionOutcome::NotFound,
            WaitOutcome::Aborted(err) => InteractionOutcome::TransportError(err),
        }
    }

    fn from_probe(probe: Probe<T>) -> Self {
        match probe {
            Probe::Ready(value) => InteractionOutcome::Success(value),
            Probe::Pending(PendingReason::NotInteractable) => InteractionOutcome::NotInteractable,
            Probe::Pending(_) => InteractionOutcome::NotFound,
            Probe::Abort(err) => InteractionOutcome::TransportError(err),
        }
    }

    /// Absorb any failure into `None`
    pub fn soften(self, action: &str, locator: &Locator) -> Option<T> {
        match self {
            InteractionOutcome::Success(value) => Some(value),
            InteractionOutcome::NotFound => {
                tracing::debug!(%locator, action, "not found");
                None
            }
            InteractionOutcome::NotInteractable => {
                tracing::debug!(%locator, action, "not interactable");
                None
            }
            InteractionOutcome::TransportError(err) => {
                tracing::warn!(%locator, action, error = %err, "transport error treated as absent");
                None
            }
        }
    }

    /// Map failures to the declared hard error types
    pub fn harden(self, locator: &Locator, waited: Duration) -> Result<T> {
        match self {
            InteractionOutcome::Success(value) => Ok(value),
            InteractionOutcome::NotFound => Err(HarnessError::ElementNotFound {
                locator: locator.clone(),
                waited,
            }),
            InteractionOutcome::NotInteractable => Err(HarnessError::ElementNotInteractable {
                locator: locator.clone(),
                waited,
            }),
            InteractionOutcome::TransportError(err) => Err(HarnessError::Transport(err)),
        }
    }
}

/// Action primitives bound to an Active session
///
/// Holding one borrows the session, so it cannot be closed underneath.
pub struct Interactions<'s> {
    session: &'s DeviceSession,
    remote: &'s RemoteSession,
}

impl<'s> Interactions<'s> {
    pub fn new(session: &'s DeviceSession) -> Result<Self> {
        let remote = session.remote()?;
        Ok(Self { session, remote })
    }

    pub fn session(&self) -> &'s DeviceSession {
        self.session
    }

    pub(crate) fn remote(&self) -> &'s RemoteSession {
        self.remote
    }

    pub fn policy(&self, kind: PolicyKind) -> WaitPolicy {
        self.session.policies().get(kind)
    }

    /// Wait until interactable, then click. Fails hard.
    pub async fn click(&self, locator: &Locator, kind: PolicyKind) -> Result<()> {
        tracing::info!(session = %self.session.id(), %locator, "click");
        let policy = self.policy(kind);
        self.attempt_click(locator, policy)
            .await
            .harden(locator, policy.timeout)
    }

    /// Like `click`, but absence is reported as `false`
    pub async fn click_soft(&self, locator: &Locator, kind: PolicyKind) -> bool {
        tracing::info!(session = %self.session.id(), %locator, "click (optional)");
        let clicked = self
            .attempt_click(locator, self.policy(kind))
            .await
            .soften("click", locator)
            .is_some();
        if !clicked {
            tracing::warn!(session = %self.session.id(), %locator, "optional element unavailable, click skipped");
        }
        clicked
    }

    /// Single immediate probe: present and displayed
    pub async fn is_visible(&self, locator: &Locator) -> bool {
        let probe = self.probe_once(probe_visible(self.remote, locator)).await;
        InteractionOutcome::from_probe(probe)
            .soften("is_visible", locator)
            .is_some()
    }

    /// Single immediate probe: present at all
    pub async fn exists(&self, locator: &Locator) -> bool {
        let probe = self.probe_once(probe_present(self.remote, locator)).await;
        InteractionOutcome::from_probe(probe)
            .soften("exists", locator)
            .is_some()
    }

    /// Wait until displayed. Fails hard.
    pub async fn wait_visible(&self, locator: &Locator, kind: PolicyKind) -> Result<()> {
        let policy = self.policy(kind);
        let remote = self.remote;
        let outcome = wait_until(policy, || async move { probe_visible(remote, locator).await }).await;
        InteractionOutcome::from_wait(outcome)
            .harden(locator, policy.timeout)
            .map(|_| ())
    }

    /// Wait until displayed, then read its text. Fails hard.
    pub async fn read_text(&self, locator: &Locator, kind: PolicyKind) -> Result<String> {
        let policy = self.policy(kind);
        let remote = self.remote;
        let outcome = wait_until(policy, || async move {
            match probe_visible(remote, locator).await {
                Probe::Ready(element) => match remote.text(&element).await {
                    Ok(text) => Probe::Ready(text),
                    Err(err) => transient(err),
                },
                Probe::Pending(reason) => Probe::Pending(reason),
                Probe::Abort(err) => Probe::Abort(err),
            }
        })
        .await;

        let text = InteractionOutcome::from_wait(outcome).harden(locator, policy.timeout)?;
        tracing::debug!(
            session = %self.session.id(),
            %locator,
            text = %locator::utils::cap_text_length(&text, 80),
            "read text"
        );
        Ok(text)
    }

    /// Immediate text probe; `None` when absent or hidden
    pub async fn read_text_soft(&self, locator: &Locator) -> Option<String> {
        let remote = self.remote;
        let probe = self
            .probe_once(async move {
                match probe_visible(remote, locator).await {
                    Probe::Ready(element) => match remote.text(&element).await {
                        Ok(text) => Probe::Ready(text),
                        Err(err) => transient(err),
                    },
                    Probe::Pending(reason) => Probe::Pending(reason),
                    Probe::Abort(err) => Probe::Abort(err),
                }
            })
            .await;
        InteractionOutcome::from_probe(probe).soften("read_text", locator)
    }

    /// Wait until displayed with exactly `expected` as text. Fails hard.
    pub async fn wait_text(&self, locator: &Locator, expected: &str, kind: PolicyKind) -> Result<()> {
        tracing::info!(session = %self.session.id(), %locator, expected, "wait for text");
        let policy = self.policy(kind);
        let remote = self.remote;
        let outcome = wait_until(policy, || async move {
            match probe_visible(remote, locator).await {
                Probe::Ready(element) => match remote.text(&element).await {
                    Ok(text) if text == expected => Probe::Ready(()),
                    Ok(_) => Probe::Pending(PendingReason::NotFound),
                    Err(err) => transient(err),
                },
                Probe::Pending(reason) => Probe::Pending(reason),
                Probe::Abort(err) => Probe::Abort(err),
            }
        })
        .await;

        InteractionOutcome::from_wait(outcome).harden(locator, policy.timeout)
    }

    /// Wait until more than `above` elements match. Returns the count seen.
    pub async fn wait_count_above(
        &self,
        locator: &Locator,
        above: usize,
        kind: PolicyKind,
    ) -> Result<usize> {
        tracing::info!(session = %self.session.id(), %locator, above, "wait for collection");
        let policy = self.policy(kind);
        let remote = self.remote;
        let outcome = wait_until(policy, || async move {
            match remote.find_elements(locator).await {
                Ok(elements) if elements.len() > above => Probe::Ready(elements.len()),
                Ok(elements) => Probe::Pending(PendingReason::CountAtMost(elements.len())),
                Err(err) => transient(err),
            }
        })
        .await;

        match outcome {
            WaitOutcome::Success(count) => Ok(count),
            WaitOutcome::Timeout { last, .. } => Err(HarnessError::CollectionTimeout {
                locator: locator.clone(),
                above,
                last_count: match last {
                    PendingReason::CountAtMost(count) => count,
                    _ => 0,
                },
                waited: policy.timeout,
            }),
            WaitOutcome::Aborted(err) => Err(HarnessError::Transport(err)),
        }
    }

    /// Click the `index`-th element of a collection. Fails hard.
    pub async fn click_nth(&self, locator: &Locator, index: usize, kind: PolicyKind) -> Result<()> {
        tracing::info!(session = %self.session.id(), %locator, index, "click nth");
        let policy = self.policy(kind);
        let remote = self.remote;
        let outcome = wait_until(policy, || async move {
            let elements = match remote.find_elements(locator).await {
                Ok(elements) => elements,
                Err(err) => return transient(err),
            };
            match elements.get(index) {
                Some(element) => click_element(remote, element).await,
                None => Probe::Pending(PendingReason::NotFound),
            }
        })
        .await;

        InteractionOutcome::from_wait(outcome).harden(locator, policy.timeout)
    }

    /// One probe, cut off after the default policy timeout
    async fn probe_once<T>(&self, probe: impl Future<Output = Probe<T>>) -> Probe<T> {
        let budget = self.policy(PolicyKind::Default).timeout;
        tokio::time::timeout(budget, probe)
            .await
            .unwrap_or(Probe::Pending(PendingReason::NotFound))
    }

    async fn attempt_click(&self, locator: &Locator, policy: WaitPolicy) -> InteractionOutcome<()> {
        let remote = self.remote;
        let outcome = wait_until(policy, || async move {
            match probe_present(remote, locator).await {
                Probe::Ready(element) => click_element(remote, &element).await,
                Probe::Pending(reason) => Probe::Pending(reason),
                Probe::Abort(err) => Probe::Abort(err),
            }
        })
        .await;
        InteractionOutcome::from_wait(outcome)
    }
}

/// Conditions that may clear up by themselves keep the wait going
fn transient<T>(err: WireError) -> Probe<T> {
    if err.is_no_such_element() || err.is_stale_element() {
        Probe::Pending(PendingReason::NotFound)
    } else if err.is_not_interactable() {
        Probe::Pending(PendingReason::NotInteractable)
    } else {
        Probe::Abort(err)
    }
}

async fn probe_present(remote: &RemoteSession, locator: &Locator) -> Probe<ElementId> {
    match remote.find_element(locator).await {
        Ok(element) => Probe::Ready(element),
        Err(err) => transient(err),
    }
}

pub(crate) async fn probe_visible(remote: &RemoteSession, locator: &Locator) -> Probe<ElementId> {
    let element = match probe_present(remote, locator).await {
        Probe::Ready(element) => element,
        other => return other,
    };
    match remote.is_displayed(&element).await {
        Ok(true) => Probe::Ready(element),
        Ok(false) => Probe::Pending(PendingReason::NotDisplayed),
        Err(err) => transient(err),
    }
}

/// Hidden or disabled elements count as not interactable
async fn click_element(remote: &RemoteSession, element: &ElementId) -> Probe<()> {
    let ready = async {
        Ok::<bool, WireError>(remote.is_displayed(element).await? && remote.is_enabled(element).await?)
    };
    match ready.await {
        Ok(true) => {}
        Ok(false) => return Probe::Pending(PendingReason::NotInteractable),
        Err(err) => return transient(err),
    }
    match remote.click(element).await {
        Ok(()) => Probe::Ready(()),
        Err(err) => transient(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SessionConfig, WaitSettings};
    use crate::session::SessionManager;
    use crate::testing::{FakeDevice, FakeElement};
    use locator::{resolve, ElementDescription};
    use std::sync::Arc;

    fn config() -> SessionConfig {
        SessionConfig {
            device_name: Some("emulator-5554".to_string()),
            app_package: "com.vk.vkvideo".to_string(),
            app_activity: "com.vk.video.screens.main.MainActivity".to_string(),
            wait: WaitSettings {
                default_timeout_ms: 150,
                extended_timeout_ms: 600,
                poll_interval_ms: 10,
            },
            ..SessionConfig::default()
        }
    }

    fn id(name: &str) -> Locator {
        resolve(&ElementDescription::resource("com.vk.vkvideo", name)).unwrap()
    }

    async fn open(device: &Arc<FakeDevice>) -> DeviceSession {
        SessionManager::new(device.clone())
            .open(config())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_click_waits_for_element() {
        let device = Arc::new(FakeDevice::new());
        device.add(
            &id("search_button"),
            FakeElement::new("").appears_after(Duration::from_millis(50)),
        );
        let session = open(&device).await;
        let ui = session.interact().unwrap();

        tokio_test::assert_ok!(ui.click(&id("search_button"), PolicyKind::Default).await);
        assert_eq!(device.clicks(&id("search_button")), 1);
    }

    #[tokio::test]
    async fn test_click_absent_is_not_found() {
        let device = Arc::new(FakeDevice::new());
        let session = open(&device).await;
        let ui = session.interact().unwrap();

        let err = ui.click(&id("missing"), PolicyKind::Default).await.unwrap_err();
        assert_eq!(err.kind(), "ElementNotFound");
    }

    #[tokio::test]
    async fn test_click_disabled_is_not_interactable() {
        let device = Arc::new(FakeDevice::new());
        device.add(&id("play"), FakeElement::new("Play").enabled(false));
        let session = open(&device).await;
        let ui = session.interact().unwrap();

        let err = ui.click(&id("play"), PolicyKind::Default).await.unwrap_err();
        assert!(matches!(err, HarnessError::ElementNotInteractable { .. }));
        assert_eq!(device.clicks(&id("play")), 0);
    }

    #[tokio::test]
    async fn test_soft_primitives_never_fail() {
        let device = Arc::new(FakeDevice::new());
        device.add(&id("hidden"), FakeElement::new("x").displayed(false));
        let session = open(&device).await;
        let ui = session.interact().unwrap();

        assert!(!ui.click_soft(&id("missing"), PolicyKind::Default).await);
        assert!(!ui.click_soft(&id("hidden"), PolicyKind::Default).await);
        assert!(!ui.is_visible(&id("missing")).await);
        assert!(!ui.is_visible(&id("hidden")).await);
        assert!(ui.exists(&id("hidden")).await);
        assert_eq!(ui.read_text_soft(&id("missing")).await, None);

        // Transport failure is still a plain `false`
        device.set_reachable(false);
        assert!(!ui.click_soft(&id("hidden"), PolicyKind::Default).await);
        assert!(!ui.exists(&id("hidden")).await);
        device.set_reachable(true);
    }

    #[tokio::test]
    async fn test_hard_primitive_surfaces_transport_error() {
        let device = Arc::new(FakeDevice::new());
        let session = open(&device).await;
        let ui = session.interact().unwrap();

        device.set_reachable(false);
        let err = ui.read_text(&id("title"), PolicyKind::Default).await.unwrap_err();
        assert_eq!(err.kind(), "TransportError");
        device.set_reachable(true);
    }

    #[tokio::test]
    async fn test_read_text() {
        let device = Arc::new(FakeDevice::new());
        device.add(&id("title"), FakeElement::new("VK Video"));
        let session = open(&device).await;
        let ui = session.interact().unwrap();

        assert_eq!(
            ui.read_text(&id("title"), PolicyKind::Default).await.unwrap(),
            "VK Video"
        );
        assert_eq!(ui.read_text_soft(&id("title")).await.as_deref(), Some("VK Video"));
    }

    #[tokio::test]
    async fn test_extended_policy_outlasts_default() {
        let device = Arc::new(FakeDevice::new());
        let hints = resolve(&ElementDescription::text("4")).unwrap();
        device.add(
            &hints,
            FakeElement::new("4").appears_after(Duration::from_millis(300)),
        );
        let session = open(&device).await;
        let ui = session.interact().unwrap();

        assert!(ui.wait_text(&hints, "4", PolicyKind::Default).await.is_err());
        tokio_test::assert_ok!(ui.wait_text(&hints, "4", PolicyKind::Extended).await);
    }

    #[tokio::test]
    async fn test_wait_count_above() {
        let device = Arc::new(FakeDevice::new());
        device.add(&id("content"), FakeElement::new("clip").count(3));
        device.add(&id("single"), FakeElement::new("clip").count(1));
        let session = open(&device).await;
        let ui = session.interact().unwrap();

        assert_eq!(
            ui.wait_count_above(&id("content"), 1, PolicyKind::Default)
                .await
                .unwrap(),
            3
        );

        match ui.wait_count_above(&id("single"), 1, PolicyKind::Default).await {
            Err(HarnessError::CollectionTimeout {
                last_count, above, ..
            }) => {
                assert_eq!(last_count, 1);
                assert_eq!(above, 1);
            }
            other => panic!("Expected CollectionTimeout, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_click_nth() {
        let device = Arc::new(FakeDevice::new());
        device.add(&id("content"), FakeElement::new("clip").count(2));
        let session = open(&device).await;
        let ui = session.interact().unwrap();

        tokio_test::assert_ok!(ui.click_nth(&id("content"), 0, PolicyKind::Default).await);
        assert!(ui.click_nth(&id("content"), 5, PolicyKind::Default).await.is_err());
        assert_eq!(device.clicks(&id("content")), 1);
    }

    #[tokio::test]
    async fn test_read_text_absent_is_not_found() {
        let device = Arc::new(FakeDevice::new());
        let session = open(&device).await;
        let ui = session.interact().unwrap();

        let err = ui.read_text(&id("title"), PolicyKind::Default).await.unwrap_err();
        assert_eq!(err.kind(), "ElementNotFound");
    }

    #[tokio::test]
    async fn test_read_text_hidden_is_not_found() {
        let device = Arc::new(FakeDevice::new());
        device.add(&id("title"), FakeElement::new("VK Video").displayed(false));
        let session = open(&device).await;
        let ui = session.interact().unwrap();

        let err = ui.read_text(&id("title"), PolicyKind::Default).await.unwrap_err();
        assert_eq!(err.kind(), "ElementNotFound");
    }

    #[tokio::test]
    async fn test_wait_visible_times_out() {
        let device = Arc::new(FakeDevice::new());
        device.add(&id("video_display"), FakeElement::new("").displayed(false));
        let session = open(&device).await;
        let ui = session.interact().unwrap();

        let started = std::time::Instant::now();
        let err = ui
            .wait_visible(&id("video_display"), PolicyKind::Default)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            HarnessError::ElementNotFound { waited, .. } if waited == Duration::from_millis(150)
        ));
        assert!(started.elapsed() >= Duration::from_millis(150));
    }

    #[tokio::test]
    async fn test_slow_server_is_bounded_by_policy() {
        let device = Arc::new(FakeDevice::new());
        let session = open(&device).await;
        let ui = session.interact().unwrap();
        device.find_latency(Duration::from_secs(3));

        let started = std::time::Instant::now();
        assert!(!ui.is_visible(&id("search_button")).await);
        assert!(!ui.exists(&id("search_button")).await);
        assert!(!ui.click_soft(&id("search_button"), PolicyKind::Default).await);
        assert_eq!(ui.read_text_soft(&id("title")).await, None);

        let err = ui.click(&id("search_button"), PolicyKind::Default).await.unwrap_err();
        assert_eq!(err.kind(), "ElementNotFound");

        // Five calls against a 150ms budget each
        assert!(started.elapsed() < Duration::from_secs(2));
    }
}
