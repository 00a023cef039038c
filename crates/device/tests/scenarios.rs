//! End-to-end scenario runs against the in-memory device

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use device::testing::{FakeDevice, FakeElement};
use device::{
    Classification, DeepLink, HarnessError, Interactions, LandingIndicators, Orchestrator,
    PolicyKind, Result, Scenario, ScenarioContext, SessionConfig, SessionEvent, SessionManager,
    Verdict, WaitSettings,
};
use locator::{any_element, resolve, ElementDescription, Locator};

const ALCHEMY: &str = "com.ilyin.alchemy";
const VIDEO: &str = "com.vk.vkvideo";

fn config(package: &str) -> SessionConfig {
    SessionConfig {
        udid: Some("5LY98PFMAIEA4LLR".to_string()),
        app_package: package.to_string(),
        app_activity: format!("{}.MainActivity", package),
        wait: WaitSettings {
            default_timeout_ms: 200,
            extended_timeout_ms: 1_000,
            poll_interval_ms: 10,
        },
        ..SessionConfig::default()
    }
}

fn text(value: &str) -> Locator {
    resolve(&ElementDescription::text(value)).unwrap()
}

fn video_id(name: &str) -> Locator {
    resolve(&ElementDescription::resource(VIDEO, name)).unwrap()
}

fn orchestrator(device: &Arc<FakeDevice>) -> Orchestrator {
    Orchestrator::new(SessionManager::new(device.clone()))
}

/// Play, take a hint, and try to earn more hints by watching an ad
struct HintsForAd;

#[async_trait]
impl Scenario for HintsForAd {
    fn name(&self) -> &str {
        "hints for ad"
    }

    async fn run(&self, ctx: &mut ScenarioContext<'_>) -> Result<Verdict> {
        ctx.ui().click(&text("Играть"), PolicyKind::Default).await?;
        ctx.ui().click(&text("2"), PolicyKind::Default).await?;

        if !ctx.ui().is_visible(&text("Ваши подсказки")).await {
            ctx.degrade("hints section not shown");
            return Ok(Verdict::Completed);
        }
        if !ctx.ui().click_soft(&text("Смотреть"), PolicyKind::Default).await {
            ctx.degrade("watch button unavailable");
            return Ok(Verdict::Completed);
        }

        ctx.ui().wait_text(&text("4"), "4", PolicyKind::Extended).await?;
        Ok(Verdict::Completed)
    }
}

#[tokio::test]
async fn test_all_branches_taken_is_pass() {
    let device = Arc::new(FakeDevice::new());
    device.add(&text("Играть"), FakeElement::new("Играть"));
    device.add(&text("2"), FakeElement::new("2"));
    device.add(&text("Ваши подсказки"), FakeElement::new("Ваши подсказки"));
    device.add(&text("Смотреть"), FakeElement::new("Смотреть"));
    // Reward lands after the default policy would have given up
    device.add(
        &text("4"),
        FakeElement::new("4").appears_after(Duration::from_millis(400)),
    );

    let report = orchestrator(&device).run(config(ALCHEMY), &HintsForAd).await;

    assert_eq!(report.classification, Classification::Pass, "{}", report.reason);
    assert!(report.notes.is_empty());
    assert_eq!(device.clicks(&text("Смотреть")), 1);
    assert_eq!(device.live_sessions(), 0);
}

#[tokio::test]
async fn test_absent_optional_button_is_degraded_pass() {
    let device = Arc::new(FakeDevice::new());
    device.add(&text("Играть"), FakeElement::new("Играть"));
    device.add(&text("2"), FakeElement::new("2"));
    device.add(&text("Ваши подсказки"), FakeElement::new("Ваши подсказки"));

    let report = orchestrator(&device).run(config(ALCHEMY), &HintsForAd).await;

    assert_eq!(report.classification, Classification::DegradedPass);
    assert_eq!(report.reason, "watch button unavailable");
    assert_eq!(device.live_sessions(), 0);
}

#[tokio::test]
async fn test_absent_optional_section_is_degraded_pass() {
    let device = Arc::new(FakeDevice::new());
    device.add(&text("Играть"), FakeElement::new("Играть"));
    device.add(&text("2"), FakeElement::new("2"));

    let report = orchestrator(&device).run(config(ALCHEMY), &HintsForAd).await;

    assert_eq!(report.classification, Classification::DegradedPass);
    assert_eq!(report.notes, vec!["hints section not shown".to_string()]);
}

#[tokio::test]
async fn test_never_interactable_click_fails() {
    let device = Arc::new(FakeDevice::new());
    device.add(&text("Играть"), FakeElement::new("Играть").enabled(false));

    let report = orchestrator(&device).run(config(ALCHEMY), &HintsForAd).await;

    assert_eq!(report.classification, Classification::Fail);
    assert!(
        report.reason.starts_with("ElementNotInteractable"),
        "{}",
        report.reason
    );
    assert_eq!(device.live_sessions(), 0);
}

#[tokio::test]
async fn test_missing_reward_fails_after_extended_wait() {
    let device = Arc::new(FakeDevice::new());
    device.add(&text("Играть"), FakeElement::new("Играть"));
    device.add(&text("2"), FakeElement::new("2"));
    device.add(&text("Ваши подсказки"), FakeElement::new("Ваши подсказки"));
    device.add(&text("Смотреть"), FakeElement::new("Смотреть"));

    let report = orchestrator(&device).run(config(ALCHEMY), &HintsForAd).await;

    assert_eq!(report.classification, Classification::Fail);
    assert!(report.reason.starts_with("ElementNotFound"), "{}", report.reason);
    assert!(report.duration >= Duration::from_millis(1_000));
}

/// Open an invalid video link and expect the app to land somewhere sane
struct InvalidVideoLink;

impl InvalidVideoLink {
    const TARGET: &'static str = "-999999999_999999999";

    fn link() -> DeepLink {
        DeepLink::new("vk://vk.com/video", VIDEO)
    }

    fn landing() -> LandingIndicators {
        LandingIndicators {
            error: resolve(&ElementDescription::contains("Ошибка")).unwrap(),
            home: video_id("main_content"),
            dismiss: video_id("close_button"),
        }
    }
}

#[async_trait]
impl Scenario for InvalidVideoLink {
    fn name(&self) -> &str {
        "invalid video link"
    }

    async fn run(&self, ctx: &mut ScenarioContext<'_>) -> Result<Verdict> {
        // Login prompt only shows on fresh installs
        ctx.ui()
            .click_soft(&video_id("fast_login_tertiary_btn"), PolicyKind::Default)
            .await;

        let link = Self::link();
        let uri = link.uri(Self::TARGET)?;
        ctx.ui()
            .dispatch_deep_link(&uri, &link, &Self::landing())
            .await
            .into_verdict(&uri)
    }
}

fn invalid_link_uri() -> String {
    InvalidVideoLink::link()
        .uri(InvalidVideoLink::TARGET)
        .unwrap()
        .to_string()
}

#[tokio::test]
async fn test_deep_link_landing_on_error_screen_passes() {
    let device = Arc::new(FakeDevice::new());
    let landing = InvalidVideoLink::landing();
    device.add(&any_element(), FakeElement::new(""));
    device.add(
        &landing.error,
        FakeElement::new("Ошибка загрузки").hidden_until_deep_link(),
    );
    device.on_deep_link(&invalid_link_uri(), &[&landing.error]);

    let manager = SessionManager::new(device.clone());
    let mut events = manager.events().subscribe();
    let report = Orchestrator::new(manager)
        .run(config(VIDEO), &InvalidVideoLink)
        .await;

    assert_eq!(report.classification, Classification::Pass, "{}", report.reason);

    let mut dispatched = false;
    while let Ok(event) = events.try_recv() {
        if let SessionEvent::DeepLinkDispatched { uri, .. } = event {
            assert_eq!(uri, "vk://vk.com/video-999999999_999999999");
            dispatched = true;
        }
    }
    assert!(dispatched);
}

#[tokio::test]
async fn test_deep_link_landing_on_home_passes() {
    let device = Arc::new(FakeDevice::new());
    device.add(&any_element(), FakeElement::new(""));
    device.add(&video_id("main_content"), FakeElement::new(""));

    let report = orchestrator(&device)
        .run(config(VIDEO), &InvalidVideoLink)
        .await;

    assert_eq!(report.classification, Classification::Pass, "{}", report.reason);
}

#[tokio::test]
async fn test_deep_link_landing_nowhere_fails() {
    let device = Arc::new(FakeDevice::new());
    device.add(&any_element(), FakeElement::new(""));

    let report = orchestrator(&device)
        .run(config(VIDEO), &InvalidVideoLink)
        .await;

    assert_eq!(report.classification, Classification::Fail);
    assert!(report.reason.starts_with("DeepLinkUnresolved"), "{}", report.reason);
}

#[tokio::test]
async fn test_deep_link_blank_screen_fails() {
    let device = Arc::new(FakeDevice::new());

    let report = orchestrator(&device)
        .run(config(VIDEO), &InvalidVideoLink)
        .await;

    assert_eq!(report.classification, Classification::Fail);
}

#[tokio::test]
async fn test_deep_link_rejected_by_platform_is_skip() {
    let device = Arc::new(FakeDevice::new());
    device.add(&any_element(), FakeElement::new(""));
    device.reject_deep_links(true);

    let report = orchestrator(&device)
        .run(config(VIDEO), &InvalidVideoLink)
        .await;

    assert_eq!(report.classification, Classification::EnvironmentSkip);
    assert!(report.reason.contains("No activity found"), "{}", report.reason);
    assert_eq!(device.live_sessions(), 0);
}

struct Exploding;

#[async_trait]
impl Scenario for Exploding {
    fn name(&self) -> &str {
        "exploding"
    }

    async fn run(&self, _ctx: &mut ScenarioContext<'_>) -> Result<Verdict> {
        panic!("scenario blew up")
    }
}

#[tokio::test]
async fn test_panicking_scenario_fails_and_closes_session() {
    let device = Arc::new(FakeDevice::new());

    let report = orchestrator(&device).run(config(VIDEO), &Exploding).await;

    assert_eq!(report.classification, Classification::Fail);
    assert!(report.reason.starts_with("panic:"), "{}", report.reason);
    assert_eq!(device.live_sessions(), 0);
}

#[tokio::test]
async fn test_unreachable_server_fails_with_connection_error() {
    let device = Arc::new(FakeDevice::new());
    device.set_reachable(false);

    let report = orchestrator(&device).run(config(VIDEO), &Exploding).await;

    assert_eq!(report.classification, Classification::Fail);
    assert!(report.reason.starts_with("ConnectionError"), "{}", report.reason);
}

#[tokio::test]
async fn test_refused_session_fails_with_launch_error() {
    let device = Arc::new(FakeDevice::new());
    device.refuse_sessions(true);

    let report = orchestrator(&device).run(config(VIDEO), &Exploding).await;

    assert_eq!(report.classification, Classification::Fail);
    assert!(report.reason.starts_with("LaunchError"), "{}", report.reason);
}

#[tokio::test]
async fn test_teardown_warning_does_not_mask_outcome() {
    let device = Arc::new(FakeDevice::new());
    device.add(&any_element(), FakeElement::new(""));
    device.add(&video_id("close_button"), FakeElement::new(""));
    device.fail_terminate(true);

    let report = orchestrator(&device)
        .run(config(VIDEO), &InvalidVideoLink)
        .await;

    assert_eq!(report.classification, Classification::Pass);
    assert_eq!(report.teardown_warnings.len(), 1);
    assert_eq!(device.live_sessions(), 0);
}

/// Needs a logged-in account, which test devices may not have
struct RequiresAccount;

#[async_trait]
impl Scenario for RequiresAccount {
    fn name(&self) -> &str {
        "requires account"
    }

    async fn run(&self, ctx: &mut ScenarioContext<'_>) -> Result<Verdict> {
        if ctx.ui().exists(&video_id("fast_login_tertiary_btn")).await {
            return Ok(ctx.skip("device is not logged in"));
        }
        ctx.ui().wait_visible(&video_id("main_content"), PolicyKind::Default).await?;
        Ok(Verdict::Completed)
    }
}

#[tokio::test]
async fn test_precondition_skip_is_environment_skip() {
    let device = Arc::new(FakeDevice::new());
    device.add(&video_id("fast_login_tertiary_btn"), FakeElement::new("Не сейчас"));

    let report = orchestrator(&device).run(config(VIDEO), &RequiresAccount).await;

    assert_eq!(report.classification, Classification::EnvironmentSkip);
    assert_eq!(report.reason, "device is not logged in");
}

#[tokio::test]
async fn test_deep_link_hidden_screen_fails() {
    let device = Arc::new(FakeDevice::new());
    device.add(&any_element(), FakeElement::new("").displayed(false));
    device.add(&video_id("main_content"), FakeElement::new(""));

    let report = orchestrator(&device)
        .run(config(VIDEO), &InvalidVideoLink)
        .await;

    assert_eq!(report.classification, Classification::Fail);
    assert!(report.reason.starts_with("DeepLinkUnresolved"), "{}", report.reason);
}

/// Play the first feed video; diagnose instead of failing when it won't play
struct VideoPlayback;

impl VideoPlayback {
    async fn play_first_in_feed(ui: &Interactions<'_>) -> Result<String> {
        let feed = video_id("content");
        ui.wait_count_above(&feed, 1, PolicyKind::Default).await?;
        ui.click_nth(&feed, 0, PolicyKind::Default).await?;
        ui.wait_visible(&video_id("video_display"), PolicyKind::Default)
            .await?;

        ui.wait_visible(&video_id("player_control"), PolicyKind::Default)
            .await?;
        ui.wait_visible(&video_id("likes"), PolicyKind::Default).await?;
        ui.read_text(&video_id("title"), PolicyKind::Default).await
    }

    async fn diagnose(ui: &Interactions<'_>) -> String {
        if let Some(message) = ui.read_text_soft(&video_id("error_message")).await {
            return message;
        }
        let unavailable = resolve(&ElementDescription::contains("Недоступно")).unwrap();
        if ui.exists(&unavailable).await {
            return "video unavailable".to_string();
        }
        "unknown playback error".to_string()
    }
}

#[async_trait]
impl Scenario for VideoPlayback {
    fn name(&self) -> &str {
        "video playback"
    }

    async fn run(&self, ctx: &mut ScenarioContext<'_>) -> Result<Verdict> {
        ctx.ui()
            .click_soft(&video_id("fast_login_tertiary_btn"), PolicyKind::Default)
            .await;

        match Self::play_first_in_feed(ctx.ui()).await {
            Ok(_title) => Ok(Verdict::Completed),
            Err(
                err @ (HarnessError::ElementNotFound { .. }
                | HarnessError::ElementNotInteractable { .. }
                | HarnessError::CollectionTimeout { .. }),
            ) => {
                let diagnosis = Self::diagnose(ctx.ui()).await;
                ctx.degrade(format!("playback failed ({}): {}", err.kind(), diagnosis));
                Ok(Verdict::Completed)
            }
            Err(err) => Err(err),
        }
    }
}

fn add_feed(device: &FakeDevice) {
    device.add(&video_id("content"), FakeElement::new("clip").count(3));
}

#[tokio::test]
async fn test_video_playback_passes() {
    let device = Arc::new(FakeDevice::new());
    add_feed(&device);
    for name in ["video_display", "player_control", "likes"] {
        device.add(&video_id(name), FakeElement::new(""));
    }
    device.add(&video_id("title"), FakeElement::new("Лучшие моменты"));

    let report = orchestrator(&device).run(config(VIDEO), &VideoPlayback).await;

    assert_eq!(report.classification, Classification::Pass, "{}", report.reason);
    assert_eq!(device.clicks(&video_id("content")), 1);
}

#[tokio::test]
async fn test_video_playback_error_message_is_degraded() {
    let device = Arc::new(FakeDevice::new());
    add_feed(&device);
    device.add(&video_id("error_message"), FakeElement::new("Видео удалено"));

    let report = orchestrator(&device).run(config(VIDEO), &VideoPlayback).await;

    assert_eq!(report.classification, Classification::DegradedPass);
    assert!(report.reason.contains("Видео удалено"), "{}", report.reason);
    assert!(report.reason.contains("ElementNotFound"), "{}", report.reason);
}

#[tokio::test]
async fn test_video_playback_unavailable_is_degraded() {
    let device = Arc::new(FakeDevice::new());
    add_feed(&device);
    device.add(
        &resolve(&ElementDescription::contains("Недоступно")).unwrap(),
        FakeElement::new("Недоступно в вашем регионе"),
    );

    let report = orchestrator(&device).run(config(VIDEO), &VideoPlayback).await;

    assert_eq!(report.classification, Classification::DegradedPass);
    assert!(report.reason.ends_with("video unavailable"), "{}", report.reason);
}

#[tokio::test]
async fn test_video_playback_short_feed_is_degraded() {
    let device = Arc::new(FakeDevice::new());
    device.add(&video_id("content"), FakeElement::new("clip"));

    let report = orchestrator(&device).run(config(VIDEO), &VideoPlayback).await;

    assert_eq!(report.classification, Classification::DegradedPass);
    assert!(report.reason.contains("CollectionTimeout"), "{}", report.reason);
    assert!(report.reason.ends_with("unknown playback error"), "{}", report.reason);
    assert_eq!(device.clicks(&video_id("content")), 0);
}

#[tokio::test]
async fn test_video_playback_transport_failure_fails() {
    let device = Arc::new(FakeDevice::new());
    add_feed(&device);

    let manager = SessionManager::new(device.clone());
    let mut session = manager.open(config(VIDEO)).await.unwrap();
    let result = {
        let mut ctx = ScenarioContext::new(session.interact().unwrap());
        device.set_reachable(false);
        VideoPlayback.run(&mut ctx).await
    };
    device.set_reachable(true);
    session.close().await;

    assert_eq!(result.unwrap_err().kind(), "TransportError");
}

/// Open search from the home screen
struct Search;

#[async_trait]
impl Scenario for Search {
    fn name(&self) -> &str {
        "search"
    }

    async fn run(&self, ctx: &mut ScenarioContext<'_>) -> Result<Verdict> {
        let button = video_id("search_button");
        ctx.ui()
            .click_soft(&video_id("fast_login_tertiary_btn"), PolicyKind::Default)
            .await;
        if !ctx.ui().click_soft(&button, PolicyKind::Default).await {
            ctx.degrade("search button unavailable");
        }

        let has_button = ctx.ui().exists(&button).await;
        let has_field = ctx.ui().exists(&video_id("search_src_text")).await;
        let has_title = ctx.ui().exists(&video_id("title")).await;

        if !(has_button || has_field || has_title) {
            return Ok(ctx.skip("app is no longer in the foreground"));
        }
        if has_field {
            return Ok(Verdict::Completed);
        }

        let title = ctx.ui().read_text_soft(&video_id("title")).await;
        if title.as_deref() == Some("VK Video") {
            ctx.degrade("search did not open, still on the home screen");
        } else {
            ctx.degrade("search field not shown");
        }
        Ok(Verdict::Completed)
    }
}

#[tokio::test]
async fn test_search_opens() {
    let device = Arc::new(FakeDevice::new());
    device.add(&video_id("search_button"), FakeElement::new(""));
    device.add(&video_id("search_src_text"), FakeElement::new(""));

    let report = orchestrator(&device).run(config(VIDEO), &Search).await;

    assert_eq!(report.classification, Classification::Pass, "{}", report.reason);
    assert_eq!(device.clicks(&video_id("search_button")), 1);
}

#[tokio::test]
async fn test_search_staying_home_is_degraded() {
    let device = Arc::new(FakeDevice::new());
    device.add(&video_id("search_button"), FakeElement::new(""));
    device.add(&video_id("title"), FakeElement::new("VK Video"));

    let report = orchestrator(&device).run(config(VIDEO), &Search).await;

    assert_eq!(report.classification, Classification::DegradedPass);
    assert_eq!(report.reason, "search did not open, still on the home screen");
}

#[tokio::test]
async fn test_search_with_collapsed_app_is_skip() {
    let device = Arc::new(FakeDevice::new());

    let report = orchestrator(&device).run(config(VIDEO), &Search).await;

    assert_eq!(report.classification, Classification::EnvironmentSkip);
    assert_eq!(report.reason, "app is no longer in the foreground");
}
