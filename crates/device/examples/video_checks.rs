//! Video checks example - feed playback and search
//!
//! Usage: cargo run --example video_checks -- device.toml [playback|search]

use async_trait::async_trait;
use device::{
    Classification, HarnessError, Interactions, Orchestrator, PolicyKind, Result, Scenario,
    ScenarioContext, SessionConfig, SessionManager, Verdict,
};
use locator::{resolve, ElementDescription, Locator};
use tracing_subscriber::EnvFilter;

const PACKAGE: &str = "com.vk.vkvideo";
const APP_TITLE: &str = "VK Video";

fn id(name: &str) -> Result<Locator> {
    Ok(resolve(&ElementDescription::resource(PACKAGE, name))?)
}

async fn skip_login(ui: &Interactions<'_>) -> Result<()> {
    ui.click_soft(&id("fast_login_tertiary_btn")?, PolicyKind::Default)
        .await;
    Ok(())
}

struct Playback;

impl Playback {
    /// Returns the title of the video that started
    async fn play_first_in_feed(ui: &Interactions<'_>) -> Result<String> {
        let feed = id("content")?;
        ui.wait_count_above(&feed, 1, PolicyKind::Default).await?;
        ui.click_nth(&feed, 0, PolicyKind::Default).await?;
        ui.wait_visible(&id("video_display")?, PolicyKind::Default)
            .await?;

        ui.wait_visible(&id("player_control")?, PolicyKind::Default)
            .await?;
        ui.wait_visible(&id("likes")?, PolicyKind::Default).await?;
        ui.read_text(&id("title")?, PolicyKind::Default).await
    }

    async fn diagnose(ui: &Interactions<'_>) -> Result<String> {
        if let Some(message) = ui.read_text_soft(&id("error_message")?).await {
            return Ok(message);
        }
        if ui
            .exists(&resolve(&ElementDescription::contains("Недоступно"))?)
            .await
        {
            return Ok("video unavailable".to_string());
        }
        Ok("unknown playback error".to_string())
    }
}

#[async_trait]
impl Scenario for Playback {
    fn name(&self) -> &str {
        "video playback with error handling"
    }

    async fn run(&self, ctx: &mut ScenarioContext<'_>) -> Result<Verdict> {
        skip_login(ctx.ui()).await?;

        match Self::play_first_in_feed(ctx.ui()).await {
            Ok(title) => {
                println!("▶️  playing: {}", title);
                Ok(Verdict::Completed)
            }
            Err(
                err @ (HarnessError::ElementNotFound { .. }
                | HarnessError::ElementNotInteractable { .. }
                | HarnessError::CollectionTimeout { .. }),
            ) => {
                let diagnosis = Self::diagnose(ctx.ui()).await?;
                ctx.degrade(format!("playback failed ({}): {}", err.kind(), diagnosis));
                Ok(Verdict::Completed)
            }
            Err(err) => Err(err),
        }
    }
}

struct Search;

#[async_trait]
impl Scenario for Search {
    fn name(&self) -> &str {
        "video search"
    }

    async fn run(&self, ctx: &mut ScenarioContext<'_>) -> Result<Verdict> {
        skip_login(ctx.ui()).await?;

        let button = id("search_button")?;
        let field = id("search_src_text")?;
        let title = id("title")?;

        if !ctx.ui().click_soft(&button, PolicyKind::Default).await {
            ctx.degrade("search button unavailable");
        }

        let has_button = ctx.ui().exists(&button).await;
        let has_field = ctx.ui().exists(&field).await;
        let has_title = ctx.ui().exists(&title).await;
        tracing::info!(has_button, has_field, has_title, "screen after search click");

        if !(has_button || has_field || has_title) {
            return Ok(ctx.skip("app is no longer in the foreground"));
        }
        if has_field {
            return Ok(Verdict::Completed);
        }

        // Known issue: the click sometimes leaves the home screen in place
        if ctx.ui().read_text_soft(&title).await.as_deref() == Some(APP_TITLE) {
            ctx.degrade("search did not open, still on the home screen");
        } else {
            ctx.degrade("search field not shown");
        }
        Ok(Verdict::Completed)
    }
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut args = std::env::args().skip(1);
    let path = args
        .next()
        .ok_or("usage: video_checks <config.toml> [playback|search]")?;
    let which = args.next();

    let scenarios: Vec<Box<dyn Scenario>> = match which.as_deref() {
        Some("playback") => vec![Box::new(Playback)],
        Some("search") => vec![Box::new(Search)],
        None => vec![Box::new(Playback), Box::new(Search)],
        Some(other) => return Err(format!("unknown check {:?}", other).into()),
    };

    let config = SessionConfig::from_file(&path)?;
    let orchestrator = Orchestrator::new(SessionManager::http(&config)?);

    let mut failed = false;
    for scenario in &scenarios {
        // Each check gets a fresh session id
        let config = SessionConfig {
            id: SessionConfig::default().id,
            ..config.clone()
        };
        let report = orchestrator.run(config, scenario.as_ref()).await;
        println!(
            "🏁 {}: {} ({}) in {:?}",
            report.name, report.classification, report.reason, report.duration
        );
        failed |= report.classification == Classification::Fail;
    }

    if failed {
        std::process::exit(1);
    }
    Ok(())
}
