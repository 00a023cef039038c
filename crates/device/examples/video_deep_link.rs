//! Video deep link example - open a nonexistent video by link
//!
//! Usage: cargo run --example video_deep_link -- device.toml [video-id]

use async_trait::async_trait;
use device::{
    Classification, DeepLink, LandingIndicators, Orchestrator, PolicyKind, Result, Scenario,
    ScenarioContext, SessionConfig, SessionManager, Verdict,
};
use locator::{resolve, ElementDescription, Locator};
use tracing_subscriber::EnvFilter;

const PACKAGE: &str = "com.vk.vkvideo";

fn id(name: &str) -> Result<Locator> {
    Ok(resolve(&ElementDescription::resource(PACKAGE, name))?)
}

struct OpenVideoLink {
    target: String,
}

#[async_trait]
impl Scenario for OpenVideoLink {
    fn name(&self) -> &str {
        "open video by deep link"
    }

    async fn run(&self, ctx: &mut ScenarioContext<'_>) -> Result<Verdict> {
        // Only shown on a fresh install
        ctx.ui()
            .click_soft(&id("fast_login_tertiary_btn")?, PolicyKind::Default)
            .await;

        let link = DeepLink::new("vk://vk.com/video", PACKAGE);
        let uri = link.uri(&self.target)?;
        let landing = LandingIndicators {
            error: resolve(&ElementDescription::contains("Ошибка"))?,
            home: id("main_content")?,
            dismiss: id("close_button")?,
        };

        ctx.ui()
            .dispatch_deep_link(&uri, &link, &landing)
            .await
            .into_verdict(&uri)
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
        .ok_or("usage: video_deep_link <config.toml> [video-id]")?;
    let target = args
        .next()
        .unwrap_or_else(|| "-999999999_999999999".to_string());

    let config = SessionConfig::from_file(&path)?;
    let manager = SessionManager::http(&config)?;
    let orchestrator = Orchestrator::new(manager);

    let report = orchestrator.run(config, &OpenVideoLink { target }).await;
    println!(
        "🏁 {}: {} ({})",
        report.name, report.classification, report.reason
    );

    match report.classification {
        Classification::Fail => std::process::exit(1),
        Classification::EnvironmentSkip => println!("⏭️  skipped on this device"),
        _ => {}
    }
    Ok(())
}
