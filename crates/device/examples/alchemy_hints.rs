//! Alchemy hints example - an optional rewarded-ad branch
//!
//! Usage: cargo run --example alchemy_hints -- device.toml

use async_trait::async_trait;
use device::{
    Classification, Orchestrator, PolicyKind, Result, Scenario, ScenarioContext, SessionConfig,
    SessionManager, Verdict,
};
use locator::{resolve, ElementDescription, Locator};
use tracing_subscriber::EnvFilter;

fn text(value: &str) -> Result<Locator> {
    Ok(resolve(&ElementDescription::text(value))?)
}

struct HintsForAd;

#[async_trait]
impl Scenario for HintsForAd {
    fn name(&self) -> &str {
        "get hints for watching an ad"
    }

    async fn run(&self, ctx: &mut ScenarioContext<'_>) -> Result<Verdict> {
        ctx.ui().click(&text("Играть")?, PolicyKind::Default).await?;
        ctx.ui().click(&text("2")?, PolicyKind::Default).await?;

        // Section and ad button depend on ad inventory for the region
        if !ctx.ui().is_visible(&text("Ваши подсказки")?).await {
            ctx.degrade("hints section not shown");
            return Ok(Verdict::Completed);
        }
        if !ctx.ui().click_soft(&text("Смотреть")?, PolicyKind::Default).await {
            ctx.degrade("no ad available to watch");
            return Ok(Verdict::Completed);
        }

        // Ads run up to a minute
        ctx.ui().wait_text(&text("4")?, "4", PolicyKind::Extended).await?;
        Ok(Verdict::Completed)
    }
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let path = std::env::args()
        .nth(1)
        .ok_or("usage: alchemy_hints <config.toml>")?;
    let config = SessionConfig::from_file(&path)?;
    println!("Device session {} against {}", config.id, config.server_url);

    let manager = SessionManager::http(&config)?;
    let mut event_rx = manager.events().subscribe();
    tokio::spawn(async move {
        while let Ok(event) = event_rx.recv().await {
            println!("📢 Event: {:?}", event);
        }
    });

    let report = Orchestrator::new(manager).run(config, &HintsForAd).await;
    println!(
        "🏁 {}: {} ({}) in {:?}",
        report.name, report.classification, report.reason, report.duration
    );
    for warning in &report.teardown_warnings {
        println!("⚠️  teardown: {}", warning);
    }

    if report.classification == Classification::Fail {
        std::process::exit(1);
    }
    Ok(())
}
