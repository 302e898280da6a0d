use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;
use vidu_animator::{Config, StatusPoller, ViduClient};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter("vidu_animator=info")
        .init();

    let video_id = std::env::args()
        .nth(1)
        .context("usage: check-status <VIDEO_ID>")?;

    let config = Config::from_env();
    config.validate()?;

    info!("🔍 Checking video {} at {}", video_id, config.provider.base_url);

    let client = ViduClient::new(&config).context("VIDU_API_KEY must be set")?;
    let poller = StatusPoller::new(Arc::new(client), config.polling.clone());

    match poller.check_once(&video_id).await {
        Ok(report) => {
            info!("✅ Status: {}", report.status);
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Err(e) => {
            info!("❌ {}", e);
            return Err(e.into());
        }
    }

    Ok(())
}
