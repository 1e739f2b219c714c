use banking_analysis_orchestrator::{
    agent::Orchestrator, api::start_server, config::AppConfig, telemetry,
};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::from_env()?;
    telemetry::init(&config.telemetry)?;

    let use_mock = std::env::var("USE_MOCK_GENERATOR")
        .map(|v| matches!(v.trim(), "1" | "true" | "yes"))
        .unwrap_or(false);

    info!("Banking Analysis Orchestrator - API Server");
    info!("Port: {}", config.server.port);

    let orchestrator = Arc::new(Orchestrator::from_config(&config, use_mock).await?);

    info!(
        stages = orchestrator.stage_plan().len(),
        mock = use_mock,
        "Orchestrator initialized"
    );

    start_server(orchestrator, &config.server).await?;

    Ok(())
}
