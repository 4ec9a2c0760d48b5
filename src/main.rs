use anyhow::Result;
use tracing::info;
use typed_router::{config::Config, server, telemetry};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    let prometheus = telemetry::init(&config.telemetry)?;

    info!("Starting {}", config.telemetry.service_name);
    info!("HTTP server listening on {}", config.http_addr());

    server::run(config, prometheus).await
}
