use ampere::{Config, Hub};
use anyhow::Result;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load().map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;

    ampere::logging::init_logging(&config.logging)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!(
        "Ampere OCPP central system {} starting up",
        env!("APP_VERSION")
    );

    // Capture bind settings before the config moves into the hub
    let (host, port) = (config.web.host.clone(), config.web.port);
    if !config.bridge.url.is_empty() {
        info!("Bridge enabled: {}", config.bridge.url);
    }

    let hub = Hub::new(config);

    // Liveness supervision runs for the process lifetime
    ampere::sweeps::spawn(hub.clone());

    info!("Listening on {}:{}", host, port);
    ampere::web::serve(hub, &host, port).await
}
