use log::*;
use service::{config::Config, logging::Logger, AppState};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::new();
    if let Err(e) = Logger::init_logger(&config) {
        eprintln!("Failed to initialize logger: {e}");
    }

    info!("Starting up prefect live update relay...");

    let sse_manager = Arc::new(sse::Manager::with_stale_after(config.relay_stale_after()));
    let app_state = AppState::new(config, &sse_manager);

    web::init_server(app_state).await?;

    Ok(())
}
