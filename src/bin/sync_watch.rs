//! Connects to a relay as a live update client and prints everything it hears.
//!
//! Settings come from the same flags and environment as the relay, e.g.
//! `sync_watch --relay-url http://localhost:3000 --page events --transport websocket`.
//! Ctrl-C prints the connection snapshot and disconnects.

use anyhow::Result;
use colored::*;
use events::{Category, Page, Update};
use log::*;
use realtime::{
    ConnectionStatus, CredentialProvider, NoCredential, Presentation, StaticCredential,
    SyncClient,
};
use service::{config::Config, logging::Logger};
use std::sync::Arc;

struct ConsolePresentation;

impl Presentation for ConsolePresentation {
    fn show_transient_notice(&self, message: &str) {
        println!("{} {}", "→".blue(), message);
    }

    fn set_connection_status(&self, status: ConnectionStatus) {
        let line = match status {
            ConnectionStatus::Live(_) => status.to_string().green(),
            ConnectionStatus::Connecting => status.to_string().yellow(),
            ConnectionStatus::Disconnected | ConnectionStatus::Failed => status.to_string().red(),
        };
        println!("{} {}", "●".bold(), line);
    }

    fn request_reload(&self, message: &str) {
        println!("{} {}", "✗".red().bold(), message.red());
    }

    fn refresh_page_data(&self, page: Page) {
        println!("{} Refresh data for {}", "↻".cyan(), page.to_string().bold());
    }
}

fn print_update(update: &Update) -> std::result::Result<(), realtime::HandlerError> {
    println!(
        "{} {} from {} {}",
        update.received_at.format("%H:%M:%S").to_string().dimmed(),
        update.kind.to_string().bright_white().bold(),
        update.origin_id.as_str().dimmed(),
        update.payload
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::new();
    if let Err(e) = Logger::init_logger(&config) {
        eprintln!("Failed to initialize logger: {e}");
    }

    let credentials: Arc<dyn CredentialProvider> = match config.token() {
        Some(token) => Arc::new(StaticCredential::new(token)),
        None => Arc::new(NoCredential),
    };

    let mut builder = SyncClient::builder(config.sync_config())
        .credentials(credentials)
        .presentation(Arc::new(ConsolePresentation));
    for category in Category::ALL {
        builder = builder.on_update(category, print_update);
    }
    let client = builder.build()?;

    println!(
        "{} Watching {} on {} as {}",
        "=== LIVE UPDATES ===".bright_white().bold(),
        config.page.to_string().bold(),
        config.relay_url(),
        client.session()
    );

    let (handle, task) = client.spawn();

    tokio::signal::ctrl_c().await?;
    match handle.connection_info().await {
        Ok(info) => println!("{}", serde_json::to_string_pretty(&info)?),
        Err(e) => warn!("Could not read connection info: {e}"),
    }
    handle.disconnect().await;
    task.await?;

    Ok(())
}
