use clap::builder::TypedValueParser as _;
use clap::Parser;
use dotenvy::dotenv;
use events::Page;
use log::LevelFilter;
use realtime::{SyncConfig, TransportKind};
use std::time::Duration;

/// Settings for both the relay server and the live update client. Every flag can also be
/// set through the environment or a `.env` file.
#[derive(Clone, Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// A list of full CORS origin URLs that allowed to receive server responses.
    #[arg(
        long,
        env,
        value_delimiter = ',',
        use_value_delimiter = true,
        default_value = "http://localhost:3000,https://localhost:3000"
    )]
    pub allowed_origins: Vec<String>,

    /// The host interface to listen for incoming connections
    #[arg(short, long, env, default_value = "127.0.0.1")]
    pub interface: Option<String>,

    /// The host TCP port to listen for incoming connections
    #[arg(short, long, env, default_value_t = 3000)]
    pub port: u16,

    /// Set the log level verbosity threshold (level) to control what gets displayed on console output
    #[arg(
        short,
        long,
        env,
        default_value_t = LevelFilter::Info,
        value_parser = clap::builder::PossibleValuesParser::new(["OFF", "ERROR", "WARN", "INFO", "DEBUG", "TRACE"])
            .map(|s| s.parse::<LevelFilter>().unwrap()),
        )]
    pub log_level_filter: LevelFilter,

    /// Seconds between relay heartbeat sweeps
    #[arg(long, env, default_value_t = 30, value_parser = clap::value_parser!(u64).range(1..))]
    pub relay_heartbeat_interval_secs: u64,

    /// Seconds a relay connection may stay silent before the sweep drops it
    #[arg(long, env, default_value_t = 60, value_parser = clap::value_parser!(u64).range(1..))]
    pub relay_stale_after_secs: u64,

    /// Base URL of the relay a live update client connects to
    #[arg(long, env, default_value = "http://localhost:3000")]
    relay_url: String,

    /// The page a live update client reports it is showing
    #[arg(
        long,
        env,
        default_value = "dashboard",
        value_parser = clap::builder::NonEmptyStringValueParser::new().map(|s| Page::from(s.as_str())),
    )]
    pub page: Page,

    /// Transport a live update client tries first
    #[arg(
        long,
        env,
        default_value = "sse",
        value_parser = clap::builder::PossibleValuesParser::new(["sse", "websocket"])
            .map(|s| if s == "websocket" { TransportKind::DuplexSocket } else { TransportKind::PushStream }),
    )]
    pub transport: TransportKind,

    /// Opaque access token attached to client connections
    #[arg(long, env)]
    token: Option<String>,

    /// Milliseconds before the first reconnection attempt; doubles on each further failure
    #[arg(long, env, default_value_t = 1000)]
    pub reconnect_base_delay_ms: u64,

    /// Consecutive failed connections before the client gives up
    #[arg(long, env, default_value_t = 5)]
    pub max_reconnect_attempts: u32,

    /// Seconds between outbound client heartbeats
    #[arg(long, env, default_value_t = 30, value_parser = clap::value_parser!(u64).range(1..))]
    pub heartbeat_interval_secs: u64,

    /// Seconds between client staleness checks
    #[arg(long, env, default_value_t = 60, value_parser = clap::value_parser!(u64).range(1..))]
    pub health_check_interval_secs: u64,

    /// Seconds without inbound traffic before the client verifies its connection
    #[arg(long, env, default_value_t = 60)]
    pub stale_after_secs: u64,

    /// Updates the client keeps for diagnostics
    #[arg(long, env, default_value_t = 100)]
    pub history_capacity: usize,

    /// Seconds a transport may take to open
    #[arg(long, env, default_value_t = 10)]
    pub open_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        // Load .env file first
        dotenv().ok();
        // Then parse the command line parameters and flags
        Config::parse()
    }

    pub fn relay_url(&self) -> &str {
        &self.relay_url
    }

    pub fn token(&self) -> Option<String> {
        self.token.clone()
    }

    pub fn relay_heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.relay_heartbeat_interval_secs)
    }

    pub fn relay_stale_after(&self) -> Duration {
        Duration::from_secs(self.relay_stale_after_secs)
    }

    /// The live update client settings.
    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig {
            base_url: self.relay_url.clone(),
            page: self.page,
            preferred_transport: self.transport,
            reconnect_base_delay: Duration::from_millis(self.reconnect_base_delay_ms),
            max_reconnect_attempts: self.max_reconnect_attempts,
            heartbeat_interval: Duration::from_secs(self.heartbeat_interval_secs),
            health_check_interval: Duration::from_secs(self.health_check_interval_secs),
            stale_after: Duration::from_secs(self.stale_after_secs),
            history_capacity: self.history_capacity,
            open_timeout: Duration::from_secs(self.open_timeout_secs),
        }
    }
}
