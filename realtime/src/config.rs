use crate::connection::TransportKind;
use crate::error::{config_error, Error};
use events::Page;
use std::time::Duration;

pub const DEFAULT_RECONNECT_BASE_DELAY: Duration = Duration::from_millis(1000);
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 5;
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(60);
pub const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(60);
pub const DEFAULT_HISTORY_CAPACITY: usize = 100;
pub const DEFAULT_OPEN_TIMEOUT: Duration = Duration::from_secs(10);

/// Settings for one live update client.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Base URL of the relay, e.g. `http://localhost:3000`.
    pub base_url: String,
    /// The page this client is showing.
    pub page: Page,
    pub preferred_transport: TransportKind,
    /// Delay before the first retry; doubles on every further consecutive failure.
    pub reconnect_base_delay: Duration,
    /// Consecutive failures tolerated before giving up until a manual reload.
    pub max_reconnect_attempts: u32,
    /// How often an outbound liveness ping is sent while connected.
    pub heartbeat_interval: Duration,
    /// How often inbound staleness is checked.
    pub health_check_interval: Duration,
    /// Silence longer than this makes the manager verify connection health.
    pub stale_after: Duration,
    pub history_capacity: usize,
    /// How long a transport may take to produce its handshake.
    pub open_timeout: Duration,
}

impl SyncConfig {
    pub fn new(base_url: impl Into<String>, page: Page) -> Self {
        Self {
            base_url: base_url.into(),
            page,
            ..Self::default()
        }
    }

    /// Rejects intervals the manager's timers cannot run with.
    pub fn validate(&self) -> Result<(), Error> {
        if self.heartbeat_interval.is_zero() {
            return Err(config_error("heartbeat_interval must be greater than zero"));
        }
        if self.health_check_interval.is_zero() {
            return Err(config_error("health_check_interval must be greater than zero"));
        }
        if self.open_timeout.is_zero() {
            return Err(config_error("open_timeout must be greater than zero"));
        }
        Ok(())
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            page: Page::Unknown,
            preferred_transport: TransportKind::PushStream,
            reconnect_base_delay: DEFAULT_RECONNECT_BASE_DELAY,
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            health_check_interval: DEFAULT_HEALTH_CHECK_INTERVAL,
            stale_after: DEFAULT_STALE_AFTER,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            open_timeout: DEFAULT_OPEN_TIMEOUT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn defaults_are_valid() {
        assert!(SyncConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_heartbeat_interval_is_rejected() {
        let config = SyncConfig {
            heartbeat_interval: Duration::ZERO,
            ..SyncConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert_eq!(err.error_kind, ErrorKind::Config);
    }

    #[test]
    fn zero_health_check_interval_is_rejected() {
        let config = SyncConfig {
            health_check_interval: Duration::ZERO,
            ..SyncConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert_eq!(err.error_kind, ErrorKind::Config);
    }

    #[test]
    fn zero_open_timeout_is_rejected() {
        let config = SyncConfig {
            open_timeout: Duration::ZERO,
            ..SyncConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert_eq!(err.error_kind, ErrorKind::Config);
    }
}
