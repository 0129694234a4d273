//! Liveness bookkeeping for the active connection.
//!
//! Outbound pings let the relay notice dead clients. The inbound staleness check catches
//! push streams that a proxy silently stopped forwarding. The monitor never tears a
//! connection down itself; on staleness it asks the manager to verify health.

use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone)]
pub struct HeartbeatMonitor {
    ping_interval: Duration,
    health_check_interval: Duration,
    stale_after: Duration,
    last_inbound: Instant,
    running: bool,
}

impl HeartbeatMonitor {
    pub fn new(
        ping_interval: Duration,
        health_check_interval: Duration,
        stale_after: Duration,
    ) -> Self {
        Self {
            ping_interval,
            health_check_interval,
            stale_after,
            last_inbound: Instant::now(),
            running: false,
        }
    }

    pub fn ping_interval(&self) -> Duration {
        self.ping_interval
    }

    pub fn health_check_interval(&self) -> Duration {
        self.health_check_interval
    }

    /// Called when a connection opens. Counts the open itself as inbound traffic.
    pub fn start(&mut self, now: Instant) {
        self.running = true;
        self.last_inbound = now;
    }

    pub fn stop(&mut self) {
        self.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Any inbound frame counts, keep-alive comments included.
    pub fn record_inbound(&mut self, now: Instant) {
        self.last_inbound = now;
    }

    pub fn since_last_inbound(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_inbound)
    }

    /// True while running and the silence has lasted longer than the threshold.
    pub fn is_stale(&self, now: Instant) -> bool {
        self.running && self.since_last_inbound(now) > self.stale_after
    }
}
