use std::time::Duration;

use serde::Deserialize;

// =======================================================
// TIMEOUT CONFIG + DEFAULTS (seconds)
// =======================================================
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Upstream TCP connect.
    pub connect_secs: u64,
    /// Reading one client request once bytes started to arrive.
    pub read_secs: u64,
    /// Writing one response to the client.
    pub write_secs: u64,
    /// Keep-alive wait for the next request on a connection.
    pub idle_secs: u64,
    /// Whole upstream fetch, body included.
    pub upstream_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 10,
            read_secs: 10,
            write_secs: 10,
            idle_secs: 15,
            upstream_secs: 10,
        }
    }
}

impl TimeoutConfig {
    pub fn connect(&self) -> Duration {
        Duration::from_secs(self.connect_secs)
    }

    pub fn read(&self) -> Duration {
        Duration::from_secs(self.read_secs)
    }

    pub fn write(&self) -> Duration {
        Duration::from_secs(self.write_secs)
    }

    pub fn idle(&self) -> Duration {
        Duration::from_secs(self.idle_secs)
    }

    pub fn upstream(&self) -> Duration {
        Duration::from_secs(self.upstream_secs)
    }
}
