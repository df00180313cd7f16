use std::time::Duration;

use serde::Deserialize;

// =======================================================
// SERVER CONFIG + DEFAULTS
// =======================================================
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen: String,
    /// Concurrent client connections before accept() waits.
    pub max_connections: usize,
    /// How long shutdown waits for in-flight connections.
    pub shutdown_grace_secs: u64,
    /// Drops the App-Name / App-Version / Author response headers.
    pub suppress_headers: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:8080".into(),
            max_connections: 1024,
            shutdown_grace_secs: 10,
            suppress_headers: false,
        }
    }
}

impl ServerConfig {
    pub fn listen(&self) -> &str {
        &self.listen
    }

    pub fn max_connections(&self) -> usize {
        self.max_connections
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }

    pub fn suppress_headers(&self) -> bool {
        self.suppress_headers
    }
}
