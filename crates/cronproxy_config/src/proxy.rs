use serde::Deserialize;

/// 1 MiB.
const DEFAULT_MAX_BODY_SIZE: u64 = 1024 * 1024;

// =======================================================
// PROXY CONFIG + DEFAULTS
// =======================================================
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Upstream bytes kept per response; the rest is discarded.
    pub max_body_size: u64,
    /// Limit for the client request line + headers.
    pub max_request_headers_bytes: u64,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            max_request_headers_bytes: 64 * 1024,
        }
    }
}
