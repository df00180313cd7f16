use std::net::SocketAddr;

use crate::CronproxyConfig;

/// Bodies above this are allowed but every cached endpoint may hold that much.
const LARGE_BODY_WARNING: u64 = 64 * 1024 * 1024;

/// Validation output for a loaded configuration.
#[derive(Debug, Default)]
pub struct ConfigReport {
    warnings: Vec<String>,
    errors: Vec<String>,
}

impl ConfigReport {
    /// Returns true when no errors were found.
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns true when at least one error was found.
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// Render warnings and errors into a readable, multi-line string.
    pub fn format(&self) -> String {
        let mut out = String::new();
        if !self.errors.is_empty() {
            out.push_str("Errors:\n");
            for err in &self.errors {
                out.push_str("  - ");
                out.push_str(err);
                out.push('\n');
            }
        }
        if !self.warnings.is_empty() {
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str("Warnings:\n");
            for warn in &self.warnings {
                out.push_str("  - ");
                out.push_str(warn);
                out.push('\n');
            }
        }
        out
    }

    fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    fn error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }
}

/// Validate a configuration and return a report of issues.
pub fn validate(cfg: &CronproxyConfig) -> ConfigReport {
    let mut report = ConfigReport::default();

    validate_server(cfg, &mut report);
    validate_timeouts(cfg, &mut report);
    validate_proxy(cfg, &mut report);

    report
}

fn validate_server(cfg: &CronproxyConfig, report: &mut ConfigReport) {
    let listen = cfg.server.listen.trim();
    if listen.is_empty() {
        report.error("server.listen is empty");
    } else if listen.parse::<SocketAddr>().is_err() {
        report.error(format!(
            "server.listen '{listen}' is not a socket address (expected ip:port)"
        ));
    }

    if cfg.server.max_connections == 0 {
        report.error("server.max_connections must be greater than 0");
    }

    if cfg.server.shutdown_grace_secs == 0 {
        report.warn("server.shutdown_grace_secs is 0; in-flight requests are dropped on shutdown");
    }
}

fn validate_timeouts(cfg: &CronproxyConfig, report: &mut ConfigReport) {
    let timeouts = [
        ("connect_secs", cfg.timeout.connect_secs),
        ("read_secs", cfg.timeout.read_secs),
        ("write_secs", cfg.timeout.write_secs),
        ("idle_secs", cfg.timeout.idle_secs),
        ("upstream_secs", cfg.timeout.upstream_secs),
    ];
    for (name, secs) in timeouts {
        if secs == 0 {
            report.error(format!("timeout.{name} must be greater than 0"));
        }
    }
}

fn validate_proxy(cfg: &CronproxyConfig, report: &mut ConfigReport) {
    if cfg.proxy.max_body_size == 0 {
        report.error("proxy.max_body_size must be greater than 0");
    } else if cfg.proxy.max_body_size > LARGE_BODY_WARNING {
        report.warn(format!(
            "proxy.max_body_size is {} bytes; the cache keeps one body per endpoint in memory",
            cfg.proxy.max_body_size
        ));
    }

    if cfg.proxy.max_request_headers_bytes == 0 {
        report.error("proxy.max_request_headers_bytes must be greater than 0");
    }
}

#[cfg(test)]
mod tests {
    use crate::CronproxyConfig;

    #[test]
    fn defaults_are_valid() {
        let report = CronproxyConfig::default().validate();
        assert!(report.is_ok(), "{}", report.format());
        assert!(report.warnings().is_empty());
    }

    #[test]
    fn rejects_zero_body_size_and_bad_listen() {
        let mut cfg = CronproxyConfig::default();
        cfg.proxy.max_body_size = 0;
        cfg.server.listen = "localhost".into();
        cfg.timeout.upstream_secs = 0;

        let report = cfg.validate();
        assert!(report.has_errors());
        assert_eq!(report.errors().len(), 3);
        let text = report.format();
        assert!(text.contains("proxy.max_body_size"));
        assert!(text.contains("server.listen 'localhost'"));
        assert!(text.contains("timeout.upstream_secs"));
    }

    #[test]
    fn warns_on_huge_body_size() {
        let mut cfg = CronproxyConfig::default();
        cfg.proxy.max_body_size = 1 << 30;
        let report = cfg.validate();
        assert!(report.is_ok());
        assert_eq!(report.warnings().len(), 1);
        assert!(report.format().starts_with("Warnings:\n"));
    }
}
