use config::{Config, ConfigError, Environment, File, FileFormat, Map};
use serde::Deserialize;
use tracing::debug;

use crate::validation::{validate, ConfigReport};
use crate::{LogConfig, ProxyConfig, ServerConfig, TimeoutConfig};

/// Prefix for environment overrides: `CRONPROXY__PROXY__MAX_BODY_SIZE=2048`.
const ENV_PREFIX: &str = "CRONPROXY";
const ENV_SEPARATOR: &str = "__";

// =======================================================
// CRONPROXY CONFIG (root)
// =======================================================
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CronproxyConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub timeout: TimeoutConfig,

    #[serde(default)]
    pub proxy: ProxyConfig,

    #[serde(default)]
    pub log: LogConfig,
}

/// Command-line values that win over file and environment.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub port: Option<u16>,
    pub max_body_size: Option<u64>,
    pub suppress_headers: bool,
    pub debug: bool,
    pub no_colors: bool,
}

impl CronproxyConfig {
    /// Validate the configuration and return a report of warnings and errors.
    pub fn validate(&self) -> ConfigReport {
        validate(self)
    }

    /// Defaults < TOML file (optional) < `CRONPROXY__*` environment < overrides.
    pub fn load(file_name: &str, overrides: &ConfigOverrides) -> Result<Self, ConfigError> {
        Self::load_with_env(file_name, overrides, None)
    }

    fn load_with_env(
        file_name: &str,
        overrides: &ConfigOverrides,
        env: Option<Map<String, String>>,
    ) -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .add_source(File::new(file_name, FileFormat::Toml).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator(ENV_SEPARATOR)
                    .try_parsing(true)
                    .source(env),
            );

        if let Some(port) = overrides.port {
            builder = builder.set_override("server.listen", format!("0.0.0.0:{port}"))?;
        }
        builder = builder.set_override_option("proxy.max_body_size", overrides.max_body_size)?;
        if overrides.suppress_headers {
            builder = builder.set_override("server.suppress_headers", true)?;
        }
        if overrides.debug {
            builder = builder.set_override("log.debug", true)?;
        }
        if overrides.no_colors {
            builder = builder.set_override("log.no_colors", true)?;
        }

        builder.build()?.try_deserialize()
    }

    /// Dumps the effective options at debug level.
    pub fn log_summary(&self) {
        debug!(
            target: "cronproxy::config",
            listen = %self.server.listen,
            max_connections = self.server.max_connections,
            shutdown_grace_secs = self.server.shutdown_grace_secs,
            suppress_headers = self.server.suppress_headers,
            "[server]"
        );
        debug!(
            target: "cronproxy::config",
            connect_secs = self.timeout.connect_secs,
            read_secs = self.timeout.read_secs,
            write_secs = self.timeout.write_secs,
            idle_secs = self.timeout.idle_secs,
            upstream_secs = self.timeout.upstream_secs,
            "[timeout]"
        );
        debug!(
            target: "cronproxy::config",
            max_body_size = self.proxy.max_body_size,
            max_request_headers_bytes = self.proxy.max_request_headers_bytes,
            "[proxy]"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigOverrides, CronproxyConfig};
    use config::Map;
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .expect("temp file");
        file.write_all(contents.as_bytes()).expect("write config");
        file
    }

    fn env(pairs: &[(&str, &str)]) -> Option<Map<String, String>> {
        Some(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn missing_file_yields_defaults() {
        let cfg = CronproxyConfig::load_with_env(
            "/nonexistent/cronproxy.toml",
            &ConfigOverrides::default(),
            env(&[]),
        )
        .expect("expected defaults");
        assert_eq!(cfg.server.listen, "0.0.0.0:8080");
        assert_eq!(cfg.proxy.max_body_size, 1_048_576);
        assert_eq!(cfg.timeout.upstream_secs, 10);
        assert_eq!(cfg.timeout.idle_secs, 15);
        assert!(!cfg.server.suppress_headers);
    }

    #[test]
    fn file_values_override_defaults() {
        let file = write_config(
            "[server]\nlisten = \"127.0.0.1:9000\"\n\n[proxy]\nmax_body_size = 100\n",
        );
        let path = file.path().to_str().expect("utf-8 path");
        let cfg = CronproxyConfig::load_with_env(path, &ConfigOverrides::default(), env(&[]))
            .expect("expected config");
        assert_eq!(cfg.server.listen, "127.0.0.1:9000");
        assert_eq!(cfg.proxy.max_body_size, 100);
        assert_eq!(cfg.server.max_connections, 1024);
    }

    #[test]
    fn env_overrides_file_and_cli_overrides_env() {
        let file = write_config("[proxy]\nmax_body_size = 100\n");
        let path = file.path().to_str().expect("utf-8 path");
        let vars = env(&[
            ("CRONPROXY__PROXY__MAX_BODY_SIZE", "200"),
            ("CRONPROXY__TIMEOUT__READ_SECS", "3"),
        ]);

        let cfg = CronproxyConfig::load_with_env(path, &ConfigOverrides::default(), vars.clone())
            .expect("expected config");
        assert_eq!(cfg.proxy.max_body_size, 200);
        assert_eq!(cfg.timeout.read_secs, 3);

        let overrides = ConfigOverrides {
            port: Some(9999),
            max_body_size: Some(300),
            suppress_headers: true,
            debug: true,
            no_colors: false,
        };
        let cfg = CronproxyConfig::load_with_env(path, &overrides, vars).expect("expected config");
        assert_eq!(cfg.proxy.max_body_size, 300);
        assert_eq!(cfg.server.listen, "0.0.0.0:9999");
        assert!(cfg.server.suppress_headers);
        assert!(cfg.log.debug);
        assert!(!cfg.log.no_colors);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let file = write_config("[proxy]\nmax_body_size = \"lots\"\n");
        let path = file.path().to_str().expect("utf-8 path");
        assert!(CronproxyConfig::load_with_env(path, &ConfigOverrides::default(), env(&[])).is_err());
    }
}
