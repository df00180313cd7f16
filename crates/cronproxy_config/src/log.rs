use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Debug level plus file/line of each event.
    pub debug: bool,
    pub no_colors: bool,
}
