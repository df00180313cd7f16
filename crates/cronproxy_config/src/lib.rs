mod cronproxy;
mod log;
mod proxy;
mod server;
mod timeout;
mod validation;

pub use cronproxy::{ConfigOverrides, CronproxyConfig};
pub use log::LogConfig;
pub use proxy::ProxyConfig;
pub use server::ServerConfig;
pub use timeout::TimeoutConfig;
pub use validation::{validate, ConfigReport};
