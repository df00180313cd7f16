use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::info;

use super::Master;

impl Master {
    pub(super) fn log_startup(&self) {
        info!(
            target: "cronproxy::master",
            version = env!("CARGO_PKG_VERSION"),
            "Starting cronproxy"
        );
        self.cfg.log_summary();
    }

    pub(super) fn init_semaphore(&self) -> Arc<Semaphore> {
        let max_conns = self.cfg.server.max_connections().max(1);
        let semaphore = Arc::new(Semaphore::new(max_conns));
        info!(
            target: "cronproxy::master",
            max_conns,
            "Connection semaphore initialized"
        );
        semaphore
    }
}
