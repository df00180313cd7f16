use std::sync::Arc;

use cronproxy_config::CronproxyConfig;
use cronproxy_proxy::Proxy;
use tokio::net::TcpListener;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{info, instrument, warn};

use crate::worker::ConnContext;

mod accept;
mod startup;

use accept::{accept_loop, bind_listener};

/// Owns the listening socket and the shared proxy engine.
pub struct Master {
    cfg: Arc<CronproxyConfig>,
    proxy: Arc<Proxy>,
}

impl Master {
    pub fn new(cfg: CronproxyConfig) -> anyhow::Result<Self> {
        let proxy = Arc::new(Proxy::from_config(&cfg)?);
        Ok(Self {
            cfg: Arc::new(cfg),
            proxy,
        })
    }

    pub fn proxy(&self) -> Arc<Proxy> {
        self.proxy.clone()
    }

    /// Binds the configured address and serves until `shutdown` fires.
    pub async fn run(self, shutdown: CancellationToken) -> anyhow::Result<()> {
        self.log_startup();
        let listener = bind_listener(self.cfg.server.listen()).await?;
        self.serve(listener, shutdown).await
    }

    /// Serves on an already bound listener. After `shutdown` fires no new
    /// connections are accepted and in-flight ones get the configured grace
    /// period to finish.
    #[instrument(skip_all, fields(
        listen = %self.cfg.server.listen(),
        max_connections = self.cfg.server.max_connections(),
    ))]
    pub async fn serve(
        self,
        listener: TcpListener,
        shutdown: CancellationToken,
    ) -> anyhow::Result<()> {
        let semaphore = self.init_semaphore();
        let tracker = TaskTracker::new();
        let ctx = ConnContext {
            proxy: self.proxy.clone(),
            cfg: self.cfg.clone(),
            shutdown: shutdown.clone(),
        };

        let result = accept_loop(listener, semaphore, tracker.clone(), ctx).await;

        tracker.close();
        let in_flight = tracker.len();
        if in_flight > 0 {
            info!(
                target: "cronproxy::master",
                in_flight,
                "Waiting for in-flight connections"
            );
        }

        let grace = self.cfg.server.shutdown_grace();
        if timeout(grace, tracker.wait()).await.is_err() {
            warn!(
                target: "cronproxy::master",
                remaining = tracker.len(),
                grace_secs = grace.as_secs(),
                "Shutdown grace period expired; dropping connections"
            );
        }

        info!(target: "cronproxy::master", "Server stopped");
        result
    }
}
