use clap::Parser;
use cronproxy_config::{ConfigOverrides, CronproxyConfig};
use cronproxy_core::Master;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use utils::init_tracing;

/// Caching HTTP proxy that refreshes an endpoint only around its cron schedule.
#[derive(Debug, Parser)]
#[command(name = "cronproxy", version, about)]
struct Args {
    /// TOML config file; a missing file means defaults.
    #[arg(short = 'c', long = "config", default_value = "cronproxy.toml")]
    config: String,

    /// Listen on 0.0.0.0:<PORT>.
    #[arg(long)]
    port: Option<u16>,

    /// Maximum upstream body size kept, in bytes.
    #[arg(long = "max-size")]
    max_size: Option<u64>,

    /// Do not send App-Name / App-Version / Author headers.
    #[arg(long)]
    suppress_headers: bool,

    /// Debug logging with source locations.
    #[arg(long = "dbg")]
    debug: bool,

    #[arg(long)]
    no_colors: bool,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            port: self.port,
            max_body_size: self.max_size,
            suppress_headers: self.suppress_headers,
            debug: self.debug,
            no_colors: self.no_colors,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    println!("cronproxy {}", env!("CARGO_PKG_VERSION"));

    let cfg = match CronproxyConfig::load(&args.config, &args.overrides()) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Error reading {}: {e}", args.config);
            std::process::exit(1);
        }
    };
    init_tracing(cfg.log.debug, cfg.log.no_colors);

    let report = cfg.validate();
    for warning in report.warnings() {
        warn!(target: "cronproxy::config", "{warning}");
    }
    if report.has_errors() {
        for err in report.errors() {
            error!(target: "cronproxy::config", "{err}");
        }
        anyhow::bail!("invalid configuration in {}", args.config);
    }

    let shutdown = CancellationToken::new();
    tokio::spawn(wait_for_signal(shutdown.clone()));

    let master = Master::new(cfg)?;
    master.run(shutdown).await?;

    info!(target: "cronproxy::master", "Bye");
    Ok(())
}

/// Cancels `token` on Ctrl-C or SIGTERM.
async fn wait_for_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(target: "cronproxy::master", error = ?e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(target: "cronproxy::master", error = ?e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!(target: "cronproxy::master", "Interrupt received; shutting down"),
        _ = terminate => info!(target: "cronproxy::master", "SIGTERM received; shutting down"),
    }
    token.cancel();
}
