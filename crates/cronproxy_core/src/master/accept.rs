use std::{net::SocketAddr, sync::Arc, time::Duration};

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::task::TaskTracker;
use tracing::{Instrument, debug, error, info, instrument};

use crate::worker::{ConnContext, handle_connection};

pub(crate) async fn bind_listener(listen_addr: &str) -> anyhow::Result<TcpListener> {
    info!(
        target: "cronproxy::master",
        listen = %listen_addr,
        "Binding listener"
    );

    match TcpListener::bind(listen_addr).await {
        Ok(listener) => {
            info!(
                target: "cronproxy::master",
                listen = %listen_addr,
                "Bind() successful"
            );
            Ok(listener)
        }
        Err(e) => {
            error!(
                target: "cronproxy::master",
                listen = %listen_addr,
                error = ?e,
                "Failed to bind listener"
            );
            Err(e.into())
        }
    }
}

struct AcceptedConn {
    stream: TcpStream,
    addr: SocketAddr,
    permit: OwnedSemaphorePermit,
}

/// Waits for a free connection slot, then for the next client.
async fn accept_with_permit(
    listener: &TcpListener,
    semaphore: &Arc<Semaphore>,
) -> anyhow::Result<AcceptedConn> {
    let permit = match semaphore.clone().acquire_owned().await {
        Ok(p) => p,
        Err(e) => {
            error!(
                target: "cronproxy::master",
                error = ?e,
                "Failed to acquire connection permit"
            );
            return Err(e.into());
        }
    };

    let (stream, addr) = match listener.accept().await {
        Ok(pair) => pair,
        Err(e) => {
            error!(
                target: "cronproxy::master",
                error = ?e,
                "Failed to accept connection"
            );
            return Err(e.into());
        }
    };

    debug!(
        target: "cronproxy::master",
        client_addr = %addr,
        available_permits = semaphore.available_permits(),
        "Connection accepted"
    );

    Ok(AcceptedConn {
        stream,
        addr,
        permit,
    })
}

/// Accepts until the shutdown token fires. Accept errors are logged and the
/// loop keeps going; they are usually transient (EMFILE, aborted handshakes).
#[instrument(skip_all)]
pub(crate) async fn accept_loop(
    listener: TcpListener,
    semaphore: Arc<Semaphore>,
    tracker: TaskTracker,
    ctx: ConnContext,
) -> anyhow::Result<()> {
    info!(target: "cronproxy::master", "accept_loop started");

    loop {
        let accepted = tokio::select! {
            _ = ctx.shutdown.cancelled() => {
                info!(target: "cronproxy::master", "Shutdown requested; no longer accepting");
                return Ok(());
            }
            res = accept_with_permit(&listener, &semaphore) => res,
        };

        let AcceptedConn { stream, addr, permit } = match accepted {
            Ok(conn) => conn,
            Err(_) => {
                // Avoid spinning while the process is out of file descriptors.
                tokio::time::sleep(Duration::from_millis(50)).await;
                continue;
            }
        };

        let ctx = ctx.clone();
        let span = tracing::info_span!("worker_connection", client_addr = %addr);

        tracker.spawn(
            async move {
                let _permit = permit;

                if let Err(e) = handle_connection(Box::new(stream), addr, ctx).await {
                    error!(
                        target: "cronproxy::worker",
                        client_addr = %addr,
                        error = ?e,
                        "Error while handling connection"
                    );
                }

                debug!(
                    target: "cronproxy::master",
                    client_addr = %addr,
                    "Permit released after connection closed"
                );
            }
            .instrument(span),
        );
    }
}
