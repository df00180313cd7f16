//! Per-connection HTTP/1 handler.
//!
//! Reads client requests, answers `/ping` locally, hands everything else to
//! the proxy engine and writes the response while respecting keep-alive and
//! timeouts.

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::{Buf, BytesMut};
use cronproxy_config::CronproxyConfig;
use cronproxy_http::responses::send_response;
use cronproxy_proxy::{Proxy, ProxyRequest, ProxyResponse};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::time::{Instant, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

mod middleware;
mod query;
mod request;

pub use middleware::{APP_AUTHOR, APP_NAME, APP_VERSION};

use middleware::{call_engine, is_ping, pong, real_ip, with_app_info};
use query::{query_param, split_target};
use request::{ParsedRequest, read_http_request};

pub trait ClientStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T> ClientStream for T where T: AsyncRead + AsyncWrite + Unpin + Send {}

/// Shared state every connection worker needs.
#[derive(Clone)]
pub struct ConnContext {
    pub proxy: Arc<Proxy>,
    pub cfg: Arc<CronproxyConfig>,
    /// Stops the keep-alive loop between requests.
    pub shutdown: CancellationToken,
}

/// Entry point for a "logical worker" that handles a single connection.
#[instrument(skip(stream, ctx), fields(client = %client_addr))]
pub async fn handle_connection(
    mut stream: Box<dyn ClientStream>,
    client_addr: SocketAddr,
    ctx: ConnContext,
) -> anyhow::Result<()> {
    debug!(target: "cronproxy::worker", "Handling new client connection");

    let cfg = &ctx.cfg;
    let mut buf = BytesMut::new();
    let mut first_request = true;

    loop {
        let idle_timeout = if first_request {
            cfg.timeout.read()
        } else {
            cfg.timeout.idle()
        };

        let waiting_idle = buf.is_empty();
        let req = tokio::select! {
            res = read_http_request(&mut stream, &mut buf, cfg, idle_timeout) => match res? {
                Some(req) => req,
                None => break,
            },
            _ = ctx.shutdown.cancelled(), if waiting_idle => {
                debug!(target: "cronproxy::worker", "Shutdown requested; closing idle connection");
                break;
            }
        };
        buf.advance(req.head_len);

        let started = Instant::now();
        let client_ip = real_ip(&req.headers, client_addr);
        let resp = respond(&req, &ctx).await;

        // Request bodies are never read; close instead of draining them.
        let keep_alive = !req.close_after && !req.has_body && !ctx.shutdown.is_cancelled();

        match timeout(
            cfg.timeout.write(),
            send_response(&mut stream, resp.status, &resp.headers, &resp.body, keep_alive),
        )
        .await
        {
            Ok(res) => res?,
            Err(_) => {
                warn!(
                    target: "cronproxy::worker",
                    timeout_secs = cfg.timeout.write_secs,
                    "Timed out writing response"
                );
                break;
            }
        }

        info!(
            target: "cronproxy::access",
            %client_ip,
            method = %req.method,
            target = %req.target,
            status = resp.status.as_u16(),
            body_len = resp.body.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Request served"
        );

        if !keep_alive {
            break;
        }
        first_request = false;
    }

    debug!(target: "cronproxy::worker", "Connection closed");
    Ok(())
}

/// Builds the response for one request: ping short-circuit, otherwise the
/// proxy engine, then the app-info headers.
async fn respond(req: &ParsedRequest, ctx: &ConnContext) -> ProxyResponse {
    let (path, query) = split_target(&req.target);

    let resp = if is_ping(&req.method, path) {
        pong()
    } else {
        let proxy_req = ProxyRequest::new(
            req.method.clone(),
            query_param(query, "endpoint"),
            query_param(query, "crontab"),
        );
        call_engine(ctx.proxy.clone(), proxy_req).await
    };

    with_app_info(resp, ctx.cfg.server.suppress_headers())
}

#[cfg(test)]
mod tests {
    use super::{ConnContext, handle_connection};
    use cronproxy_config::CronproxyConfig;
    use cronproxy_proxy::Proxy;
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio_util::sync::CancellationToken;

    fn ctx(cfg: CronproxyConfig) -> ConnContext {
        ConnContext {
            proxy: Arc::new(Proxy::from_config(&cfg).expect("client builds")),
            cfg: Arc::new(cfg),
            shutdown: CancellationToken::new(),
        }
    }

    /// Writes `raw` on one end of an in-memory pipe, runs the worker on the
    /// other and returns everything it wrote back.
    async fn exchange(ctx: ConnContext, raw: &str) -> String {
        let (mut client, server) = tokio::io::duplex(64 * 1024);
        let worker = tokio::spawn(handle_connection(
            Box::new(server),
            "127.0.0.1:4000".parse().unwrap(),
            ctx,
        ));

        client.write_all(raw.as_bytes()).await.unwrap();
        let mut out = Vec::new();
        client.read_to_end(&mut out).await.unwrap();
        worker.await.unwrap().unwrap();
        String::from_utf8(out).unwrap()
    }

    #[tokio::test]
    async fn ping_answers_pong_with_app_info() {
        let out = exchange(
            ctx(CronproxyConfig::default()),
            "GET /ping HTTP/1.1\r\nHost: x\r\nConnection: close\r\n\r\n",
        )
        .await;

        assert!(out.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(out.contains("app-name: cronproxy\r\n"));
        assert!(out.contains("author: cronproxy\r\n"));
        assert!(out.contains("Connection: close\r\n"));
        assert!(out.ends_with("\r\n\r\npong"));
    }

    #[tokio::test]
    async fn suppressed_headers_are_not_sent() {
        let mut cfg = CronproxyConfig::default();
        cfg.server.suppress_headers = true;
        let out = exchange(ctx(cfg), "GET /ping HTTP/1.0\r\n\r\n").await;

        assert!(out.ends_with("pong"));
        assert!(!out.contains("app-name"));
    }

    #[tokio::test]
    async fn keep_alive_serves_pipelined_requests() {
        let out = exchange(
            ctx(CronproxyConfig::default()),
            "POST /?endpoint=x&crontab=* HTTP/1.1\r\n\r\nGET /?crontab=0_0_31_2_* HTTP/1.1\r\nConnection: close\r\n\r\n",
        )
        .await;

        let first = out.find("HTTP/1.1 405 Method Not Allowed\r\n").expect("405 first");
        let second = out.find("HTTP/1.1 404 Not Found\r\n").expect("404 second");
        assert!(first < second);
        assert!(out.contains("Method not allowed\n"));
        assert!(out.ends_with("No cached response available\n"));
    }

    #[tokio::test]
    async fn invalid_crontab_is_500() {
        let out = exchange(
            ctx(CronproxyConfig::default()),
            "GET /?endpoint=http%3A%2F%2F127.0.0.1%3A1&crontab=blah HTTP/1.1\r\nConnection: close\r\n\r\n",
        )
        .await;

        assert!(out.starts_with("HTTP/1.1 500 Internal Server Error\r\n"));
        assert!(out.contains("failed to parse crontab"));
    }

    #[tokio::test]
    async fn admitted_request_fetches_upstream() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/data")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body("{\"ok\":true}")
            .expect(1)
            .create_async()
            .await;

        let endpoint = format!("{}/data", server.url()).replace(':', "%3A").replace('/', "%2F");
        let raw = format!(
            "GET /?endpoint={endpoint}&crontab=*+*+*+*+* HTTP/1.1\r\nConnection: close\r\n\r\n"
        );
        let out = exchange(ctx(CronproxyConfig::default()), &raw).await;

        assert!(out.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(out.contains("content-type: application/json\r\n"));
        assert!(out.ends_with("{\"ok\":true}"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn request_with_body_closes_connection() {
        let out = exchange(
            ctx(CronproxyConfig::default()),
            "GET /ping HTTP/1.1\r\nContent-Length: 3\r\n\r\nabcGET /ping HTTP/1.1\r\n\r\n",
        )
        .await;

        assert_eq!(out.matches("HTTP/1.1 200 OK").count(), 1);
        assert!(out.contains("Connection: close\r\n"));
    }

    #[tokio::test]
    async fn malformed_request_is_400() {
        let out = exchange(ctx(CronproxyConfig::default()), "\x01 / HTTP/1.1\r\n\r\n").await;
        assert!(out.starts_with("HTTP/1.1 400 Bad Request\r\n"));
    }

    #[tokio::test]
    async fn oversized_head_is_431() {
        let mut cfg = CronproxyConfig::default();
        cfg.proxy.max_request_headers_bytes = 64;
        let raw = format!("GET /ping HTTP/1.1\r\nX-Pad: {}\r\n\r\n", "a".repeat(200));
        let out = exchange(ctx(cfg), &raw).await;
        assert!(out.starts_with("HTTP/1.1 431 Request Header Fields Too Large\r\n"));
    }

    #[tokio::test]
    async fn stalled_request_is_408() {
        let mut cfg = CronproxyConfig::default();
        cfg.timeout.read_secs = 1;
        let out = exchange(ctx(cfg), "GET /ping HTTP/1.1\r\nHost: ").await;
        assert!(out.starts_with("HTTP/1.1 408 Request Timeout\r\n"));
    }

    #[tokio::test]
    async fn shutdown_closes_idle_keep_alive_connection() {
        let ctx = ctx(CronproxyConfig::default());
        let token = ctx.shutdown.clone();
        let (mut client, server) = tokio::io::duplex(4096);
        let worker = tokio::spawn(handle_connection(
            Box::new(server),
            "127.0.0.1:4000".parse().unwrap(),
            ctx,
        ));

        client
            .write_all(b"GET /ping HTTP/1.1\r\n\r\n")
            .await
            .unwrap();
        let mut seen = String::new();
        let mut chunk = [0u8; 1024];
        while !seen.ends_with("pong") {
            let n = client.read(&mut chunk).await.unwrap();
            assert!(n > 0, "connection closed before the response");
            seen.push_str(&String::from_utf8_lossy(&chunk[..n]));
        }
        assert!(seen.contains("Connection: keep-alive\r\n"));

        token.cancel();
        worker.await.unwrap().unwrap();
        let mut rest = Vec::new();
        client.read_to_end(&mut rest).await.unwrap();
        assert!(rest.is_empty());
    }
}
