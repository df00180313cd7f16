//! Host-level request handling that wraps the proxy engine: client address
//! resolution, `/ping`, the app-info headers and panic containment.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use bytes::Bytes;
use cronproxy_proxy::{copy_headers, Proxy, ProxyRequest, ProxyResponse};
use http::{HeaderMap, HeaderValue, Method, StatusCode, header};
use tracing::error;

pub const APP_NAME: &str = "cronproxy";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");
pub const APP_AUTHOR: &str = "cronproxy";

/// Client address as reported by a fronting proxy, falling back to the peer.
pub(crate) fn real_ip(headers: &HeaderMap, peer: SocketAddr) -> IpAddr {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|v| v.trim().parse::<IpAddr>().ok());
    if let Some(ip) = forwarded {
        return ip;
    }

    headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<IpAddr>().ok())
        .unwrap_or_else(|| peer.ip())
}

/// Liveness probe: any GET whose path ends in `/ping`.
pub(crate) fn is_ping(method: &Method, path: &str) -> bool {
    *method == Method::GET && path.to_ascii_lowercase().ends_with("/ping")
}

pub(crate) fn pong() -> ProxyResponse {
    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/plain"));
    ProxyResponse {
        status: StatusCode::OK,
        headers,
        body: Bytes::from_static(b"pong"),
    }
}

fn app_info_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert("app-name", HeaderValue::from_static(APP_NAME));
    headers.insert("app-version", HeaderValue::from_static(APP_VERSION));
    headers.insert("author", HeaderValue::from_static(APP_AUTHOR));
    headers
}

/// Final header set sent to the client: app-info headers first (unless
/// suppressed), then the response's own headers appended.
pub(crate) fn with_app_info(resp: ProxyResponse, suppress: bool) -> ProxyResponse {
    if suppress {
        return resp;
    }
    let mut headers = app_info_headers();
    copy_headers(&mut headers, &resp.headers);
    ProxyResponse { headers, ..resp }
}

/// Runs the engine on its own task so a panic turns into a 500 instead of
/// tearing down the connection.
pub(crate) async fn call_engine(proxy: Arc<Proxy>, req: ProxyRequest) -> ProxyResponse {
    recover(async move { proxy.handle(&req).await }).await
}

async fn recover<F>(fut: F) -> ProxyResponse
where
    F: Future<Output = ProxyResponse> + Send + 'static,
{
    match tokio::spawn(fut).await {
        Ok(resp) => resp,
        Err(join_err) => {
            error!(
                target: "cronproxy::worker",
                error = %join_err,
                "Request handler panicked"
            );
            ProxyResponse::text(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
        }
    }
}
