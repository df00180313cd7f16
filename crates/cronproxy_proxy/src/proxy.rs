use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Local, TimeZone};
use cronproxy_cache::CacheManager;
use cronproxy_config::CronproxyConfig;
use cronproxy_schedule::{is_admitted, normalize};
use http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use tracing::{debug, enabled, info, instrument, warn, Level};

use crate::error::{FetchError, ProxyError};
use crate::headers::copy_headers;
use crate::upstream::UpstreamClient;

pub const NO_CACHED_RESPONSE: &str = "No cached response available";

/// Engine knobs, usually derived from [`CronproxyConfig`].
#[derive(Debug, Clone)]
pub struct ProxySettings {
    pub max_body_size: usize,
    pub upstream_timeout: Duration,
    pub connect_timeout: Duration,
}

impl Default for ProxySettings {
    fn default() -> Self {
        Self::from(&CronproxyConfig::default())
    }
}

impl From<&CronproxyConfig> for ProxySettings {
    fn from(cfg: &CronproxyConfig) -> Self {
        Self {
            max_body_size: usize::try_from(cfg.proxy.max_body_size).unwrap_or(usize::MAX),
            upstream_timeout: cfg.timeout.upstream(),
            connect_timeout: cfg.timeout.connect(),
        }
    }
}

/// Inbound request as the engine sees it. Missing query parameters are
/// empty strings.
#[derive(Debug, Clone)]
pub struct ProxyRequest {
    pub method: Method,
    /// Upstream URL, used verbatim as the cache key.
    pub endpoint: String,
    /// Raw schedule expression, underscores not yet replaced.
    pub crontab: String,
}

impl ProxyRequest {
    pub fn new(method: Method, endpoint: impl Into<String>, crontab: impl Into<String>) -> Self {
        Self {
            method,
            endpoint: endpoint.into(),
            crontab: crontab.into(),
        }
    }

    pub fn get(endpoint: impl Into<String>, crontab: impl Into<String>) -> Self {
        Self::new(Method::GET, endpoint, crontab)
    }
}

#[derive(Debug, Clone)]
pub struct ProxyResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl ProxyResponse {
    /// 200 with `headers` appended onto an empty map.
    fn ok(headers: &HeaderMap, body: Bytes) -> Self {
        let mut out = HeaderMap::new();
        copy_headers(&mut out, headers);
        Self {
            status: StatusCode::OK,
            headers: out,
            body,
        }
    }

    /// Plain-text error body, newline terminated.
    pub fn text(status: StatusCode, message: &str) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        headers.insert(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        );
        Self {
            status,
            headers,
            body: Bytes::from(format!("{message}\n")),
        }
    }

    fn from_error(err: &ProxyError) -> Self {
        Self::text(err.status(), &err.to_string())
    }
}

/// =======================================================
/// PROXY STATE
/// =======================================================
///
/// Owns the response cache and the upstream client. Shared between
/// connection workers behind an `Arc<Proxy>`; every instance has its own
/// cache.
#[derive(Debug)]
pub struct Proxy {
    cache: CacheManager,
    upstream: UpstreamClient,
    settings: ProxySettings,
}

impl Proxy {
    pub fn new(settings: ProxySettings) -> Result<Self, FetchError> {
        let upstream = UpstreamClient::new(settings.upstream_timeout, settings.connect_timeout)?;
        Ok(Self {
            cache: CacheManager::new(),
            upstream,
            settings,
        })
    }

    pub fn from_config(cfg: &CronproxyConfig) -> Result<Self, FetchError> {
        Self::new(ProxySettings::from(cfg))
    }

    pub fn cache(&self) -> &CacheManager {
        &self.cache
    }

    /// Serves one request against the local clock.
    pub async fn handle(&self, req: &ProxyRequest) -> ProxyResponse {
        self.handle_at(req, &Local::now()).await
    }

    /// Serves one request as if it arrived at `now`.
    ///
    /// - non-GET → 405
    /// - crontab does not parse → 500
    /// - next run within a minute → fetch, cache, 200 (upstream status is
    ///   not passed through)
    /// - otherwise → cached copy (200) or 404
    #[instrument(
        skip(self, req, now),
        fields(method = %req.method, endpoint = %req.endpoint)
    )]
    pub async fn handle_at<Tz: TimeZone>(
        &self,
        req: &ProxyRequest,
        now: &DateTime<Tz>,
    ) -> ProxyResponse {
        match self.try_handle(req, now).await {
            Ok(resp) => resp,
            Err(err) => {
                warn!(
                    target: "cronproxy::proxy",
                    status = %err.status(),
                    error = %err,
                    "Request failed"
                );
                ProxyResponse::from_error(&err)
            }
        }
    }

    async fn try_handle<Tz: TimeZone>(
        &self,
        req: &ProxyRequest,
        now: &DateTime<Tz>,
    ) -> Result<ProxyResponse, ProxyError> {
        if req.method != Method::GET {
            return Err(ProxyError::MethodNotAllowed);
        }

        let crontab = normalize(&req.crontab);
        if is_admitted(&crontab, now)? {
            self.fetch_and_store(&req.endpoint).await
        } else {
            Ok(self.serve_cached(&req.endpoint))
        }
    }

    async fn fetch_and_store(&self, endpoint: &str) -> Result<ProxyResponse, ProxyError> {
        let fetched = self
            .upstream
            .fetch(endpoint, self.settings.max_body_size)
            .await?;

        let replaced = self
            .cache
            .store(endpoint, fetched.headers.clone(), fetched.body.clone());

        info!(
            target: "cronproxy::proxy",
            upstream_status = %fetched.status,
            body_len = fetched.body.len(),
            truncated = fetched.truncated,
            replaced,
            "Fetched upstream response"
        );
        log_body("non-cached", endpoint, &fetched.body);

        Ok(ProxyResponse::ok(&fetched.headers, fetched.body))
    }

    fn serve_cached(&self, endpoint: &str) -> ProxyResponse {
        let Some(entry) = self.cache.get(endpoint) else {
            debug!(target: "cronproxy::proxy", "Cache miss outside admission window");
            return ProxyResponse::text(StatusCode::NOT_FOUND, NO_CACHED_RESPONSE);
        };

        debug!(
            target: "cronproxy::proxy",
            age_secs = entry.age_secs(),
            body_len = entry.body.len(),
            "Cache hit"
        );
        log_body("cached", endpoint, &entry.body);

        ProxyResponse::ok(&entry.headers, entry.body)
    }
}

fn log_body(kind: &str, endpoint: &str, body: &[u8]) {
    if enabled!(target: "cronproxy::proxy", Level::DEBUG) {
        let flat = String::from_utf8_lossy(body).replace('\n', " ");
        debug!(target: "cronproxy::proxy", "{kind} response from {endpoint}: {flat}");
    }
}
