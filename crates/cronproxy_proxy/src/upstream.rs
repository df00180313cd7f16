use std::time::Duration;

use bytes::{Bytes, BytesMut};
use http::{HeaderMap, StatusCode};
use tracing::{debug, instrument};

use crate::error::FetchError;

/// Response read from the upstream endpoint, body already capped.
#[derive(Debug)]
pub struct FetchedResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub truncated: bool,
}

/// HTTP client used for the admitted-branch fetch.
///
/// The timeout covers connect, headers and body, and is independent of
/// the server's own client timeouts.
/// Body accumulator that keeps at most `cap` bytes. A full buffer keeps
/// reading until the next non-empty chunk proves there was more.
#[derive(Debug)]
struct CappedBody {
    buf: BytesMut,
    cap: usize,
    truncated: bool,
}

impl CappedBody {
    fn new(cap: usize, hint: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(hint.min(cap)),
            cap,
            truncated: false,
        }
    }

    /// Appends what fits of `chunk`. Returns false once reading can stop.
    fn push(&mut self, chunk: &[u8]) -> bool {
        let remaining = self.cap - self.buf.len();
        if chunk.len() > remaining {
            self.buf.extend_from_slice(&chunk[..remaining]);
            self.truncated = true;
            return false;
        }
        self.buf.extend_from_slice(chunk);
        true
    }
}

#[derive(Debug, Clone)]
pub struct UpstreamClient {
    client: reqwest::Client,
}

impl UpstreamClient {
    pub fn new(timeout: Duration, connect_timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(connect_timeout)
            .user_agent(concat!("cronproxy/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }

    /// GETs `endpoint` and reads at most `max_body` bytes of the body.
    /// Anything past the cap is dropped without error.
    #[instrument(skip(self), fields(upstream = %endpoint))]
    pub async fn fetch(
        &self,
        endpoint: &str,
        max_body: usize,
    ) -> Result<FetchedResponse, FetchError> {
        let mut resp = self
            .client
            .get(endpoint)
            .send()
            .await
            .map_err(|e| FetchError::request(endpoint, &e))?;

        let status = resp.status();
        let headers = resp.headers().clone();

        let hint = resp
            .content_length()
            .and_then(|n| usize::try_from(n).ok())
            .unwrap_or(max_body);
        let mut body = CappedBody::new(max_body, hint);

        while let Some(chunk) = resp
            .chunk()
            .await
            .map_err(|e| FetchError::body(endpoint, &e))?
        {
            if !body.push(&chunk) {
                break;
            }
        }
        let CappedBody { buf: body, truncated, .. } = body;

        debug!(
            target: "cronproxy::proxy",
            status = %status,
            body_len = body.len(),
            truncated,
            "Upstream response read"
        );

        Ok(FetchedResponse {
            status,
            headers,
            body: body.freeze(),
            truncated,
        })
    }
}
