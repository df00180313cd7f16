use bytes::BytesMut;
use cronproxy_config::CronproxyConfig;
use cronproxy_http::responses::{send_400, send_408, send_431};
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use tokio::io::AsyncReadExt;
use tokio::time::{Duration, timeout};
use tracing::{debug, instrument, warn};

use super::ClientStream;

const MAX_HEADERS: usize = 64;

/// Request line and headers of one client request.
/// The body (if any) is never read; `has_body` tells the worker to close
/// the connection after answering.
#[derive(Debug)]
pub(crate) struct ParsedRequest {
    pub(crate) method: Method,
    /// Request target as sent (path + query).
    pub(crate) target: String,
    pub(crate) headers: HeaderMap,
    pub(crate) has_body: bool,
    pub(crate) close_after: bool,
    /// Bytes of `buf` taken by the request head.
    pub(crate) head_len: usize,
}

#[derive(Debug)]
pub(crate) enum HeadError {
    TooManyHeaders,
    Malformed(String),
}

/// Reads one request head from `stream`. `Ok(None)` means the connection
/// should be closed: the peer went away, stayed idle, or was sent a
/// protocol error already.
#[instrument(skip(stream, buf, cfg), fields(buffered = buf.len()))]
pub(crate) async fn read_http_request(
    stream: &mut dyn ClientStream,
    buf: &mut BytesMut,
    cfg: &CronproxyConfig,
    idle_timeout: Duration,
) -> anyhow::Result<Option<ParsedRequest>> {
    let read_timeout = cfg.timeout.read();
    let max_headers = usize::try_from(cfg.proxy.max_request_headers_bytes).unwrap_or(usize::MAX);

    loop {
        if !buf.is_empty() {
            match parse_head(&buf[..]) {
                Ok(Some(req)) if max_headers > 0 && req.head_len > max_headers => {
                    send_431(stream).await?;
                    return Ok(None);
                }
                Ok(Some(req)) => {
                    debug!(
                        target: "cronproxy::http",
                        method = %req.method,
                        target = %req.target,
                        head_len = req.head_len,
                        "Parsed HTTP request head"
                    );
                    return Ok(Some(req));
                }
                Ok(None) => {}
                Err(HeadError::TooManyHeaders) => {
                    send_431(stream).await?;
                    return Ok(None);
                }
                Err(HeadError::Malformed(reason)) => {
                    warn!(
                        target: "cronproxy::http",
                        %reason,
                        "Invalid request head"
                    );
                    send_400(stream).await?;
                    return Ok(None);
                }
            }
        }

        if max_headers > 0 && buf.len() > max_headers {
            send_431(stream).await?;
            return Ok(None);
        }

        // Idle wait before the first byte, read timeout once a request started.
        let wait = if buf.is_empty() { idle_timeout } else { read_timeout };
        let mut chunk = [0u8; 4096];
        match timeout(wait, stream.read(&mut chunk)).await {
            Ok(Ok(0)) => return Ok(None),
            Ok(Ok(n)) => buf.extend_from_slice(&chunk[..n]),
            Ok(Err(e)) => return Err(e.into()),
            Err(_) if buf.is_empty() => return Ok(None),
            Err(_) => {
                debug!(
                    target: "cronproxy::http",
                    buffered = buf.len(),
                    "Client stalled mid-request"
                );
                send_408(stream).await?;
                return Ok(None);
            }
        }
    }
}

/// Parses the head at the start of `buf`. `Ok(None)` while incomplete.
pub(crate) fn parse_head(buf: &[u8]) -> Result<Option<ParsedRequest>, HeadError> {
    let mut slots = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut req = httparse::Request::new(&mut slots);

    let head_len = match req.parse(buf) {
        Ok(httparse::Status::Complete(n)) => n,
        Ok(httparse::Status::Partial) => return Ok(None),
        Err(httparse::Error::TooManyHeaders) => return Err(HeadError::TooManyHeaders),
        Err(e) => return Err(HeadError::Malformed(e.to_string())),
    };

    let method = req.method.unwrap_or("GET");
    let method = Method::from_bytes(method.as_bytes())
        .map_err(|_| HeadError::Malformed(format!("invalid method {method:?}")))?;
    let target = req.path.unwrap_or("/").to_string();
    let http_10 = req.version == Some(0);

    let mut headers = HeaderMap::with_capacity(req.headers.len());
    for h in req.headers.iter() {
        let name = HeaderName::from_bytes(h.name.as_bytes())
            .map_err(|_| HeadError::Malformed(format!("invalid header name {:?}", h.name)))?;
        let value = HeaderValue::from_bytes(h.value)
            .map_err(|_| HeadError::Malformed(format!("invalid value for {:?}", h.name)))?;
        headers.append(name, value);
    }

    let content_length = content_length(&headers)?;
    let is_chunked = has_token(&headers, http::header::TRANSFER_ENCODING, "chunked");
    let close = has_token(&headers, http::header::CONNECTION, "close");
    let keep_alive = has_token(&headers, http::header::CONNECTION, "keep-alive");

    let close_after = if http_10 { !keep_alive || close } else { close };

    Ok(Some(ParsedRequest {
        method,
        target,
        headers,
        has_body: is_chunked || content_length > 0,
        close_after,
        head_len,
    }))
}

/// Every Content-Length value must agree; "5, 5" is accepted.
fn content_length(headers: &HeaderMap) -> Result<usize, HeadError> {
    let mut value: Option<usize> = None;
    for raw in headers.get_all(http::header::CONTENT_LENGTH) {
        let raw = raw
            .to_str()
            .map_err(|_| HeadError::Malformed("invalid Content-Length".into()))?;
        for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let len = part
                .parse::<usize>()
                .map_err(|_| HeadError::Malformed(format!("invalid Content-Length {part:?}")))?;
            match value {
                Some(prev) if prev != len => {
                    return Err(HeadError::Malformed("conflicting Content-Length".into()));
                }
                _ => value = Some(len),
            }
        }
    }
    Ok(value.unwrap_or(0))
}

fn has_token(headers: &HeaderMap, name: HeaderName, token: &str) -> bool {
    headers
        .get_all(name)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(|t| t.trim().trim_matches(|c| c == '"' || c == '\''))
        .any(|t| t.eq_ignore_ascii_case(token))
}

#[cfg(test)]
mod tests {
    use super::{HeadError, parse_head};

    fn parse(raw: &str) -> super::ParsedRequest {
        parse_head(raw.as_bytes())
            .expect("expected ok")
            .expect("expected complete head")
    }

    #[test]
    fn parse_head_extracts_request_line_and_headers() {
        let raw = "GET /?endpoint=http%3A%2F%2Fa&crontab=*_*_*_*_* HTTP/1.1\r\nHost: example\r\nX-Forwarded-For: 10.0.0.1\r\n\r\n";
        let req = parse(raw);
        assert_eq!(req.method, http::Method::GET);
        assert_eq!(req.target, "/?endpoint=http%3A%2F%2Fa&crontab=*_*_*_*_*");
        assert_eq!(req.headers["host"], "example");
        assert_eq!(req.head_len, raw.len());
        assert!(!req.has_body);
        assert!(!req.close_after);
    }

    #[test]
    fn parse_head_waits_for_complete_head() {
        let partial = parse_head(b"GET / HTTP/1.1\r\nHost: exa").expect("expected ok");
        assert!(partial.is_none());
    }

    #[test]
    fn parse_head_leaves_pipelined_bytes() {
        let raw = "GET /a HTTP/1.1\r\n\r\nGET /b HTTP/1.1\r\n\r\n";
        let req = parse(raw);
        assert_eq!(req.target, "/a");
        assert_eq!(req.head_len, "GET /a HTTP/1.1\r\n\r\n".len());
    }

    #[test]
    fn parse_head_accepts_duplicate_content_length() {
        let req = parse("POST / HTTP/1.1\r\nContent-Length: 5\r\nContent-Length: 5\r\n\r\n");
        assert!(req.has_body);
    }

    #[test]
    fn parse_head_rejects_conflicting_content_length() {
        let err = parse_head(b"POST / HTTP/1.1\r\nContent-Length: 5\r\nContent-Length: 6\r\n\r\n")
            .unwrap_err();
        assert!(matches!(err, HeadError::Malformed(_)));
        let err = parse_head(b"POST / HTTP/1.1\r\nContent-Length: nope\r\n\r\n").unwrap_err();
        assert!(matches!(err, HeadError::Malformed(_)));
    }

    #[test]
    fn parse_head_detects_chunked_and_connection_tokens() {
        let req = parse("POST / HTTP/1.1\r\nTransfer-Encoding: gzip, \"chunked\"\r\n\r\n");
        assert!(req.has_body);

        let req = parse("GET / HTTP/1.1\r\nConnection: \"keep-alive\", close\r\n\r\n");
        assert!(req.close_after);
    }

    #[test]
    fn parse_head_http_10_closes_unless_keep_alive() {
        assert!(parse("GET / HTTP/1.0\r\n\r\n").close_after);
        assert!(!parse("GET / HTTP/1.0\r\nConnection: keep-alive\r\n\r\n").close_after);
    }

    #[test]
    fn parse_head_rejects_garbage() {
        let err = parse_head(b"\x01\x02 nonsense\r\n\r\n").unwrap_err();
        assert!(matches!(err, HeadError::Malformed(_)));
    }

    #[test]
    fn parse_head_reports_too_many_headers() {
        let mut raw = String::from("GET / HTTP/1.1\r\n");
        for i in 0..100 {
            raw.push_str(&format!("X-H{i}: v\r\n"));
        }
        raw.push_str("\r\n");
        let err = parse_head(raw.as_bytes()).unwrap_err();
        assert!(matches!(err, HeadError::TooManyHeaders));
    }
}
