use std::time::SystemTime;

use http::{header, HeaderMap, HeaderName, StatusCode};
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// Headers owned by the connection framing. Values carried in the
/// response header map are dropped in favour of the computed ones.
const FRAMING_HEADERS: [HeaderName; 4] = [
    header::CONTENT_LENGTH,
    header::TRANSFER_ENCODING,
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
];

/// Serializes the status line and headers of an HTTP/1.1 response.
pub fn render_head(
    status: StatusCode,
    headers: &HeaderMap,
    body_len: usize,
    keep_alive: bool,
) -> Vec<u8> {
    let mut out = Vec::with_capacity(256);
    out.extend_from_slice(
        format!(
            "HTTP/1.1 {} {}\r\n",
            status.as_u16(),
            status.canonical_reason().unwrap_or("")
        )
        .as_bytes(),
    );

    if !headers.contains_key(header::DATE) {
        out.extend_from_slice(b"Date: ");
        out.extend_from_slice(httpdate::fmt_http_date(SystemTime::now()).as_bytes());
        out.extend_from_slice(b"\r\n");
    }

    for (name, value) in headers.iter() {
        if FRAMING_HEADERS.contains(name) {
            continue;
        }
        out.extend_from_slice(name.as_str().as_bytes());
        out.extend_from_slice(b": ");
        out.extend_from_slice(value.as_bytes());
        out.extend_from_slice(b"\r\n");
    }

    let connection = if keep_alive { "keep-alive" } else { "close" };
    out.extend_from_slice(
        format!("Content-Length: {body_len}\r\nConnection: {connection}\r\n\r\n").as_bytes(),
    );
    out
}

/// Writes a full response (head + body) and flushes.
pub async fn send_response<S>(
    stream: &mut S,
    status: StatusCode,
    headers: &HeaderMap,
    body: &[u8],
    keep_alive: bool,
) -> anyhow::Result<()>
where
    S: AsyncWrite + Unpin + ?Sized,
{
    let head = render_head(status, headers, body.len(), keep_alive);
    stream.write_all(&head).await?;
    stream.write_all(body).await?;
    stream.flush().await?;
    Ok(())
}

/// Plain-text protocol errors. Always closes the connection.
async fn send_text_response<S>(
    stream: &mut S,
    status: StatusCode,
    body: &str,
) -> anyhow::Result<()>
where
    S: AsyncWrite + Unpin + ?Sized,
{
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    send_response(stream, status, &headers, body.as_bytes(), false).await
}

pub async fn send_400<S>(stream: &mut S) -> anyhow::Result<()>
where
    S: AsyncWrite + Unpin + ?Sized,
{
    send_text_response(stream, StatusCode::BAD_REQUEST, "400 Bad Request\n").await
}

pub async fn send_408<S>(stream: &mut S) -> anyhow::Result<()>
where
    S: AsyncWrite + Unpin + ?Sized,
{
    send_text_response(stream, StatusCode::REQUEST_TIMEOUT, "408 Request Timeout\n").await
}

pub async fn send_431<S>(stream: &mut S) -> anyhow::Result<()>
where
    S: AsyncWrite + Unpin + ?Sized,
{
    send_text_response(
        stream,
        StatusCode::REQUEST_HEADER_FIELDS_TOO_LARGE,
        "431 Request Header Fields Too Large\n",
    )
    .await
}
