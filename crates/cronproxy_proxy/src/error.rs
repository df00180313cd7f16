use std::error::Error as StdError;

use cronproxy_schedule::ScheduleError;
use http::StatusCode;
use thiserror::Error;

/// Failure talking to the upstream endpoint.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("building upstream client: {0}")]
    Client(#[from] reqwest::Error),

    #[error("GET {endpoint:?}: {detail}")]
    Request { endpoint: String, detail: String },

    #[error("reading body from {endpoint:?}: {detail}")]
    Body { endpoint: String, detail: String },
}

impl FetchError {
    pub(crate) fn request(endpoint: &str, err: &reqwest::Error) -> Self {
        Self::Request {
            endpoint: endpoint.to_string(),
            detail: error_chain(err),
        }
    }

    pub(crate) fn body(endpoint: &str, err: &reqwest::Error) -> Self {
        Self::Body {
            endpoint: endpoint.to_string(),
            detail: error_chain(err),
        }
    }
}

/// Request-terminal failures of the engine. Each maps to one status code.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error(transparent)]
    Schedule(#[from] ScheduleError),

    #[error(transparent)]
    Fetch(#[from] FetchError),
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ProxyError::Schedule(_) | ProxyError::Fetch(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// reqwest's top-level message hides the cause ("error sending request"),
/// so the whole source chain is rendered.
fn error_chain(err: &reqwest::Error) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        out.push_str(": ");
        out.push_str(&cause.to_string());
        source = cause.source();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::ProxyError;
    use cronproxy_schedule::is_admitted;
    use http::StatusCode;

    #[test]
    fn status_mapping() {
        assert_eq!(
            ProxyError::MethodNotAllowed.status(),
            StatusCode::METHOD_NOT_ALLOWED
        );

        let parse = is_admitted("blah", &chrono::Utc::now()).unwrap_err();
        let err = ProxyError::from(parse);
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.to_string().contains("failed to parse crontab"));
    }
}
