//! Cache-or-fetch engine.
//!
//! For every request the schedule gate decides between a live upstream
//! fetch (which refreshes the cache) and the last cached response for the
//! same endpoint.

mod error;
mod headers;
mod proxy;
mod upstream;

pub use error::{FetchError, ProxyError};
pub use headers::copy_headers;
pub use proxy::{Proxy, ProxyRequest, ProxyResponse, ProxySettings, NO_CACHED_RESPONSE};
pub use upstream::{FetchedResponse, UpstreamClient};
