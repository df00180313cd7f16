//! Request-target splitting and query parameter lookup.

use url::form_urlencoded;

/// Splits a request target into its path and raw query.
pub(crate) fn split_target(target: &str) -> (&str, &str) {
    match target.split_once('?') {
        Some((path, query)) => (path, query),
        None => (target, ""),
    }
}

/// First decoded value of `key` in `query`, or an empty string.
pub(crate) fn query_param(query: &str, key: &str) -> String {
    form_urlencoded::parse(query.as_bytes())
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
        .unwrap_or_default()
}
