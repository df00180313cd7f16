/// Raw `endpoint` string as supplied by the caller. Not normalized:
/// `http://a/x` and `http://a/x/` are different keys.
#[derive(Hash, Eq, PartialEq, Debug, Clone)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(endpoint: &str) -> Self {
        Self(endpoint.to_string())
    }
}
