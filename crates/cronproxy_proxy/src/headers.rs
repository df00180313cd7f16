use http::HeaderMap;

/// Appends every value of every header in `src` to `dst`.
///
/// Existing values in `dst` are kept: a name present on both sides ends up
/// multi-valued, with the `dst` values first.
pub fn copy_headers(dst: &mut HeaderMap, src: &HeaderMap) {
    for (name, value) in src.iter() {
        dst.append(name.clone(), value.clone());
    }
}
