use http::HeaderMap;
use http::header::HeaderName;

/// Joins every line of a repeated header into one comma-separated list.
///
/// Lines that are not valid visible ASCII are skipped. Returns `None` when no
/// usable line is present.
pub(crate) fn joined(headers: &HeaderMap, name: HeaderName) -> Option<String> {
    let values: Vec<&str> = headers
        .get_all(name)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .collect();
    (!values.is_empty()).then(|| values.join(", "))
}
