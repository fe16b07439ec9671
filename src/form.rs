//! Form field helpers
//!
//! HTML forms submit everything as strings; these turn them into the typed
//! values the handlers work with.

/// A checkbox-style flag: absent, empty and "0" are false
pub fn flag(value: Option<&str>) -> bool {
    match value.map(str::trim) {
        None | Some("") | Some("0") => false,
        Some(_) => true,
    }
}

/// A non-negative offset; anything unparseable or negative is 0
pub fn offset(value: Option<&str>) -> u64 {
    value
        .map(str::trim)
        .and_then(|v| v.parse::<i64>().ok())
        .map(|v| v.max(0) as u64)
        .unwrap_or(0)
}

/// Empty strings count as absent
pub fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
