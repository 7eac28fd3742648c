//! Request target normalization.
//!
//! A knock token is the request path with the query and fragment removed
//! and one trailing `/` stripped. Targets that cannot be reduced to a path
//! become the empty token, which no configured sequence contains.

use reqwest::Url;

/// Reduce a request target to its knock token.
pub fn normalize_path(target: &str) -> String {
    let path = if target.starts_with('/') {
        target
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .to_string()
    } else {
        // Absolute-form target (proxy-style request line).
        match Url::parse(target) {
            Ok(url) if url.has_host() => raw_path(target).to_string(),
            _ => return String::new(),
        }
    };

    match path.strip_suffix('/') {
        Some(stripped) => stripped.to_string(),
        None => path,
    }
}

/// Path of an absolute-form target exactly as sent, without dot-segment
/// resolution or re-encoding.
fn raw_path(target: &str) -> &str {
    let rest = target.split_once(':').map_or("", |(_, rest)| rest);
    let rest = rest.trim_start_matches('/');
    let rest = &rest[..rest.find(['?', '#']).unwrap_or(rest.len())];
    match rest.find('/') {
        Some(start) => &rest[start..],
        None => "",
    }
}
