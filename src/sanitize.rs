//! Scrubbing helpers: sensitive headers, oversized strings, URL filtering.

use regex::Regex;
use std::collections::HashMap;

/// Replacement for values that must not leave the device.
pub const FILTERED: &str = "[Filtered]";

/// Header name fragments that mark a header as sensitive.
const SENSITIVE_HEADER_PARTS: &[&str] = &[
    "authorization",
    "cookie",
    "set-cookie",
    "x-api-key",
    "x-auth-token",
    "x-access-token",
    "api-key",
    "apikey",
    "password",
    "secret",
    "token",
];

/// Returns a copy of `headers` with sensitive values replaced by
/// [`FILTERED`]. Matching is case-insensitive on the header name.
pub fn sanitize_headers(headers: &HashMap<String, String>) -> HashMap<String, String> {
    headers
        .iter()
        .map(|(name, value)| {
            let lower = name.to_lowercase();
            let value = if SENSITIVE_HEADER_PARTS.iter().any(|p| lower.contains(p)) {
                FILTERED.to_string()
            } else {
                value.clone()
            };
            (name.clone(), value)
        })
        .collect()
}

/// Truncates `s` to at most `max_len` characters, ending in `...` when cut.
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        return s.to_string();
    }
    let keep = max_len.saturating_sub(3);
    let mut out: String = s.chars().take(keep).collect();
    out.push_str("...");
    out
}

/// Replaces nesting beyond `max_depth` with a `"[Max Depth]"` marker.
///
/// Keeps free-form context and snapshot variables bounded no matter what the
/// application hands us.
pub fn depth_limited(value: &serde_json::Value, max_depth: usize) -> serde_json::Value {
    use serde_json::Value;

    if max_depth == 0 {
        return match value {
            Value::Object(_) | Value::Array(_) => Value::String("[Max Depth]".to_string()),
            other => other.clone(),
        };
    }
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), depth_limited(v, max_depth - 1)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(
            items.iter().map(|v| depth_limited(v, max_depth - 1)).collect(),
        ),
        other => other.clone(),
    }
}

/// URL exclusion filter: substring patterns plus compiled regexes.
///
/// Used to keep telemetry endpoints and other noisy URLs out of network
/// instrumentation.
#[derive(Debug, Clone, Default)]
pub struct UrlFilter {
    substrings: Vec<String>,
    patterns: Vec<Regex>,
}

impl UrlFilter {
    /// Builds a filter from substring patterns and compiled regexes.
    pub fn new(substrings: Vec<String>, patterns: Vec<Regex>) -> Self {
        Self {
            substrings,
            patterns,
        }
    }

    /// Whether `url` matches any exclusion pattern.
    pub fn matches(&self, url: &str) -> bool {
        self.substrings.iter().any(|s| url.contains(s.as_str()))
            || self.patterns.iter().any(|p| p.is_match(url))
    }

    /// Whether the filter has no patterns at all.
    pub fn is_empty(&self) -> bool {
        self.substrings.is_empty() && self.patterns.is_empty()
    }
}

/// Extracts the host portion of a URL, without port or userinfo.
pub fn host_of(url: &str) -> Option<String> {
    let rest = url.split_once("://").map_or(url, |(_, rest)| rest);
    let authority = rest.split(['/', '?', '#']).next()?;
    if authority.is_empty() {
        return None;
    }
    let host = authority
        .rsplit_once('@')
        .map_or(authority, |(_, host)| host);
    let host = host.split(':').next()?;
    if host.is_empty() {
        None
    } else {
        Some(host.to_lowercase())
    }
}

/// Derives a logical service name from a URL.
///
/// Cluster-local hosts collapse to their service label and `.internal`
/// domains lose the suffix; anything else passes through as the hostname.
pub fn service_name_from_url(url: &str) -> Option<String> {
    let host = host_of(url)?;
    if host.contains(".svc.cluster.local") {
        return host.split('.').next().map(str::to_string);
    }
    if let Some(stripped) = host.strip_suffix(".internal") {
        return Some(stripped.to_string());
    }
    Some(host)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_headers(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_authorization_header_is_filtered() {
        let headers = make_headers(&[("Authorization", "Bearer abc123"), ("Accept", "json")]);
        let sanitized = sanitize_headers(&headers);
        assert_eq!(sanitized["Authorization"], FILTERED);
        assert_eq!(sanitized["Accept"], "json");
    }

    #[test]
    fn test_header_matching_is_case_insensitive() {
        let headers = make_headers(&[("X-API-KEY", "k"), ("x-auth-token", "t"), ("COOKIE", "c")]);
        let sanitized = sanitize_headers(&headers);
        assert!(sanitized.values().all(|v| v == FILTERED));
    }

    #[test]
    fn test_substring_header_match() {
        let headers = make_headers(&[("X-Custom-Secret-Thing", "s")]);
        let sanitized = sanitize_headers(&headers);
        assert_eq!(sanitized["X-Custom-Secret-Thing"], FILTERED);
    }

    #[test]
    fn test_truncate_short_string_unchanged() {
        assert_eq!(truncate("hello", 10), "hello");
    }

    #[test]
    fn test_truncate_long_string() {
        assert_eq!(truncate("hello world", 8), "hello...");
        assert_eq!(truncate("hello world", 8).len(), 8);
    }

    #[test]
    fn test_depth_limit_replaces_deep_nesting() {
        let value = serde_json::json!({"a": {"b": {"c": {"d": 1}}}});
        let limited = depth_limited(&value, 2);
        assert_eq!(limited["a"]["b"], serde_json::json!("[Max Depth]"));
        assert_eq!(depth_limited(&value, 10), value);
    }

    #[test]
    fn test_url_filter_substring_and_regex() {
        let filter = UrlFilter::new(
            vec!["/health".to_string()],
            vec![Regex::new(r"analytics\.\w+\.com").unwrap()],
        );
        assert!(filter.matches("https://api.example.com/health"));
        assert!(filter.matches("https://analytics.vendor.com/v1/batch"));
        assert!(!filter.matches("https://api.example.com/users"));
        assert!(UrlFilter::default().is_empty());
    }

    #[test]
    fn test_host_of() {
        assert_eq!(
            host_of("https://api.example.com:8443/v1?x=1"),
            Some("api.example.com".to_string())
        );
        assert_eq!(host_of("http://user:pw@host.io/p"), Some("host.io".to_string()));
        assert_eq!(host_of("localhost:3000/x"), Some("localhost".to_string()));
        assert_eq!(host_of("https://"), None);
    }

    #[test]
    fn test_service_name_from_url() {
        assert_eq!(
            service_name_from_url("http://orders.prod.svc.cluster.local:8080/api"),
            Some("orders".to_string())
        );
        assert_eq!(
            service_name_from_url("https://billing.internal/charge"),
            Some("billing".to_string())
        );
        assert_eq!(
            service_name_from_url("http://localhost:9000/x"),
            Some("localhost".to_string())
        );
        assert_eq!(
            service_name_from_url("https://api.example.com/v2"),
            Some("api.example.com".to_string())
        );
    }
}
