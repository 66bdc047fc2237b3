//! Host, domain and path rules from RFC 6265 §5.1.
//!
//! Public suffixes are approximated: a domain-wide cookie must name a domain
//! with at least one interior dot, so `com` or `localhost` can only ever carry
//! host-only cookies. No public-suffix list is consulted.

use std::net::IpAddr;

/// Lowercases a request host and strips a trailing root dot.
pub fn normalize_host(host: &str) -> String {
    host.trim().trim_end_matches('.').to_ascii_lowercase()
}

/// Normalizes a cookie domain and reports whether it is host-only.
///
/// A leading dot (`.example.com`) marks a domain-wide cookie; anything else is
/// treated as host-only.
pub fn normalize_domain(domain: &str) -> (String, bool) {
    let domain = domain.trim();
    match domain.strip_prefix('.') {
        Some(rest) => (normalize_host(rest), false),
        None => (normalize_host(domain), true),
    }
}

/// Returns true if `host` is an IPv4 or IPv6 literal (brackets allowed).
pub fn is_ip_address(host: &str) -> bool {
    let bare = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);
    bare.parse::<IpAddr>().is_ok()
}

/// Checks that `domain` looks like something a cookie can be scoped to.
pub fn is_valid_domain(domain: &str) -> bool {
    if domain.is_empty() {
        return false;
    }
    if is_ip_address(domain) {
        return true;
    }
    if domain.starts_with('.') || domain.ends_with('.') || domain.contains("..") {
        return false;
    }
    domain
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.' || c == '_')
}

/// Returns true if a domain-wide cookie may be scoped to `domain`.
pub fn allows_domain_cookie(domain: &str) -> bool {
    !is_ip_address(domain) && domain.contains('.')
}

/// Domain-match: exact for host-only cookies, exact-or-subdomain otherwise.
///
/// Both arguments must already be normalized.
pub fn domain_match(host: &str, domain: &str, host_only: bool) -> bool {
    if host == domain {
        return true;
    }
    if host_only || is_ip_address(host) {
        return false;
    }
    host.len() > domain.len()
        && host.ends_with(domain)
        && host.as_bytes()[host.len() - domain.len() - 1] == b'.'
}

/// Path-match per RFC 6265 §5.1.4.
///
/// `/foo` matches `/foo`, `/foo/` and `/foo/bar`, but not `/foobar`.
pub fn path_match(request_path: &str, cookie_path: &str) -> bool {
    if request_path == cookie_path {
        return true;
    }
    if !request_path.starts_with(cookie_path) {
        return false;
    }
    cookie_path.ends_with('/') || request_path.as_bytes()[cookie_path.len()] == b'/'
}

/// Default cookie path derived from the request path (RFC 6265 §5.1.4).
pub fn default_path(request_path: &str) -> String {
    if !request_path.starts_with('/') {
        return "/".to_string();
    }
    match request_path.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(idx) => request_path[..idx].to_string(),
    }
}
