//! `Set-Cookie` header parsing (RFC 6265 §5.2 / §5.3).
//!
//! Parsing is lenient in the way browsers are: unknown attributes are ignored,
//! an unparsable `Expires` is dropped, and `Max-Age` wins over `Expires`
//! regardless of order. A cookie is rejected outright when it has no name,
//! when its `Domain` attribute does not cover the request host, or when it is
//! `Secure` but arrived over plain HTTP.

use time::OffsetDateTime;
use url::Url;

use crate::cookies::cookies::expiry_from_max_age;
use crate::cookies::{domain, Cookie, SameSite};
use crate::errors::CookieError;

/// Returns true for schemes whose transport is encrypted.
pub fn is_secure_scheme(url: &Url) -> bool {
    matches!(url.scheme(), "https" | "wss")
}

/// Parses one `Set-Cookie` header value received in response to `url`.
///
/// The returned cookie may already be expired (`Max-Age=0`, past `Expires`);
/// handing it to a jar deletes the stored cookie with the same key.
pub fn parse_set_cookie(header: &str, url: &Url, now: OffsetDateTime) -> Result<Cookie, CookieError> {
    let host = url
        .host_str()
        .map(domain::normalize_host)
        .ok_or_else(|| CookieError::InvalidCookie(format!("no host in {url}")))?;

    let mut parts = header.split(';');
    let pair = parts.next().unwrap_or_default();
    let (name, value) = pair
        .split_once('=')
        .ok_or_else(|| CookieError::InvalidCookie(format!("missing '=' in {pair:?}")))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(CookieError::InvalidCookie("empty name".into()));
    }

    let mut cookie = Cookie::new(name, value.trim(), &host);
    cookie.creation_time = now;
    cookie.last_access_time = now;

    let mut expires = None;
    let mut max_age = None;
    let mut domain_attr = None;
    let mut path_attr = None;

    for part in parts {
        let part = part.trim();
        let (key, val) = match part.split_once('=') {
            Some((k, v)) => (k.trim(), v.trim()),
            None => (part, ""),
        };

        match key.to_ascii_lowercase().as_str() {
            "expires" => {
                if let Ok(t) = httpdate::parse_http_date(val) {
                    expires = Some(OffsetDateTime::from(t));
                }
            }
            "max-age" => {
                let looks_numeric = val.starts_with(|c: char| c.is_ascii_digit() || c == '-');
                if looks_numeric {
                    if let Ok(secs) = val.parse::<i64>() {
                        max_age = Some(secs);
                    } else if val.trim_start_matches('-').chars().all(|c| c.is_ascii_digit()) {
                        // Out of i64 range
                        max_age = Some(if val.starts_with('-') { i64::MIN } else { i64::MAX });
                    }
                }
            }
            "domain" if !val.is_empty() => {
                domain_attr = Some(domain::normalize_domain(val).0);
            }
            "path" => {
                path_attr = val.starts_with('/').then(|| val.to_string());
            }
            "secure" => cookie.secure = true,
            "httponly" => cookie.http_only = true,
            "samesite" => cookie.same_site = SameSite::parse(val),
            _ => {}
        }
    }

    cookie.expires = match max_age {
        Some(secs) => Some(expiry_from_max_age(secs, now)),
        None => expires,
    };

    match domain_attr {
        Some(d) if d == host => {
            // Domain equal to the host: domain-wide unless it cannot carry one (IP, bare TLD)
            cookie.host_only = !domain::allows_domain_cookie(&d);
        }
        Some(d) => {
            if domain::is_ip_address(&host) || !domain::domain_match(&host, &d, false) {
                return Err(CookieError::InvalidCookie(format!(
                    "domain {d:?} does not cover host {host:?}"
                )));
            }
            if !domain::allows_domain_cookie(&d) {
                return Err(CookieError::InvalidCookie(format!("domain {d:?} is a public suffix")));
            }
            cookie.domain = d;
            cookie.host_only = false;
        }
        None => {}
    }

    cookie.path = path_attr.unwrap_or_else(|| domain::default_path(url.path()));

    if cookie.secure && !is_secure_scheme(url) {
        return Err(CookieError::InvalidCookie(format!(
            "secure cookie {:?} set over insecure scheme",
            cookie.name
        )));
    }

    cookie.validate()?;
    Ok(cookie)
}
