//! Cookie jar abstraction and the in-memory implementation.
//!
//! A **cookie jar** holds the authoritative set of cookies for one HTTP client.
//! The client asks the jar which cookies to attach before sending a request and
//! hands every `Set-Cookie` header back to it after a response.
//!
//! This module defines the [`CookieJar`] trait and [`DefaultCookieJar`], which
//! keeps cookies **in memory only**. Persistence is layered on top by
//! [`PersistentCookieJar`](crate::cookies::PersistentCookieJar).
//!
//! ## Matching & ordering
//! - Cookies are keyed by (domain, path, name). Setting an existing key replaces
//!   the value but keeps the original `creation_time`.
//! - A request matches a cookie when the host domain-matches (exact for host-only
//!   cookies), the request path path-matches, and the request is secure if the
//!   cookie is `Secure`.
//! - Results are ordered by longer path first, then earlier `creation_time`, then
//!   name.
//!
//! ## Limits
//! When the jar grows beyond `max_cookies`, or a single domain beyond
//! `max_cookies_per_domain`, expired cookies go first and then the least recently
//! accessed ones. The cookie that triggered the eviction is never evicted.
//!
//! See also: RFC 6265 (HTTP State Management Mechanism).
//!
use std::cmp::Reverse;
use std::collections::HashMap;
use std::sync::Arc;

use http::header::SET_COOKIE;
use http::HeaderMap;
use parking_lot::RwLock;
use time::OffsetDateTime;
use url::Url;

use crate::config::CookieJarConfig;
use crate::cookies::set_cookie::{is_secure_scheme, parse_set_cookie};
use crate::cookies::{domain, Cookie, CookieJarHandle, CookieKey};
use crate::errors::CookieError;

/// A cookie jar shared by every request of one HTTP client.
///
/// Implementations are internally synchronized: readers may run concurrently,
/// writers are exclusive with each other and with readers.
pub trait CookieJar: Send + Sync {
    /// Validates and stores `cookie`, replacing any cookie with the same key.
    ///
    /// An already expired cookie is not stored; instead the cookie with the same
    /// key (if any) is removed. Returns [`CookieError::InvalidCookie`] without
    /// touching the jar when validation fails.
    fn set_cookie(&self, cookie: Cookie) -> Result<(), CookieError>;

    /// Returns the cookies to attach to a request for `host` + `path`.
    ///
    /// `Secure` cookies are left out unless `is_secure`. Expired cookies are
    /// never returned, even before they have been swept.
    fn cookies_for(&self, host: &str, path: &str, is_secure: bool) -> Vec<Cookie>;

    /// Removes one cookie. Returns whether it was present.
    fn remove(&self, domain: &str, path: &str, name: &str) -> Result<bool, CookieError>;

    /// Removes all cookies from the jar.
    fn clear(&self) -> Result<(), CookieError>;

    /// Removes every cookie whose expiry is at or before `now`, returning how many.
    fn expire_and_sweep(&self, now: OffsetDateTime) -> Result<usize, CookieError>;

    /// All stored cookies, for diagnostics/inspection.
    fn all_cookies(&self) -> Vec<Cookie>;

    fn len(&self) -> usize {
        self.all_cookies().len()
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Parses raw `Set-Cookie` values received for `url` and stores them.
    ///
    /// Invalid cookies are dropped silently (logged at debug level). Returns the
    /// number of cookies the jar accepted, or the first persistence error after
    /// all headers have been applied. A jar that refuses cookies outright
    /// overrides this and reports 0.
    fn store_set_cookie_headers(
        &self,
        url: &Url,
        headers: &mut dyn Iterator<Item = &str>,
    ) -> Result<usize, CookieError> {
        let now = OffsetDateTime::now_utc();
        let mut applied = 0;
        let mut first_error = None;

        for header in headers {
            let cookie = match parse_set_cookie(header, url, now) {
                Ok(cookie) => cookie,
                Err(e) => {
                    log::debug!("Ignoring Set-Cookie from {}: {}", url, e);
                    continue;
                }
            };

            match self.set_cookie(cookie) {
                Ok(()) => applied += 1,
                Err(CookieError::InvalidCookie(msg)) => {
                    log::debug!("Ignoring Set-Cookie from {}: {}", url, msg);
                }
                Err(e) => {
                    // The in-memory jar was updated regardless
                    applied += 1;
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(applied),
        }
    }

    /// Stores all `Set-Cookie` headers found in a response for `url`.
    fn store_response_cookies(&self, url: &Url, headers: &HeaderMap) -> Result<usize, CookieError> {
        let mut values = headers
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok());
        self.store_set_cookie_headers(url, &mut values)
    }

    /// Returns the `Cookie` request header value to send for `url`, if any.
    fn get_request_cookies(&self, url: &Url) -> Option<String> {
        let host = url.host_str()?;
        let header = self
            .cookies_for(host, url.path(), is_secure_scheme(url))
            .iter()
            .map(Cookie::pair)
            .collect::<Vec<_>>()
            .join("; ");

        if header.is_empty() {
            None
        } else {
            Some(header)
        }
    }
}

/// What a mutation did to the index, so a persistence layer can mirror it.
#[derive(Debug, Default)]
pub(crate) struct Change {
    /// Cookie that was inserted or replaced.
    pub stored: Option<Cookie>,
    /// Keys that are gone afterwards (deleted, expired or evicted).
    pub removed: Vec<CookieKey>,
}

/// Unsynchronized cookie index with the matching and eviction rules.
#[derive(Debug, Clone)]
pub(crate) struct CookieIndex {
    entries: HashMap<CookieKey, Cookie>,
    max_cookies: usize,
    max_cookies_per_domain: usize,
}

impl CookieIndex {
    pub fn new(max_cookies: usize, max_cookies_per_domain: usize) -> Self {
        Self {
            entries: HashMap::new(),
            max_cookies,
            max_cookies_per_domain,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn insert(&mut self, mut cookie: Cookie, now: OffsetDateTime) -> Result<Change, CookieError> {
        cookie.normalize_domain();
        cookie.validate()?;
        let key = cookie.key();

        if cookie.is_expired(now) {
            if self.entries.remove(&key).is_some() {
                log::debug!("Cookie {} deleted by expired Set-Cookie", key);
            }
            return Ok(Change {
                stored: None,
                removed: vec![key],
            });
        }

        cookie.creation_time = self
            .entries
            .get(&key)
            .map(|existing| existing.creation_time)
            .unwrap_or(now);
        cookie.last_access_time = now;

        self.entries.insert(key.clone(), cookie.clone());
        let evicted = self.evict(&key, now);

        Ok(Change {
            stored: Some(cookie),
            removed: evicted,
        })
    }

    /// Puts a previously persisted cookie back without touching its timestamps.
    pub fn restore(&mut self, mut cookie: Cookie) {
        cookie.normalize_domain();
        self.entries.insert(cookie.key(), cookie);
    }

    pub fn remove(&mut self, key: &CookieKey) -> bool {
        self.entries.remove(key).is_some()
    }

    pub fn clear(&mut self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        count
    }

    pub fn sweep(&mut self, now: OffsetDateTime) -> Vec<CookieKey> {
        let expired: Vec<CookieKey> = self
            .entries
            .iter()
            .filter(|(_, c)| c.is_expired(now))
            .map(|(k, _)| k.clone())
            .collect();

        for key in &expired {
            self.entries.remove(key);
        }
        expired
    }

    pub fn matching(&self, host: &str, path: &str, is_secure: bool, now: OffsetDateTime) -> Vec<Cookie> {
        let host = domain::normalize_host(host);
        let path = if path.starts_with('/') { path } else { "/" };

        let mut cookies: Vec<Cookie> = self
            .entries
            .values()
            .filter(|c| !c.is_expired(now) && c.matches(&host, path, is_secure))
            .cloned()
            .collect();

        sort_for_request(&mut cookies);
        cookies
    }

    pub fn all(&self) -> Vec<Cookie> {
        let mut cookies: Vec<Cookie> = self.entries.values().cloned().collect();
        cookies.sort_by(|a, b| {
            (&a.domain, Reverse(a.path.len()), a.creation_time, &a.name)
                .cmp(&(&b.domain, Reverse(b.path.len()), b.creation_time, &b.name))
        });
        cookies
    }

    /// Enforces the per-domain and total limits after inserting `protected`.
    fn evict(&mut self, protected: &CookieKey, now: OffsetDateTime) -> Vec<CookieKey> {
        let mut evicted = Vec::new();

        let domain_count = self.entries.keys().filter(|k| k.domain == protected.domain).count();
        if domain_count > self.max_cookies_per_domain {
            let excess = domain_count - self.max_cookies_per_domain;
            let victims = self.eviction_candidates(protected, now, Some(protected.domain.as_str()), excess);
            self.drop_keys(&victims);
            evicted.extend(victims);
        }

        if self.entries.len() > self.max_cookies {
            let excess = self.entries.len() - self.max_cookies;
            let victims = self.eviction_candidates(protected, now, None, excess);
            self.drop_keys(&victims);
            evicted.extend(victims);
        }

        evicted
    }

    fn drop_keys(&mut self, keys: &[CookieKey]) {
        for key in keys {
            if self.entries.remove(key).is_some() {
                log::debug!("Evicted cookie {}", key);
            }
        }
    }

    /// Picks `count` victims: expired cookies first, then least recently accessed.
    fn eviction_candidates(
        &self,
        protected: &CookieKey,
        now: OffsetDateTime,
        domain: Option<&str>,
        count: usize,
    ) -> Vec<CookieKey> {
        let mut candidates: Vec<&Cookie> = self
            .entries
            .iter()
            .filter(|(k, _)| *k != protected && domain.map_or(true, |d| k.domain == d))
            .map(|(_, c)| c)
            .collect();

        candidates.sort_by_key(|c| (!c.is_expired(now), c.last_access_time, c.creation_time));
        candidates.into_iter().take(count).map(Cookie::key).collect()
    }
}

/// Longer path first, then earlier creation time, then name.
fn sort_for_request(cookies: &mut [Cookie]) {
    cookies.sort_by(|a, b| {
        (Reverse(a.path.len()), a.creation_time, &a.name).cmp(&(Reverse(b.path.len()), b.creation_time, &b.name))
    });
}

/// Default cookie jar, **in memory only**.
///
/// The index lives behind a `parking_lot::RwLock`, so any number of
/// `cookies_for` calls run in parallel while mutations are exclusive.
#[derive(Debug)]
pub struct DefaultCookieJar {
    index: RwLock<CookieIndex>,
}

impl Default for DefaultCookieJar {
    fn default() -> Self {
        Self::new()
    }
}

impl DefaultCookieJar {
    /// Creates an empty jar with the default limits.
    pub fn new() -> Self {
        Self::with_config(&CookieJarConfig::default())
    }

    /// Creates an empty jar using the limits from `config`.
    pub fn with_config(config: &CookieJarConfig) -> Self {
        DefaultCookieJar {
            index: RwLock::new(CookieIndex::new(config.max_cookies, config.max_cookies_per_domain)),
        }
    }

    pub(crate) fn apply_set(&self, cookie: Cookie, now: OffsetDateTime) -> Result<Change, CookieError> {
        self.index.write().insert(cookie, now)
    }

    pub(crate) fn apply_remove(&self, key: &CookieKey) -> bool {
        self.index.write().remove(key)
    }

    pub(crate) fn apply_clear(&self) -> usize {
        self.index.write().clear()
    }

    pub(crate) fn apply_sweep(&self, now: OffsetDateTime) -> Vec<CookieKey> {
        self.index.write().sweep(now)
    }

    /// Replaces the whole content with previously persisted cookies.
    pub(crate) fn restore_all(&self, cookies: Vec<Cookie>) {
        let mut index = self.index.write();
        index.clear();
        for cookie in cookies {
            index.restore(cookie);
        }
    }
}

impl CookieJar for DefaultCookieJar {
    fn set_cookie(&self, cookie: Cookie) -> Result<(), CookieError> {
        self.apply_set(cookie, OffsetDateTime::now_utc()).map(|_| ())
    }

    fn cookies_for(&self, host: &str, path: &str, is_secure: bool) -> Vec<Cookie> {
        self.index.read().matching(host, path, is_secure, OffsetDateTime::now_utc())
    }

    fn remove(&self, domain: &str, path: &str, name: &str) -> Result<bool, CookieError> {
        Ok(self.apply_remove(&CookieKey::new(domain, path, name)))
    }

    fn clear(&self) -> Result<(), CookieError> {
        self.apply_clear();
        Ok(())
    }

    fn expire_and_sweep(&self, now: OffsetDateTime) -> Result<usize, CookieError> {
        Ok(self.apply_sweep(now).len())
    }

    fn all_cookies(&self) -> Vec<Cookie> {
        self.index.read().all()
    }

    fn len(&self) -> usize {
        self.index.read().len()
    }
}

impl From<DefaultCookieJar> for CookieJarHandle {
    fn from(jar: DefaultCookieJar) -> Self {
        Arc::new(jar)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Barrier;
    use std::thread;
    use time::Duration;

    fn t(secs: i64) -> OffsetDateTime {
        time::macros::datetime!(2025-06-01 12:00:00 UTC) + Duration::seconds(secs)
    }

    fn names(cookies: &[Cookie]) -> Vec<&str> {
        cookies.iter().map(|c| c.name.as_str()).collect()
    }

    #[test]
    fn set_then_get_returns_equal_cookie() {
        let jar = DefaultCookieJar::new();
        let cookie = Cookie::new("sid", "abc123", ".example.com")
            .with_path("/app")
            .with_max_age(Duration::hours(1))
            .with_http_only(true);
        jar.set_cookie(cookie.clone()).unwrap();

        let found = jar.cookies_for("www.example.com", "/app/page", false);
        assert_eq!(found, vec![cookie]);
    }

    #[test]
    fn domain_cookie_scenario() {
        let jar = DefaultCookieJar::new();
        jar.set_cookie(Cookie::new("sid", "abc123", ".example.com").with_max_age(Duration::hours(1)))
            .unwrap();

        let found = jar.cookies_for("api.example.com", "/foo", false);
        let pairs: Vec<(&str, &str)> = found.iter().map(|c| (c.name.as_str(), c.value.as_str())).collect();
        assert_eq!(pairs, vec![("sid", "abc123")]);

        assert!(jar.cookies_for("other.com", "/foo", false).is_empty());
    }

    #[test]
    fn hand_built_cookie_domain_is_normalized() {
        let jar = DefaultCookieJar::new();
        let cookie = Cookie {
            domain: "Example.COM".into(),
            ..Cookie::new("a", "1", "example.com")
        };
        jar.set_cookie(cookie).unwrap();

        let found = jar.cookies_for("example.com", "/", false);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].domain, "example.com");
        assert!(found[0].host_only);

        let dotted = Cookie {
            domain: ".Example.com".into(),
            host_only: true,
            ..Cookie::new("b", "1", "example.com")
        };
        jar.set_cookie(dotted).unwrap();
        assert_eq!(names(&jar.cookies_for("www.example.com", "/", false)), vec!["b"]);

        assert!(jar.remove("Example.COM", "/", "a").unwrap());
        assert!(jar.remove("example.com", "/", "b").unwrap());
        assert!(jar.is_empty());
    }

    #[test]
    fn host_only_cookie_does_not_reach_subdomains() {
        let jar = DefaultCookieJar::new();
        jar.set_cookie(Cookie::new("a", "1", "example.com")).unwrap();

        assert_eq!(jar.cookies_for("example.com", "/", false).len(), 1);
        assert!(jar.cookies_for("www.example.com", "/", false).is_empty());
    }

    #[test]
    fn same_key_collapses_to_latest_value() {
        let mut index = CookieIndex::new(100, 100);
        index.insert(Cookie::new("a", "1", "example.com"), t(0)).unwrap();
        index.insert(Cookie::new("a", "2", "example.com"), t(10)).unwrap();

        let found = index.matching("example.com", "/", false, t(20));
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].value, "2");
        assert_eq!(found[0].creation_time, t(0));
        assert_eq!(found[0].last_access_time, t(10));
    }

    #[test]
    fn secure_cookies_need_secure_requests() {
        let jar = DefaultCookieJar::new();
        jar.set_cookie(Cookie::new("s", "1", ".example.com").with_secure(true)).unwrap();

        for host in ["example.com", "www.example.com"] {
            for path in ["/", "/deep/path"] {
                assert!(jar.cookies_for(host, path, false).is_empty());
                assert_eq!(jar.cookies_for(host, path, true).len(), 1);
            }
        }
    }

    #[test]
    fn expired_set_deletes_existing_cookie() {
        let jar = DefaultCookieJar::new();
        jar.set_cookie(Cookie::new("sid", "abc", "example.com").with_max_age(Duration::hours(1)))
            .unwrap();
        jar.set_cookie(Cookie::new("sid", "", "example.com").with_expires(t(0))).unwrap();

        assert!(jar.cookies_for("example.com", "/", false).is_empty());
        assert_eq!(jar.expire_and_sweep(OffsetDateTime::now_utc()).unwrap(), 0);
    }

    #[test]
    fn expired_cookie_is_never_stored() {
        let jar = DefaultCookieJar::new();
        jar.set_cookie(Cookie::new("sid", "abc", "example.com").with_max_age(Duration::ZERO))
            .unwrap();
        assert!(jar.is_empty());
    }

    #[test]
    fn invalid_cookie_is_rejected_without_effect() {
        let jar = DefaultCookieJar::new();
        let err = jar.set_cookie(Cookie::new("", "abc", "example.com")).unwrap_err();
        assert!(matches!(err, CookieError::InvalidCookie(_)));

        let err = jar.set_cookie(Cookie::new("a", "abc", ".com")).unwrap_err();
        assert!(matches!(err, CookieError::InvalidCookie(_)));
        assert!(jar.is_empty());
    }

    #[test]
    fn order_is_longest_path_then_oldest() {
        let mut index = CookieIndex::new(100, 100);
        index.insert(Cookie::new("root-new", "1", "example.com"), t(5)).unwrap();
        index.insert(Cookie::new("root-old", "1", "example.com"), t(1)).unwrap();
        index.insert(Cookie::new("deep", "1", "example.com").with_path("/a/b"), t(9)).unwrap();
        index.insert(Cookie::new("mid", "1", "example.com").with_path("/a"), t(3)).unwrap();

        let found = index.matching("example.com", "/a/b/c", false, t(10));
        assert_eq!(names(&found), vec!["deep", "mid", "root-old", "root-new"]);
    }

    #[test]
    fn sweep_removes_only_expired() {
        let mut index = CookieIndex::new(100, 100);
        index.insert(Cookie::new("short", "1", "example.com").with_expires(t(60)), t(0)).unwrap();
        index.insert(Cookie::new("long", "1", "example.com").with_expires(t(3600)), t(0)).unwrap();
        index.insert(Cookie::new("session", "1", "example.com"), t(0)).unwrap();

        // Expired cookies are hidden before the sweep runs
        assert_eq!(names(&index.matching("example.com", "/", false, t(60))), vec!["long", "session"]);

        let removed = index.sweep(t(60));
        assert_eq!(removed, vec![CookieKey::new("example.com", "/", "short")]);
        assert_eq!(index.len(), 2);
        assert!(index.sweep(t(60)).is_empty());
    }

    #[test]
    fn remove_and_clear() {
        let jar = DefaultCookieJar::new();
        jar.set_cookie(Cookie::new("a", "1", ".example.com")).unwrap();
        jar.set_cookie(Cookie::new("b", "1", "example.com")).unwrap();

        assert!(jar.remove(".example.com", "/", "a").unwrap());
        assert!(!jar.remove("example.com", "/", "a").unwrap());
        assert_eq!(jar.len(), 1);

        jar.clear().unwrap();
        jar.clear().unwrap();
        assert!(jar.cookies_for("example.com", "/", true).is_empty());
    }

    #[test]
    fn per_domain_limit_evicts_least_recently_used() {
        let mut index = CookieIndex::new(100, 2);
        index.insert(Cookie::new("a", "1", "example.com"), t(0)).unwrap();
        index.insert(Cookie::new("b", "1", "example.com"), t(1)).unwrap();
        index.insert(Cookie::new("a", "2", "example.com"), t(2)).unwrap();
        index.insert(Cookie::new("x", "1", "other.com"), t(3)).unwrap();

        let change = index.insert(Cookie::new("c", "1", "example.com"), t(4)).unwrap();
        assert_eq!(change.removed, vec![CookieKey::new("example.com", "/", "b")]);
        assert_eq!(names(&index.matching("example.com", "/", false, t(5))), vec!["a", "c"]);
        assert_eq!(index.len(), 3);
    }

    #[test]
    fn total_limit_prefers_expired_victims() {
        let mut index = CookieIndex::new(2, 2);
        index.insert(Cookie::new("a", "1", "a.com"), t(0)).unwrap();
        index.insert(Cookie::new("b", "1", "b.com").with_expires(t(5)), t(1)).unwrap();

        let change = index.insert(Cookie::new("c", "1", "c.com"), t(10)).unwrap();
        assert_eq!(change.removed, vec![CookieKey::new("b.com", "/", "b")]);
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn request_header_rendering() {
        let jar = DefaultCookieJar::new();
        let url = Url::parse("https://www.example.com/account/login").unwrap();

        let mut headers = HeaderMap::new();
        headers.append(SET_COOKIE, "sid=abc; Path=/; Secure".parse().unwrap());
        headers.append(SET_COOKIE, "lang=en; Path=/account".parse().unwrap());
        headers.append(SET_COOKIE, "bad; Path=/".parse().unwrap());
        assert_eq!(jar.store_response_cookies(&url, &headers).unwrap(), 2);

        assert_eq!(
            jar.get_request_cookies(&Url::parse("https://www.example.com/account/x").unwrap()),
            Some("lang=en; sid=abc".to_string())
        );
        assert_eq!(
            jar.get_request_cookies(&Url::parse("http://www.example.com/account/x").unwrap()),
            Some("lang=en".to_string())
        );
        assert_eq!(jar.get_request_cookies(&Url::parse("https://example.com/").unwrap()), None);
    }

    #[test]
    fn concurrent_writers_lose_nothing() {
        const WRITERS: usize = 16;
        const PER_WRITER: usize = 25;

        let jar: CookieJarHandle = DefaultCookieJar::new().into();
        let barrier = Arc::new(Barrier::new(WRITERS));

        let handles: Vec<_> = (0..WRITERS)
            .map(|w| {
                let jar = jar.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    for i in 0..PER_WRITER {
                        let domain = format!("w{w}.example.com");
                        jar.set_cookie(Cookie::new(format!("c{i}"), "v", &domain)).unwrap();
                        // Readers interleave with writers
                        let _ = jar.cookies_for(&domain, "/", false);
                    }
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }

        let total: usize = (0..WRITERS)
            .map(|w| jar.cookies_for(&format!("w{w}.example.com"), "/", false).len())
            .sum();
        assert_eq!(total, WRITERS * PER_WRITER);
        assert_eq!(jar.len(), WRITERS * PER_WRITER);
    }
}
