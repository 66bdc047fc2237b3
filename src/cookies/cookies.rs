//! Cookie core types.
//!
//! This module defines the **type-erased handles** used throughout the crate
//! and the [`Cookie`] data structure.
//!
//! # Concurrency model
//! - [`CookieJarHandle`] is `Arc<dyn CookieJar + Send + Sync>`.
//!   - Jars synchronize internally: any number of concurrent readers, one writer
//!     at a time. All trait methods take `&self`.
//! - [`CookieStoreHandle`] is `Arc<dyn CookieStore + Send + Sync>`.
//!   - Stores manage their **own internal synchronization** (a mutex around a file,
//!     a connection pool, ...).
//!
//! # Typical usage
//! ```rust
//! use gosub_cookies::cookies::{Cookie, CookieJar, CookieJarHandle, DefaultCookieJar};
//!
//! let jar: CookieJarHandle = DefaultCookieJar::new().into();
//! jar.set_cookie(Cookie::new("sid", "abc123", ".example.com")).unwrap();
//!
//! let cookies = jar.cookies_for("api.example.com", "/foo", false);
//! assert_eq!(cookies[0].value, "abc123");
//! ```

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

use crate::cookies::domain;
use crate::cookies::store::CookieStore;
use crate::cookies::CookieJar;
use crate::errors::CookieError;

/// A handle to a cookie jar.
///
/// Reference-counted pointer to a type-erased, internally synchronized [`CookieJar`].
/// This is what an HTTP client holds; there is no process-wide default jar.
pub type CookieJarHandle = Arc<dyn CookieJar + Send + Sync>;

/// A handle to a cookie store.
///
/// Store implementations must be **`Send + Sync` and internally synchronized**,
/// since callers hold only `&self` when invoking trait methods.
pub type CookieStoreHandle = Arc<dyn CookieStore + Send + Sync>;

/// SameSite policy of a cookie. Advisory: the jar stores it but does not enforce it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

impl SameSite {
    /// Parses a `SameSite` attribute value, case-insensitively.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        if value.eq_ignore_ascii_case("strict") {
            Some(SameSite::Strict)
        } else if value.eq_ignore_ascii_case("lax") {
            Some(SameSite::Lax)
        } else if value.eq_ignore_ascii_case("none") {
            Some(SameSite::None)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SameSite::Strict => "Strict",
            SameSite::Lax => "Lax",
            SameSite::None => "None",
        }
    }
}

/// Uniqueness key of a cookie inside a jar.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CookieKey {
    pub domain: String,
    pub path: String,
    pub name: String,
}

impl CookieKey {
    /// Builds a key, ignoring a leading-dot marker and case in `domain`.
    pub fn new(domain: &str, path: &str, name: &str) -> Self {
        let (domain, _) = domain::normalize_domain(domain);
        Self {
            domain,
            path: path.to_string(),
            name: name.to_string(),
        }
    }
}

impl fmt::Display for CookieKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{} {}", self.domain, self.path, self.name)
    }
}

/// A single HTTP cookie.
///
/// Equality compares the cookie attributes only; `creation_time` and
/// `last_access_time` are bookkeeping owned by the jar.
#[derive(Debug, Clone)]
pub struct Cookie {
    /// Cookie name (case-sensitive).
    pub name: String,

    /// Raw cookie value (not URL-decoded).
    pub value: String,

    /// Lowercase domain without the leading-dot marker.
    pub domain: String,

    /// `true` if the cookie is only sent to `domain` itself, `false` if subdomains match too.
    pub host_only: bool,

    /// Path scoping, always starting with `/`.
    pub path: String,

    /// Absolute expiry. Session cookies have `None`.
    pub expires: Option<OffsetDateTime>,

    /// If `true`, cookie is sent only over an encrypted transport.
    pub secure: bool,

    /// If `true`, client-side scripts must not see the cookie. Not enforced by the jar.
    pub http_only: bool,

    /// SameSite policy, if any was given.
    pub same_site: Option<SameSite>,

    pub creation_time: OffsetDateTime,
    pub last_access_time: OffsetDateTime,
}

impl Cookie {
    /// Creates a session cookie with path `/`.
    ///
    /// A leading dot on `domain` (`".example.com"`) makes the cookie match
    /// subdomains; without it the cookie is host-only.
    pub fn new(name: impl Into<String>, value: impl Into<String>, domain: &str) -> Self {
        let (domain, host_only) = domain::normalize_domain(domain);
        let now = OffsetDateTime::now_utc();
        Self {
            name: name.into(),
            value: value.into(),
            domain,
            host_only,
            path: "/".to_string(),
            expires: None,
            secure: false,
            http_only: false,
            same_site: None,
            creation_time: now,
            last_access_time: now,
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Sets an absolute expiry, truncated to whole seconds as it is persisted.
    pub fn with_expires(mut self, expires: OffsetDateTime) -> Self {
        self.expires = Some(whole_seconds(expires));
        self
    }

    /// Sets the expiry relative to now. A zero or negative duration expires the cookie.
    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.expires = Some(expiry_from_max_age(max_age.whole_seconds(), OffsetDateTime::now_utc()));
        self
    }

    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    pub fn with_http_only(mut self, http_only: bool) -> Self {
        self.http_only = http_only;
        self
    }

    pub fn with_same_site(mut self, same_site: SameSite) -> Self {
        self.same_site = Some(same_site);
        self
    }

    pub fn key(&self) -> CookieKey {
        CookieKey {
            domain: self.domain.clone(),
            path: self.path.clone(),
            name: self.name.clone(),
        }
    }

    /// A cookie without an expiry lives only as long as the process.
    pub fn is_session(&self) -> bool {
        self.expires.is_none()
    }

    pub fn is_expired(&self, now: OffsetDateTime) -> bool {
        matches!(self.expires, Some(expires) if expires <= now)
    }

    /// Returns true if this cookie should be attached to a request for `host` + `path`.
    ///
    /// `host` must be normalized (see [`domain::normalize_host`]).
    pub fn matches(&self, host: &str, path: &str, is_secure: bool) -> bool {
        (!self.secure || is_secure)
            && domain::domain_match(host, &self.domain, self.host_only)
            && domain::path_match(path, &self.path)
    }

    /// Renders the cookie as it appears in a `Cookie` request header.
    pub fn pair(&self) -> String {
        format!("{}={}", self.name, self.value)
    }

    /// Lowercases the domain and turns a leading dot into `host_only = false`.
    ///
    /// Fields are public, so a cookie built by hand may carry `Example.COM` or
    /// `.example.com`; the jar and the stores call this before keying it.
    pub(crate) fn normalize_domain(&mut self) {
        let (domain, host_only) = domain::normalize_domain(&self.domain);
        self.host_only &= host_only;
        self.domain = domain;
    }

    /// Checks name, value, domain and path. Nothing is stored for a cookie that fails.
    pub fn validate(&self) -> Result<(), CookieError> {
        if self.name.is_empty() {
            return Err(CookieError::InvalidCookie("empty name".into()));
        }
        if self.name.chars().any(|c| c.is_control() || c.is_whitespace() || matches!(c, '=' | ';' | ',')) {
            return Err(CookieError::InvalidCookie(format!("invalid name {:?}", self.name)));
        }
        if self.value.chars().any(|c| c.is_control() || c == ';') {
            return Err(CookieError::InvalidCookie(format!("invalid value for {:?}", self.name)));
        }
        if !domain::is_valid_domain(&self.domain) {
            return Err(CookieError::InvalidCookie(format!("invalid domain {:?}", self.domain)));
        }
        if !self.host_only && !domain::allows_domain_cookie(&self.domain) {
            return Err(CookieError::InvalidCookie(format!(
                "domain cookie not allowed for {:?}",
                self.domain
            )));
        }
        if !self.path.starts_with('/') {
            return Err(CookieError::InvalidCookie(format!("invalid path {:?}", self.path)));
        }
        Ok(())
    }
}

impl PartialEq for Cookie {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.value == other.value
            && self.domain == other.domain
            && self.host_only == other.host_only
            && self.path == other.path
            && self.expires == other.expires
            && self.secure == other.secure
            && self.http_only == other.http_only
            && self.same_site == other.same_site
    }
}

impl Eq for Cookie {}

/// Latest representable expiry; large `Max-Age` values saturate to it.
pub(crate) const MAX_EXPIRY: OffsetDateTime = time::macros::datetime!(9999-12-31 23:59:59 UTC);

/// Converts a `Max-Age` in seconds into an absolute expiry.
pub(crate) fn expiry_from_max_age(seconds: i64, now: OffsetDateTime) -> OffsetDateTime {
    if seconds <= 0 {
        return OffsetDateTime::UNIX_EPOCH;
    }
    whole_seconds(now)
        .checked_add(Duration::seconds(seconds))
        .map(|t| t.min(MAX_EXPIRY))
        .unwrap_or(MAX_EXPIRY)
}

pub(crate) fn whole_seconds(t: OffsetDateTime) -> OffsetDateTime {
    t.replace_nanosecond(0).unwrap_or(t)
}
