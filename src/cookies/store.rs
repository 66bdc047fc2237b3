//! Cookie store infrastructure.
//!
//! A **cookie store** is the durable backing of a
//! [`PersistentCookieJar`](crate::cookies::PersistentCookieJar). The jar keeps the
//! authoritative in-memory index and pushes every change into its store; the
//! store is read once when the jar is opened.
//!
//! This module exports three implementations:
//! - [`InMemoryCookieStore`]: nothing touches disk (tests, private sessions).
//! - [`JsonCookieStore`]: a single JSON file (good for simple setups).
//! - [`SqliteCookieStore`]: an SQLite database, one row per cookie (feature
//!   `sqlite_cookie_store`, enabled by default).
//!
//! ## Design notes
//! - Stores are addressed by [`CookieKey`]; each operation touches one record or,
//!   for `clear`, all of them. No snapshot of the whole jar is ever written.
//! - Implementations should be `Send + Sync` and safe for concurrent access, but
//!   they may assume writes arrive in the order the jar applied them.
//! - Malformed records found by [`CookieStore::load`] are skipped and counted,
//!   never fatal.
//!
//! ## Example
//! ```rust,no_run
//! use gosub_cookies::config::CookieJarConfig;
//! use gosub_cookies::cookies::{JsonCookieStore, PersistentCookieJar};
//!
//! let store = JsonCookieStore::new("cookies.json".into()).unwrap();
//! let (jar, report) = PersistentCookieJar::open(store, &CookieJarConfig::default()).unwrap();
//! println!("loaded {} cookies, skipped {}", report.loaded, report.skipped);
//! ```
mod in_memory;
mod json;
#[cfg(feature = "sqlite_cookie_store")]
mod sqlite;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::cookies::{Cookie, CookieKey, SameSite};
use crate::errors::CookieError;

/// Store that keeps records in process memory only.
pub use in_memory::InMemoryCookieStore;
/// File-backed JSON cookie store.
pub use json::JsonCookieStore;
/// SQLite-backed cookie store.
#[cfg(feature = "sqlite_cookie_store")]
pub use sqlite::SqliteCookieStore;

/// Result of reading every record from a store.
#[derive(Debug, Default)]
pub struct LoadedCookies {
    /// Records that decoded into valid cookies.
    pub cookies: Vec<Cookie>,
    /// Records that were malformed and skipped.
    pub skipped: usize,
}

/// Durable backing for a cookie jar.
///
/// Implementations must be `Send + Sync` and safe for concurrent use.
pub trait CookieStore: Send + Sync {
    /// Reads every persisted cookie.
    ///
    /// Malformed records are skipped and reported through [`LoadedCookies::skipped`].
    /// An error is returned only when the store itself cannot be read.
    fn load(&self) -> Result<LoadedCookies, CookieError>;

    /// Inserts or replaces the record with the same [`CookieKey`].
    fn upsert(&self, cookie: &Cookie) -> Result<(), CookieError>;

    /// Deletes the record for `key`. Deleting a missing record is not an error.
    fn delete(&self, key: &CookieKey) -> Result<(), CookieError>;

    /// Deletes several records at once.
    fn delete_many(&self, keys: &[CookieKey]) -> Result<(), CookieError> {
        for key in keys {
            self.delete(key)?;
        }
        Ok(())
    }

    /// Deletes every record. Must succeed on an empty store.
    fn clear(&self) -> Result<(), CookieError>;
}

/// Persisted form of a [`Cookie`]. Timestamps are unix seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct StoredCookie {
    pub domain: String,
    #[serde(default)]
    pub host_only: bool,
    pub path: String,
    pub name: String,
    pub value: String,
    pub expires: Option<i64>,
    pub secure: bool,
    pub http_only: bool,
    #[serde(default)]
    pub same_site: Option<SameSite>,
    pub creation_time: i64,
    pub last_access_time: i64,
}

impl StoredCookie {
    pub fn key(&self) -> CookieKey {
        CookieKey::new(&self.domain, &self.path, &self.name)
    }
}

impl From<&Cookie> for StoredCookie {
    fn from(c: &Cookie) -> Self {
        Self {
            domain: c.domain.clone(),
            host_only: c.host_only,
            path: c.path.clone(),
            name: c.name.clone(),
            value: c.value.clone(),
            expires: c.expires.map(|t| t.unix_timestamp()),
            secure: c.secure,
            http_only: c.http_only,
            same_site: c.same_site,
            creation_time: c.creation_time.unix_timestamp(),
            last_access_time: c.last_access_time.unix_timestamp(),
        }
    }
}

impl TryFrom<StoredCookie> for Cookie {
    type Error = CookieError;

    fn try_from(s: StoredCookie) -> Result<Self, Self::Error> {
        let key = s.key();
        let ts = |secs: i64, field: &str| {
            OffsetDateTime::from_unix_timestamp(secs)
                .map_err(|e| CookieError::CorruptRecord(format!("{key}: bad {field}: {e}")))
        };

        let mut cookie = Cookie {
            expires: s.expires.map(|secs| ts(secs, "expires")).transpose()?,
            creation_time: ts(s.creation_time, "creation_time")?,
            last_access_time: ts(s.last_access_time, "last_access_time")?,
            name: s.name,
            value: s.value,
            domain: s.domain,
            host_only: s.host_only,
            path: s.path,
            secure: s.secure,
            http_only: s.http_only,
            same_site: s.same_site,
        };

        cookie.normalize_domain();
        cookie.validate().map_err(|e| match e {
            CookieError::InvalidCookie(msg) => CookieError::CorruptRecord(msg),
            other => other,
        })?;
        Ok(cookie)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;

    #[test]
    fn stored_cookie_keeps_all_attributes() {
        let original = Cookie::new("sid", "abc", ".example.com")
            .with_path("/app")
            .with_max_age(Duration::hours(1))
            .with_secure(true)
            .with_http_only(true)
            .with_same_site(SameSite::Strict);

        let restored = Cookie::try_from(StoredCookie::from(&original)).unwrap();

        assert_eq!(restored, original);
        assert_eq!(restored.creation_time.unix_timestamp(), original.creation_time.unix_timestamp());
    }

    #[test]
    fn edited_record_domain_is_normalized() {
        let mut stored = StoredCookie::from(&Cookie::new("sid", "abc", "example.com"));
        stored.domain = ".Example.COM".into();

        assert_eq!(stored.key(), CookieKey::new("example.com", "/", "sid"));
        let cookie = Cookie::try_from(stored).unwrap();
        assert_eq!(cookie.domain, "example.com");
        assert!(!cookie.host_only);
        assert!(cookie.matches("www.example.com", "/", false));
    }

    #[test]
    fn invalid_record_is_corrupt() {
        let mut stored = StoredCookie::from(&Cookie::new("sid", "abc", "example.com"));
        stored.name = String::new();
        assert!(matches!(Cookie::try_from(stored), Err(CookieError::CorruptRecord(_))));

        let mut stored = StoredCookie::from(&Cookie::new("sid", "abc", "example.com"));
        stored.creation_time = i64::MAX;
        assert!(matches!(Cookie::try_from(stored), Err(CookieError::CorruptRecord(_))));
    }
}
