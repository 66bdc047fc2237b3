use std::sync::Arc;

use parking_lot::Mutex;
use time::OffsetDateTime;

use crate::config::CookieJarConfig;
use crate::cookies::cookie_jar::{Change, DefaultCookieJar};
use crate::cookies::{Cookie, CookieJar, CookieJarHandle, CookieKey, CookieStoreHandle};
use crate::errors::CookieError;

/// Outcome of reading the backing store into a jar.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Cookies now in memory.
    pub loaded: usize,
    /// Records that were malformed and skipped.
    pub skipped: usize,
    /// Records that had expired while the process was not running.
    pub expired: usize,
}

/// A `CookieJar` decorator that persists changes after each mutation.
///
/// This type is *transparent* for reads but *eagerly* persists after writes.
/// Writers are serialized by `writer`, which is held across "update memory,
/// then write the store" so the store sees changes in the order they were
/// applied. The in-memory index lock is released before the store is written,
/// so `cookies_for` never waits on disk I/O.
///
/// A failed store write does not roll back the in-memory change; the error is
/// returned to the caller as [`CookieError::Persistence`].
pub struct PersistentCookieJar {
    /// Inner cookie jar that holds the actual cookie state.
    inner: DefaultCookieJar,
    /// Handle to the cookie store responsible for persistence.
    store_handle: CookieStoreHandle,
    /// Serializes mutations and their store writes.
    writer: Mutex<()>,
    persist_session_cookies: bool,
}

impl PersistentCookieJar {
    /// Opens a jar on top of `store` and loads everything it holds.
    ///
    /// The load is the only time the store is read; afterwards memory is authoritative.
    pub fn open(store: CookieStoreHandle, config: &CookieJarConfig) -> Result<(Self, LoadReport), CookieError> {
        let jar = Self {
            inner: DefaultCookieJar::with_config(config),
            store_handle: store,
            writer: Mutex::new(()),
            persist_session_cookies: config.persist_session_cookies,
        };
        let report = jar.load()?;
        Ok((jar, report))
    }

    /// Replaces the in-memory state with what the store holds.
    ///
    /// Records that already expired are dropped from memory and deleted from the store.
    pub fn load(&self) -> Result<LoadReport, CookieError> {
        let _writer = self.writer.lock();

        let loaded = self.store_handle.load()?;
        let now = OffsetDateTime::now_utc();

        let (expired, live): (Vec<Cookie>, Vec<Cookie>) =
            loaded.cookies.into_iter().partition(|c| c.is_expired(now));

        if !expired.is_empty() {
            let keys: Vec<CookieKey> = expired.iter().map(Cookie::key).collect();
            if let Err(e) = self.store_handle.delete_many(&keys) {
                log::warn!("Cannot delete {} expired cookies from store: {}", keys.len(), e);
            }
        }

        let report = LoadReport {
            loaded: live.len(),
            skipped: loaded.skipped,
            expired: expired.len(),
        };
        self.inner.restore_all(live);

        log::info!(
            "Loaded {} cookies ({} corrupt records skipped, {} expired)",
            report.loaded,
            report.skipped,
            report.expired
        );
        Ok(report)
    }

    /// Mirrors an index change into the store.
    fn persist(&self, change: &Change) -> Result<(), CookieError> {
        let mut result = Ok(());

        if let Some(cookie) = &change.stored {
            let write = if cookie.is_session() && !self.persist_session_cookies {
                // A session cookie may replace a persisted one with the same key
                self.store_handle.delete(&cookie.key())
            } else {
                self.store_handle.upsert(cookie)
            };
            result = result.and(write);
        }

        if !change.removed.is_empty() {
            result = result.and(self.store_handle.delete_many(&change.removed));
        }

        if let Err(e) = &result {
            log::error!("Cookie store write failed, keeping in-memory state: {}", e);
        }
        result
    }
}

impl CookieJar for PersistentCookieJar {
    /// Stores the cookie, then persists it (or its deletion).
    fn set_cookie(&self, cookie: Cookie) -> Result<(), CookieError> {
        let _writer = self.writer.lock();
        let change = self.inner.apply_set(cookie, OffsetDateTime::now_utc())?;
        self.persist(&change)
    }

    /// Returns the matching cookies without touching the store.
    fn cookies_for(&self, host: &str, path: &str, is_secure: bool) -> Vec<Cookie> {
        self.inner.cookies_for(host, path, is_secure)
    }

    /// Removes a single cookie, then deletes it from the store.
    fn remove(&self, domain: &str, path: &str, name: &str) -> Result<bool, CookieError> {
        let _writer = self.writer.lock();
        let key = CookieKey::new(domain, path, name);
        let removed = self.inner.apply_remove(&key);
        if removed {
            self.store_handle.delete(&key).inspect_err(|e| {
                log::error!("Cookie store delete of {} failed: {}", key, e);
            })?;
        }
        Ok(removed)
    }

    /// Clears all cookies in the jar, then clears the store.
    fn clear(&self) -> Result<(), CookieError> {
        let _writer = self.writer.lock();
        self.inner.apply_clear();
        self.store_handle.clear().inspect_err(|e| {
            log::error!("Cookie store clear failed: {}", e);
        })
    }

    /// Drops expired cookies from memory and store.
    fn expire_and_sweep(&self, now: OffsetDateTime) -> Result<usize, CookieError> {
        let _writer = self.writer.lock();
        let removed = self.inner.apply_sweep(now);
        let count = removed.len();
        if count > 0 {
            self.persist(&Change {
                stored: None,
                removed,
            })?;
        }
        Ok(count)
    }

    fn all_cookies(&self) -> Vec<Cookie> {
        self.inner.all_cookies()
    }

    fn len(&self) -> usize {
        self.inner.len()
    }
}

impl From<PersistentCookieJar> for CookieJarHandle {
    fn from(jar: PersistentCookieJar) -> Self {
        Arc::new(jar)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cookies::store::{CookieStore, InMemoryCookieStore, LoadedCookies};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Barrier;
    use std::thread;
    use time::Duration;

    /// Wraps an in-memory store and fails every write while `broken` is set.
    struct FlakyStore {
        inner: InMemoryCookieStore,
        broken: AtomicBool,
    }

    impl FlakyStore {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                inner: InMemoryCookieStore::default(),
                broken: AtomicBool::new(false),
            })
        }

        fn check(&self) -> Result<(), CookieError> {
            if self.broken.load(Ordering::SeqCst) {
                Err(CookieError::Persistence("disk full".into()))
            } else {
                Ok(())
            }
        }
    }

    impl CookieStore for FlakyStore {
        fn load(&self) -> Result<LoadedCookies, CookieError> {
            self.inner.load()
        }
        fn upsert(&self, cookie: &Cookie) -> Result<(), CookieError> {
            self.check()?;
            self.inner.upsert(cookie)
        }
        fn delete(&self, key: &CookieKey) -> Result<(), CookieError> {
            self.check()?;
            self.inner.delete(key)
        }
        fn clear(&self) -> Result<(), CookieError> {
            self.check()?;
            self.inner.clear()
        }
    }

    fn persistent(name: &str, value: &str) -> Cookie {
        Cookie::new(name, value, ".example.com").with_max_age(Duration::hours(1))
    }

    fn open(store: Arc<InMemoryCookieStore>) -> PersistentCookieJar {
        PersistentCookieJar::open(store, &CookieJarConfig::default()).unwrap().0
    }

    #[test]
    fn mutations_reach_the_store() {
        let store = Arc::new(InMemoryCookieStore::new());
        let jar = open(store.clone());

        let sid = persistent("sid", "abc123");
        jar.set_cookie(sid.clone()).unwrap();
        jar.set_cookie(persistent("theme", "dark")).unwrap();
        assert_eq!(store.len(), 2);

        assert!(jar.remove("example.com", "/", "theme").unwrap());
        assert_eq!(store.len(), 1);

        let reopened = open(store.clone());
        let found = reopened.cookies_for("api.example.com", "/foo", false);
        assert_eq!(found, vec![sid]);
    }

    #[test]
    fn session_cookies_are_not_persisted_by_default() {
        let store = Arc::new(InMemoryCookieStore::new());
        let jar = open(store.clone());

        jar.set_cookie(Cookie::new("session", "1", "example.com")).unwrap();
        assert_eq!(jar.len(), 1);
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn session_cookie_replacing_persistent_one_deletes_record() {
        let store = Arc::new(InMemoryCookieStore::new());
        let jar = open(store.clone());

        jar.set_cookie(persistent("sid", "1")).unwrap();
        jar.set_cookie(Cookie::new("sid", "2", ".example.com")).unwrap();
        assert_eq!(store.len(), 0);
        assert_eq!(jar.cookies_for("example.com", "/", false)[0].value, "2");
    }

    #[test]
    fn session_cookies_persist_when_configured() {
        let store = Arc::new(InMemoryCookieStore::new());
        let config = CookieJarConfig::builder().persist_session_cookies(true).build().unwrap();
        let (jar, _) = PersistentCookieJar::open(store.clone(), &config).unwrap();

        jar.set_cookie(Cookie::new("session", "1", "example.com")).unwrap();
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn expired_set_removes_persisted_record() {
        let store = Arc::new(InMemoryCookieStore::new());
        let jar = open(store.clone());

        jar.set_cookie(persistent("sid", "abc")).unwrap();
        jar.set_cookie(Cookie::new("sid", "", ".example.com").with_max_age(Duration::ZERO))
            .unwrap();

        assert!(jar.cookies_for("www.example.com", "/", false).is_empty());
        assert_eq!(store.len(), 0);
        assert_eq!(jar.expire_and_sweep(OffsetDateTime::now_utc()).unwrap(), 0);
    }

    #[test]
    fn clear_empties_memory_and_store() {
        let store = Arc::new(InMemoryCookieStore::new());
        let jar = open(store.clone());
        jar.clear().unwrap();

        jar.set_cookie(persistent("a", "1")).unwrap();
        jar.set_cookie(persistent("b", "1")).unwrap();
        jar.clear().unwrap();

        for secure in [false, true] {
            assert!(jar.cookies_for("example.com", "/", secure).is_empty());
        }
        let (reopened, report) = PersistentCookieJar::open(store, &CookieJarConfig::default()).unwrap();
        assert!(reopened.is_empty());
        assert_eq!(report.loaded, 0);
    }

    #[test]
    fn sweep_deletes_from_store() {
        let store = Arc::new(InMemoryCookieStore::new());
        let jar = open(store.clone());
        jar.set_cookie(persistent("a", "1")).unwrap();
        jar.set_cookie(Cookie::new("b", "1", "example.com").with_max_age(Duration::days(2)))
            .unwrap();

        let later = OffsetDateTime::now_utc() + Duration::days(1);
        assert_eq!(jar.expire_and_sweep(later).unwrap(), 1);
        assert_eq!(store.len(), 1);
        assert_eq!(jar.len(), 1);
    }

    #[test]
    fn load_drops_records_that_expired_offline() {
        let store = Arc::new(InMemoryCookieStore::new());
        let mut stale = persistent("stale", "1");
        stale.expires = Some(OffsetDateTime::now_utc() - Duration::minutes(5));
        store.upsert(&stale).unwrap();
        store.upsert(&persistent("fresh", "1")).unwrap();

        let (jar, report) = PersistentCookieJar::open(store.clone(), &CookieJarConfig::default()).unwrap();
        assert_eq!(report, LoadReport { loaded: 1, skipped: 0, expired: 1 });
        assert_eq!(jar.len(), 1);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn persistence_failure_keeps_memory_state() {
        let store = FlakyStore::new();
        let (jar, _) = PersistentCookieJar::open(store.clone(), &CookieJarConfig::default()).unwrap();

        store.broken.store(true, Ordering::SeqCst);
        let err = jar.set_cookie(persistent("sid", "abc")).unwrap_err();
        assert!(err.is_persistence());
        assert_eq!(jar.cookies_for("example.com", "/", false).len(), 1);

        let err = jar.clear().unwrap_err();
        assert!(err.is_persistence());
        assert!(jar.is_empty());

        // Invalid input is still rejected before the store is involved
        let err = jar.set_cookie(Cookie::new("", "x", "example.com")).unwrap_err();
        assert!(matches!(err, CookieError::InvalidCookie(_)));
    }

    #[test]
    fn concurrent_writers_are_all_persisted() {
        const WRITERS: usize = 8;
        const PER_WRITER: usize = 20;

        let store = Arc::new(InMemoryCookieStore::new());
        let config = CookieJarConfig::builder().max_cookies_per_domain(1000).build().unwrap();
        let jar: CookieJarHandle = PersistentCookieJar::open(store.clone(), &config).unwrap().0.into();
        let barrier = Arc::new(Barrier::new(WRITERS));

        let handles: Vec<_> = (0..WRITERS)
            .map(|w| {
                let jar = jar.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    for i in 0..PER_WRITER {
                        let cookie = Cookie::new(format!("w{w}-{i}"), "v", "example.com")
                            .with_max_age(Duration::hours(1));
                        jar.set_cookie(cookie).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(jar.cookies_for("example.com", "/", false).len(), WRITERS * PER_WRITER);
        assert_eq!(store.len(), WRITERS * PER_WRITER);
    }
}
