//! Accept/refuse cookies as a decorator around a jar.
//!
//! The jar itself has no "enabled" flag. An application that lets the user
//! switch cookies off wraps its jar in a [`PolicyCookieJar`] and hands the
//! wrapper to the HTTP client instead. Every policy change clears the wrapped
//! jar so no cookie from the previous mode leaks into the next one.

use std::sync::Arc;

use parking_lot::RwLock;
use time::OffsetDateTime;
use url::Url;

use crate::cookies::{Cookie, CookieJar, CookieJarHandle};
use crate::errors::CookieError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CookiePolicy {
    /// Send stored cookies and record new ones.
    #[default]
    AcceptAll,
    /// Send nothing and ignore every `Set-Cookie`.
    AcceptNone,
}

pub struct PolicyCookieJar {
    inner: CookieJarHandle,
    policy: RwLock<CookiePolicy>,
}

impl PolicyCookieJar {
    pub fn new(inner: CookieJarHandle, policy: CookiePolicy) -> Self {
        Self {
            inner,
            policy: RwLock::new(policy),
        }
    }

    pub fn policy(&self) -> CookiePolicy {
        *self.policy.read()
    }

    pub fn is_enabled(&self) -> bool {
        self.policy() == CookiePolicy::AcceptAll
    }

    /// Switches the policy. On an actual change the wrapped jar is cleared first.
    ///
    /// Returns whether the policy changed. If clearing fails with a persistence
    /// error the policy is still switched and the error is returned.
    pub fn set_policy(&self, policy: CookiePolicy) -> Result<bool, CookieError> {
        let mut current = self.policy.write();
        if *current == policy {
            return Ok(false);
        }

        log::info!("Cookie policy {:?} -> {:?}", *current, policy);
        let cleared = self.inner.clear();
        *current = policy;
        cleared.map(|_| true)
    }

    pub fn set_enabled(&self, enabled: bool) -> Result<bool, CookieError> {
        self.set_policy(if enabled { CookiePolicy::AcceptAll } else { CookiePolicy::AcceptNone })
    }

    /// The wrapped jar.
    pub fn inner(&self) -> &CookieJarHandle {
        &self.inner
    }
}

// Reads and writes hold the policy read lock for the whole inner call, so they
// cannot interleave with the clear in `set_policy`.
impl CookieJar for PolicyCookieJar {
    fn set_cookie(&self, cookie: Cookie) -> Result<(), CookieError> {
        let policy = self.policy.read();
        match *policy {
            CookiePolicy::AcceptAll => self.inner.set_cookie(cookie),
            CookiePolicy::AcceptNone => Ok(()),
        }
    }

    fn cookies_for(&self, host: &str, path: &str, is_secure: bool) -> Vec<Cookie> {
        let policy = self.policy.read();
        match *policy {
            CookiePolicy::AcceptAll => self.inner.cookies_for(host, path, is_secure),
            CookiePolicy::AcceptNone => Vec::new(),
        }
    }

    /// Refused headers are not counted: under `AcceptNone` this always returns 0.
    fn store_set_cookie_headers(
        &self,
        url: &Url,
        headers: &mut dyn Iterator<Item = &str>,
    ) -> Result<usize, CookieError> {
        let policy = self.policy.read();
        match *policy {
            CookiePolicy::AcceptAll => self.inner.store_set_cookie_headers(url, headers),
            CookiePolicy::AcceptNone => Ok(0),
        }
    }

    fn remove(&self, domain: &str, path: &str, name: &str) -> Result<bool, CookieError> {
        self.inner.remove(domain, path, name)
    }

    fn clear(&self) -> Result<(), CookieError> {
        self.inner.clear()
    }

    fn expire_and_sweep(&self, now: OffsetDateTime) -> Result<usize, CookieError> {
        self.inner.expire_and_sweep(now)
    }

    fn all_cookies(&self) -> Vec<Cookie> {
        self.inner.all_cookies()
    }

    fn len(&self) -> usize {
        self.inner.len()
    }
}

impl From<PolicyCookieJar> for CookieJarHandle {
    fn from(jar: PolicyCookieJar) -> Self {
        Arc::new(jar)
    }
}
