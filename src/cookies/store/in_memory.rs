use std::collections::BTreeMap;

use parking_lot::RwLock;

use crate::cookies::store::{CookieStore, LoadedCookies};
use crate::cookies::{Cookie, CookieKey};
use crate::errors::CookieError;

/// A store that never touches disk. Useful for tests and private sessions.
#[derive(Debug, Default)]
pub struct InMemoryCookieStore {
    /// Persisted records by key
    records: RwLock<BTreeMap<CookieKey, Cookie>>,
}

impl InMemoryCookieStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records currently held.
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

impl CookieStore for InMemoryCookieStore {
    fn load(&self) -> Result<LoadedCookies, CookieError> {
        Ok(LoadedCookies {
            cookies: self.records.read().values().cloned().collect(),
            skipped: 0,
        })
    }

    fn upsert(&self, cookie: &Cookie) -> Result<(), CookieError> {
        self.records.write().insert(cookie.key(), cookie.clone());
        Ok(())
    }

    fn delete(&self, key: &CookieKey) -> Result<(), CookieError> {
        self.records.write().remove(key);
        Ok(())
    }

    fn clear(&self) -> Result<(), CookieError> {
        self.records.write().clear();
        Ok(())
    }
}
