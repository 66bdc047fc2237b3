//! JSON-backed cookie store.
//!
//! `JsonCookieStore` keeps every persisted cookie in a single JSON file on disk:
//!
//! ```json
//! { "version": 1, "cookies": [ { "domain": "example.com", "path": "/", "name": "sid", ... } ] }
//! ```
//!
//! ### Design
//! - The records are cached in memory (`records`) once the file has been read, so
//!   each mutation only has to serialize, not re-read.
//! - Every write replaces the whole file. The new content goes to a temporary
//!   file in the same directory which is then renamed over the old one, so a
//!   crash never leaves a half-written document behind.
//! - Records are decoded one by one; a malformed record is skipped and counted,
//!   the rest still load. A file that is not a JSON document at all is reported
//!   by [`CookieStore::load`] as a [`CookieError::Persistence`]. Writes do not
//!   get stuck on such a file: `clear` overwrites it, and any other mutation
//!   first renames it to `<path>.corrupt` and continues from an empty set.
//!
//! ### I/O characteristics & caveats
//! - Rewriting the file is `O(number of cookies)` per mutation. For large jars
//!   consider the SQLite-backed store.
//!
//! ### Example
//! ```ignore
//! let store = JsonCookieStore::new("cookies.json".into())?;
//! let (jar, report) = PersistentCookieJar::open(store, &CookieJarConfig::default())?;
//! ```
use std::collections::BTreeMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::cookies::store::{CookieStore, LoadedCookies, StoredCookie};
use crate::cookies::{Cookie, CookieKey};
use crate::errors::CookieError;

const FILE_VERSION: u32 = 1;

/// On-disk representation, as written.
#[derive(Debug, Serialize)]
struct CookieFileOut<'a> {
    version: u32,
    cookies: Vec<&'a StoredCookie>,
}

/// On-disk representation, as read. Records stay raw so each can fail on its own.
#[derive(Debug, Deserialize)]
struct CookieFileIn {
    #[serde(default)]
    version: Option<u32>,
    #[serde(default)]
    cookies: Vec<serde_json::Value>,
}

/// A JSON-file cookie store.
pub struct JsonCookieStore {
    /// Path to the JSON file where cookies are stored.
    path: PathBuf,

    /// Cached file content; `None` until the file has been read.
    records: Mutex<Option<BTreeMap<CookieKey, StoredCookie>>>,
}

impl JsonCookieStore {
    /// Creates (or opens) a JSON cookie store at `path`.
    ///
    /// If the file does not exist, an empty document is written so that
    /// permission problems show up here rather than on the first cookie.
    pub fn new(path: PathBuf) -> Result<Arc<Self>, CookieError> {
        let store = Self {
            path,
            records: Mutex::new(None),
        };

        if !store.path.exists() {
            store.save_file(&BTreeMap::new())?;
        }

        Ok(Arc::new(store))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads and decodes the file, skipping malformed records.
    ///
    /// Returns `Ok(None)` when the file exists but is not a cookie document at all.
    fn read_file(&self) -> Result<Option<(BTreeMap<CookieKey, StoredCookie>, LoadedCookies)>, CookieError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => String::new(),
            Err(e) => return Err(e.into()),
        };

        let mut records = BTreeMap::new();
        let mut loaded = LoadedCookies::default();
        if contents.trim().is_empty() {
            return Ok(Some((records, loaded)));
        }

        let file: CookieFileIn = match serde_json::from_str(&contents) {
            Ok(file) => file,
            Err(e) => {
                log::warn!("{} is not a cookie file: {}", self.path.display(), e);
                return Ok(None);
            }
        };
        if let Some(version) = file.version.filter(|v| *v > FILE_VERSION) {
            log::warn!("{} has version {}, reading it as version {}", self.path.display(), version, FILE_VERSION);
        }

        for (idx, raw) in file.cookies.into_iter().enumerate() {
            let decoded = serde_json::from_value::<StoredCookie>(raw)
                .map_err(|e| CookieError::CorruptRecord(e.to_string()))
                .and_then(|stored| Cookie::try_from(stored.clone()).map(|cookie| (stored, cookie)));

            match decoded {
                Ok((stored, cookie)) => {
                    records.insert(stored.key(), stored);
                    loaded.cookies.push(cookie);
                }
                Err(e) => {
                    log::warn!("Skipping cookie record #{} in {}: {}", idx, self.path.display(), e);
                    loaded.skipped += 1;
                }
            }
        }

        Ok(Some((records, loaded)))
    }

    /// Where an unreadable document is moved before it gets overwritten.
    pub fn corrupt_path(&self) -> PathBuf {
        let mut path = self.path.clone().into_os_string();
        path.push(".corrupt");
        PathBuf::from(path)
    }

    /// Moves an unreadable document out of the way and starts from an empty set.
    fn set_aside(&self) -> Result<BTreeMap<CookieKey, StoredCookie>, CookieError> {
        let target = self.corrupt_path();
        log::warn!("Moving unreadable {} to {}", self.path.display(), target.display());
        fs::rename(&self.path, &target)?;
        Ok(BTreeMap::new())
    }

    /// Serializes `records` and atomically replaces the file.
    fn save_file(&self, records: &BTreeMap<CookieKey, StoredCookie>) -> Result<(), CookieError> {
        let document = CookieFileOut {
            version: FILE_VERSION,
            cookies: records.values().collect(),
        };
        let contents = serde_json::to_vec_pretty(&document)?;

        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(&contents)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path)?;
        Ok(())
    }

    /// Runs `f` on the cached records (reading the file first if needed) and saves the result.
    fn mutate<F>(&self, f: F) -> Result<(), CookieError>
    where
        F: FnOnce(&mut BTreeMap<CookieKey, StoredCookie>) -> bool,
    {
        let mut guard = self.records.lock();
        if guard.is_none() {
            let records = match self.read_file()? {
                Some((records, _)) => records,
                None => self.set_aside()?,
            };
            *guard = Some(records);
        }

        let records = guard.get_or_insert_with(BTreeMap::new);
        if f(records) {
            self.save_file(records)?;
        }
        Ok(())
    }
}

impl CookieStore for JsonCookieStore {
    fn load(&self) -> Result<LoadedCookies, CookieError> {
        let mut guard = self.records.lock();
        let (records, loaded) = self.read_file()?.ok_or_else(|| {
            CookieError::Persistence(format!("{} is not a cookie file", self.path.display()))
        })?;
        *guard = Some(records);
        Ok(loaded)
    }

    fn upsert(&self, cookie: &Cookie) -> Result<(), CookieError> {
        let stored = StoredCookie::from(cookie);
        self.mutate(|records| {
            records.insert(stored.key(), stored);
            true
        })
    }

    fn delete(&self, key: &CookieKey) -> Result<(), CookieError> {
        self.mutate(|records| records.remove(key).is_some())
    }

    fn delete_many(&self, keys: &[CookieKey]) -> Result<(), CookieError> {
        self.mutate(|records| {
            let before = records.len();
            for key in keys {
                records.remove(key);
            }
            records.len() != before
        })
    }

    fn clear(&self) -> Result<(), CookieError> {
        // Whatever is on disk gets replaced, readable or not
        let mut guard = self.records.lock();
        let records = BTreeMap::new();
        self.save_file(&records)?;
        *guard = Some(records);
        Ok(())
    }
}
