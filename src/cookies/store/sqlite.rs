//! SQLite-backed cookie store.
//!
//! `SqliteCookieStore` persists cookies in a single SQLite database, one row
//! per cookie, keyed by `(domain, path, name)`.
//!
//! ## Design
//! - Database access goes through an `r2d2` pool for safe multi-threaded use.
//! - Every connection gets a `busy_timeout` and the pool a `connection_timeout`
//!   taken from the caller, which bounds how long a store operation may block.
//! - Writes are single-row `INSERT ... ON CONFLICT DO UPDATE` / `DELETE`
//!   statements; batch deletes run in one transaction.
//! - Rows that cannot be decoded are skipped during [`CookieStore::load`].
//!
//! ## Example
//! ```ignore
//! let store = SqliteCookieStore::new("cookies.sqlite", Duration::from_secs(5))?;
//! let (jar, report) = PersistentCookieJar::open(store, &CookieJarConfig::default())?;
//! ```

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::rusqlite::{params, OpenFlags, Row};
use r2d2_sqlite::SqliteConnectionManager;

use crate::cookies::store::{CookieStore, LoadedCookies, StoredCookie};
use crate::cookies::{Cookie, CookieKey, SameSite};
use crate::errors::CookieError;

/// A SQLite-based cookie store that persists cookies across sessions.
pub struct SqliteCookieStore {
    /// Connection pool for SQLite database (so it can run multithreaded)
    pool: Pool<SqliteConnectionManager>,
}

impl SqliteCookieStore {
    /// Opens (or creates) a SQLite database at `path` and ensures the schema exists.
    ///
    /// `io_timeout` bounds how long an operation waits for a pooled connection
    /// or a database lock.
    pub fn new(path: impl AsRef<Path>, io_timeout: Duration) -> Result<Arc<Self>, CookieError> {
        let manager = SqliteConnectionManager::file(path.as_ref())
            .with_flags(
                OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE | OpenFlags::SQLITE_OPEN_URI,
            )
            .with_init(move |c| {
                c.busy_timeout(io_timeout)?;
                c.pragma_update_and_check(None, "journal_mode", "WAL", |_| Ok(()))?;
                Ok(())
            });

        let pool = Pool::builder()
            .max_size(8)
            .connection_timeout(io_timeout)
            .build(manager)?;

        {
            let conn = pool.get()?;
            conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS cookies (
                    domain TEXT NOT NULL,
                    path TEXT NOT NULL,
                    name TEXT NOT NULL,
                    value TEXT NOT NULL,
                    host_only INTEGER NOT NULL,
                    expires INTEGER,
                    secure INTEGER NOT NULL,
                    http_only INTEGER NOT NULL,
                    same_site TEXT,
                    creation_time INTEGER NOT NULL,
                    last_access_time INTEGER NOT NULL,
                    PRIMARY KEY (domain, path, name)
                );",
            )?;
        }

        Ok(Arc::new(Self { pool }))
    }

    /// Borrows a pooled SQLite connection.
    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, CookieError> {
        Ok(self.pool.get()?)
    }
}

/// Decodes one row. Column types are checked by rusqlite, the content by [`Cookie::try_from`].
fn stored_from_row(row: &Row<'_>) -> Result<StoredCookie, CookieError> {
    let same_site = match row.get::<_, Option<String>>(8)? {
        Some(raw) => Some(
            SameSite::parse(&raw).ok_or_else(|| CookieError::CorruptRecord(format!("bad same_site {raw:?}")))?,
        ),
        None => None,
    };

    Ok(StoredCookie {
        domain: row.get(0)?,
        path: row.get(1)?,
        name: row.get(2)?,
        value: row.get(3)?,
        host_only: row.get::<_, i64>(4)? != 0,
        expires: row.get(5)?,
        secure: row.get::<_, i64>(6)? != 0,
        http_only: row.get::<_, i64>(7)? != 0,
        same_site,
        creation_time: row.get(9)?,
        last_access_time: row.get(10)?,
    })
}

impl CookieStore for SqliteCookieStore {
    fn load(&self) -> Result<LoadedCookies, CookieError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT domain, path, name, value, host_only, expires, secure, http_only, same_site,
                    creation_time, last_access_time
             FROM cookies",
        )?;

        let mut loaded = LoadedCookies::default();
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            match stored_from_row(row).and_then(Cookie::try_from) {
                Ok(cookie) => loaded.cookies.push(cookie),
                Err(e) => {
                    log::warn!("Skipping cookie row: {}", e);
                    loaded.skipped += 1;
                }
            }
        }

        Ok(loaded)
    }

    fn upsert(&self, cookie: &Cookie) -> Result<(), CookieError> {
        let stored = StoredCookie::from(cookie);
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO cookies (domain, path, name, value, host_only, expires, secure, http_only,
                                  same_site, creation_time, last_access_time)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
             ON CONFLICT(domain, path, name) DO UPDATE
             SET value=excluded.value, host_only=excluded.host_only, expires=excluded.expires,
                 secure=excluded.secure, http_only=excluded.http_only, same_site=excluded.same_site,
                 creation_time=excluded.creation_time, last_access_time=excluded.last_access_time",
            params![
                stored.domain,
                stored.path,
                stored.name,
                stored.value,
                stored.host_only as i64,
                stored.expires,
                stored.secure as i64,
                stored.http_only as i64,
                stored.same_site.map(|s| s.as_str()),
                stored.creation_time,
                stored.last_access_time,
            ],
        )?;
        Ok(())
    }

    fn delete(&self, key: &CookieKey) -> Result<(), CookieError> {
        let conn = self.conn()?;
        conn.execute(
            "DELETE FROM cookies WHERE domain=?1 AND path=?2 AND name=?3",
            params![key.domain, key.path, key.name],
        )?;
        Ok(())
    }

    fn delete_many(&self, keys: &[CookieKey]) -> Result<(), CookieError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare("DELETE FROM cookies WHERE domain=?1 AND path=?2 AND name=?3")?;
            for key in keys {
                stmt.execute(params![key.domain, key.path, key.name])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn clear(&self) -> Result<(), CookieError> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM cookies", [])?;
        Ok(())
    }
}
