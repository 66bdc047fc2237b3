use crate::config::ConfigError;

#[derive(Debug, thiserror::Error)]
pub enum CookieError {
    #[error("Invalid cookie: {0}")]
    InvalidCookie(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Corrupt cookie record: {0}")]
    CorruptRecord(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl CookieError {
    /// Returns true when the in-memory jar was updated but the backing store was not.
    pub fn is_persistence(&self) -> bool {
        matches!(self, CookieError::Persistence(_))
    }
}

impl From<std::io::Error> for CookieError {
    fn from(e: std::io::Error) -> Self {
        CookieError::Persistence(e.to_string())
    }
}

impl From<serde_json::Error> for CookieError {
    fn from(e: serde_json::Error) -> Self {
        CookieError::Persistence(e.to_string())
    }
}

impl From<tempfile::PersistError> for CookieError {
    fn from(e: tempfile::PersistError) -> Self {
        CookieError::Persistence(e.error.to_string())
    }
}

#[cfg(feature = "sqlite_cookie_store")]
impl From<r2d2::Error> for CookieError {
    fn from(e: r2d2::Error) -> Self {
        CookieError::Persistence(e.to_string())
    }
}

#[cfg(feature = "sqlite_cookie_store")]
impl From<r2d2_sqlite::rusqlite::Error> for CookieError {
    fn from(e: r2d2_sqlite::rusqlite::Error) -> Self {
        CookieError::Persistence(e.to_string())
    }
}
