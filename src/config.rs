//! Cookie jar configuration.
//!
//! `CookieJarConfig` controls how a [`PersistentCookieJar`](crate::cookies::PersistentCookieJar)
//! treats session cookies, how many cookies it keeps, and how long the backing
//! store may block on I/O.
//!
//! `CookieJarConfig` provides sensible defaults via [`Default`] and a fluent
//! [`CookieJarConfig::builder()`] for customization with validation.
//!
//! # Examples
//!
//! ## Use defaults
//! ```rust
//! use gosub_cookies::config::CookieJarConfig;
//! let cfg = CookieJarConfig::default();
//! assert!(!cfg.persist_session_cookies);
//! assert_eq!(cfg.max_cookies, 3000);
//! ```
//!
//! ## Customize with the builder
//! ```rust
//! use std::time::Duration;
//! use gosub_cookies::config::CookieJarConfig;
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let cfg = CookieJarConfig::builder()
//!     .persist_session_cookies(true)
//!     .max_cookies(500)
//!     .max_cookies_per_domain(20)
//!     .io_timeout(Duration::from_secs(2))
//!     .build()?; // returns Result<CookieJarConfig, ConfigError>
//! # Ok(()) }
//! ```
//!
//! # Fields (summary)
//! - `persist_session_cookies`: write cookies without an expiry to the store (default: `false`).
//! - `max_cookies`: total number of cookies kept in the jar (default: 3000).
//! - `max_cookies_per_domain`: cookies kept per cookie domain (default: 50).
//! - `io_timeout`: upper bound for a single store operation to wait on locks/connections (default: 5s).
//! - `sweep_interval`: period of the background expiry sweeper (default: 60s).
//!
//! # Errors
//!
//! Builder validation returns [`ConfigError`] if a limit is zero, if the
//! per-domain limit exceeds the total limit, or if a duration is zero.

use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct CookieJarConfig {
    pub persist_session_cookies: bool,
    pub max_cookies: usize,
    pub max_cookies_per_domain: usize,
    pub io_timeout: Duration,
    pub sweep_interval: Duration,
}

impl Default for CookieJarConfig {
    fn default() -> Self {
        Self {
            persist_session_cookies: false,
            max_cookies: 3000,
            max_cookies_per_domain: 50,
            io_timeout: Duration::from_secs(5),
            sweep_interval: Duration::from_secs(60),
        }
    }
}

impl CookieJarConfig {
    pub fn builder() -> CookieJarConfigBuilder {
        CookieJarConfigBuilder::default()
    }
}

/// Builder for [`CookieJarConfig`].
#[derive(Debug, Clone, Default)]
pub struct CookieJarConfigBuilder {
    inner: CookieJarConfig,
}

impl CookieJarConfigBuilder {
    #[inline]
    fn map(mut self, f: impl FnOnce(&mut CookieJarConfig)) -> Self {
        f(&mut self.inner);
        self
    }

    pub fn persist_session_cookies(self, on: bool) -> Self { self.map(|c| c.persist_session_cookies = on) }
    pub fn max_cookies(self, n: usize) -> Self { self.map(|c| c.max_cookies = n) }
    pub fn max_cookies_per_domain(self, n: usize) -> Self { self.map(|c| c.max_cookies_per_domain = n) }
    pub fn io_timeout(self, timeout: Duration) -> Self { self.map(|c| c.io_timeout = timeout) }
    pub fn sweep_interval(self, interval: Duration) -> Self { self.map(|c| c.sweep_interval = interval) }

    /// Apply multiple changes in one go.
    pub fn with(self, f: impl FnOnce(&mut CookieJarConfig)) -> Self { self.map(f) }

    /// Validate and build the final config.
    pub fn build(self) -> Result<CookieJarConfig, ConfigError> {
        validate(&self.inner)?;
        Ok(self.inner)
    }
}

// ---------- Validation ----------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    ZeroLimit(&'static str),
    DomainLimitLarger { per_domain: usize, total: usize },
    ZeroDuration(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ZeroLimit(field) =>
                write!(f, "{field} must be at least 1"),
            ConfigError::DomainLimitLarger { per_domain, total } =>
                write!(f, "max_cookies_per_domain ({per_domain}) > max_cookies ({total})"),
            ConfigError::ZeroDuration(field) =>
                write!(f, "{field} must be greater than zero"),
        }
    }
}
impl std::error::Error for ConfigError {}

fn validate(c: &CookieJarConfig) -> Result<(), ConfigError> {
    if c.max_cookies == 0 {
        return Err(ConfigError::ZeroLimit("max_cookies"));
    }
    if c.max_cookies_per_domain == 0 {
        return Err(ConfigError::ZeroLimit("max_cookies_per_domain"));
    }
    if c.max_cookies_per_domain > c.max_cookies {
        return Err(ConfigError::DomainLimitLarger {
            per_domain: c.max_cookies_per_domain,
            total: c.max_cookies,
        });
    }
    if c.io_timeout.is_zero() {
        return Err(ConfigError::ZeroDuration("io_timeout"));
    }
    if c.sweep_interval.is_zero() {
        return Err(ConfigError::ZeroDuration("sweep_interval"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = CookieJarConfig::builder().build().unwrap();
        assert!(!cfg.persist_session_cookies);
        assert_eq!(cfg.max_cookies_per_domain, 50);
    }

    #[test]
    fn per_domain_limit_cannot_exceed_total() {
        let err = CookieJarConfig::builder()
            .max_cookies(10)
            .max_cookies_per_domain(11)
            .build()
            .unwrap_err();
        assert_eq!(err, ConfigError::DomainLimitLarger { per_domain: 11, total: 10 });
    }

    #[test]
    fn zero_values_are_rejected() {
        assert_eq!(
            CookieJarConfig::builder().max_cookies(0).build().unwrap_err(),
            ConfigError::ZeroLimit("max_cookies")
        );
        assert_eq!(
            CookieJarConfig::builder().io_timeout(Duration::ZERO).build().unwrap_err(),
            ConfigError::ZeroDuration("io_timeout")
        );
    }

    #[test]
    fn with_applies_several_changes() {
        let cfg = CookieJarConfig::builder()
            .with(|c| {
                c.max_cookies = 100;
                c.max_cookies_per_domain = 5;
            })
            .build()
            .unwrap();
        assert_eq!(cfg.max_cookies, 100);
        assert_eq!(cfg.max_cookies_per_domain, 5);
    }
}
