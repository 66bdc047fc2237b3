//! Cookies: [`CookieJar`], [`CookieStore`] and backends.
//!
//! A [`DefaultCookieJar`] keeps cookies in memory. Wrap a [`CookieStore`] in a
//! [`PersistentCookieJar`] to have every change mirrored to disk, and put a
//! [`PolicyCookieJar`] in front of either to let the user switch cookies off.

mod cookies;
mod cookie_jar;
pub mod domain;
mod persistent_cookie_jar;
mod policy;
pub mod set_cookie;
pub mod store;
pub mod sweeper;

pub use cookies::Cookie;
pub use cookies::CookieJarHandle;
pub use cookies::CookieKey;
pub use cookies::CookieStoreHandle;
pub use cookies::SameSite;

pub use cookie_jar::CookieJar;
pub use cookie_jar::DefaultCookieJar;
pub use persistent_cookie_jar::LoadReport;
pub use persistent_cookie_jar::PersistentCookieJar;
pub use policy::CookiePolicy;
pub use policy::PolicyCookieJar;

pub use store::CookieStore;
pub use store::InMemoryCookieStore;
pub use store::JsonCookieStore;
pub use store::LoadedCookies;
#[cfg(feature = "sqlite_cookie_store")]
pub use store::SqliteCookieStore;
