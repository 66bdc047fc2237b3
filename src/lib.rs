//! A persistent HTTP cookie jar.
//!
//! Cookies received in `Set-Cookie` headers are kept in a [`cookies::CookieJar`],
//! optionally mirrored to disk through a [`cookies::CookieStore`], and sent back
//! on later requests. The [`net`] module plugs a jar into a `reqwest` client.

pub mod config;
pub mod cookies;
pub mod errors;
pub mod net;

pub use errors::CookieError;
