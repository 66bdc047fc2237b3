//! HTTP plumbing around the cookie jar.
//!
//! [`client_with_cookies`] builds a `reqwest` client whose cookie handling is
//! backed by one of our jars, and [`fetch`] loads a URL into a fully buffered
//! [`Response`].

mod client_cookies;
mod fetch;
mod response;

pub use client_cookies::client_with_cookies;
pub use client_cookies::ClientCookies;
pub use client_cookies::DEFAULT_USER_AGENT;
pub use fetch::fetch;
pub use response::Response;
