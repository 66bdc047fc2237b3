//! Buffered HTTP response.
//!
//! Holds the final URL, status, headers and body of a request made through
//! [`fetch`](crate::net::fetch). `Set-Cookie` headers are left in `headers`
//! even though the client's cookie provider has already consumed them.
use http::header::{CONTENT_TYPE, SET_COOKIE};
use http::HeaderMap;

#[derive(Debug)]
pub struct Response {
    /// Final URL of the response (after redirects, if any).
    pub url: url::Url,

    /// Numeric HTTP status code (e.g., `200`, `404`).
    pub status: u16,

    /// Canonical reason phrase, `"Unknown"` for non-standard codes.
    pub status_text: String,

    /// Response headers as a case-insensitive map.
    pub headers: HeaderMap,

    /// Raw response body bytes.
    pub body: Vec<u8>,
}

impl Response {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok())
    }

    /// Raw `Set-Cookie` values sent with this response.
    pub fn set_cookie_headers(&self) -> impl Iterator<Item = &str> {
        self.headers.get_all(SET_COOKIE).iter().filter_map(|v| v.to_str().ok())
    }

    /// The body decoded as UTF-8, with invalid sequences replaced.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}
