//! Bridge between `reqwest` and our cookie jars.
//!
//! `reqwest` asks its cookie provider for a `Cookie` header before each request
//! and hands it every `Set-Cookie` header of each response. [`ClientCookies`]
//! answers both from a [`CookieJarHandle`]. The provider interface has no way
//! to report errors, so the last persistence failure is kept aside and can be
//! picked up with [`ClientCookies::take_last_error`].

use std::sync::Arc;

use http::HeaderValue;
use parking_lot::Mutex;
use url::Url;

use crate::cookies::CookieJarHandle;
use crate::errors::CookieError;

pub const DEFAULT_USER_AGENT: &str = "Gosub/1.0 (X11; Linux x86_64) GosubCookies/1.0";

pub struct ClientCookies {
    jar: CookieJarHandle,
    last_error: Mutex<Option<CookieError>>,
}

impl ClientCookies {
    pub fn new(jar: CookieJarHandle) -> Self {
        Self {
            jar,
            last_error: Mutex::new(None),
        }
    }

    pub fn jar(&self) -> &CookieJarHandle {
        &self.jar
    }

    /// Returns (and forgets) the most recent error raised while storing response cookies.
    pub fn take_last_error(&self) -> Option<CookieError> {
        self.last_error.lock().take()
    }
}

impl reqwest::cookie::CookieStore for ClientCookies {
    fn set_cookies(&self, cookie_headers: &mut dyn Iterator<Item = &HeaderValue>, url: &Url) {
        let mut values = cookie_headers.filter_map(|v| v.to_str().ok());
        if let Err(e) = self.jar.store_set_cookie_headers(url, &mut values) {
            log::error!("Failed to store cookies from {}: {}", url, e);
            *self.last_error.lock() = Some(e);
        }
    }

    fn cookies(&self, url: &Url) -> Option<HeaderValue> {
        let header = self.jar.get_request_cookies(url)?;
        match HeaderValue::from_str(&header) {
            Ok(value) => Some(value),
            Err(e) => {
                log::debug!("Not sending cookies to {}: {}", url, e);
                None
            }
        }
    }
}

/// Builds a client that sends and stores cookies through `jar`.
///
/// The returned [`ClientCookies`] is the same provider the client uses, so
/// callers can check it for persistence errors after a request.
pub fn client_with_cookies(
    jar: CookieJarHandle,
    user_agent: &str,
) -> Result<(reqwest::Client, Arc<ClientCookies>), reqwest::Error> {
    let cookies = Arc::new(ClientCookies::new(jar));
    let client = reqwest::Client::builder()
        .user_agent(user_agent)
        .cookie_provider(cookies.clone())
        .build()?;
    Ok((client, cookies))
}
