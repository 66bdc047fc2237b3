//! Loads httpbin twice across runs to show cookies surviving a restart.
//!
//! On the first run the jar is empty, so we ask httpbin to set a `time` cookie.
//! Every later run finds that cookie on disk and sends it to `/cookies`, which
//! echoes it back. Pass `--disable-cookies` to switch cookies off (this also
//! clears the stored jar).
//!
//! ```sh
//! RUST_LOG=debug cargo run --example persistent_cookies
//! ```

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Context;
use gosub_cookies::config::CookieJarConfig;
use gosub_cookies::cookies::sweeper::spawn_sweeper;
use gosub_cookies::cookies::{CookieJar, CookieJarHandle, CookiePolicy, JsonCookieStore, PersistentCookieJar, PolicyCookieJar};
use gosub_cookies::net::{client_with_cookies, fetch, DEFAULT_USER_AGENT};
use tokio_util::sync::CancellationToken;

const HTTPBIN: &str = "https://httpbin.org";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let disable_cookies = std::env::args().any(|arg| arg == "--disable-cookies");

    // Session cookies are persisted too, httpbin never sends an expiry
    let config = CookieJarConfig::builder()
        .persist_session_cookies(true)
        .build()
        .context("invalid cookie jar configuration")?;

    let path = std::env::temp_dir().join("gosub-cookies.json");
    let store = JsonCookieStore::new(path.clone()).context("cannot open cookie file")?;
    let (jar, report) = PersistentCookieJar::open(store, &config)?;
    println!(
        "Opened {} ({} cookies, {} skipped, {} expired)",
        path.display(),
        report.loaded,
        report.skipped,
        report.expired
    );

    let jar = Arc::new(PolicyCookieJar::new(jar.into(), CookiePolicy::AcceptAll));
    jar.set_enabled(!disable_cookies)?;

    let handle: CookieJarHandle = jar.clone();
    let cancel = CancellationToken::new();
    let sweeper = spawn_sweeper(handle.clone(), config.sweep_interval, cancel.clone());

    let (client, provider) = client_with_cookies(handle, DEFAULT_USER_AGENT)?;

    let url = if jar.inner().is_empty() {
        let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs();
        format!("{HTTPBIN}/cookies/set?time={now}")
    } else {
        format!("{HTTPBIN}/cookies")
    };

    println!("GET {url}");
    let response = fetch(&client, &url).await?;
    println!("{} {} from {}", response.status, response.status_text, response.url);
    if !response.is_success() {
        eprintln!("httpbin answered with an error status");
    }
    for header in response.set_cookie_headers() {
        println!("Set-Cookie: {header}");
    }
    println!("{} body:", response.content_type().unwrap_or("untyped"));
    println!("{}", response.text());

    if let Some(e) = provider.take_last_error() {
        eprintln!("Cookies were not saved: {e}");
    }

    for cookie in jar.all_cookies() {
        println!("stored: {} (domain={}, path={})", cookie.pair(), cookie.domain, cookie.path);
    }

    cancel.cancel();
    sweeper.await?;
    Ok(())
}
