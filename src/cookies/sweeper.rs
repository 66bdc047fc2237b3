//! Periodic removal of expired cookies.
//!
//! Expired cookies are already hidden from `cookies_for`; the sweeper just
//! reclaims memory and store space. The sweep itself may block on disk I/O, so
//! it runs on tokio's blocking pool.

use std::time::Duration;

use time::OffsetDateTime;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::cookies::CookieJarHandle;

/// Spawns a task that calls [`expire_and_sweep`](crate::cookies::CookieJar::expire_and_sweep)
/// every `interval` until `cancel` fires.
///
/// Failures are logged and the task keeps running.
pub fn spawn_sweeper(jar: CookieJarHandle, interval: Duration, cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let jar = jar.clone();
            let swept = tokio::task::spawn_blocking(move || jar.expire_and_sweep(OffsetDateTime::now_utc())).await;

            match swept {
                Ok(Ok(0)) => {}
                Ok(Ok(n)) => log::debug!("Swept {} expired cookies", n),
                Ok(Err(e)) => log::error!("Cookie sweep failed: {}", e),
                Err(e) => log::error!("Cookie sweep task panicked: {}", e),
            }
        }

        log::debug!("Cookie sweeper stopped");
    })
}
