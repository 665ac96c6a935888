use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::portal::Portal;

/// Something that reloads its server-backed views in one pass. Failures are
/// logged by the implementor, never returned.
#[async_trait]
pub trait Refreshable: Send + Sync {
    async fn refresh_all(&self);
}

/// Refreshes `target` on every invalidation and on a polling fallback tick,
/// until `cancel` fires. The first tick runs immediately.
pub async fn run_refresh_loop<R: Refreshable + ?Sized>(
    target: Arc<R>,
    wake: Arc<Notify>,
    poll_interval: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(poll_interval.max(Duration::from_secs(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    log::info!("Refresh loop started, polling every {}s", poll_interval.as_secs());
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = wake.notified() => log::debug!("Refresh triggered by invalidation"),
            _ = ticker.tick() => log::debug!("Polling refresh"),
        }
        target.refresh_all().await;
    }
    log::info!("Refresh loop stopped");
}

pub fn spawn_refresh_task(portal: Arc<Portal>, cancel: CancellationToken) -> JoinHandle<()> {
    let wake = portal.invalidations();
    let poll_interval = portal.config().app.poll_interval();
    tokio::spawn(run_refresh_loop(portal, wake, poll_interval, cancel))
}
