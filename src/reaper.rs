use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::notify::NotifyHub;

/// Background task that periodically drops event channels nobody listens to.
pub async fn run_reaper(notify: Arc<NotifyHub>, every: Duration) {
    let mut interval = tokio::time::interval(every);
    loop {
        interval.tick().await;
        let before = notify.channel_count();
        notify.prune();
        let after = notify.channel_count();
        if after < before {
            debug!("reaped {} idle event channels", before - after);
        }
    }
}
