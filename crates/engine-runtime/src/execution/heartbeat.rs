use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::info;

/// Logs `status()` every `period` until the returned guard is dropped or
/// `parent` is cancelled.
pub fn spawn<F>(period: Duration, parent: &CancellationToken, status: F) -> DropGuard
where
    F: Fn() -> String + Send + 'static,
{
    let token = parent.child_token();
    let stop = token.clone();
    let period = period.max(Duration::from_millis(1));

    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                biased;
                _ = stop.cancelled() => break,
                _ = ticker.tick() => info!(target: "heartbeat", "{}", status()),
            }
        }
    });

    token.drop_guard()
}
