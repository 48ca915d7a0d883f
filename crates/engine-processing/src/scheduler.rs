use crate::context::SyncContext;
use engine_core::{
    connectors::broker::BrokerClient, metrics::Metrics, state::MetadataStore,
    watermark::Watermark,
};
use std::{
    sync::{
        Arc,
        atomic::{AtomicI64, Ordering},
    },
    time::Duration,
};
use tokio::{
    task::JoinHandle,
    time::{Instant, MissedTickBehavior, interval_at},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Periodically flushes the broker and persists the confirmed watermark.
///
/// Persistence here is best-effort: failures are logged and retried on the
/// next tick. The authoritative commit happens once at the end of the session.
pub struct FlushScheduler {
    broker: Arc<dyn BrokerClient>,
    store: Arc<dyn MetadataStore>,
    flow: String,
    watermark: Arc<Watermark>,
    consumed_offset: Arc<AtomicI64>,
    period: Duration,
    metrics: Metrics,
}

impl FlushScheduler {
    pub fn new(
        broker: Arc<dyn BrokerClient>,
        store: Arc<dyn MetadataStore>,
        flow: impl Into<String>,
        watermark: Arc<Watermark>,
        consumed_offset: Arc<AtomicI64>,
        period: Duration,
        metrics: Metrics,
    ) -> Self {
        FlushScheduler {
            broker,
            store,
            flow: flow.into(),
            watermark,
            consumed_offset,
            period,
            metrics,
        }
    }

    /// Starts ticking on its own task until stopped or `ctx` is cancelled.
    pub fn spawn(self, ctx: &SyncContext) -> FlushHandle {
        let stop = CancellationToken::new();
        let task = tokio::spawn(self.run(ctx.clone(), stop.clone()));
        FlushHandle { stop, task }
    }

    async fn run(self, ctx: SyncContext, stop: CancellationToken) {
        let period = self.period.max(Duration::from_millis(1));
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = stop.cancelled() => break,
                _ = ctx.cancelled() => break,
                _ = ticker.tick() => self.tick().await,
            }
        }
        debug!(flow = %self.flow, "Flush scheduler stopped");
    }

    /// One flush-then-persist cycle.
    pub async fn tick(&self) {
        // Read first: anything confirmed by now is covered by this flush.
        let last_seen = self.watermark.get();

        if let Err(e) = self.broker.flush().await {
            self.metrics.record_flush(false);
            warn!(flow = %self.flow, error = %e, "Periodic flush failed");
            return;
        }
        self.metrics.record_flush(true);

        if last_seen <= self.consumed_offset.load(Ordering::Acquire) {
            return;
        }
        match self.store.set_last_offset(&self.flow, last_seen).await {
            Ok(()) => {
                self.consumed_offset.fetch_max(last_seen, Ordering::AcqRel);
                info!(flow = %self.flow, offset = last_seen, "Updated last offset");
            }
            Err(e) => {
                warn!(
                    flow = %self.flow,
                    offset = last_seen,
                    error = %e,
                    "Failed to persist offset"
                );
            }
        }
    }
}

pub struct FlushHandle {
    stop: CancellationToken,
    task: JoinHandle<()>,
}

impl FlushHandle {
    /// Stops the scheduler and waits for a tick in progress to finish, so no
    /// periodic write can land after this returns.
    pub async fn stop(self) {
        self.stop.cancel();
        if let Err(e) = self.task.await {
            warn!(error = %e, "Flush scheduler task ended abnormally");
        }
    }
}
