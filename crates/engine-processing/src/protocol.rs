use crate::{context::SyncContext, error::SyncError};
use engine_core::{connectors::broker::BrokerClient, metrics::Metrics, watermark::Watermark};
use model::records::result::TransformResult;
use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};
use tracing::debug;

/// Sends transform results to the broker and retires their checkpoints.
///
/// A checkpoint is offered to the watermark once every message of its result
/// is acknowledged, or right away when the result has no messages. A failed
/// delivery cancels the session and leaves that checkpoint unretired.
#[derive(Clone)]
pub struct Dispatcher {
    broker: Arc<dyn BrokerClient>,
    watermark: Option<Arc<Watermark>>,
    ctx: SyncContext,
    metrics: Metrics,
}

impl Dispatcher {
    /// `watermark` is `None` for batch runs, which do not track checkpoints.
    pub fn new(
        broker: Arc<dyn BrokerClient>,
        watermark: Option<Arc<Watermark>>,
        ctx: SyncContext,
        metrics: Metrics,
    ) -> Self {
        Dispatcher {
            broker,
            watermark,
            ctx,
            metrics,
        }
    }

    pub fn dispatch(&self, result: TransformResult) {
        let checkpoint = result.checkpoint;

        if result.is_empty() {
            if let Some(watermark) = &self.watermark {
                watermark.advance(checkpoint);
            }
            return;
        }

        let remaining = Arc::new(AtomicUsize::new(result.len()));
        for message in result.messages {
            if self.ctx.is_cancelled() {
                debug!(checkpoint, "Session cancelled, not producing remaining messages");
                return;
            }

            let remaining = remaining.clone();
            let watermark = self.watermark.clone();
            let ctx = self.ctx.clone();
            let metrics = self.metrics.clone();

            self.metrics.record_produced(message.size_bytes() as u64);
            self.broker.produce(
                message,
                Box::new(move |outcome| match outcome {
                    Ok(()) => {
                        metrics.record_acked();
                        if remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
                            if let Some(watermark) = watermark {
                                watermark.advance(checkpoint);
                            }
                        }
                    }
                    Err(err) => {
                        metrics.record_produce_failure();
                        ctx.cancel_with(SyncError::Produce(err));
                    }
                }),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use engine_core::{connectors::broker::DeliveryCallback, error::BrokerError};
    use model::records::message::OutboundMessage;
    use std::sync::Mutex;
    use tokio_util::sync::CancellationToken;

    /// Holds callbacks until the test completes them.
    #[derive(Default)]
    struct HeldBroker {
        pending: Mutex<Vec<(OutboundMessage, DeliveryCallback)>>,
    }

    impl HeldBroker {
        fn complete(&self, index: usize, outcome: Result<(), BrokerError>) {
            let (_, callback) = self.pending.lock().unwrap().remove(index);
            callback(outcome);
        }

        fn len(&self) -> usize {
            self.pending.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl BrokerClient for HeldBroker {
        fn produce(&self, message: OutboundMessage, on_complete: DeliveryCallback) {
            self.pending.lock().unwrap().push((message, on_complete));
        }

        async fn flush(&self) -> Result<(), BrokerError> {
            Ok(())
        }

        async fn ping(&self) -> Result<(), BrokerError> {
            Ok(())
        }

        fn close(&self) {}
    }

    fn setup() -> (Arc<HeldBroker>, Arc<Watermark>, SyncContext, Dispatcher) {
        let broker = Arc::new(HeldBroker::default());
        let watermark = Arc::new(Watermark::new(0));
        let ctx = SyncContext::new(&CancellationToken::new());
        let dispatcher = Dispatcher::new(
            broker.clone(),
            Some(watermark.clone()),
            ctx.clone(),
            Metrics::new(),
        );
        (broker, watermark, ctx, dispatcher)
    }

    fn result(checkpoint: i64, n: usize) -> TransformResult {
        let messages = (0..n)
            .map(|i| OutboundMessage::text(format!("m{i}"), "t"))
            .collect();
        TransformResult::new(messages, checkpoint)
    }

    #[test]
    fn empty_result_advances_immediately() {
        let (broker, watermark, _, dispatcher) = setup();
        dispatcher.dispatch(result(15, 0));

        assert_eq!(watermark.get(), 15);
        assert_eq!(broker.len(), 0);
    }

    #[test]
    fn waits_for_every_acknowledgement() {
        let (broker, watermark, _, dispatcher) = setup();
        dispatcher.dispatch(result(20, 3));

        broker.complete(2, Ok(()));
        broker.complete(0, Ok(()));
        assert_eq!(watermark.get(), 0);

        broker.complete(0, Ok(()));
        assert_eq!(watermark.get(), 20);
    }

    #[test]
    fn out_of_order_results_keep_the_maximum() {
        let (broker, watermark, _, dispatcher) = setup();
        dispatcher.dispatch(result(10, 1));
        dispatcher.dispatch(result(30, 1));

        broker.complete(1, Ok(()));
        assert_eq!(watermark.get(), 30);
        broker.complete(0, Ok(()));
        assert_eq!(watermark.get(), 30);
    }

    #[test]
    fn failed_delivery_cancels_and_never_advances() {
        let (broker, watermark, ctx, dispatcher) = setup();
        dispatcher.dispatch(result(40, 2));

        broker.complete(0, Ok(()));
        broker.complete(
            0,
            Err(BrokerError::Produce {
                topic: "t".into(),
                message: "rejected".into(),
            }),
        );

        assert_eq!(watermark.get(), 0);
        assert!(matches!(ctx.cause(), Some(SyncError::Produce(_))));
    }

    #[test]
    fn cancelled_session_produces_nothing() {
        let (broker, watermark, ctx, dispatcher) = setup();
        ctx.cancel_with(SyncError::Cancelled);
        dispatcher.dispatch(result(50, 2));

        assert_eq!(broker.len(), 0);
        assert_eq!(watermark.get(), 0);
    }
}
