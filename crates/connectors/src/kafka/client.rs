use crate::kafka::config::client_config;
use async_trait::async_trait;
use engine_config::kafka::{KafkaConfig, Partitioner};
use engine_core::{
    connectors::broker::{BrokerClient, DeliveryCallback},
    error::{BrokerError, SetupError},
};
use model::records::message::OutboundMessage;
use rdkafka::{
    error::{KafkaError, RDKafkaErrorCode},
    message::{Header, OwnedHeaders},
    producer::{FutureProducer, FutureRecord, Producer},
    util::Timeout,
};
use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};
use tokio::{runtime::Handle, sync::Notify};
use tracing::{debug, info, warn};

const QUEUE_FULL_BACKOFF: Duration = Duration::from_millis(20);
const DEFAULT_FLUSH_TIMEOUT: Duration = Duration::from_secs(60);
const PING_TIMEOUT: Duration = Duration::from_secs(10);
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Counts delivery callbacks that have not run yet.
#[derive(Default)]
struct InFlight {
    count: AtomicUsize,
    idle: Notify,
}

/// Held by a delivery task until its callback has returned.
struct InFlightGuard(Arc<InFlight>);

impl InFlight {
    fn track(self: &Arc<Self>) -> InFlightGuard {
        self.count.fetch_add(1, Ordering::SeqCst);
        InFlightGuard(self.clone())
    }

    async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.count.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if self.0.count.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.0.idle.notify_waiters();
        }
    }
}

/// [`BrokerClient`] backed by librdkafka.
///
/// Delivery reports are awaited on the runtime the client was created on, so
/// `produce` can be called from plain worker threads.
pub struct KafkaBrokerClient {
    producer: FutureProducer,
    runtime: Handle,
    in_flight: Arc<InFlight>,
    manual_partitioning: bool,
    flush_timeout: Duration,
}

impl KafkaBrokerClient {
    /// Must be called from within a tokio runtime.
    pub fn new(config: &KafkaConfig) -> Result<Self, SetupError> {
        let runtime = Handle::try_current()
            .map_err(|e| SetupError::Client(format!("no async runtime available: {e}")))?;
        let producer: FutureProducer = client_config(config)?
            .create()
            .map_err(|e| SetupError::Client(e.to_string()))?;

        info!(
            servers = %config.bootstrap_servers(),
            partitioner = %config.partitioner,
            "Kafka producer created"
        );

        Ok(KafkaBrokerClient {
            producer,
            runtime,
            in_flight: Arc::default(),
            manual_partitioning: config.partitioner == Partitioner::Manual,
            flush_timeout: DEFAULT_FLUSH_TIMEOUT,
        })
    }

    pub fn with_flush_timeout(mut self, timeout: Duration) -> Self {
        self.flush_timeout = timeout;
        self
    }
}

fn to_headers(message: &OutboundMessage) -> Option<OwnedHeaders> {
    if message.headers.is_empty() {
        return None;
    }
    let headers = message
        .headers
        .iter()
        .fold(OwnedHeaders::new_with_capacity(message.headers.len()), |acc, h| {
            acc.insert(Header {
                key: &h.key,
                value: Some(h.value.as_slice()),
            })
        });
    Some(headers)
}

#[async_trait]
impl BrokerClient for KafkaBrokerClient {
    /// Enqueues in call order. Blocks briefly while the local producer queue
    /// is full.
    fn produce(&self, message: OutboundMessage, on_complete: DeliveryCallback) {
        let topic = message.topic.clone();

        let mut record: FutureRecord<'_, [u8], [u8]> = FutureRecord::to(&message.topic);
        if let Some(key) = &message.key {
            record = record.key(key.as_slice());
        }
        if let Some(value) = &message.value {
            record = record.payload(value.as_slice());
        }
        if self.manual_partitioning {
            record = record.partition(message.partition);
        }
        if let Some(headers) = to_headers(&message) {
            record = record.headers(headers);
        }

        let delivery = loop {
            match self.producer.send_result(record) {
                Ok(delivery) => break delivery,
                Err((KafkaError::MessageProduction(RDKafkaErrorCode::QueueFull), returned)) => {
                    debug!(topic = %topic, "Producer queue full, backing off");
                    record = returned;
                    std::thread::sleep(QUEUE_FULL_BACKOFF);
                }
                Err((err, _)) => {
                    on_complete(Err(BrokerError::Produce {
                        topic,
                        message: err.to_string(),
                    }));
                    return;
                }
            }
        };

        let guard = self.in_flight.track();
        self.runtime.spawn(async move {
            let _guard = guard;
            let result = match delivery.await {
                Ok(Ok(_)) => Ok(()),
                Ok(Err((err, _))) => Err(BrokerError::Produce {
                    topic,
                    message: err.to_string(),
                }),
                Err(_) => Err(BrokerError::DeliveryCancelled(topic)),
            };
            on_complete(result);
        });
    }

    /// Returns once librdkafka has no queued messages and every delivery
    /// callback for them has run.
    async fn flush(&self) -> Result<(), BrokerError> {
        let producer = self.producer.clone();
        let timeout = self.flush_timeout;
        tokio::task::spawn_blocking(move || producer.flush(Timeout::After(timeout)))
            .await
            .map_err(|e| BrokerError::Flush(e.to_string()))?
            .map_err(|e| BrokerError::Flush(e.to_string()))?;

        tokio::time::timeout(timeout, self.in_flight.wait_idle())
            .await
            .map_err(|_| BrokerError::Flush("timed out waiting for delivery callbacks".into()))
    }

    async fn ping(&self) -> Result<(), BrokerError> {
        let producer = self.producer.clone();
        let metadata = tokio::task::spawn_blocking(move || {
            producer
                .client()
                .fetch_metadata(None, Timeout::After(PING_TIMEOUT))
                .map(|m| m.brokers().len())
        })
        .await
        .map_err(|e| BrokerError::Ping(e.to_string()))?
        .map_err(|e| BrokerError::Ping(e.to_string()))?;

        debug!(brokers = metadata, "Kafka metadata fetched");
        Ok(())
    }

    fn close(&self) {
        if let Err(e) = self.producer.flush(Timeout::After(CLOSE_TIMEOUT)) {
            warn!(error = %e, "Flush on close failed; undelivered messages are dropped");
        }
    }
}
