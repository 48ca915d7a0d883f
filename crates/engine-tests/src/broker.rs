use async_trait::async_trait;
use engine_core::{
    connectors::broker::{BrokerClient, DeliveryCallback},
    error::BrokerError,
};
use model::records::message::OutboundMessage;
use std::sync::{
    Mutex, MutexGuard,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};

type HeldDelivery = (Result<(), BrokerError>, DeliveryCallback);

#[derive(Default)]
struct BrokerState {
    produced: Vec<OutboundMessage>,
    held: Vec<HeldDelivery>,
}

/// In-process broker whose delivery behaviour is set up per test.
///
/// By default every message is acknowledged inside `produce`. A holding broker
/// keeps acknowledgements back until the next flush (or [`release`]), which
/// lets tests observe checkpoints that are produced but not yet confirmed.
///
/// [`release`]: ScriptedBroker::release
#[derive(Default)]
pub struct ScriptedBroker {
    state: Mutex<BrokerState>,
    /// 1-based position of the message whose delivery fails.
    fail_at: Option<usize>,
    hold: bool,
    reverse: bool,
    fail_flush: AtomicBool,
    flushes: AtomicUsize,
}

impl ScriptedBroker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_at(position: usize) -> Self {
        ScriptedBroker {
            fail_at: Some(position),
            ..Self::default()
        }
    }

    pub fn holding() -> Self {
        ScriptedBroker {
            hold: true,
            ..Self::default()
        }
    }

    /// Completes held deliveries newest first.
    pub fn reversed(mut self) -> Self {
        self.reverse = true;
        self
    }

    pub fn set_flush_failure(&self, fail: bool) {
        self.fail_flush.store(fail, Ordering::SeqCst);
    }

    pub fn produced(&self) -> Vec<OutboundMessage> {
        self.lock().produced.clone()
    }

    pub fn pending(&self) -> usize {
        self.lock().held.len()
    }

    pub fn flushes(&self) -> usize {
        self.flushes.load(Ordering::SeqCst)
    }

    /// Fires every held callback outside the lock.
    pub fn release(&self) {
        let mut held = std::mem::take(&mut self.lock().held);
        if self.reverse {
            held.reverse();
        }
        for (outcome, on_complete) in held {
            on_complete(outcome);
        }
    }

    fn lock(&self) -> MutexGuard<'_, BrokerState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl BrokerClient for ScriptedBroker {
    fn produce(&self, message: OutboundMessage, on_complete: DeliveryCallback) {
        let outcome = {
            let mut state = self.lock();
            state.produced.push(message.clone());
            if self.fail_at == Some(state.produced.len()) {
                Err(BrokerError::Produce {
                    topic: message.topic,
                    message: "simulated delivery failure".into(),
                })
            } else {
                Ok(())
            }
        };

        if self.hold {
            self.lock().held.push((outcome, on_complete));
        } else {
            on_complete(outcome);
        }
    }

    async fn flush(&self) -> Result<(), BrokerError> {
        self.flushes.fetch_add(1, Ordering::SeqCst);
        if self.fail_flush.load(Ordering::SeqCst) {
            return Err(BrokerError::Flush("broker unavailable".into()));
        }
        self.release();
        Ok(())
    }

    async fn ping(&self) -> Result<(), BrokerError> {
        Ok(())
    }

    fn close(&self) {}
}
