use crate::error::BrokerError;
use async_trait::async_trait;
use model::records::message::OutboundMessage;

/// Completion callback for a produced message. Invoked exactly once, possibly
/// from another thread than the one that called [`BrokerClient::produce`].
pub type DeliveryCallback = Box<dyn FnOnce(Result<(), BrokerError>) + Send + 'static>;

/// Message broker collaborator of the sink.
#[async_trait]
pub trait BrokerClient: Send + Sync {
    /// Hands `message` to the client without waiting for delivery.
    fn produce(&self, message: OutboundMessage, on_complete: DeliveryCallback);

    /// Waits until every previously produced message is acknowledged or failed.
    async fn flush(&self) -> Result<(), BrokerError>;

    async fn ping(&self) -> Result<(), BrokerError>;

    fn close(&self);
}
