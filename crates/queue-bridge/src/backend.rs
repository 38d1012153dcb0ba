//! Backend capability traits consumed by the bridge.
//!
//! The minimal contract every broker client must provide is [`Backend`],
//! [`Producer`], and [`Consumer`]. Explicit topology declaration and
//! per-message delivery options are optional capabilities: a backend that
//! does not support them returns `None` from the capability accessor and the
//! bridge silently skips the corresponding step. Capabilities are resolved
//! at compose time; the bridge never inspects backend types at runtime.

use crate::destination::{Destination, DestinationHandle, DestinationName};
use crate::error::BackendError;
use crate::message::{InboundMessage, OutboundMessage, ReceiptHandle};
use async_trait::async_trait;
use chrono::Duration;

/// Connection-scoped entry point into a broker client
#[async_trait]
pub trait Backend: Send + Sync {
    /// Construct a backend handle for a destination without declaring it
    fn destination(&self, destination: &Destination) -> DestinationHandle {
        DestinationHandle::new(destination.clone())
    }

    /// Create a producer for outbound sends
    async fn create_producer(&self) -> Result<Box<dyn Producer>, BackendError>;

    /// Create a consumer bound to one destination
    ///
    /// The consumer lives for the duration of a single receive loop and is
    /// never reused across destinations.
    async fn create_consumer(
        &self,
        destination: &DestinationHandle,
    ) -> Result<Box<dyn Consumer>, BackendError>;

    /// Explicit topology declaration, if the backend supports it
    fn topology(&self) -> Option<&dyn TopologyCapability>;

    /// Close the underlying connection
    async fn close(&self) -> Result<(), BackendError>;
}

/// Optional capability: declaring destinations before first use
#[async_trait]
pub trait TopologyCapability: Send + Sync {
    /// Declare a destination with its attributes
    ///
    /// Idempotent: re-declaring an existing destination must succeed without
    /// duplicating resources.
    async fn declare(&self, destination: &Destination) -> Result<(), BackendError>;

    /// Bind a queue to a topic so fanout deliveries reach it
    async fn bind(
        &self,
        topic: &DestinationName,
        queue: &DestinationName,
    ) -> Result<(), BackendError>;
}

/// Producer-side send surface
#[async_trait]
pub trait Producer: Send {
    /// Per-message delivery options, if the backend supports them
    fn delivery_options(&mut self) -> Option<&mut dyn DeliveryOptionsCapability>;

    /// Send one message to a destination
    async fn send(
        &self,
        destination: &DestinationHandle,
        message: OutboundMessage,
    ) -> Result<(), BackendError>;
}

/// Optional capability: delay, priority, and expiry applied before send
pub trait DeliveryOptionsCapability: Send {
    /// Delay before the message becomes visible to consumers
    fn set_delivery_delay(&mut self, delay: Duration);

    /// Relative priority among queued messages
    fn set_priority(&mut self, priority: i32);

    /// Expiry after which the message is discarded undelivered
    fn set_time_to_live(&mut self, ttl: Duration);
}

/// Consumer bound to a single destination
#[async_trait]
pub trait Consumer: Send {
    /// Poll for the next message with a bounded timeout
    ///
    /// `None` means the timeout elapsed with nothing delivered; it is not an
    /// error.
    async fn poll(&mut self, timeout: Duration) -> Result<Option<InboundMessage>, BackendError>;

    /// Acknowledge a message as processed
    async fn acknowledge(&mut self, receipt: &ReceiptHandle) -> Result<(), BackendError>;

    /// Reject a message, optionally requesting redelivery
    async fn reject(&mut self, receipt: &ReceiptHandle, requeue: bool)
        -> Result<(), BackendError>;
}
