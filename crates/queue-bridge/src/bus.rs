//! Bus dispatch seam.

use crate::error::BusError;
use crate::message::Received;
use async_trait::async_trait;

/// Result of dispatching a received message to the bus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Message handled; acknowledge it
    Handled,
    /// Message unprocessable; drop without redelivery
    Reject,
    /// Transient failure; redeliver
    Requeue,
}

/// The application-level message bus this bridge feeds
#[async_trait]
pub trait MessageBus<M: Send>: Send + Sync {
    /// Dispatch one received message to its handlers
    ///
    /// Reject/requeue signals travel in the `Ok` outcome; any other failure
    /// is a [`BusError`] and propagates to the caller unmapped.
    async fn dispatch(&self, message: Received<M>) -> Result<DispatchOutcome, BusError>;
}
