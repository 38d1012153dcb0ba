//! Push-style bridge for backends that own the consume loop.

use crate::bus::{DispatchOutcome, MessageBus};
use crate::codec::{Codec, Decoded};
use crate::error::ProcessError;
use crate::message::{DeliveryOutcome, InboundMessage, Received};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Decodes backend-delivered messages and maps bus outcomes to dispositions
///
/// Used when the backend invokes a handler per message instead of being
/// polled. The returned [`DeliveryOutcome`] is the backend-facing
/// disposition signal; bus failures other than reject/requeue propagate
/// unmapped to the backend's invocation site.
pub struct Processor<M> {
    bus: Arc<dyn MessageBus<M>>,
    codec: Arc<dyn Codec<M>>,
}

impl<M: Send> Processor<M> {
    /// Create a processor bridging the given bus and codec
    pub fn new(bus: Arc<dyn MessageBus<M>>, codec: Arc<dyn Codec<M>>) -> Self {
        Self { bus, codec }
    }

    /// Handle one delivered message
    ///
    /// Exactly one decode attempt; the outcome drives exactly one backend
    /// disposition call at the invocation site.
    #[instrument(skip_all, fields(message_id = %inbound.message_id))]
    pub async fn handle(&self, inbound: &InboundMessage) -> Result<DeliveryOutcome, ProcessError> {
        let message = match self.codec.decode(inbound).map_err(ProcessError::Decode)? {
            Decoded::Message(message) => message,
            Decoded::Reject => return Ok(DeliveryOutcome::Rejected),
            Decoded::Requeue => return Ok(DeliveryOutcome::Requeued),
        };

        // Preserve backend origin metadata through dispatch.
        let received = Received::new(message, inbound.origin());

        match self
            .bus
            .dispatch(received)
            .await
            .map_err(ProcessError::Dispatch)?
        {
            DispatchOutcome::Handled => Ok(DeliveryOutcome::Delivered),
            DispatchOutcome::Reject => {
                debug!("bus rejected message");
                Ok(DeliveryOutcome::Rejected)
            }
            DispatchOutcome::Requeue => {
                debug!("bus requested redelivery");
                Ok(DeliveryOutcome::Requeued)
            }
        }
    }
}

#[cfg(test)]
#[path = "processor_tests.rs"]
mod tests;
