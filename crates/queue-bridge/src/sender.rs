//! Producer-side send path: encode, resolve, apply delivery options, send,
//! recover.

use crate::codec::Codec;
use crate::context::ContextManager;
use crate::destination::{Destination, DestinationDescriptor, DestinationName};
use crate::error::{ConfigurationError, SendError, TransportFault};
use crate::message::{DeliveryOptions, OutboundMessage};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Total send attempts per message: the initial send plus one
/// recovery-driven retry. A recovery hook that keeps reporting success
/// against a deterministically failing backend must not loop.
const MAX_SEND_ATTEMPTS: usize = 2;

/// Construction-time sender configuration, immutable thereafter
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SenderConfig {
    /// Topic to send to when `is_topic` is set
    pub topic_name: Option<DestinationName>,
    /// Queue to send to otherwise
    pub queue_name: Option<DestinationName>,
    /// Select the topic as the live destination
    pub is_topic: bool,
    /// Eagerly provision topology before each send (development use)
    pub debug: bool,
    /// Per-message delivery options, applied when the backend supports them
    #[serde(default)]
    pub delivery: DeliveryOptions,
}

impl SenderConfig {
    /// Create empty configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Send to a topic
    pub fn with_topic(mut self, name: DestinationName) -> Self {
        self.topic_name = Some(name);
        self.is_topic = true;
        self
    }

    /// Send to a queue
    pub fn with_queue(mut self, name: DestinationName) -> Self {
        self.queue_name = Some(name);
        self
    }

    /// Enable eager topology provisioning before each send
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Set delivery options
    pub fn with_delivery(mut self, delivery: DeliveryOptions) -> Self {
        self.delivery = delivery;
        self
    }
}

/// Sends encoded bus messages through a backend producer
pub struct Sender<M> {
    codec: Arc<dyn Codec<M>>,
    context: Arc<dyn ContextManager>,
    config: SenderConfig,
    destination: Destination,
    descriptor: DestinationDescriptor,
}

impl<M: Send + Sync> Sender<M> {
    /// Create a sender, validating the configuration
    ///
    /// Fails with [`ConfigurationError::MissingDestination`] when neither a
    /// queue name nor a topic name is configured — before any backend
    /// interaction.
    pub fn new(
        codec: Arc<dyn Codec<M>>,
        context: Arc<dyn ContextManager>,
        config: SenderConfig,
    ) -> Result<Self, ConfigurationError> {
        let destination = match (config.is_topic, &config.topic_name, &config.queue_name) {
            (true, Some(topic), _) => Destination::topic(topic.clone()),
            (_, _, Some(queue)) => Destination::queue(queue.clone()),
            (_, Some(topic), None) => Destination::topic(topic.clone()),
            (_, None, None) => return Err(ConfigurationError::MissingDestination),
        };
        let descriptor =
            DestinationDescriptor::new(config.topic_name.clone(), config.queue_name.clone());

        Ok(Self {
            codec,
            context,
            config,
            destination,
            descriptor,
        })
    }

    /// The destination this sender publishes to
    pub fn destination(&self) -> &Destination {
        &self.destination
    }

    /// Encode and send one bus message
    ///
    /// On a transport fault the context manager is asked to recover; a
    /// successful recovery buys exactly one retry before the fault is
    /// surfaced as [`SendError::SendingFailed`].
    #[instrument(skip_all, fields(destination = %self.destination))]
    pub async fn send(&self, message: &M) -> Result<(), SendError> {
        let encoded = self.codec.encode(message).map_err(SendError::Encode)?;

        if self.config.debug && !self.context.ensure_exists(&self.descriptor).await {
            warn!(descriptor = %self.descriptor, "eager provisioning reported failure");
        }

        let mut attempts = 0;
        loop {
            attempts += 1;
            match self.try_send(encoded.clone()).await {
                Ok(()) => {
                    debug!(attempts, "message sent");
                    return Ok(());
                }
                Err(fault) => {
                    if attempts < MAX_SEND_ATTEMPTS
                        && self.context.recover(&fault, &self.descriptor).await
                    {
                        debug!(%fault, "context manager recovered the fault, retrying send");
                        continue;
                    }
                    return Err(SendError::SendingFailed { fault });
                }
            }
        }
    }

    /// One send attempt: resolve, apply options, hand to the producer
    async fn try_send(&self, message: OutboundMessage) -> Result<(), TransportFault> {
        let fault = |cause| TransportFault::new(self.descriptor.clone(), cause);

        let handle = self
            .context
            .resolve(&self.destination)
            .await
            .map_err(fault)?;

        let mut producer = self
            .context
            .backend()
            .create_producer()
            .await
            .map_err(fault)?;

        if let Some(options) = producer.delivery_options() {
            let delivery = &self.config.delivery;
            if let Some(delay) = delivery.delay {
                options.set_delivery_delay(delay);
            }
            if let Some(priority) = delivery.priority {
                options.set_priority(priority);
            }
            if let Some(ttl) = delivery.time_to_live {
                options.set_time_to_live(ttl);
            }
        }

        producer.send(&handle, message).await.map_err(fault)
    }
}

#[cfg(test)]
#[path = "sender_tests.rs"]
mod tests;
