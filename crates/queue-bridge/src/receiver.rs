//! Consumer-side receive loop: poll, decode, dispose.

use crate::codec::{Codec, Decoded};
use crate::context::ContextManager;
use crate::destination::{Destination, DestinationDescriptor, DestinationName};
use crate::error::{ConfigurationError, ReceiveError, TransportFault};
use crate::message::Received;
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

/// Default bounded poll timeout
const DEFAULT_RECEIVE_TIMEOUT_MS: i64 = 1000;

/// Construction-time receiver configuration, immutable thereafter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiverConfig {
    /// Queue to consume from
    pub queue_name: DestinationName,
    /// Bounded timeout for each poll call
    #[serde(with = "duration_millis", default = "default_receive_timeout")]
    pub receive_timeout: Duration,
}

fn default_receive_timeout() -> Duration {
    Duration::milliseconds(DEFAULT_RECEIVE_TIMEOUT_MS)
}

/// Custom serialization for the poll timeout as milliseconds
mod duration_millis {
    use chrono::Duration;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        value.num_milliseconds().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = i64::deserialize(deserializer)?;
        Ok(Duration::milliseconds(millis))
    }
}

impl ReceiverConfig {
    /// Create configuration with the default 1000 ms poll timeout
    pub fn new(queue_name: DestinationName) -> Self {
        Self {
            queue_name,
            receive_timeout: default_receive_timeout(),
        }
    }

    /// Override the poll timeout
    pub fn with_receive_timeout(mut self, timeout: Duration) -> Self {
        self.receive_timeout = timeout;
        self
    }
}

/// Drives a poll-decode-disposition loop over one backend consumer
pub struct Receiver<M> {
    codec: Arc<dyn Codec<M>>,
    context: Arc<dyn ContextManager>,
    config: ReceiverConfig,
}

impl<M: Send + 'static> Receiver<M> {
    /// Create a receiver, validating the configuration
    pub fn new(
        codec: Arc<dyn Codec<M>>,
        context: Arc<dyn ContextManager>,
        config: ReceiverConfig,
    ) -> Result<Self, ConfigurationError> {
        if config.receive_timeout <= Duration::zero() {
            return Err(ConfigurationError::Invalid {
                message: "receive_timeout must be positive".to_string(),
            });
        }

        Ok(Self {
            codec,
            context,
            config,
        })
    }

    /// Run the receive loop until cancelled or a fatal error occurs
    ///
    /// Decoded messages are delivered through `sink`; each backend handle is
    /// disposed exactly once, after exactly one decode attempt. A `None`
    /// poll result (timeout) is not an error — the loop polls again. Fatal
    /// decode failures terminate the loop with the handle left undisposed,
    /// never silently dropping the message.
    ///
    /// Returns `Ok(())` when `cancel` fires or the sink is closed.
    #[instrument(skip_all, fields(queue = %self.config.queue_name))]
    pub async fn run(
        &self,
        sink: mpsc::Sender<Received<M>>,
        cancel: CancellationToken,
    ) -> Result<(), ReceiveError> {
        let destination = Destination::queue(self.config.queue_name.clone());
        let descriptor = DestinationDescriptor::for_queue(self.config.queue_name.clone());

        let handle = self
            .context
            .resolve(&destination)
            .await
            .map_err(|cause| TransportFault::new(descriptor.clone(), cause))?;

        // One consumer per loop invocation, bound to one destination.
        let mut consumer = self
            .context
            .backend()
            .create_consumer(&handle)
            .await
            .map_err(|cause| TransportFault::new(descriptor, cause))?;

        debug!("receive loop started");

        loop {
            if cancel.is_cancelled() {
                return Ok(());
            }

            let polled = tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                polled = consumer.poll(self.config.receive_timeout) => {
                    polled.map_err(ReceiveError::Backend)?
                }
            };

            let Some(inbound) = polled else {
                continue;
            };

            match self.codec.decode(&inbound).map_err(ReceiveError::Decode)? {
                Decoded::Message(message) => {
                    let received = Received::new(message, inbound.origin());
                    if sink.send(received).await.is_err() {
                        // Downstream hung up: treat as cancellation and leave
                        // the handle undisposed for redelivery.
                        debug!("sink closed, stopping receive loop");
                        return Ok(());
                    }
                    consumer
                        .acknowledge(inbound.receipt())
                        .await
                        .map_err(ReceiveError::Disposition)?;
                }
                Decoded::Reject => {
                    debug!(message_id = %inbound.message_id, "rejecting message");
                    consumer
                        .reject(inbound.receipt(), false)
                        .await
                        .map_err(ReceiveError::Disposition)?;
                }
                Decoded::Requeue => {
                    debug!(message_id = %inbound.message_id, "requeueing message");
                    consumer
                        .reject(inbound.receipt(), true)
                        .await
                        .map_err(ReceiveError::Disposition)?;
                }
            }
        }
    }

    /// Spawn the receive loop and expose it as a lazy message sequence
    ///
    /// Consumes the receiver: the sequence is not restartable from a
    /// partially consumed consumer. Dropping the returned channel stops the
    /// loop at its next iteration.
    pub fn receive(
        self,
        cancel: CancellationToken,
    ) -> (
        mpsc::Receiver<Received<M>>,
        JoinHandle<Result<(), ReceiveError>>,
    ) {
        let (tx, rx) = mpsc::channel(1);
        let task = tokio::spawn(async move { self.run(tx, cancel).await });
        (rx, task)
    }
}

#[cfg(test)]
#[path = "receiver_tests.rs"]
mod tests;
