//! In-memory backend implementation for testing and development.
//!
//! A fully functional broker client that:
//! - Supports explicit topology declaration (topics, queues, bindings)
//! - Fans out topic sends to every bound queue
//! - Applies delivery delay, priority, and TTL on the producer
//! - Tracks in-flight messages per receipt handle with redelivery counting
//!
//! Intended for unit testing of bridge consumers, development, and as the
//! reference implementation for real backends.

use crate::backend::{
    Backend, Consumer, DeliveryOptionsCapability, Producer, TopologyCapability,
};
use crate::destination::{
    Destination, DestinationAttributes, DestinationHandle, DestinationKind, DestinationName,
};
use crate::error::BackendError;
use crate::message::{
    InboundMessage, MessageId, OutboundMessage, PropertyValue, ReceiptHandle, Timestamp,
};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;

// ============================================================================
// Configuration
// ============================================================================

/// In-memory backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryBackendConfig {
    /// How often a blocked poll re-checks the queue, in milliseconds
    pub poll_interval_ms: u64,
}

impl Default for MemoryBackendConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 10,
        }
    }
}

// ============================================================================
// Internal Storage Structures
// ============================================================================

/// All broker state behind one lock
struct BackendState {
    topics: HashMap<DestinationName, MemoryTopic>,
    queues: HashMap<DestinationName, MemoryQueue>,
    closed: bool,
}

impl BackendState {
    fn new() -> Self {
        Self {
            topics: HashMap::new(),
            queues: HashMap::new(),
            closed: false,
        }
    }

    fn ensure_open(&self) -> Result<(), BackendError> {
        if self.closed {
            return Err(BackendError::ConnectionFailed {
                message: "backend is closed".to_string(),
            });
        }
        Ok(())
    }
}

/// Declared topic with its queue bindings
struct MemoryTopic {
    #[allow(dead_code)]
    attributes: DestinationAttributes,
    bindings: Vec<DestinationName>,
}

/// Declared queue holding pending and in-flight messages
struct MemoryQueue {
    #[allow(dead_code)]
    attributes: DestinationAttributes,
    /// Pending messages, kept priority-sorted (FIFO within a priority)
    messages: VecDeque<StoredMessage>,
    /// Messages handed to a consumer, keyed by receipt handle
    in_flight: HashMap<String, StoredMessage>,
}

impl MemoryQueue {
    fn new(attributes: DestinationAttributes) -> Self {
        Self {
            attributes,
            messages: VecDeque::new(),
            in_flight: HashMap::new(),
        }
    }

    /// Insert keeping higher priorities first, FIFO within equal priority
    fn enqueue(&mut self, message: StoredMessage) {
        let position = self
            .messages
            .iter()
            .position(|queued| queued.priority < message.priority)
            .unwrap_or(self.messages.len());
        self.messages.insert(position, message);
    }
}

/// A message stored in a queue with its delivery metadata
#[derive(Clone)]
struct StoredMessage {
    message_id: MessageId,
    body: Bytes,
    headers: HashMap<String, String>,
    properties: HashMap<String, PropertyValue>,
    priority: i32,
    delivery_count: u32,
    available_at: Timestamp,
    expires_at: Option<Timestamp>,
}

impl StoredMessage {
    fn is_expired(&self, now: &Timestamp) -> bool {
        self.expires_at
            .as_ref()
            .is_some_and(|expires_at| now >= expires_at)
    }

    fn is_available(&self, now: &Timestamp) -> bool {
        *now >= self.available_at
    }
}

// ============================================================================
// MemoryBackend
// ============================================================================

/// In-memory broker client
pub struct MemoryBackend {
    state: Arc<RwLock<BackendState>>,
    config: MemoryBackendConfig,
}

impl MemoryBackend {
    /// Create new in-memory backend with configuration
    pub fn new(config: MemoryBackendConfig) -> Self {
        Self {
            state: Arc::new(RwLock::new(BackendState::new())),
            config,
        }
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new(MemoryBackendConfig::default())
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn create_producer(&self) -> Result<Box<dyn Producer>, BackendError> {
        self.state.read().await.ensure_open()?;
        Ok(Box::new(MemoryProducer {
            state: Arc::clone(&self.state),
            delay: None,
            priority: None,
            time_to_live: None,
        }))
    }

    async fn create_consumer(
        &self,
        destination: &DestinationHandle,
    ) -> Result<Box<dyn Consumer>, BackendError> {
        let state = self.state.read().await;
        state.ensure_open()?;

        if destination.kind() != DestinationKind::Queue {
            return Err(BackendError::Unsupported {
                operation: format!("consuming from {}", destination.destination()),
            });
        }
        if !state.queues.contains_key(destination.name()) {
            return Err(BackendError::DestinationNotFound {
                name: destination.name().to_string(),
            });
        }

        Ok(Box::new(MemoryConsumer {
            state: Arc::clone(&self.state),
            queue: destination.name().clone(),
            poll_interval: std::time::Duration::from_millis(self.config.poll_interval_ms),
        }))
    }

    fn topology(&self) -> Option<&dyn TopologyCapability> {
        Some(self)
    }

    async fn close(&self) -> Result<(), BackendError> {
        let mut state = self.state.write().await;
        state.closed = true;
        Ok(())
    }
}

#[async_trait]
impl TopologyCapability for MemoryBackend {
    async fn declare(&self, destination: &Destination) -> Result<(), BackendError> {
        let mut state = self.state.write().await;
        state.ensure_open()?;

        // Re-declaration keeps the existing resource untouched.
        match destination.kind() {
            DestinationKind::Topic => {
                state
                    .topics
                    .entry(destination.name().clone())
                    .or_insert_with(|| MemoryTopic {
                        attributes: *destination.attributes(),
                        bindings: Vec::new(),
                    });
            }
            DestinationKind::Queue => {
                state
                    .queues
                    .entry(destination.name().clone())
                    .or_insert_with(|| MemoryQueue::new(*destination.attributes()));
            }
        }

        debug!(%destination, "declared");
        Ok(())
    }

    async fn bind(
        &self,
        topic: &DestinationName,
        queue: &DestinationName,
    ) -> Result<(), BackendError> {
        let mut state = self.state.write().await;
        state.ensure_open()?;

        if !state.queues.contains_key(queue) {
            return Err(BackendError::DestinationNotFound {
                name: queue.to_string(),
            });
        }
        let entry = state
            .topics
            .get_mut(topic)
            .ok_or_else(|| BackendError::DestinationNotFound {
                name: topic.to_string(),
            })?;

        if !entry.bindings.contains(queue) {
            entry.bindings.push(queue.clone());
        }
        Ok(())
    }
}

// ============================================================================
// MemoryProducer
// ============================================================================

/// Producer applying delay, priority, and TTL to stored messages
struct MemoryProducer {
    state: Arc<RwLock<BackendState>>,
    delay: Option<Duration>,
    priority: Option<i32>,
    time_to_live: Option<Duration>,
}

impl DeliveryOptionsCapability for MemoryProducer {
    fn set_delivery_delay(&mut self, delay: Duration) {
        self.delay = Some(delay);
    }

    fn set_priority(&mut self, priority: i32) {
        self.priority = Some(priority);
    }

    fn set_time_to_live(&mut self, ttl: Duration) {
        self.time_to_live = Some(ttl);
    }
}

#[async_trait]
impl Producer for MemoryProducer {
    fn delivery_options(&mut self) -> Option<&mut dyn DeliveryOptionsCapability> {
        Some(self)
    }

    async fn send(
        &self,
        destination: &DestinationHandle,
        message: OutboundMessage,
    ) -> Result<(), BackendError> {
        let now = Timestamp::now();
        let available_at = match self.delay {
            Some(delay) => Timestamp::from_datetime(now.as_datetime() + delay),
            None => now.clone(),
        };
        let expires_at = self
            .time_to_live
            .map(|ttl| Timestamp::from_datetime(now.as_datetime() + ttl));

        let stored = StoredMessage {
            message_id: MessageId::new(),
            body: message.body,
            headers: message.headers,
            properties: message.properties,
            priority: self.priority.unwrap_or(0),
            delivery_count: 0,
            available_at,
            expires_at,
        };

        let mut state = self.state.write().await;
        state.ensure_open()?;

        match destination.kind() {
            DestinationKind::Queue => {
                let queue = state.queues.get_mut(destination.name()).ok_or_else(|| {
                    BackendError::DestinationNotFound {
                        name: destination.name().to_string(),
                    }
                })?;
                queue.enqueue(stored);
            }
            DestinationKind::Topic => {
                let bindings = state
                    .topics
                    .get(destination.name())
                    .ok_or_else(|| BackendError::DestinationNotFound {
                        name: destination.name().to_string(),
                    })?
                    .bindings
                    .clone();

                // Fanout: one copy per bound queue. No bindings, no delivery.
                for binding in bindings {
                    if let Some(queue) = state.queues.get_mut(&binding) {
                        queue.enqueue(stored.clone());
                    }
                }
            }
        }

        Ok(())
    }
}

// ============================================================================
// MemoryConsumer
// ============================================================================

/// Consumer bound to one queue
struct MemoryConsumer {
    state: Arc<RwLock<BackendState>>,
    queue: DestinationName,
    poll_interval: std::time::Duration,
}

impl MemoryConsumer {
    /// Take the next available message, moving it in-flight
    async fn take_next(&self) -> Result<Option<InboundMessage>, BackendError> {
        let mut state = self.state.write().await;
        state.ensure_open()?;

        let queue = state.queues.get_mut(&self.queue).ok_or_else(|| {
            BackendError::DestinationNotFound {
                name: self.queue.to_string(),
            }
        })?;

        let now = Timestamp::now();
        queue.messages.retain(|message| !message.is_expired(&now));

        let Some(position) = queue
            .messages
            .iter()
            .position(|message| message.is_available(&now))
        else {
            return Ok(None);
        };

        let Some(mut stored) = queue.messages.remove(position) else {
            return Ok(None);
        };
        stored.delivery_count += 1;

        let receipt = ReceiptHandle::new(uuid::Uuid::new_v4().to_string(), self.queue.clone());
        let inbound = InboundMessage {
            message_id: stored.message_id.clone(),
            body: stored.body.clone(),
            headers: stored.headers.clone(),
            properties: stored.properties.clone(),
            receipt: receipt.clone(),
            delivery_count: stored.delivery_count,
            delivered_at: now,
        };
        queue.in_flight.insert(receipt.handle().to_string(), stored);

        Ok(Some(inbound))
    }

    /// Remove an in-flight message by receipt
    async fn remove_in_flight(
        &self,
        receipt: &ReceiptHandle,
    ) -> Result<StoredMessage, BackendError> {
        let mut state = self.state.write().await;
        state.ensure_open()?;

        let queue = state.queues.get_mut(receipt.destination()).ok_or_else(|| {
            BackendError::DestinationNotFound {
                name: receipt.destination().to_string(),
            }
        })?;

        queue
            .in_flight
            .remove(receipt.handle())
            .ok_or_else(|| BackendError::HandleExpired {
                receipt: receipt.handle().to_string(),
            })
    }
}

#[async_trait]
impl Consumer for MemoryConsumer {
    async fn poll(&mut self, timeout: Duration) -> Result<Option<InboundMessage>, BackendError> {
        let timeout = timeout.to_std().unwrap_or(std::time::Duration::ZERO);
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            if let Some(inbound) = self.take_next().await? {
                return Ok(Some(inbound));
            }

            let now = tokio::time::Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(self.poll_interval.min(deadline - now)).await;
        }
    }

    async fn acknowledge(&mut self, receipt: &ReceiptHandle) -> Result<(), BackendError> {
        self.remove_in_flight(receipt).await?;
        Ok(())
    }

    async fn reject(
        &mut self,
        receipt: &ReceiptHandle,
        requeue: bool,
    ) -> Result<(), BackendError> {
        let mut stored = self.remove_in_flight(receipt).await?;
        if !requeue {
            return Ok(());
        }

        // Redelivery: back on the queue, immediately visible.
        stored.available_at = Timestamp::now();
        let mut state = self.state.write().await;
        let queue = state.queues.get_mut(receipt.destination()).ok_or_else(|| {
            BackendError::DestinationNotFound {
                name: receipt.destination().to_string(),
            }
        })?;
        queue.enqueue(stored);
        Ok(())
    }
}
