//! Message envelopes, delivery options, and disposition types.

use crate::destination::DestinationName;
use bytes::Bytes;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

// ============================================================================
// Core Identifiers
// ============================================================================

/// Unique identifier assigned to messages by the backend
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(String);

impl MessageId {
    /// Generate new random message ID
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Get message ID as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Timestamp wrapper for consistent time handling
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Create timestamp for current time
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Create timestamp from DateTime
    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// Get underlying DateTime
    pub fn as_datetime(&self) -> DateTime<Utc> {
        self.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d %H:%M:%S UTC"))
    }
}

// ============================================================================
// Property Values
// ============================================================================

/// Scalar value allowed in a message's properties map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for PropertyValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

// ============================================================================
// Envelopes
// ============================================================================

/// An encoded message ready to hand to a backend producer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundMessage {
    #[serde(with = "bytes_serde")]
    pub body: Bytes,
    pub headers: HashMap<String, String>,
    pub properties: HashMap<String, PropertyValue>,
}

/// Custom serialization for Bytes
mod bytes_serde {
    use base64::{engine::general_purpose, Engine as _};
    use bytes::Bytes;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(bytes: &Bytes, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let encoded = general_purpose::STANDARD.encode(bytes);
        encoded.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Bytes, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        let decoded = general_purpose::STANDARD
            .decode(encoded)
            .map_err(serde::de::Error::custom)?;
        Ok(Bytes::from(decoded))
    }
}

impl OutboundMessage {
    /// Create new message with body
    pub fn new(body: Bytes) -> Self {
        Self {
            body,
            headers: HashMap::new(),
            properties: HashMap::new(),
        }
    }

    /// Add message header
    pub fn with_header(mut self, key: String, value: String) -> Self {
        self.headers.insert(key, value);
        self
    }

    /// Add message property
    pub fn with_property(mut self, key: String, value: PropertyValue) -> Self {
        self.properties.insert(key, value);
        self
    }
}

/// Opaque token for acknowledging or rejecting a received message
///
/// Used exactly once per message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiptHandle {
    handle: String,
    destination: DestinationName,
}

impl ReceiptHandle {
    /// Create new receipt handle
    pub fn new(handle: String, destination: DestinationName) -> Self {
        Self {
            handle,
            destination,
        }
    }

    /// Get handle string
    pub fn handle(&self) -> &str {
        &self.handle
    }

    /// Get the destination the message was consumed from
    pub fn destination(&self) -> &DestinationName {
        &self.destination
    }
}

/// A message delivered by a backend consumer, awaiting disposition
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub message_id: MessageId,
    pub body: Bytes,
    pub headers: HashMap<String, String>,
    pub properties: HashMap<String, PropertyValue>,
    pub receipt: ReceiptHandle,
    pub delivery_count: u32,
    pub delivered_at: Timestamp,
}

impl InboundMessage {
    /// Get the disposition receipt
    pub fn receipt(&self) -> &ReceiptHandle {
        &self.receipt
    }

    /// Backend origin metadata preserved through decode
    pub fn origin(&self) -> MessageOrigin {
        MessageOrigin {
            destination: self.receipt.destination().clone(),
            message_id: self.message_id.clone(),
            delivery_count: self.delivery_count,
        }
    }
}

/// Where an inbound message came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageOrigin {
    pub destination: DestinationName,
    pub message_id: MessageId,
    pub delivery_count: u32,
}

/// Canonical received-message wrapper dispatched to the bus
#[derive(Debug, Clone)]
pub struct Received<M> {
    pub message: M,
    pub origin: MessageOrigin,
}

impl<M> Received<M> {
    /// Wrap a decoded message with its origin metadata
    pub fn new(message: M, origin: MessageOrigin) -> Self {
        Self { message, origin }
    }
}

// ============================================================================
// Delivery Options and Outcomes
// ============================================================================

/// Per-message producer settings, each independently optional
///
/// Unset options are never applied to the backend producer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeliveryOptions {
    #[serde(with = "opt_duration_millis", default)]
    pub delay: Option<Duration>,
    #[serde(with = "opt_duration_millis", default)]
    pub time_to_live: Option<Duration>,
    pub priority: Option<i32>,
}

/// Custom serialization for optional durations as milliseconds
mod opt_duration_millis {
    use chrono::Duration;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        value
            .as_ref()
            .map(|d| d.num_milliseconds())
            .serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = Option::<i64>::deserialize(deserializer)?;
        Ok(millis.map(Duration::milliseconds))
    }
}

impl DeliveryOptions {
    /// Create options with nothing set
    pub fn new() -> Self {
        Self::default()
    }

    /// Set delay before the message becomes visible
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Set message expiry
    pub fn with_time_to_live(mut self, ttl: Duration) -> Self {
        self.time_to_live = Some(ttl);
        self
    }

    /// Set relative priority
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Check whether any option is set
    pub fn is_empty(&self) -> bool {
        self.delay.is_none() && self.time_to_live.is_none() && self.priority.is_none()
    }
}

/// Terminal disposition of an inbound message
///
/// Drives exactly one backend disposition call per message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Message processed; acknowledge the handle
    Delivered,
    /// Message unprocessable; reject without redelivery
    Rejected,
    /// Transient failure; reject with redelivery requested
    Requeued,
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;
