//! Destination identity and topology attributes.

use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Validated destination name with length and character restrictions
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DestinationName(String);

impl DestinationName {
    /// Create new destination name with validation
    pub fn new(name: String) -> Result<Self, ValidationError> {
        if name.is_empty() || name.len() > 255 {
            return Err(ValidationError::OutOfRange {
                field: "destination_name".to_string(),
                message: "must be 1-255 characters".to_string(),
            });
        }

        // Broker-portable character set (ASCII alphanumeric, hyphens, underscores, dots)
        if !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
        {
            return Err(ValidationError::InvalidFormat {
                field: "destination_name".to_string(),
                message: "only ASCII alphanumeric, hyphens, underscores, and dots allowed"
                    .to_string(),
            });
        }

        Ok(Self(name))
    }

    /// Get destination name as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DestinationName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DestinationName {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_string())
    }
}

/// Kind of addressable destination on the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DestinationKind {
    Topic,
    Queue,
}

impl fmt::Display for DestinationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Topic => write!(f, "topic"),
            Self::Queue => write!(f, "queue"),
        }
    }
}

/// Backend attributes applied when a destination is declared
///
/// Only meaningful for backends exposing an explicit-declaration capability;
/// other backends ignore them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestinationAttributes {
    pub durable: bool,
    pub fanout: bool,
}

impl DestinationAttributes {
    /// Default attributes for a topic: durable with fanout distribution
    pub fn topic_defaults() -> Self {
        Self {
            durable: true,
            fanout: true,
        }
    }

    /// Default attributes for a queue: durable
    pub fn queue_defaults() -> Self {
        Self {
            durable: true,
            fanout: false,
        }
    }
}

/// Logical identity of a topic or queue plus its declaration attributes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Destination {
    name: DestinationName,
    kind: DestinationKind,
    attributes: DestinationAttributes,
}

impl Destination {
    /// Create a topic destination with default attributes
    pub fn topic(name: DestinationName) -> Self {
        Self {
            name,
            kind: DestinationKind::Topic,
            attributes: DestinationAttributes::topic_defaults(),
        }
    }

    /// Create a queue destination with default attributes
    pub fn queue(name: DestinationName) -> Self {
        Self {
            name,
            kind: DestinationKind::Queue,
            attributes: DestinationAttributes::queue_defaults(),
        }
    }

    /// Override the declaration attributes
    pub fn with_attributes(mut self, attributes: DestinationAttributes) -> Self {
        self.attributes = attributes;
        self
    }

    /// Get destination name
    pub fn name(&self) -> &DestinationName {
        &self.name
    }

    /// Get destination kind
    pub fn kind(&self) -> DestinationKind {
        self.kind
    }

    /// Get declaration attributes
    pub fn attributes(&self) -> &DestinationAttributes {
        &self.attributes
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{}'", self.kind, self.name)
    }
}

/// Resolved backend handle for a destination
///
/// Created per operation; repeated resolution of the same destination yields
/// an equal handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestinationHandle {
    destination: Destination,
}

impl DestinationHandle {
    /// Create a handle for the given destination
    pub fn new(destination: Destination) -> Self {
        Self { destination }
    }

    /// Get the underlying destination
    pub fn destination(&self) -> &Destination {
        &self.destination
    }

    /// Get destination name
    pub fn name(&self) -> &DestinationName {
        self.destination.name()
    }

    /// Get destination kind
    pub fn kind(&self) -> DestinationKind {
        self.destination.kind()
    }
}

/// The topic/queue name pair handed to recovery and eager provisioning
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestinationDescriptor {
    topic: Option<DestinationName>,
    queue: Option<DestinationName>,
}

impl DestinationDescriptor {
    /// Create a descriptor from optional topic and queue names
    pub fn new(topic: Option<DestinationName>, queue: Option<DestinationName>) -> Self {
        Self { topic, queue }
    }

    /// Create a descriptor naming only a topic
    pub fn for_topic(topic: DestinationName) -> Self {
        Self {
            topic: Some(topic),
            queue: None,
        }
    }

    /// Create a descriptor naming only a queue
    pub fn for_queue(queue: DestinationName) -> Self {
        Self {
            topic: None,
            queue: Some(queue),
        }
    }

    /// Get topic name, if any
    pub fn topic(&self) -> Option<&DestinationName> {
        self.topic.as_ref()
    }

    /// Get queue name, if any
    pub fn queue(&self) -> Option<&DestinationName> {
        self.queue.as_ref()
    }
}

impl fmt::Display for DestinationDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.topic, &self.queue) {
            (Some(topic), Some(queue)) => write!(f, "topic '{}', queue '{}'", topic, queue),
            (Some(topic), None) => write!(f, "topic '{}'", topic),
            (None, Some(queue)) => write!(f, "queue '{}'", queue),
            (None, None) => write!(f, "unspecified destination"),
        }
    }
}

#[cfg(test)]
#[path = "destination_tests.rs"]
mod tests;
