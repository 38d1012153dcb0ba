//! # Queue Bridge
//!
//! Transport bridge between an application-level message bus and pluggable
//! queue backends (topics/queues, producers, consumers, message envelopes).
//!
//! This library provides:
//! - Destination resolution with idempotent topology provisioning
//! - A producer-side send path with delivery options and bounded
//!   fault recovery
//! - A consumer-side receive loop with ack/reject/requeue disposition
//! - A push-style processor bridge for backends that own the consume loop
//! - An in-memory reference backend for tests and development
//!
//! ## Module Organization
//!
//! - [`error`] - Error types for all bridge operations
//! - [`destination`] - Destination identity and topology attributes
//! - [`message`] - Message envelopes, delivery options, and dispositions
//! - [`backend`] - Capability traits implemented by broker clients
//! - [`codec`] - Encode/decode seam between bus messages and envelopes
//! - [`bus`] - Dispatch seam toward the message bus
//! - [`context`] - Backend ownership, resolution, and fault recovery
//! - [`sender`] - Producer adapter
//! - [`receiver`] - Consumer adapter
//! - [`processor`] - Push-style bridge
//! - [`backends`] - Backend implementations

// Module declarations
pub mod backend;
pub mod backends;
pub mod bus;
pub mod codec;
pub mod context;
pub mod destination;
pub mod error;
pub mod message;
pub mod processor;
pub mod receiver;
pub mod sender;

// Re-export commonly used types at crate root for convenience
pub use backend::{
    Backend, Consumer, DeliveryOptionsCapability, Producer, TopologyCapability,
};
pub use backends::{MemoryBackend, MemoryBackendConfig};
pub use bus::{DispatchOutcome, MessageBus};
pub use codec::{Codec, Decoded, JsonCodec};
pub use context::{BackendContextManager, ContextManager};
pub use destination::{
    Destination, DestinationAttributes, DestinationDescriptor, DestinationHandle, DestinationKind,
    DestinationName,
};
pub use error::{
    BackendError, BusError, CodecError, ConfigurationError, ProcessError, ReceiveError, SendError,
    TransportFault, ValidationError,
};
pub use message::{
    DeliveryOptions, DeliveryOutcome, InboundMessage, MessageId, MessageOrigin, OutboundMessage,
    PropertyValue, ReceiptHandle, Received, Timestamp,
};
pub use processor::Processor;
pub use receiver::{Receiver, ReceiverConfig};
pub use sender::{Sender, SenderConfig};

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
