//! Codec seam between bus-level messages and raw envelopes.

use crate::error::CodecError;
use crate::message::{InboundMessage, OutboundMessage};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;

/// Result of one decode attempt
///
/// Reject and requeue are expected outcomes, not errors; fatal decode
/// failures travel on the `Err` channel of [`Codec::decode`].
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded<M> {
    /// Successfully decoded bus message
    Message(M),
    /// Message is invalid; drop without redelivery
    Reject,
    /// Failure is transient; redeliver
    Requeue,
}

/// Converts between bus-level messages and raw body/headers/properties
pub trait Codec<M>: Send + Sync {
    /// Encode an outbound bus message into an envelope
    fn encode(&self, message: &M) -> Result<OutboundMessage, CodecError>;

    /// Decode a delivered envelope, or signal reject/requeue
    fn decode(&self, inbound: &InboundMessage) -> Result<Decoded<M>, CodecError>;
}

/// Reference codec: JSON bodies for serde-serializable bus messages
pub struct JsonCodec<M> {
    _marker: PhantomData<fn() -> M>,
}

impl<M> JsonCodec<M> {
    /// Create new JSON codec
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<M> Default for JsonCodec<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> Codec<M> for JsonCodec<M>
where
    M: Serialize + DeserializeOwned + Send + Sync,
{
    fn encode(&self, message: &M) -> Result<OutboundMessage, CodecError> {
        let body = serde_json::to_vec(message)?;
        Ok(OutboundMessage::new(body.into())
            .with_header("content-type".to_string(), "application/json".to_string()))
    }

    fn decode(&self, inbound: &InboundMessage) -> Result<Decoded<M>, CodecError> {
        let message = serde_json::from_slice(&inbound.body)?;
        Ok(Decoded::Message(message))
    }
}

#[cfg(test)]
#[path = "codec_tests.rs"]
mod tests;
