//! Context management: backend ownership, destination resolution, and
//! transport-fault recovery.

use crate::backend::Backend;
use crate::destination::{Destination, DestinationDescriptor, DestinationHandle};
use crate::error::{BackendError, TransportFault};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

/// Capability handle the adapters use to reach the backend context
///
/// Senders, receivers, and processors hold a non-owning reference; the
/// implementation owns the backend connection and its lifecycle.
#[async_trait]
pub trait ContextManager: Send + Sync {
    /// The underlying backend context
    fn backend(&self) -> &dyn Backend;

    /// Resolve a destination, declaring it first when the backend supports
    /// explicit declaration
    ///
    /// Declaration is idempotent and sits on the hot path; repeated
    /// resolution of the same destination yields an equal handle.
    async fn resolve(&self, destination: &Destination) -> Result<DestinationHandle, BackendError>;

    /// Attempt backend-specific remediation of a send failure
    ///
    /// Returns `true` if the fault was remediated and the send is worth
    /// retrying.
    async fn recover(&self, fault: &TransportFault, descriptor: &DestinationDescriptor) -> bool;

    /// Eagerly provision the descriptor's topology (debug use)
    ///
    /// Returns `true` if the topology exists after the call.
    async fn ensure_exists(&self, descriptor: &DestinationDescriptor) -> bool;
}

/// Default context manager owning the backend connection
///
/// Recovery re-provisions missing topology; faults that provisioning cannot
/// fix are reported unrecoverable.
pub struct BackendContextManager {
    backend: Arc<dyn Backend>,
}

impl BackendContextManager {
    /// Create a context manager owning the given backend
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    /// Close the owned backend connection
    pub async fn close(&self) -> Result<(), BackendError> {
        self.backend.close().await
    }

    /// Declare everything the descriptor names, plus the topic-queue binding
    /// when both are present
    async fn provision(&self, descriptor: &DestinationDescriptor) -> Result<(), BackendError> {
        let Some(topology) = self.backend.topology() else {
            // Nothing to declare; the backend resolves destinations lazily.
            return Ok(());
        };

        if let Some(topic) = descriptor.topic() {
            topology.declare(&Destination::topic(topic.clone())).await?;
        }
        if let Some(queue) = descriptor.queue() {
            topology.declare(&Destination::queue(queue.clone())).await?;
        }
        if let (Some(topic), Some(queue)) = (descriptor.topic(), descriptor.queue()) {
            topology.bind(topic, queue).await?;
        }

        Ok(())
    }
}

#[async_trait]
impl ContextManager for BackendContextManager {
    fn backend(&self) -> &dyn Backend {
        self.backend.as_ref()
    }

    async fn resolve(&self, destination: &Destination) -> Result<DestinationHandle, BackendError> {
        if let Some(topology) = self.backend.topology() {
            topology.declare(destination).await?;
        }
        Ok(self.backend.destination(destination))
    }

    async fn recover(&self, fault: &TransportFault, descriptor: &DestinationDescriptor) -> bool {
        if self.backend.topology().is_none() {
            debug!(%fault, "backend has no topology capability, cannot recover");
            return false;
        }
        if !fault.cause().is_missing_topology() {
            debug!(%fault, "fault is not topology-shaped, not recovering");
            return false;
        }

        match self.provision(descriptor).await {
            Ok(()) => {
                debug!(%descriptor, "re-provisioned topology after transport fault");
                true
            }
            Err(error) => {
                warn!(%descriptor, %error, "topology re-provisioning failed");
                false
            }
        }
    }

    async fn ensure_exists(&self, descriptor: &DestinationDescriptor) -> bool {
        match self.provision(descriptor).await {
            Ok(()) => true,
            Err(error) => {
                warn!(%descriptor, %error, "eager provisioning failed");
                false
            }
        }
    }
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod tests;
