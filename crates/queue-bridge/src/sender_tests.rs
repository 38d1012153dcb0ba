//! Tests for the producer-side send path.

use super::*;
use crate::backend::{
    Backend, Consumer, DeliveryOptionsCapability, Producer, TopologyCapability,
};
use crate::codec::JsonCodec;
use crate::context::BackendContextManager;
use crate::destination::{DestinationHandle, DestinationKind};
use crate::error::BackendError;
use async_trait::async_trait;
use chrono::Duration;
use serde::Deserialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Order {
    id: u32,
}

fn name(value: &str) -> DestinationName {
    DestinationName::new(value.to_string()).unwrap()
}

// ============================================================================
// Recording Backend
// ============================================================================

/// Everything the sender asked the backend to do, in order
#[derive(Debug, Clone, PartialEq)]
enum BackendCall {
    Declare(Destination),
    Bind(DestinationName, DestinationName),
    CreateProducer,
    SetDelay(i64),
    SetPriority(i32),
    SetTtl(i64),
    Send(DestinationName),
}

/// Which error a scripted send failure produces
#[derive(Debug, Clone, Copy)]
enum FailKind {
    MissingQueue,
    Connection,
}

impl FailKind {
    fn to_error(self) -> BackendError {
        match self {
            Self::MissingQueue => BackendError::DestinationNotFound {
                name: "orders.q".to_string(),
            },
            Self::Connection => BackendError::ConnectionFailed {
                message: "channel closed".to_string(),
            },
        }
    }
}

#[derive(Clone)]
struct RecordingBackend {
    calls: Arc<Mutex<Vec<BackendCall>>>,
    failing_sends: Arc<AtomicUsize>,
    fail_kind: FailKind,
    supports_options: bool,
}

impl RecordingBackend {
    fn new() -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            failing_sends: Arc::new(AtomicUsize::new(0)),
            fail_kind: FailKind::MissingQueue,
            supports_options: true,
        }
    }

    fn with_failing_sends(count: usize, kind: FailKind) -> Self {
        let backend = Self::new();
        backend.failing_sends.store(count, Ordering::SeqCst);
        Self {
            fail_kind: kind,
            ..backend
        }
    }

    fn without_delivery_options() -> Self {
        Self {
            supports_options: false,
            ..Self::new()
        }
    }

    fn calls(&self) -> Vec<BackendCall> {
        self.calls.lock().unwrap().clone()
    }

    fn count(&self, matches: impl Fn(&BackendCall) -> bool) -> usize {
        self.calls().iter().filter(|call| matches(call)).count()
    }

    fn send_attempts(&self) -> usize {
        self.count(|call| matches!(call, BackendCall::Send(_)))
    }
}

#[async_trait]
impl Backend for RecordingBackend {
    async fn create_producer(&self) -> Result<Box<dyn Producer>, BackendError> {
        self.calls.lock().unwrap().push(BackendCall::CreateProducer);
        Ok(Box::new(RecordingProducer {
            calls: Arc::clone(&self.calls),
            failing_sends: Arc::clone(&self.failing_sends),
            fail_kind: self.fail_kind,
            supports_options: self.supports_options,
        }))
    }

    async fn create_consumer(
        &self,
        _destination: &DestinationHandle,
    ) -> Result<Box<dyn Consumer>, BackendError> {
        unimplemented!("consuming not needed for sender tests")
    }

    fn topology(&self) -> Option<&dyn TopologyCapability> {
        Some(self)
    }

    async fn close(&self) -> Result<(), BackendError> {
        Ok(())
    }
}

#[async_trait]
impl TopologyCapability for RecordingBackend {
    async fn declare(&self, destination: &Destination) -> Result<(), BackendError> {
        self.calls
            .lock()
            .unwrap()
            .push(BackendCall::Declare(destination.clone()));
        Ok(())
    }

    async fn bind(
        &self,
        topic: &DestinationName,
        queue: &DestinationName,
    ) -> Result<(), BackendError> {
        self.calls
            .lock()
            .unwrap()
            .push(BackendCall::Bind(topic.clone(), queue.clone()));
        Ok(())
    }
}

struct RecordingProducer {
    calls: Arc<Mutex<Vec<BackendCall>>>,
    failing_sends: Arc<AtomicUsize>,
    fail_kind: FailKind,
    supports_options: bool,
}

impl DeliveryOptionsCapability for RecordingProducer {
    fn set_delivery_delay(&mut self, delay: Duration) {
        self.calls
            .lock()
            .unwrap()
            .push(BackendCall::SetDelay(delay.num_milliseconds()));
    }

    fn set_priority(&mut self, priority: i32) {
        self.calls
            .lock()
            .unwrap()
            .push(BackendCall::SetPriority(priority));
    }

    fn set_time_to_live(&mut self, ttl: Duration) {
        self.calls
            .lock()
            .unwrap()
            .push(BackendCall::SetTtl(ttl.num_milliseconds()));
    }
}

#[async_trait]
impl Producer for RecordingProducer {
    fn delivery_options(&mut self) -> Option<&mut dyn DeliveryOptionsCapability> {
        if self.supports_options {
            Some(self)
        } else {
            None
        }
    }

    async fn send(
        &self,
        destination: &DestinationHandle,
        _message: OutboundMessage,
    ) -> Result<(), BackendError> {
        self.calls
            .lock()
            .unwrap()
            .push(BackendCall::Send(destination.name().clone()));

        let remaining = self.failing_sends.load(Ordering::SeqCst);
        if remaining > 0 {
            if remaining != usize::MAX {
                self.failing_sends.store(remaining - 1, Ordering::SeqCst);
            }
            return Err(self.fail_kind.to_error());
        }
        Ok(())
    }
}

// ============================================================================
// Counting Context
// ============================================================================

/// Delegating context manager that counts recovery and provisioning calls
struct CountingContext {
    inner: BackendContextManager,
    ensure_calls: AtomicUsize,
    recover_calls: AtomicUsize,
}

impl CountingContext {
    fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            inner: BackendContextManager::new(backend),
            ensure_calls: AtomicUsize::new(0),
            recover_calls: AtomicUsize::new(0),
        }
    }

    fn ensure_count(&self) -> usize {
        self.ensure_calls.load(Ordering::SeqCst)
    }

    fn recover_count(&self) -> usize {
        self.recover_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContextManager for CountingContext {
    fn backend(&self) -> &dyn Backend {
        self.inner.backend()
    }

    async fn resolve(&self, destination: &Destination) -> Result<DestinationHandle, BackendError> {
        self.inner.resolve(destination).await
    }

    async fn recover(&self, fault: &TransportFault, descriptor: &DestinationDescriptor) -> bool {
        self.recover_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.recover(fault, descriptor).await
    }

    async fn ensure_exists(&self, descriptor: &DestinationDescriptor) -> bool {
        self.ensure_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.ensure_exists(descriptor).await
    }
}

fn sender_with(
    backend: &RecordingBackend,
    config: SenderConfig,
) -> (Sender<Order>, Arc<CountingContext>) {
    let context = Arc::new(CountingContext::new(Arc::new(backend.clone())));
    let sender = Sender::new(
        Arc::new(JsonCodec::<Order>::new()),
        context.clone(),
        config,
    )
    .unwrap();
    (sender, context)
}

// ============================================================================
// Construction
// ============================================================================

#[test]
fn test_neither_name_fails_before_any_backend_call() {
    let backend = RecordingBackend::new();
    let context: Arc<dyn ContextManager> =
        Arc::new(CountingContext::new(Arc::new(backend.clone())));

    let result = Sender::<Order>::new(
        Arc::new(JsonCodec::<Order>::new()),
        context,
        SenderConfig::new().with_debug(true),
    );

    assert!(matches!(
        result,
        Err(ConfigurationError::MissingDestination)
    ));
    assert!(backend.calls().is_empty());
}

#[test]
fn test_topic_selected_when_is_topic() {
    let backend = RecordingBackend::new();
    let (sender, _) = sender_with(
        &backend,
        SenderConfig::new()
            .with_topic(name("orders"))
            .with_queue(name("orders.q")),
    );
    assert_eq!(sender.destination().kind(), DestinationKind::Topic);
}

#[test]
fn test_queue_selected_when_not_topic() {
    let backend = RecordingBackend::new();
    let (sender, _) = sender_with(
        &backend,
        SenderConfig {
            topic_name: Some(name("orders")),
            queue_name: Some(name("orders.q")),
            is_topic: false,
            ..SenderConfig::new()
        },
    );
    assert_eq!(sender.destination().kind(), DestinationKind::Queue);
}

#[test]
fn test_topic_fallback_when_only_topic_named() {
    let backend = RecordingBackend::new();
    let (sender, _) = sender_with(
        &backend,
        SenderConfig {
            topic_name: Some(name("orders")),
            is_topic: false,
            ..SenderConfig::new()
        },
    );
    assert_eq!(sender.destination().kind(), DestinationKind::Topic);
}

// ============================================================================
// Send Path
// ============================================================================

#[tokio::test]
async fn test_topic_send_declares_durable_fanout_and_sends_once() {
    let backend = RecordingBackend::new();
    let (sender, context) = sender_with(
        &backend,
        SenderConfig::new().with_topic(name("orders")).with_debug(false),
    );

    sender.send(&Order { id: 1 }).await.unwrap();

    // No eager provisioning outside debug mode.
    assert_eq!(context.ensure_count(), 0);

    let calls = backend.calls();
    let declared = calls
        .iter()
        .find_map(|call| match call {
            BackendCall::Declare(destination) => Some(destination.clone()),
            _ => None,
        })
        .expect("topic must be declared");
    assert_eq!(declared.kind(), DestinationKind::Topic);
    assert!(declared.attributes().durable);
    assert!(declared.attributes().fanout);

    assert_eq!(backend.send_attempts(), 1);
}

#[tokio::test]
async fn test_queue_send_declares_durable_queue() {
    let backend = RecordingBackend::new();
    let (sender, _) = sender_with(&backend, SenderConfig::new().with_queue(name("orders.q")));

    sender.send(&Order { id: 2 }).await.unwrap();

    let declared_queue = backend.count(|call| {
        matches!(
            call,
            BackendCall::Declare(destination)
                if destination.kind() == DestinationKind::Queue
                    && destination.attributes().durable
        )
    });
    assert_eq!(declared_queue, 1);
}

#[tokio::test]
async fn test_debug_mode_provisions_eagerly() {
    let backend = RecordingBackend::new();
    let (sender, context) = sender_with(
        &backend,
        SenderConfig::new()
            .with_topic(name("orders"))
            .with_queue(name("orders.q"))
            .with_debug(true),
    );

    sender.send(&Order { id: 3 }).await.unwrap();

    assert_eq!(context.ensure_count(), 1);
    // Eager provisioning declares the pair and binds them.
    assert_eq!(
        backend.count(|call| matches!(call, BackendCall::Bind(_, _))),
        1
    );
}

// ============================================================================
// Delivery Options
// ============================================================================

#[tokio::test]
async fn test_delivery_options_applied_with_exact_values_before_send() {
    let backend = RecordingBackend::new();
    let (sender, _) = sender_with(
        &backend,
        SenderConfig::new().with_queue(name("orders.q")).with_delivery(
            DeliveryOptions::new()
                .with_delay(Duration::milliseconds(500))
                .with_priority(5)
                .with_time_to_live(Duration::milliseconds(60_000)),
        ),
    );

    sender.send(&Order { id: 4 }).await.unwrap();

    let calls = backend.calls();
    let delay_at = calls
        .iter()
        .position(|call| *call == BackendCall::SetDelay(500))
        .expect("delay setter invoked");
    let priority_at = calls
        .iter()
        .position(|call| *call == BackendCall::SetPriority(5))
        .expect("priority setter invoked");
    let ttl_at = calls
        .iter()
        .position(|call| *call == BackendCall::SetTtl(60_000))
        .expect("ttl setter invoked");
    let send_at = calls
        .iter()
        .position(|call| matches!(call, BackendCall::Send(_)))
        .expect("send invoked");

    assert!(delay_at < send_at);
    assert!(priority_at < send_at);
    assert!(ttl_at < send_at);
}

#[tokio::test]
async fn test_unset_delivery_options_are_not_applied() {
    let backend = RecordingBackend::new();
    let (sender, _) = sender_with(
        &backend,
        SenderConfig::new()
            .with_queue(name("orders.q"))
            .with_delivery(DeliveryOptions::new().with_priority(5)),
    );

    sender.send(&Order { id: 5 }).await.unwrap();

    assert_eq!(
        backend.count(|call| matches!(call, BackendCall::SetPriority(_))),
        1
    );
    assert_eq!(
        backend.count(|call| matches!(call, BackendCall::SetDelay(_))),
        0
    );
    assert_eq!(
        backend.count(|call| matches!(call, BackendCall::SetTtl(_))),
        0
    );
}

#[tokio::test]
async fn test_options_silently_skipped_without_capability() {
    let backend = RecordingBackend::without_delivery_options();
    let (sender, _) = sender_with(
        &backend,
        SenderConfig::new().with_queue(name("orders.q")).with_delivery(
            DeliveryOptions::new()
                .with_delay(Duration::milliseconds(500))
                .with_priority(5),
        ),
    );

    sender.send(&Order { id: 6 }).await.unwrap();

    assert_eq!(
        backend.count(|call| {
            matches!(
                call,
                BackendCall::SetDelay(_) | BackendCall::SetPriority(_) | BackendCall::SetTtl(_)
            )
        }),
        0
    );
    assert_eq!(backend.send_attempts(), 1);
}

// ============================================================================
// Fault Recovery
// ============================================================================

#[tokio::test]
async fn test_recovery_success_buys_one_retry() {
    let backend = RecordingBackend::with_failing_sends(1, FailKind::MissingQueue);
    let (sender, context) = sender_with(&backend, SenderConfig::new().with_queue(name("orders.q")));

    sender.send(&Order { id: 7 }).await.unwrap();

    assert_eq!(context.recover_count(), 1);
    assert_eq!(backend.send_attempts(), 2);
}

#[tokio::test]
async fn test_deterministic_failure_is_bounded_despite_recovery_success() {
    // Every send fails; recovery keeps re-provisioning successfully. The
    // retry ceiling must stop the loop.
    let backend = RecordingBackend::with_failing_sends(usize::MAX, FailKind::MissingQueue);
    let (sender, context) = sender_with(&backend, SenderConfig::new().with_queue(name("orders.q")));

    let result = sender.send(&Order { id: 8 }).await;

    assert!(matches!(result, Err(SendError::SendingFailed { .. })));
    assert_eq!(backend.send_attempts(), 2);
    assert_eq!(context.recover_count(), 1);
}

#[tokio::test]
async fn test_recovery_failure_surfaces_without_retry() {
    let backend = RecordingBackend::with_failing_sends(usize::MAX, FailKind::Connection);
    let (sender, context) = sender_with(&backend, SenderConfig::new().with_queue(name("orders.q")));

    let result = sender.send(&Order { id: 9 }).await;

    let Err(SendError::SendingFailed { fault }) = result else {
        panic!("expected SendingFailed");
    };
    assert!(matches!(
        fault.cause(),
        BackendError::ConnectionFailed { .. }
    ));
    assert_eq!(backend.send_attempts(), 1);
    assert_eq!(context.recover_count(), 1);
}
