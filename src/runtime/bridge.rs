//! Async bridge
//!
//! Runs native operations on the tokio runtime and hands the host a
//! [`Deferred`] immediately. Each invocation is its own task, so a slow
//! operation never holds up the caller or any other invocation. The outcome
//! settles the deferred exactly once: the settling half owns a
//! `oneshot::Sender`, which is consumed by the send.
//!
//! When created with [`AsyncBridge::with_settlements`], every settlement is
//! also published to a [`HostLoop`] in completion order. The host drains that
//! loop from a single task, so its continuations never overlap.
//!
//! There is no timeout and no cancellation. Dropping a `Deferred` only stops
//! observing the outcome; the native work runs to completion.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};

use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};

use crate::abi::Payload;
use crate::error::{default_error_handler, BridgeError, ErrorHandler, HostFunctionError};

/// Outcome of one invocation.
pub type Outcome = Result<Payload, BridgeError>;

/// Type alias for the future of an async operation, already marshaled.
pub type NativeFuture = Pin<Box<dyn Future<Output = Outcome> + Send + 'static>>;

/// Observable state of a [`Deferred`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeferredStatus {
    Pending,
    Resolved,
    Rejected,
}

/// One settled invocation, as delivered to the host loop.
#[derive(Debug, Clone)]
pub struct Settlement {
    pub call_id: u64,
    pub operation: String,
    pub outcome: Outcome,
}

#[derive(Default)]
struct Slot {
    outcome: Mutex<Option<Outcome>>,
}

impl Slot {
    fn get(&self) -> Option<Outcome> {
        self.outcome
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set(&self, outcome: Outcome) {
        *self.outcome.lock().unwrap_or_else(PoisonError::into_inner) = Some(outcome);
    }
}

/// A host-awaitable handle to the outcome of one invocation.
///
/// Resolves with a marshaled payload or rejects with a [`BridgeError`].
pub struct Deferred {
    call_id: u64,
    operation: String,
    slot: Arc<Slot>,
    rx: oneshot::Receiver<Outcome>,
}

impl Deferred {
    pub fn call_id(&self) -> u64 {
        self.call_id
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Current state, without waiting.
    pub fn status(&self) -> DeferredStatus {
        match self.slot.get() {
            None => DeferredStatus::Pending,
            Some(Ok(_)) => DeferredStatus::Resolved,
            Some(Err(_)) => DeferredStatus::Rejected,
        }
    }

    /// The outcome, if settled.
    pub fn outcome(&self) -> Option<Outcome> {
        self.slot.get()
    }
}

impl std::fmt::Debug for Deferred {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Deferred")
            .field("call_id", &self.call_id)
            .field("operation", &self.operation)
            .field("status", &self.status())
            .finish()
    }
}

impl Future for Deferred {
    type Output = Outcome;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Outcome> {
        let this = self.get_mut();
        match Pin::new(&mut this.rx).poll(cx) {
            Poll::Ready(Ok(outcome)) => Poll::Ready(outcome),
            // The settler is gone without sending: only possible when the
            // runtime shut down under the task.
            Poll::Ready(Err(_)) => Poll::Ready(this.slot.get().unwrap_or_else(|| {
                Err(BridgeError::Aborted {
                    operation: this.operation.clone(),
                    reason: "runtime shut down".to_string(),
                })
            })),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Settling half of a deferred. Consumed by [`Settler::settle`].
struct Settler {
    call_id: u64,
    operation: String,
    slot: Arc<Slot>,
    tx: oneshot::Sender<Outcome>,
    sink: Option<mpsc::UnboundedSender<Settlement>>,
    error_handler: ErrorHandler,
}

impl Settler {
    fn settle(self, outcome: Outcome) {
        match &outcome {
            Ok(_) => tracing::debug!(call_id = self.call_id, operation = %self.operation, "resolved"),
            Err(error) => (self.error_handler)(&HostFunctionError {
                function: self.operation.clone(),
                call_id: Some(self.call_id),
                error: error.clone(),
            }),
        }

        self.slot.set(outcome.clone());
        if let Some(sink) = &self.sink {
            let _ = sink.send(Settlement {
                call_id: self.call_id,
                operation: self.operation.clone(),
                outcome: outcome.clone(),
            });
        }
        // The receiver may be gone: the host stopped observing.
        let _ = self.tx.send(outcome);
    }
}

/// Receiving side of the settlement stream.
///
/// Holding a `HostLoop` without reading it keeps every settlement in memory.
pub struct HostLoop {
    rx: mpsc::UnboundedReceiver<Settlement>,
}

impl HostLoop {
    /// Next settlement in completion order. `None` once every bridge handle
    /// is dropped and the queue is drained.
    pub async fn next(&mut self) -> Option<Settlement> {
        self.rx.recv().await
    }

    /// A settlement that is already queued, without waiting.
    pub fn try_next(&mut self) -> Option<Settlement> {
        self.rx.try_recv().ok()
    }

    /// Deliver settlements to `handler`, one at a time, until `count` have
    /// been handled or the stream ends. Returns how many were handled.
    pub async fn drain<F>(&mut self, count: usize, mut handler: F) -> usize
    where
        F: FnMut(Settlement),
    {
        let mut handled = 0;
        while handled < count {
            match self.next().await {
                Some(settlement) => {
                    handler(settlement);
                    handled += 1;
                }
                None => break,
            }
        }
        handled
    }
}

struct BridgeInner {
    handle: Handle,
    next_id: AtomicU64,
    sink: Option<mpsc::UnboundedSender<Settlement>>,
    error_handler: ErrorHandler,
}

/// Launches native operations and hands back deferred results.
///
/// Cheap to clone; clones share call ids and the settlement stream.
#[derive(Clone)]
pub struct AsyncBridge {
    inner: Arc<BridgeInner>,
}

impl AsyncBridge {
    /// A bridge without a host loop. Outcomes are observed only through the
    /// returned [`Deferred`]s.
    pub fn new(handle: Handle) -> Self {
        Self::build(handle, None, None)
    }

    /// A bridge that also publishes every settlement to a [`HostLoop`].
    ///
    /// The stream is unbounded: settlements queue until the loop reads them.
    pub fn with_settlements(handle: Handle) -> (Self, HostLoop) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::build(handle, Some(tx), None), HostLoop { rx })
    }

    /// Whether settlements are published to a [`HostLoop`].
    pub fn publishes_settlements(&self) -> bool {
        self.inner.sink.is_some()
    }

    fn build(
        handle: Handle,
        sink: Option<mpsc::UnboundedSender<Settlement>>,
        error_handler: Option<ErrorHandler>,
    ) -> Self {
        Self {
            inner: Arc::new(BridgeInner {
                handle,
                next_id: AtomicU64::new(1),
                sink,
                error_handler: error_handler.unwrap_or_else(|| Arc::new(default_error_handler)),
            }),
        }
    }

    /// Replace the handler called for every rejection.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let bridge = AsyncBridge::new(handle).on_error(|err| {
    ///     metrics.rejections.fetch_add(1, Ordering::Relaxed);
    ///     tracing::error!("{}", err);
    /// });
    /// ```
    pub fn on_error<F>(self, handler: F) -> Self
    where
        F: Fn(&HostFunctionError) + Send + Sync + 'static,
    {
        Self::build(
            self.inner.handle.clone(),
            self.inner.sink.clone(),
            Some(Arc::new(handler)),
        )
    }

    /// The runtime native work is spawned on.
    pub fn handle(&self) -> &Handle {
        &self.inner.handle
    }

    fn pending(&self, operation: &str) -> (Deferred, Settler) {
        let call_id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let slot = Arc::new(Slot::default());
        let (tx, rx) = oneshot::channel();
        let deferred = Deferred {
            call_id,
            operation: operation.to_string(),
            slot: Arc::clone(&slot),
            rx,
        };
        let settler = Settler {
            call_id,
            operation: operation.to_string(),
            slot,
            tx,
            sink: self.inner.sink.clone(),
            error_handler: Arc::clone(&self.inner.error_handler),
        };
        (deferred, settler)
    }

    /// Launch `future` on its own task and return a pending [`Deferred`].
    pub fn invoke(&self, operation: &str, future: NativeFuture) -> Deferred {
        let (deferred, settler) = self.pending(operation);
        tracing::debug!(call_id = deferred.call_id, operation, "invoked");

        let work = self.inner.handle.spawn(future);
        self.inner.handle.spawn(async move {
            let outcome = match work.await {
                Ok(outcome) => outcome,
                Err(join_error) => Err(BridgeError::Aborted {
                    operation: settler.operation.clone(),
                    reason: if join_error.is_panic() {
                        "native operation panicked".to_string()
                    } else {
                        "native operation was cancelled".to_string()
                    },
                }),
            };
            settler.settle(outcome);
        });

        deferred
    }

    /// A deferred that is already rejected with `error`.
    pub fn reject_now(&self, operation: &str, error: BridgeError) -> Deferred {
        let (deferred, settler) = self.pending(operation);
        settler.settle(Err(error));
        deferred
    }

    /// Run `future` on the same runtime without a deferred. Not awaitable;
    /// a failure is only reported to the error handler.
    pub fn spawn_detached<F>(&self, operation: &str, future: F)
    where
        F: Future<Output = Result<(), BridgeError>> + Send + 'static,
    {
        let operation = operation.to_string();
        let error_handler = Arc::clone(&self.inner.error_handler);
        tracing::debug!(operation = %operation, "spawned detached task");

        self.inner.handle.spawn(async move {
            if let Err(error) = future.await {
                error_handler(&HostFunctionError {
                    function: operation,
                    call_id: None,
                    error,
                });
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quorum::NativeError;
    use host_value::HostValue;

    fn ok_payload(key: &str) -> Outcome {
        let mut payload = Payload::new();
        payload.insert(key.to_string(), HostValue::Bool(true));
        Ok(payload)
    }

    #[tokio::test]
    async fn test_invoke_resolves() {
        let bridge = AsyncBridge::new(Handle::current());
        let deferred = bridge.invoke("Echo", Box::pin(async { ok_payload("echo") }));
        let payload = deferred.await.expect("resolved");
        assert_eq!(payload.get("echo"), Some(&HostValue::Bool(true)));
    }

    #[tokio::test]
    async fn test_reject_now_is_settled_immediately() {
        let bridge = AsyncBridge::new(Handle::current());
        let deferred = bridge.reject_now("Missing", BridgeError::NotFound("Missing".into()));
        assert_eq!(deferred.status(), DeferredStatus::Rejected);
        assert!(matches!(deferred.await, Err(BridgeError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_panicking_operation_rejects() {
        let bridge = AsyncBridge::new(Handle::current());
        let deferred = bridge.invoke(
            "Boom",
            Box::pin(async {
                if true {
                    panic!("native bug");
                }
                ok_payload("unreachable")
            }),
        );
        match deferred.await {
            Err(BridgeError::Aborted { operation, .. }) => assert_eq!(operation, "Boom"),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_call_ids_are_unique() {
        let bridge = AsyncBridge::new(Handle::current());
        let a = bridge.invoke("A", Box::pin(async { ok_payload("a") }));
        let b = bridge.clone().invoke("B", Box::pin(async { ok_payload("b") }));
        assert_ne!(a.call_id(), b.call_id());
    }

    #[tokio::test]
    async fn test_error_handler_sees_rejections() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let bridge = AsyncBridge::new(Handle::current()).on_error(move |err| {
            sink.lock().unwrap().push(err.function.clone());
        });

        let deferred = bridge.invoke(
            "GetTrx",
            Box::pin(async {
                Err::<Payload, _>(BridgeError::from(NativeError::TrxNotFound("t1".into())))
            }),
        );
        assert!(deferred.await.is_err());
        assert_eq!(*seen.lock().unwrap(), vec!["GetTrx".to_string()]);
    }
}
