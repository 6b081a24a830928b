//! Host runtime
//!
//! Dispatches host calls: registry lookup, argument adaptation, then either a
//! synchronous result or a [`Deferred`] from the async bridge.

mod bridge;
mod lifecycle;
mod registry;

pub use bridge::{AsyncBridge, Deferred, DeferredStatus, HostLoop, NativeFuture, Outcome, Settlement};
pub use lifecycle::{Lifecycle, LifecycleError, ServiceState, ShutdownSignal, StartTicket};
pub use registry::{AsyncFn, Operation, OperationDescriptor, OperationProvider, Registry, SyncFn};

use std::sync::Arc;

use host_value::HostValue;
use serde::{Deserialize, Serialize};

use crate::abi::{adapt, AdaptError};
use crate::error::BridgeError;

/// What a call does when the host passes fewer arguments than the operation's
/// fixed parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArityPolicy {
    /// Return `null` without running the operation.
    #[default]
    Decline,
    /// Reject with the arity error.
    Reject,
}

/// Result of one host call.
#[derive(Debug)]
pub enum Call {
    /// A synchronous operation's value, or `null` for a declined call.
    Immediate(HostValue),
    /// An asynchronous operation in flight, or a rejection.
    Pending(Deferred),
}

impl Call {
    /// Wait for the call's value. Payloads become host objects.
    pub async fn settle(self) -> Result<HostValue, BridgeError> {
        match self {
            Call::Immediate(value) => Ok(value),
            Call::Pending(deferred) => deferred.await.map(HostValue::Object),
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Call::Pending(_))
    }
}

/// A frozen registry plus the bridge its async operations run on.
#[derive(Clone)]
pub struct Runtime {
    registry: Arc<Registry>,
    bridge: AsyncBridge,
    arity_policy: ArityPolicy,
}

impl Runtime {
    pub fn new(registry: Registry, bridge: AsyncBridge) -> Self {
        Self {
            registry: Arc::new(registry),
            bridge,
            arity_policy: ArityPolicy::default(),
        }
    }

    pub fn with_arity_policy(mut self, policy: ArityPolicy) -> Self {
        self.arity_policy = policy;
        self
    }

    pub fn arity_policy(&self) -> ArityPolicy {
        self.arity_policy
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn bridge(&self) -> &AsyncBridge {
        &self.bridge
    }

    /// Call operation `name` with untyped host arguments.
    ///
    /// Never blocks on native work. Every failure of an async operation,
    /// including an unknown name or a bad argument, is a rejected
    /// [`Deferred`]; a sync operation's failure is a rejected one as well, so
    /// the host has a single rejection channel.
    pub fn call(&self, name: &str, args: &[HostValue]) -> Call {
        let descriptor = match self.registry.lookup(name) {
            Ok(descriptor) => descriptor,
            Err(err) => return Call::Pending(self.bridge.reject_now(name, err)),
        };

        let adapted = match adapt(descriptor.signature(), args) {
            Ok(adapted) => adapted,
            Err(err @ AdaptError::Arity { .. }) => {
                return match self.arity_policy {
                    ArityPolicy::Decline => {
                        tracing::debug!(operation = name, %err, "declined call");
                        Call::Immediate(HostValue::Null)
                    }
                    ArityPolicy::Reject => Call::Pending(self.bridge.reject_now(name, err.into())),
                };
            }
            Err(err) => return Call::Pending(self.bridge.reject_now(name, err.into())),
        };

        match descriptor.operation() {
            Operation::Sync(func) => match func(adapted) {
                Ok(value) => Call::Immediate(value),
                Err(err) => Call::Pending(self.bridge.reject_now(name, err)),
            },
            Operation::Async(func) => Call::Pending(self.bridge.invoke(name, func(adapted))),
        }
    }
}
