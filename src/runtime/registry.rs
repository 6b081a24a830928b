//! Function registry
//!
//! Binds operation names to descriptors: a [`Signature`] for the argument
//! adapter and the native [`Operation`] to run. Registration happens once,
//! while the host bindings are assembled; afterwards the registry is frozen
//! inside a [`Runtime`](super::Runtime) and only read.
//!
//! # Example
//!
//! ```ignore
//! let mut registry = Registry::new();
//! registry
//!     .func_sync("IsQuorumRunning", Signature::new(), move |_args| {
//!         Ok(HostValue::Bool(lifecycle.is_active()))
//!     })
//!     .func_async("GetTrx", Signature::new().string().string(), move |args| {
//!         let api = api.clone();
//!         async move { Ok::<_, BridgeError>(api.get_trx(args.string(0)?, args.string(1)?).await?) }
//!     });
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use host_value::HostValue;
use serde::Serialize;

use crate::abi::{marshal, Args, Signature};
use crate::error::BridgeError;
use crate::runtime::bridge::NativeFuture;

/// A synchronous operation: runs on the host's thread and returns at once.
pub type SyncFn = Arc<dyn Fn(Args) -> Result<HostValue, BridgeError> + Send + Sync>;

/// An asynchronous operation: builds the future the bridge will spawn.
pub type AsyncFn = Arc<dyn Fn(Args) -> NativeFuture + Send + Sync>;

#[derive(Clone)]
pub enum Operation {
    Sync(SyncFn),
    Async(AsyncFn),
}

/// Everything the runtime needs to serve one operation name.
#[derive(Clone)]
pub struct OperationDescriptor {
    name: String,
    signature: Signature,
    operation: Operation,
}

impl OperationDescriptor {
    pub fn new(name: impl Into<String>, signature: Signature, operation: Operation) -> Self {
        Self {
            name: name.into(),
            signature,
            operation,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn operation(&self) -> &Operation {
        &self.operation
    }

    pub fn is_async(&self) -> bool {
        matches!(self.operation, Operation::Async(_))
    }
}

impl std::fmt::Debug for OperationDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationDescriptor")
            .field("name", &self.name)
            .field("signature", &self.signature)
            .field("async", &self.is_async())
            .finish()
    }
}

/// Name → descriptor table.
#[derive(Default, Clone)]
pub struct Registry {
    operations: HashMap<String, OperationDescriptor>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `descriptor` under its name. An existing entry with the same
    /// name is replaced and returned (last write wins).
    pub fn register(&mut self, descriptor: OperationDescriptor) -> Option<OperationDescriptor> {
        let previous = self
            .operations
            .insert(descriptor.name.clone(), descriptor);
        if let Some(old) = &previous {
            tracing::debug!(operation = %old.name, "replaced existing registration");
        }
        previous
    }

    pub fn lookup(&self, name: &str) -> Result<&OperationDescriptor, BridgeError> {
        self.operations
            .get(name)
            .ok_or_else(|| BridgeError::NotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.operations.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.operations.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Descriptors, sorted by name.
    pub fn iter(&self) -> impl Iterator<Item = &OperationDescriptor> {
        let mut descriptors: Vec<&OperationDescriptor> = self.operations.values().collect();
        descriptors.sort_unstable_by(|a, b| a.name.cmp(&b.name));
        descriptors.into_iter()
    }

    /// Register a synchronous operation.
    pub fn func_sync<F>(&mut self, name: &str, signature: Signature, func: F) -> &mut Self
    where
        F: Fn(Args) -> Result<HostValue, BridgeError> + Send + Sync + 'static,
    {
        self.register(OperationDescriptor::new(
            name,
            signature,
            Operation::Sync(Arc::new(func)),
        ));
        self
    }

    /// Register an asynchronous operation with automatic marshaling.
    ///
    /// `func` turns adapted arguments into a future of a serializable native
    /// result. The result is marshaled into a payload on the worker task, so
    /// nothing but building the future happens on the host's thread.
    pub fn func_async<R, E, F, Fut>(&mut self, name: &str, signature: Signature, func: F) -> &mut Self
    where
        R: Serialize + Send + 'static,
        E: Into<BridgeError> + Send + 'static,
        F: Fn(Args) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, E>> + Send + 'static,
    {
        let wrapped = move |args: Args| -> NativeFuture {
            let future = func(args);
            Box::pin(async move {
                let result = future.await.map_err(Into::into)?;
                Ok(marshal(&result)?)
            })
        };
        self.register(OperationDescriptor::new(
            name,
            signature,
            Operation::Async(Arc::new(wrapped)),
        ));
        self
    }

    /// Register a provider's operations.
    pub fn register_provider<P: OperationProvider + ?Sized>(&mut self, provider: &P) -> &mut Self {
        provider.register(self);
        self
    }
}

/// Trait for types that provide a set of operations.
///
/// Implement this to package the bindings of one backend so they can be
/// registered in one call.
pub trait OperationProvider {
    fn register(&self, registry: &mut Registry);
}
