//! quorum-bridge: asynchronous host bindings for a quorum node
//!
//! Exposes the node's operations to a single-threaded, dynamically-typed
//! host. The host calls an operation by name with untyped arguments and gets
//! back either a value (for the few synchronous operations) or a deferred
//! that settles once the native work finishes on the tokio runtime.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │                    Host                     │
//! │     call(name, [HostValue])   HostLoop      │
//! ├─────────────────────────────────────────────┤
//! │  runtime   - registry, dispatch, deferreds  │
//! │  abi       - argument adapter, marshaler    │
//! │  quorum    - operation table, node api      │
//! ├─────────────────────────────────────────────┤
//! │         Native work (tokio runtime)         │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use quorum_bridge::{build_runtime, ArityPolicy, HostValue, LogControl, MemoryNode};
//!
//! # async fn demo() -> Result<(), quorum_bridge::BridgeError> {
//! let node = Arc::new(MemoryNode::new(Default::default()));
//! let (runtime, _lifecycle) = build_runtime(
//!     node,
//!     LogControl::detached(false),
//!     tokio::runtime::Handle::current(),
//!     ArityPolicy::Decline,
//! );
//!
//! let started = runtime
//!     .call("StartQuorum", &[HostValue::from("secret"), HostValue::from("")])
//!     .settle()
//!     .await?;
//! assert_eq!(started.get("ok"), Some(&HostValue::Bool(true)));
//! # Ok(())
//! # }
//! ```

pub mod abi;
pub mod config;
pub mod error;
pub mod logging;
pub mod quorum;
pub mod runtime;

pub use abi::{adapt, marshal, Payload, Signature};
pub use config::BridgeConfig;
pub use error::{BridgeError, HostFunctionError};
pub use host_value::HostValue;
pub use logging::LogControl;
pub use quorum::{
    build_runtime, build_runtime_with_host_loop, MemoryNode, NativeError, QuorumApi, QuorumBindings,
};
pub use runtime::{ArityPolicy, Call, Deferred, HostLoop, Lifecycle, Runtime};
