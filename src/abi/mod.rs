//! ABI: argument adaptation and result marshaling
//!
//! Handles the data boundary between the untyped host and native operations.
//!
//! - Inbound: host values are adapted to a declared [`Signature`]
//! - Outbound: native results are marshaled into an untyped [`Payload`]

mod adapter;
mod marshal;

pub use adapter::{adapt, AdaptError, Args, NativeArg, ParamKind, Signature};
pub use marshal::{marshal, marshal_error, MarshalError, Payload};
