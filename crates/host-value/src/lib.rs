//! Host values for the quorum bridge.
//!
//! A host (a scripting runtime, a JSON-lines driver, a test harness) speaks in
//! untyped values. [`HostValue`] is that value space: the same shapes a
//! JavaScript caller can produce. Native code never accepts a `HostValue`
//! directly; it converts through the strict `TryFrom` impls in this crate so a
//! number can never silently become a group id.
//!
//! ```
//! use host_value::HostValue;
//!
//! let arg = HostValue::from("group-1");
//! let id: String = arg.try_into().unwrap();
//! assert_eq!(id, "group-1");
//!
//! let bad = HostValue::Number(7.0);
//! assert!(String::try_from(bad).is_err());
//! ```

mod value;

#[cfg(feature = "serde")]
mod json;

pub use value::{HostValue, Object, ValueKind};

use thiserror::Error;

/// Error converting a [`HostValue`] into a native Rust type.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConversionError {
    /// The value has a different kind than the target type accepts.
    #[error("expected {expected}, got {got}")]
    TypeMismatch { expected: ValueKind, got: ValueKind },

    /// A number was expected to be integral (and finite) but was not.
    #[error("expected an integer, got {0}")]
    NotAnInteger(f64),

    /// An integral number does not fit the target integer type.
    #[error("{value} is out of range for {target}")]
    OutOfRange { value: f64, target: &'static str },

    /// Conversion of an array element failed.
    #[error("element {0}: {1}")]
    IndexError(usize, Box<ConversionError>),
}
