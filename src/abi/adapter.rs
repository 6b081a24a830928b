//! Argument adaptation
//!
//! Every operation declares a [`Signature`]: an ordered list of fixed
//! parameters, optionally followed by a rest parameter that collects every
//! remaining argument. [`adapt`] turns the host's untyped argument list into
//! [`Args`] using strict coercion, so a host that passes `5` where a group id
//! is expected gets a type error instead of the id `"5"`.

use std::fmt;

use host_value::{ConversionError, HostValue};
use thiserror::Error;

/// Declared type of one positional parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    String,
    Integer,
    Bool,
    /// A single comma-joined string, split on `,` into a list. Empty fields
    /// are kept: `"a,,b"` becomes `["a", "", "b"]`.
    StringList,
}

impl ParamKind {
    fn coerce(self, value: HostValue) -> Result<NativeArg, ConversionError> {
        match self {
            ParamKind::String => String::try_from(value).map(NativeArg::String),
            ParamKind::Integer => i64::try_from(value).map(NativeArg::Integer),
            ParamKind::Bool => bool::try_from(value).map(NativeArg::Bool),
            ParamKind::StringList => String::try_from(value)
                .map(|joined| NativeArg::List(joined.split(',').map(String::from).collect())),
        }
    }
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ParamKind::String => "string",
            ParamKind::Integer => "integer",
            ParamKind::Bool => "bool",
            ParamKind::StringList => "string-list",
        };
        f.write_str(name)
    }
}

/// Positional argument schema of an operation.
///
/// # Example
///
/// ```
/// use quorum_bridge::abi::{ParamKind, Signature};
///
/// // GetContent(groupId, num, startTrx, reverse, ...senders)
/// let sig = Signature::new()
///     .string()
///     .integer()
///     .string()
///     .boolean()
///     .rest(ParamKind::String);
/// assert_eq!(sig.arity(), 4);
/// assert_eq!(sig.to_string(), "(string, integer, string, bool, ...string)");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Signature {
    params: Vec<ParamKind>,
    rest: Option<ParamKind>,
}

impl Signature {
    /// An empty signature: no parameters.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn param(mut self, kind: ParamKind) -> Self {
        self.params.push(kind);
        self
    }

    pub fn string(self) -> Self {
        self.param(ParamKind::String)
    }

    pub fn integer(self) -> Self {
        self.param(ParamKind::Integer)
    }

    pub fn boolean(self) -> Self {
        self.param(ParamKind::Bool)
    }

    pub fn string_list(self) -> Self {
        self.param(ParamKind::StringList)
    }

    /// Collect every argument after the fixed prefix as `kind`.
    pub fn rest(mut self, kind: ParamKind) -> Self {
        self.rest = Some(kind);
        self
    }

    /// Number of fixed (required) parameters.
    pub fn arity(&self) -> usize {
        self.params.len()
    }

    pub fn params(&self) -> &[ParamKind] {
        &self.params
    }

    pub fn rest_kind(&self) -> Option<ParamKind> {
        self.rest
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (i, kind) in self.params.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", kind)?;
        }
        if let Some(kind) = self.rest {
            if !self.params.is_empty() {
                f.write_str(", ")?;
            }
            write!(f, "...{}", kind)?;
        }
        f.write_str(")")
    }
}

/// A validated native argument.
#[derive(Debug, Clone, PartialEq)]
pub enum NativeArg {
    String(String),
    Integer(i64),
    Bool(bool),
    List(Vec<String>),
}

/// Errors from adapting host arguments.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AdaptError {
    #[error("expected at least {expected} arguments, got {got}")]
    Arity { expected: usize, got: usize },

    #[error("argument {index}: expected {expected}: {source}")]
    Type {
        index: usize,
        expected: ParamKind,
        #[source]
        source: ConversionError,
    },

    /// The wiring read an argument with the wrong accessor.
    #[error("argument {index} is not a {expected}")]
    Access { index: usize, expected: ParamKind },
}

/// Adapted arguments of one call.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Args {
    fixed: Vec<NativeArg>,
    rest: Vec<NativeArg>,
}

impl Args {
    pub fn fixed(&self) -> &[NativeArg] {
        &self.fixed
    }

    pub fn rest(&self) -> &[NativeArg] {
        &self.rest
    }

    fn get(&self, index: usize, expected: ParamKind) -> Result<&NativeArg, AdaptError> {
        self.fixed
            .get(index)
            .ok_or(AdaptError::Access { index, expected })
    }

    pub fn string(&self, index: usize) -> Result<String, AdaptError> {
        match self.get(index, ParamKind::String)? {
            NativeArg::String(s) => Ok(s.clone()),
            _ => Err(AdaptError::Access {
                index,
                expected: ParamKind::String,
            }),
        }
    }

    pub fn integer(&self, index: usize) -> Result<i64, AdaptError> {
        match self.get(index, ParamKind::Integer)? {
            NativeArg::Integer(n) => Ok(*n),
            _ => Err(AdaptError::Access {
                index,
                expected: ParamKind::Integer,
            }),
        }
    }

    pub fn boolean(&self, index: usize) -> Result<bool, AdaptError> {
        match self.get(index, ParamKind::Bool)? {
            NativeArg::Bool(b) => Ok(*b),
            _ => Err(AdaptError::Access {
                index,
                expected: ParamKind::Bool,
            }),
        }
    }

    pub fn list(&self, index: usize) -> Result<Vec<String>, AdaptError> {
        match self.get(index, ParamKind::StringList)? {
            NativeArg::List(items) => Ok(items.clone()),
            _ => Err(AdaptError::Access {
                index,
                expected: ParamKind::StringList,
            }),
        }
    }

    /// The rest parameter as strings, in host order.
    pub fn rest_strings(&self) -> Result<Vec<String>, AdaptError> {
        let arity = self.fixed.len();
        self.rest
            .iter()
            .enumerate()
            .map(|(i, arg)| match arg {
                NativeArg::String(s) => Ok(s.clone()),
                _ => Err(AdaptError::Access {
                    index: arity + i,
                    expected: ParamKind::String,
                }),
            })
            .collect()
    }
}

/// Adapt an untyped host argument list to `signature`.
///
/// Fewer arguments than the fixed prefix is an [`AdaptError::Arity`]. Extra
/// arguments are collected by the rest parameter when there is one and
/// ignored otherwise.
pub fn adapt(signature: &Signature, args: &[HostValue]) -> Result<Args, AdaptError> {
    if args.len() < signature.arity() {
        return Err(AdaptError::Arity {
            expected: signature.arity(),
            got: args.len(),
        });
    }

    let coerce = |index: usize, kind: ParamKind, value: &HostValue| {
        kind.coerce(value.clone()).map_err(|source| AdaptError::Type {
            index,
            expected: kind,
            source,
        })
    };

    let fixed = signature
        .params
        .iter()
        .zip(args)
        .enumerate()
        .map(|(index, (kind, value))| coerce(index, *kind, value))
        .collect::<Result<Vec<_>, _>>()?;

    let rest = match signature.rest {
        Some(kind) => args[signature.arity()..]
            .iter()
            .enumerate()
            .map(|(i, value)| coerce(signature.arity() + i, kind, value))
            .collect::<Result<Vec<_>, _>>()?,
        None => Vec::new(),
    };

    Ok(Args { fixed, rest })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_list_keeps_empty_fields() {
        let sig = Signature::new().string_list();
        let args = adapt(&sig, &[HostValue::from("a,,b")]).expect("adapt");
        assert_eq!(args.list(0).expect("list"), vec!["a", "", "b"]);

        let args = adapt(&sig, &[HostValue::from("")]).expect("adapt");
        assert_eq!(args.list(0).expect("list"), vec![""]);
    }

    #[test]
    fn test_surplus_arguments_are_ignored_without_rest() {
        let sig = Signature::new().string();
        let args = adapt(&sig, &[HostValue::from("g"), HostValue::Bool(true)]).expect("adapt");
        assert_eq!(args.fixed().len(), 1);
        assert!(args.rest().is_empty());
    }

    #[test]
    fn test_wrong_accessor_is_an_access_error() {
        let sig = Signature::new().boolean();
        let args = adapt(&sig, &[HostValue::Bool(false)]).expect("adapt");
        assert_eq!(
            args.string(0),
            Err(AdaptError::Access {
                index: 0,
                expected: ParamKind::String
            })
        );
        assert!(args.boolean(1).is_err());
    }

    #[test]
    fn test_rest_only_signature_display() {
        assert_eq!(Signature::new().rest(ParamKind::String).to_string(), "(...string)");
        assert_eq!(Signature::new().to_string(), "()");
    }
}
