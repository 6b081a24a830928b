//! Runtime host values

use std::collections::BTreeMap;
use std::fmt;

use crate::ConversionError;

/// String-keyed associative host structure. Key order carries no meaning.
pub type Object = BTreeMap<String, HostValue>;

/// The kind of a host value, used in diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Undefined,
    Null,
    Bool,
    Number,
    Integer,
    String,
    Array,
    Object,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Undefined => "undefined",
            ValueKind::Null => "null",
            ValueKind::Bool => "bool",
            ValueKind::Number => "number",
            ValueKind::Integer => "integer",
            ValueKind::String => "string",
            ValueKind::Array => "array",
            ValueKind::Object => "object",
        };
        f.write_str(name)
    }
}

/// An untyped value as seen by the host.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum HostValue {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<HostValue>),
    Object(Object),
}

impl HostValue {
    /// The kind of this value. Numbers always report [`ValueKind::Number`].
    pub fn kind(&self) -> ValueKind {
        match self {
            HostValue::Undefined => ValueKind::Undefined,
            HostValue::Null => ValueKind::Null,
            HostValue::Bool(_) => ValueKind::Bool,
            HostValue::Number(_) => ValueKind::Number,
            HostValue::String(_) => ValueKind::String,
            HostValue::Array(_) => ValueKind::Array,
            HostValue::Object(_) => ValueKind::Object,
        }
    }

    /// `true` for `undefined` and `null`.
    pub fn is_nullish(&self) -> bool {
        matches!(self, HostValue::Undefined | HostValue::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            HostValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            HostValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            HostValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[HostValue]> {
        match self {
            HostValue::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            HostValue::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Look up a key of an object value.
    pub fn get(&self, key: &str) -> Option<&HostValue> {
        self.as_object().and_then(|map| map.get(key))
    }

    fn mismatch(&self, expected: ValueKind) -> ConversionError {
        ConversionError::TypeMismatch {
            expected,
            got: self.kind(),
        }
    }

    /// Strict integer view: finite, no fractional part, inside `[min, max]`.
    fn integral(&self, min: f64, max: f64, target: &'static str) -> Result<f64, ConversionError> {
        let n = match self {
            HostValue::Number(n) => *n,
            other => return Err(other.mismatch(ValueKind::Integer)),
        };
        if !n.is_finite() || n.fract() != 0.0 {
            return Err(ConversionError::NotAnInteger(n));
        }
        if n < min || n > max {
            return Err(ConversionError::OutOfRange { value: n, target });
        }
        Ok(n)
    }
}

impl fmt::Display for HostValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostValue::Undefined => f.write_str("undefined"),
            HostValue::Null => f.write_str("null"),
            HostValue::Bool(b) => write!(f, "{}", b),
            HostValue::Number(n) => write!(f, "{}", n),
            HostValue::String(s) => write!(f, "{:?}", s),
            HostValue::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            HostValue::Object(map) => {
                f.write_str("{")?;
                for (i, (key, value)) in map.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{:?}: {}", key, value)?;
                }
                f.write_str("}")
            }
        }
    }
}

// ============================================================================
// From implementations
// ============================================================================

impl From<()> for HostValue {
    fn from(_: ()) -> Self {
        HostValue::Undefined
    }
}

impl From<bool> for HostValue {
    fn from(v: bool) -> Self {
        HostValue::Bool(v)
    }
}

impl From<f64> for HostValue {
    fn from(v: f64) -> Self {
        HostValue::Number(v)
    }
}

impl From<i32> for HostValue {
    fn from(v: i32) -> Self {
        HostValue::Number(f64::from(v))
    }
}

impl From<u32> for HostValue {
    fn from(v: u32) -> Self {
        HostValue::Number(f64::from(v))
    }
}

impl From<i64> for HostValue {
    fn from(v: i64) -> Self {
        HostValue::Number(v as f64)
    }
}

impl From<String> for HostValue {
    fn from(v: String) -> Self {
        HostValue::String(v)
    }
}

impl From<&str> for HostValue {
    fn from(v: &str) -> Self {
        HostValue::String(v.to_string())
    }
}

impl From<Object> for HostValue {
    fn from(v: Object) -> Self {
        HostValue::Object(v)
    }
}

impl<T: Into<HostValue>> From<Vec<T>> for HostValue {
    fn from(v: Vec<T>) -> Self {
        HostValue::Array(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<HostValue>> From<Option<T>> for HostValue {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(x) => x.into(),
            None => HostValue::Null,
        }
    }
}

// ============================================================================
// TryFrom implementations (strict)
// ============================================================================

impl TryFrom<HostValue> for bool {
    type Error = ConversionError;
    fn try_from(v: HostValue) -> Result<Self, Self::Error> {
        match v {
            HostValue::Bool(x) => Ok(x),
            other => Err(other.mismatch(ValueKind::Bool)),
        }
    }
}

impl TryFrom<HostValue> for String {
    type Error = ConversionError;
    fn try_from(v: HostValue) -> Result<Self, Self::Error> {
        match v {
            HostValue::String(x) => Ok(x),
            other => Err(other.mismatch(ValueKind::String)),
        }
    }
}

impl TryFrom<HostValue> for f64 {
    type Error = ConversionError;
    fn try_from(v: HostValue) -> Result<Self, Self::Error> {
        match v {
            HostValue::Number(x) => Ok(x),
            other => Err(other.mismatch(ValueKind::Number)),
        }
    }
}

// 2^53: the largest range in which every integer is exactly representable.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

impl TryFrom<HostValue> for i64 {
    type Error = ConversionError;
    fn try_from(v: HostValue) -> Result<Self, Self::Error> {
        v.integral(-MAX_SAFE_INTEGER, MAX_SAFE_INTEGER, "i64")
            .map(|n| n as i64)
    }
}

impl TryFrom<HostValue> for i32 {
    type Error = ConversionError;
    fn try_from(v: HostValue) -> Result<Self, Self::Error> {
        v.integral(f64::from(i32::MIN), f64::from(i32::MAX), "i32")
            .map(|n| n as i32)
    }
}

impl TryFrom<HostValue> for u32 {
    type Error = ConversionError;
    fn try_from(v: HostValue) -> Result<Self, Self::Error> {
        v.integral(0.0, f64::from(u32::MAX), "u32").map(|n| n as u32)
    }
}

impl TryFrom<HostValue> for usize {
    type Error = ConversionError;
    fn try_from(v: HostValue) -> Result<Self, Self::Error> {
        v.integral(0.0, MAX_SAFE_INTEGER, "usize").map(|n| n as usize)
    }
}

impl<T: TryFrom<HostValue, Error = ConversionError>> TryFrom<HostValue> for Vec<T> {
    type Error = ConversionError;
    fn try_from(v: HostValue) -> Result<Self, Self::Error> {
        match v {
            HostValue::Array(items) => items
                .into_iter()
                .enumerate()
                .map(|(i, item)| {
                    T::try_from(item).map_err(|e| ConversionError::IndexError(i, Box::new(e)))
                })
                .collect(),
            other => Err(other.mismatch(ValueKind::Array)),
        }
    }
}

impl TryFrom<HostValue> for Object {
    type Error = ConversionError;
    fn try_from(v: HostValue) -> Result<Self, Self::Error> {
        match v {
            HostValue::Object(map) => Ok(map),
            other => Err(other.mismatch(ValueKind::Object)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_is_strict() {
        assert_eq!(
            String::try_from(HostValue::Number(12.0)),
            Err(ConversionError::TypeMismatch {
                expected: ValueKind::String,
                got: ValueKind::Number,
            })
        );
        assert!(String::try_from(HostValue::Null).is_err());
    }

    #[test]
    fn test_integer_rejects_fraction() {
        assert_eq!(
            i64::try_from(HostValue::Number(2.5)),
            Err(ConversionError::NotAnInteger(2.5))
        );
        assert!(i64::try_from(HostValue::Number(f64::NAN)).is_err());
        assert_eq!(i64::try_from(HostValue::Number(-3.0)), Ok(-3));
    }

    #[test]
    fn test_unsigned_range() {
        assert!(matches!(
            u32::try_from(HostValue::Number(-1.0)),
            Err(ConversionError::OutOfRange { target: "u32", .. })
        ));
        assert_eq!(usize::try_from(HostValue::Number(10.0)), Ok(10));
    }

    #[test]
    fn test_vec_reports_index() {
        let v = HostValue::from(vec![HostValue::from("a"), HostValue::Bool(true)]);
        match Vec::<String>::try_from(v) {
            Err(ConversionError::IndexError(1, inner)) => {
                assert!(matches!(*inner, ConversionError::TypeMismatch { .. }))
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_display() {
        let mut map = Object::new();
        map.insert("ok".into(), HostValue::Bool(true));
        map.insert("ids".into(), HostValue::from(vec!["x"]));
        assert_eq!(HostValue::Object(map).to_string(), r#"{"ids": ["x"], "ok": true}"#);
    }
}
