//! Result marshaling
//!
//! Native results reach the host as a [`Payload`]: the result is serialized to
//! JSON and parsed back into untyped host values. The payload's keys and
//! nesting are exactly the serde field names of the native type; nothing is
//! renamed or projected here.

use host_value::{HostValue, Object};
use serde::Serialize;
use thiserror::Error;

use crate::error::BridgeError;

/// Untyped associative result handed to the host.
pub type Payload = Object;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MarshalError {
    #[error("failed to serialize native result: {0}")]
    Serialize(String),

    #[error("failed to parse serialized result: {0}")]
    Parse(String),

    #[error("native result serialized to {0}, expected an object")]
    NotAnObject(&'static str),
}

/// Convert a native result into a host payload.
pub fn marshal<T: Serialize + ?Sized>(result: &T) -> Result<Payload, MarshalError> {
    let bytes = serde_json::to_vec(result).map_err(|e| MarshalError::Serialize(e.to_string()))?;
    let value: HostValue = serde_json::from_slice(&bytes).map_err(|e| MarshalError::Parse(e.to_string()))?;
    match value {
        HostValue::Object(map) => Ok(map),
        other => Err(MarshalError::NotAnObject(kind_name(&other))),
    }
}

/// Describe a rejection as a payload, for hosts that print rather than throw.
///
/// The payload has two keys: `error` (the error message, verbatim) and
/// `kind` (see [`BridgeError::kind`]).
pub fn marshal_error(err: &BridgeError) -> Payload {
    let mut payload = Payload::new();
    payload.insert("error".to_string(), HostValue::String(err.to_string()));
    payload.insert("kind".to_string(), HostValue::String(err.kind().to_string()));
    payload
}

fn kind_name(value: &HostValue) -> &'static str {
    match value {
        HostValue::Undefined | HostValue::Null => "null",
        HostValue::Bool(_) => "a bool",
        HostValue::Number(_) => "a number",
        HostValue::String(_) => "a string",
        HostValue::Array(_) => "an array",
        HostValue::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::ser::Error as _;
    use serde::Serializer;

    #[derive(Serialize)]
    struct Nested {
        group_id: String,
        #[serde(rename = "trxIds")]
        trx_ids: Vec<String>,
        owner: Option<String>,
    }

    #[test]
    fn test_keys_mirror_serde_names() {
        let payload = marshal(&Nested {
            group_id: "g1".into(),
            trx_ids: vec!["t1".into()],
            owner: None,
        })
        .expect("marshal");

        let keys: Vec<&str> = payload.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["group_id", "owner", "trxIds"]);
        assert_eq!(payload["owner"], HostValue::Null);
    }

    #[test]
    fn test_non_object_is_rejected() {
        let err = marshal(&vec![1, 2]).unwrap_err();
        assert!(matches!(err, MarshalError::NotAnObject("an array")));
    }

    #[derive(Serialize)]
    struct Stamped {
        timestamp: i64,
    }

    #[test]
    fn test_inexact_integer_is_an_error() {
        let err = marshal(&Stamped {
            timestamp: 1_760_000_000_123_456_789,
        })
        .unwrap_err();
        assert!(matches!(err, MarshalError::Parse(_)));
        assert!(err.to_string().contains("1760000000123456789"));

        let payload = marshal(&Stamped {
            timestamp: 9_007_199_254_740_991,
        })
        .expect("largest exact integer");
        assert_eq!(payload["timestamp"], HostValue::Number(9_007_199_254_740_991.0));
    }

    struct Unserializable;

    impl Serialize for Unserializable {
        fn serialize<S: Serializer>(&self, _: S) -> Result<S::Ok, S::Error> {
            Err(S::Error::custom("handle cannot be serialized"))
        }
    }

    #[test]
    fn test_serialize_failure_is_an_error() {
        let err = marshal(&Unserializable).unwrap_err();
        assert!(matches!(err, MarshalError::Serialize(_)));
        assert!(err.to_string().contains("handle cannot be serialized"));
    }
}
