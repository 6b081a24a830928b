//! serde support: host values are JSON-shaped.

use std::fmt;

use serde::de::{self, Deserialize, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

use crate::{HostValue, Object};

const MAX_EXACT: f64 = 9_007_199_254_740_991.0;

impl Serialize for HostValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            HostValue::Undefined | HostValue::Null => serializer.serialize_unit(),
            HostValue::Bool(b) => serializer.serialize_bool(*b),
            // Integral numbers go out as integers so `10` does not become `10.0`.
            HostValue::Number(n) if n.fract() == 0.0 && n.abs() <= MAX_EXACT => {
                serializer.serialize_i64(*n as i64)
            }
            HostValue::Number(n) => serializer.serialize_f64(*n),
            HostValue::String(s) => serializer.serialize_str(s),
            HostValue::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            HostValue::Object(map) => {
                let mut out = serializer.serialize_map(Some(map.len()))?;
                for (key, value) in map {
                    out.serialize_entry(key, value)?;
                }
                out.end()
            }
        }
    }
}

struct HostValueVisitor;

impl<'de> Visitor<'de> for HostValueVisitor {
    type Value = HostValue;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("any JSON-shaped value")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<HostValue, E> {
        Ok(HostValue::Bool(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<HostValue, E> {
        if v.unsigned_abs() > MAX_EXACT as u64 {
            return Err(E::custom(format_args!(
                "integer {} is outside the exact range of a host number",
                v
            )));
        }
        Ok(HostValue::Number(v as f64))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<HostValue, E> {
        if v > MAX_EXACT as u64 {
            return Err(E::custom(format_args!(
                "integer {} is outside the exact range of a host number",
                v
            )));
        }
        Ok(HostValue::Number(v as f64))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<HostValue, E> {
        Ok(HostValue::Number(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<HostValue, E> {
        Ok(HostValue::String(v.to_string()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<HostValue, E> {
        Ok(HostValue::String(v))
    }

    fn visit_unit<E: de::Error>(self) -> Result<HostValue, E> {
        Ok(HostValue::Null)
    }

    fn visit_none<E: de::Error>(self) -> Result<HostValue, E> {
        Ok(HostValue::Null)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<HostValue, D::Error> {
        HostValue::deserialize(deserializer)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<HostValue, A::Error> {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(item) = seq.next_element()? {
            items.push(item);
        }
        Ok(HostValue::Array(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<HostValue, A::Error> {
        let mut map = Object::new();
        while let Some((key, value)) = access.next_entry::<String, HostValue>()? {
            map.insert(key, value);
        }
        Ok(HostValue::Object(map))
    }
}

impl<'de> Deserialize<'de> for HostValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(HostValueVisitor)
    }
}

impl From<serde_json::Value> for HostValue {
    fn from(v: serde_json::Value) -> Self {
        use serde_json::Value;
        match v {
            Value::Null => HostValue::Null,
            Value::Bool(b) => HostValue::Bool(b),
            Value::Number(n) => HostValue::Number(n.as_f64().unwrap_or(f64::NAN)),
            Value::String(s) => HostValue::String(s),
            Value::Array(items) => HostValue::Array(items.into_iter().map(Into::into).collect()),
            Value::Object(map) => {
                HostValue::Object(map.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
        }
    }
}

impl From<HostValue> for serde_json::Value {
    fn from(v: HostValue) -> Self {
        use serde_json::Value;
        match v {
            HostValue::Undefined | HostValue::Null => Value::Null,
            HostValue::Bool(b) => Value::Bool(b),
            HostValue::Number(n) if n.fract() == 0.0 && n.abs() <= MAX_EXACT => {
                Value::from(n as i64)
            }
            // Non-finite numbers have no JSON form.
            HostValue::Number(n) => serde_json::Number::from_f64(n)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            HostValue::String(s) => Value::String(s),
            HostValue::Array(items) => Value::Array(items.into_iter().map(Into::into).collect()),
            HostValue::Object(map) => {
                Value::Object(map.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
        }
    }
}
