//! Dynamic payload values carried by [`Item`](crate::Item)s.
//!
//! Every item flowing through a DAG carries its data as a [`Value`]: a small
//! recursive tree of nulls, booleans, numbers, strings, bytes, lists and maps.
//! The engine itself only ever inspects values structurally (wrapping two
//! values into a `{Previous, Current}` map, collecting a window into a list),
//! so user handlers are free to impose whatever schema they like on top.
//!
//! Values convert to and from JSON via `serde_json`:
//!
//! ```
//! use windflow::Value;
//!
//! let v = Value::from_json(r#"{"count": 3, "tags": ["a", "b"]}"#)?;
//! assert_eq!(v.get("count").and_then(Value::as_f64), Some(3.0));
//! assert_eq!(Value::from_json(&v.to_json()?)?, v);
//! # anyhow::Result::<()>::Ok(())
//! ```

use anyhow::{Context, Result, bail};
use ordered_float::OrderedFloat;
use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Number as JsonNumber, Value as Json};
use std::collections::BTreeMap;
use std::fmt;

/// Field holding the previously emitted aggregate in an accumulate composite.
pub const PREVIOUS: &str = "Previous";
/// Field holding the freshly fired window contents in an accumulate composite.
pub const CURRENT: &str = "Current";
/// Field holding the stale aggregate in a retract-and-aggregate payload.
pub const RETRACT: &str = "Retract";
/// Field holding the corrected aggregate in a retract-and-aggregate payload.
pub const AGGREGATE: &str = "Aggregate";

/// Recursive dynamic value.
///
/// Numbers are stored as [`OrderedFloat<f64>`] so that values are totally
/// ordered and hashable, which lets them live inside sorted collections and
/// be compared in tests.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(OrderedFloat<f64>),
    String(String),
    Binary(Vec<u8>),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// Build a numeric value.
    #[inline]
    pub fn number(n: f64) -> Self {
        Self::Number(OrderedFloat(n))
    }

    /// Build a map with exactly two fields.
    pub fn pair(k1: &str, v1: Value, k2: &str, v2: Value) -> Self {
        let mut m = BTreeMap::new();
        m.insert(k1.to_string(), v1);
        m.insert(k2.to_string(), v2);
        Self::Map(m)
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(n.0),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Self::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Look up a field of a map value; `None` for non-maps and missing fields.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.as_map().and_then(|m| m.get(field))
    }

    /// Numeric view that fails loudly, for handlers that require numbers.
    pub fn expect_f64(&self) -> Result<f64> {
        match self {
            Self::Number(n) => Ok(n.0),
            other => bail!("expected number, got {}", other.kind()),
        }
    }

    /// Short name of the variant, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Binary(_) => "binary",
            Self::List(_) => "list",
            Self::Map(_) => "map",
        }
    }

    /// Convert into a `serde_json::Value`.
    ///
    /// Binary payloads become arrays of byte numbers. Non-finite numbers have
    /// no JSON form and are rejected.
    pub fn to_json_value(&self) -> Result<Json> {
        Ok(match self {
            Self::Null => Json::Null,
            Self::Bool(b) => Json::Bool(*b),
            Self::Number(n) => {
                let f = n.0;
                if f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
                    Json::Number(JsonNumber::from(f as i64))
                } else {
                    Json::Number(
                        JsonNumber::from_f64(f)
                            .with_context(|| format!("number {f} has no JSON representation"))?,
                    )
                }
            }
            Self::String(s) => Json::String(s.clone()),
            Self::Binary(b) => Json::Array(b.iter().map(|x| Json::from(*x)).collect()),
            Self::List(l) => Json::Array(
                l.iter()
                    .map(Value::to_json_value)
                    .collect::<Result<Vec<_>>>()?,
            ),
            Self::Map(m) => {
                let mut out = JsonMap::new();
                for (k, v) in m {
                    out.insert(k.clone(), v.to_json_value()?);
                }
                Json::Object(out)
            }
        })
    }

    /// Encode as a JSON string.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(&self.to_json_value()?).context("encoding value as JSON")
    }

    /// Decode from a JSON string.
    pub fn from_json(s: &str) -> Result<Self> {
        let json: Json = serde_json::from_str(s).context("decoding value from JSON")?;
        Ok(Self::from(json))
    }
}

impl From<Json> for Value {
    fn from(json: Json) -> Self {
        match json {
            Json::Null => Self::Null,
            Json::Bool(b) => Self::Bool(b),
            Json::Number(n) => Self::number(n.as_f64().unwrap_or(f64::NAN)),
            Json::String(s) => Self::String(s),
            Json::Array(a) => Self::List(a.into_iter().map(Value::from).collect()),
            Json::Object(o) => Self::Map(o.into_iter().map(|(k, v)| (k, Value::from(v))).collect()),
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::number(n as f64)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Self::number(f64::from(n))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(l: Vec<Value>) -> Self {
        Self::List(l)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json_value()
            .map_err(serde::ser::Error::custom)?
            .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Json::deserialize(deserializer).map(Value::from)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_json() {
            Ok(s) => f.write_str(&s),
            Err(_) => write!(f, "{self:?}"),
        }
    }
}
