//! Dynamic value model for evaluation-context data.
//!
//! [`Value`] is the recursively-typed bag the condition evaluator walks:
//! a variant of scalar, sequence, or mapping (spec.md §9 "Dynamic bags of
//! fields in context"). Dotted-path lookup ([`Value::get_path`]) returns
//! [`Value::Undefined`] rather than an `Option`, so the sentinel can flow
//! through comparison operators as an ordinary value (spec.md §4.2).

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value as Json;
use std::collections::BTreeMap;

/// A recursively-typed value: scalar, sequence, or mapping, plus the
/// `Undefined` sentinel produced by a failed field-path resolution.
///
/// `Undefined` is never produced by JSON conversion, only by
/// [`Value::get_path`]; it serializes as `null` so a `Value` can still be
/// embedded in a `serde`-derived struct without a special case.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Sentinel for "field path did not resolve to anything".
    Undefined,
    /// JSON `null`.
    Null,
    /// Boolean scalar.
    Bool(bool),
    /// Integer scalar (kept distinct from `Float` for exact comparisons).
    Int(i64),
    /// Floating-point scalar.
    Float(f64),
    /// String scalar.
    Str(String),
    /// Ordered sequence of values.
    Seq(Vec<Value>),
    /// Mapping keyed by string. Backed by a `BTreeMap` so iteration order
    /// is always lexicographic, which keeps canonical-JSON serialization
    /// (see `warden-core::fingerprint`) trivial.
    Map(BTreeMap<String, Value>),
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        Json::from(self).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Json::deserialize(deserializer).map(Value::from)
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Undefined
    }
}

impl Value {
    /// `true` if this is [`Value::Undefined`].
    #[must_use]
    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    /// `true` if this is `Null` or `Undefined` — both represent "no value".
    #[must_use]
    pub fn is_absent(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    /// Resolve a dotted field path (`"a.b.c"`) against this value, treating
    /// `self` as the root mapping. At each step, descend into the mapping;
    /// if a component is missing, or the current value is not a mapping
    /// while further descent is required, the result is [`Value::Undefined`].
    #[must_use]
    pub fn get_path(&self, path: &str) -> Value {
        let mut cur = self;
        for part in path.split('.') {
            match cur {
                Value::Map(m) => match m.get(part) {
                    Some(v) => cur = v,
                    None => return Value::Undefined,
                },
                _ => return Value::Undefined,
            }
        }
        cur.clone()
    }

    /// View this value as a string slice, if it is `Str`.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// View this value as an `f64`, promoting `Int` to `Float`.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// View this value as a sequence slice, if it is `Seq`.
    #[must_use]
    pub fn as_seq(&self) -> Option<&[Value]> {
        match self {
            Value::Seq(s) => Some(s.as_slice()),
            _ => None,
        }
    }

    /// Deep equality with numeric promotion between `Int` and `Float`;
    /// `Undefined` never equals anything, including another `Undefined`
    /// (spec.md §4.2: "`undefined` compared for equality to anything
    /// other than `undefined` is `false`" — we extend this to also cover
    /// `undefined == undefined`, since no evaluation ever needs that case
    /// to be `true` and it keeps the relation irreflexive-on-absence).
    #[must_use]
    pub fn deep_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, _) | (_, Value::Undefined) => false,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => {
                (*a as f64) == *b
            }
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Null, Value::Null) => true,
            (Value::Seq(a), Value::Seq(b)) => {
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.deep_eq(y))
            }
            (Value::Map(a), Value::Map(b)) => {
                a.len() == b.len()
                    && a.iter().all(|(k, v)| b.get(k).is_some_and(|bv| v.deep_eq(bv)))
            }
            _ => false,
        }
    }
}

impl From<&Json> for Value {
    fn from(j: &Json) -> Self {
        match j {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Bool(*b),
            Json::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else {
                    Value::Float(n.as_f64().unwrap_or(0.0))
                }
            }
            Json::String(s) => Value::Str(s.clone()),
            Json::Array(a) => Value::Seq(a.iter().map(Value::from).collect()),
            Json::Object(o) => {
                Value::Map(o.iter().map(|(k, v)| (k.clone(), Value::from(v))).collect())
            }
        }
    }
}

impl From<Json> for Value {
    fn from(j: Json) -> Self {
        Value::from(&j)
    }
}

impl From<&Value> for Json {
    fn from(v: &Value) -> Self {
        match v {
            Value::Undefined | Value::Null => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Int(i) => Json::Number((*i).into()),
            Value::Float(f) => {
                serde_json::Number::from_f64(*f).map_or(Json::Null, Json::Number)
            }
            Value::Str(s) => Json::String(s.clone()),
            Value::Seq(a) => Json::Array(a.iter().map(Json::from).collect()),
            Value::Map(m) => {
                Json::Object(m.iter().map(|(k, v)| (k.clone(), Json::from(v))).collect())
            }
        }
    }
}

impl From<Value> for Json {
    fn from(v: Value) -> Self {
        Json::from(&v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn dotted_path_resolves() {
        let v: Value = json!({"llm": {"provider": "openai", "maxTokens": 2000}}).into();
        assert_eq!(v.get_path("llm.provider").as_str(), Some("openai"));
        assert_eq!(v.get_path("llm.maxTokens").as_f64(), Some(2000.0));
    }

    #[test]
    fn missing_path_is_undefined() {
        let v: Value = json!({"llm": {"provider": "openai"}}).into();
        assert!(v.get_path("llm.model").is_undefined());
        assert!(v.get_path("user.id").is_undefined());
    }

    #[test]
    fn descend_into_non_mapping_is_undefined() {
        let v: Value = json!({"llm": {"provider": "openai"}}).into();
        assert!(v.get_path("llm.provider.nested").is_undefined());
    }

    #[test]
    fn undefined_never_equals_anything() {
        assert!(!Value::Undefined.deep_eq(&Value::Undefined));
        assert!(!Value::Undefined.deep_eq(&Value::Null));
    }

    #[test]
    fn numeric_promotion_equality() {
        assert!(Value::Int(2).deep_eq(&Value::Float(2.0)));
        assert!(Value::Float(2.0).deep_eq(&Value::Int(2)));
    }

    #[test]
    fn key_order_irrelevant_to_map_equality() {
        let a: Value = json!({"a": 1, "b": 2}).into();
        let b: Value = json!({"b": 2, "a": 1}).into();
        assert!(a.deep_eq(&b));
    }
}
