//! Typed attribute values
//!
//! Ordering is deterministic: Bool < Number < Text. Numbers keep integers
//! exact (the whole `i64` and `u64` ranges) and compare numerically against
//! floats without going through `f64`.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Lower bound of the `i128` range as an `f64` (-2^127, exactly representable).
const I128_MIN_F64: f64 = -170_141_183_460_469_231_731_687_303_715_884_105_728.0;
/// First `f64` above the `i128` range (2^127).
const I128_END_F64: f64 = 170_141_183_460_469_231_731_687_303_715_884_105_728.0;

/// Comparison family of an attribute value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ValueFamily {
    Bool,
    Number,
    Text,
}

impl ValueFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueFamily::Bool => "bool",
            ValueFamily::Number => "number",
            ValueFamily::Text => "text",
        }
    }
}

/// Declared attribute type used by schema-described extractors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeType {
    Bool,
    Int,
    Float,
    Text,
}

#[derive(Debug, Clone, Copy)]
enum Repr {
    /// Wide enough for every JSON integer (`i64` and `u64`).
    Int(i128),
    /// Never integral inside the `i128` range (normalized on construction).
    Float(f64),
}

/// A numeric attribute value with exact integer/float comparison.
#[derive(Debug, Clone, Copy)]
pub struct Number(Repr);

impl Number {
    /// Create from an integer
    pub fn from_i64(v: i64) -> Self {
        Number(Repr::Int(i128::from(v)))
    }

    pub fn from_u64(v: u64) -> Self {
        Number(Repr::Int(i128::from(v)))
    }

    /// Create from a float.
    ///
    /// Integral floats inside the `i128` range are stored as integers so that
    /// `20` and `20.0` are the same key.
    pub fn from_f64(v: f64) -> Self {
        if v.fract() == 0.0 && (I128_MIN_F64..I128_END_F64).contains(&v) {
            Number(Repr::Int(v as i128))
        } else {
            Number(Repr::Float(v))
        }
    }

    pub fn is_integer(&self) -> bool {
        matches!(self.0, Repr::Int(_))
    }

    /// Returns the integer value if this number is integral and fits `i64`
    pub fn as_i64(&self) -> Option<i64> {
        match self.0 {
            Repr::Int(i) => i64::try_from(i).ok(),
            Repr::Float(_) => None,
        }
    }

    /// Returns the value as `f64` (lossy for very large integers)
    pub fn as_f64(&self) -> f64 {
        match self.0 {
            Repr::Int(i) => i as f64,
            Repr::Float(f) => f,
        }
    }

    pub fn is_nan(&self) -> bool {
        matches!(self.0, Repr::Float(f) if f.is_nan())
    }

    fn to_json(self) -> Value {
        let float = match self.0 {
            Repr::Int(i) => {
                if let Ok(v) = i64::try_from(i) {
                    return Value::from(v);
                }
                if let Ok(v) = u64::try_from(i) {
                    return Value::from(v);
                }
                i as f64
            }
            Repr::Float(f) => f,
        };
        serde_json::Number::from_f64(float)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

/// Exact comparison of an integer against a float.
///
/// NaN follows `f64::total_cmp`: negative NaN sorts first, positive NaN last.
fn cmp_int_float(i: i128, f: f64) -> Ordering {
    if f.is_nan() {
        return if f.is_sign_negative() {
            Ordering::Greater
        } else {
            Ordering::Less
        };
    }
    if f >= I128_END_F64 {
        return Ordering::Less;
    }
    if f < I128_MIN_F64 {
        return Ordering::Greater;
    }

    let truncated = f.trunc();
    match i.cmp(&(truncated as i128)) {
        Ordering::Equal if f > truncated => Ordering::Less,
        Ordering::Equal if f < truncated => Ordering::Greater,
        other => other,
    }
}

impl Ord for Number {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.0, other.0) {
            (Repr::Int(a), Repr::Int(b)) => a.cmp(&b),
            (Repr::Float(a), Repr::Float(b)) => a.total_cmp(&b),
            (Repr::Int(a), Repr::Float(b)) => cmp_int_float(a, b),
            (Repr::Float(a), Repr::Int(b)) => cmp_int_float(b, a).reverse(),
        }
    }
}

impl PartialOrd for Number {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Number {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Number {}

impl Hash for Number {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // Int and Float never compare equal after normalization.
        match self.0 {
            Repr::Int(i) => {
                0u8.hash(state);
                i.hash(state);
            }
            Repr::Float(f) => {
                1u8.hash(state);
                f.to_bits().hash(state);
            }
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Repr::Int(i) => write!(f, "{}", i),
            Repr::Float(v) => write!(f, "{}", v),
        }
    }
}

/// A typed attribute value extracted from an entry, or a predicate literal.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AttributeValue {
    Bool(bool),
    Number(Number),
    Text(String),
}

impl AttributeValue {
    pub fn int(v: i64) -> Self {
        AttributeValue::Number(Number::from_i64(v))
    }

    pub fn float(v: f64) -> Self {
        AttributeValue::Number(Number::from_f64(v))
    }

    pub fn text(v: impl Into<String>) -> Self {
        AttributeValue::Text(v.into())
    }

    /// Converts a JSON scalar. `null`, arrays and objects are absent.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(AttributeValue::Bool(*b)),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Some(AttributeValue::int(i))
                } else if let Some(u) = n.as_u64() {
                    Some(AttributeValue::Number(Number::from_u64(u)))
                } else {
                    n.as_f64().map(AttributeValue::float)
                }
            }
            Value::String(s) => Some(AttributeValue::Text(s.clone())),
            _ => None,
        }
    }

    /// Converts back to JSON (for explain output and result rendering)
    pub fn to_json(&self) -> Value {
        match self {
            AttributeValue::Bool(b) => Value::Bool(*b),
            AttributeValue::Number(n) => n.to_json(),
            AttributeValue::Text(s) => Value::String(s.clone()),
        }
    }

    pub fn family(&self) -> ValueFamily {
        match self {
            AttributeValue::Bool(_) => ValueFamily::Bool,
            AttributeValue::Number(_) => ValueFamily::Number,
            AttributeValue::Text(_) => ValueFamily::Text,
        }
    }

    /// Compares two values of the same family; `None` across families.
    pub fn compare(&self, other: &AttributeValue) -> Option<Ordering> {
        if self.family() == other.family() {
            Some(self.cmp(other))
        } else {
            None
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            AttributeValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttributeValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Bool(b) => write!(f, "{}", b),
            AttributeValue::Number(n) => write!(f, "{}", n),
            AttributeValue::Text(s) => write!(f, "'{}'", s.replace('\'', "''")),
        }
    }
}

impl From<bool> for AttributeValue {
    fn from(v: bool) -> Self {
        AttributeValue::Bool(v)
    }
}

impl From<i64> for AttributeValue {
    fn from(v: i64) -> Self {
        AttributeValue::int(v)
    }
}

impl From<u64> for AttributeValue {
    fn from(v: u64) -> Self {
        AttributeValue::Number(Number::from_u64(v))
    }
}

impl From<i32> for AttributeValue {
    fn from(v: i32) -> Self {
        AttributeValue::int(v as i64)
    }
}

impl From<f64> for AttributeValue {
    fn from(v: f64) -> Self {
        AttributeValue::float(v)
    }
}

impl From<&str> for AttributeValue {
    fn from(v: &str) -> Self {
        AttributeValue::Text(v.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(v: String) -> Self {
        AttributeValue::Text(v)
    }
}
