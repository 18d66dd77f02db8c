//! Index keys
//!
//! A field value reduced to something totally ordered.

use serde_json::Value;

/// Index key representing a scalar field value.
///
/// Ordering is deterministic: Null < Bool < Int < Float < String.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IndexKey {
    /// JSON null
    Null,
    /// Boolean value (false < true)
    Bool(bool),
    /// Integer value
    Int(i64),
    /// Float value (stored as bits for total ordering)
    Float(u64),
    /// String value
    Str(String),
}

impl IndexKey {
    /// Create a key from a float
    ///
    /// Uses bit representation for total ordering.
    pub fn from_float(v: f64) -> Self {
        let bits = v.to_bits();
        let ordered = if (bits >> 63) == 1 {
            !bits // Negative: flip all bits
        } else {
            bits ^ (1 << 63) // Positive: flip sign bit
        };
        IndexKey::Float(ordered)
    }

    /// Key for a JSON float, folding integral values onto `Int` so 2.0 equals 2
    fn from_number(v: f64) -> Self {
        // 2^63 is exact as f64, so the upper bound stays exclusive
        if v.fract() == 0.0 && v >= i64::MIN as f64 && v < i64::MAX as f64 {
            IndexKey::Int(v as i64)
        } else {
            IndexKey::from_float(v)
        }
    }

    /// Create a key from a JSON value
    ///
    /// Arrays and objects are not indexable and yield None.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Null => Some(IndexKey::Null),
            Value::Bool(b) => Some(IndexKey::Bool(*b)),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Some(IndexKey::Int(i))
                } else {
                    n.as_f64().map(IndexKey::from_number)
                }
            }
            Value::String(s) => Some(IndexKey::Str(s.clone())),
            Value::Array(_) | Value::Object(_) => None,
        }
    }
}

impl From<i64> for IndexKey {
    fn from(v: i64) -> Self {
        IndexKey::Int(v)
    }
}

impl From<&str> for IndexKey {
    fn from(v: &str) -> Self {
        IndexKey::Str(v.to_string())
    }
}
