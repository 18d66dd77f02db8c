//! Equality conditions
//!
//! `"<field>" == <value>` where value is `null`, `true`, an integer, or a
//! double-quoted string.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{GardenError, Result};
use crate::garden::IndexKey;
use crate::storage::Record;

/// Right-hand side of a condition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Literal {
    Null,
    True,
    Int(i64),
    Str(String),
}

impl Literal {
    /// Interpret a literal token
    ///
    /// A double-quoted token is always a string. Bare tokens are tried as
    /// `null`, then `true`, then an integer, and fall back to the raw text.
    pub fn parse(token: &str) -> Result<Self> {
        let token = token.trim();
        if token.is_empty() {
            return Err(GardenError::InvalidCondition(
                "missing value after ==".to_string(),
            ));
        }

        if let Some(inner) = strip_quotes(token) {
            let text = serde_json::from_str::<String>(token).unwrap_or_else(|_| inner.to_string());
            return Ok(Literal::Str(text));
        }

        Ok(match token {
            "null" => Literal::Null,
            "true" => Literal::True,
            _ => match token.parse::<i64>() {
                Ok(i) => Literal::Int(i),
                Err(_) => Literal::Str(token.to_string()),
            },
        })
    }

    /// The index key this literal matches
    pub fn to_key(&self) -> IndexKey {
        match self {
            Literal::Null => IndexKey::Null,
            Literal::True => IndexKey::Bool(true),
            Literal::Int(i) => IndexKey::Int(*i),
            Literal::Str(s) => IndexKey::Str(s.clone()),
        }
    }

    /// True if `value` equals this literal
    pub fn matches(&self, value: &Value) -> bool {
        IndexKey::from_json(value).is_some_and(|key| key == self.to_key())
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Null => write!(f, "null"),
            Literal::True => write!(f, "true"),
            Literal::Int(i) => write!(f, "{}", i),
            Literal::Str(s) => write!(f, "{}", Value::String(s.clone())),
        }
    }
}

impl From<i64> for Literal {
    fn from(v: i64) -> Self {
        Literal::Int(v)
    }
}

impl From<u64> for Literal {
    fn from(v: u64) -> Self {
        i64::try_from(v).map_or_else(|_| Literal::Str(v.to_string()), Literal::Int)
    }
}

impl From<&str> for Literal {
    fn from(v: &str) -> Self {
        Literal::Str(v.to_string())
    }
}

impl From<String> for Literal {
    fn from(v: String) -> Self {
        Literal::Str(v)
    }
}

/// A single-field equality predicate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Condition {
    field: String,
    value: Literal,
}

impl Condition {
    /// Build `field == value` directly
    pub fn eq(field: impl Into<String>, value: impl Into<Literal>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Parse `"<field>" == <value>`
    pub fn parse(text: &str) -> Result<Self> {
        let (field, value) = text.split_once("==").ok_or_else(|| {
            GardenError::InvalidCondition(format!("expected \"field\" == value, got {:?}", text))
        })?;

        let field = field.trim();
        let field = strip_quotes(field).unwrap_or(field).trim();
        if field.is_empty() {
            return Err(GardenError::InvalidCondition(format!(
                "missing field name in {:?}",
                text
            )));
        }

        Ok(Self {
            field: field.to_string(),
            value: Literal::parse(value)?,
        })
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn value(&self) -> &Literal {
        &self.value
    }

    /// Index key to search for
    pub fn key(&self) -> IndexKey {
        self.value.to_key()
    }

    /// Evaluate against a whole record (top-level field only)
    pub fn matches(&self, record: &Record) -> bool {
        record
            .get(&self.field)
            .is_some_and(|value| self.value.matches(value))
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} == {}", Value::String(self.field.clone()), self.value)
    }
}

impl FromStr for Condition {
    type Err = GardenError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl From<Condition> for String {
    fn from(c: Condition) -> Self {
        c.to_string()
    }
}

impl TryFrom<String> for Condition {
    type Error = GardenError;

    fn try_from(s: String) -> Result<Self> {
        Self::parse(&s)
    }
}

/// `"abc"` → Some("abc")
fn strip_quotes(token: &str) -> Option<&str> {
    if token.len() >= 2 && token.starts_with('"') && token.ends_with('"') {
        Some(&token[1..token.len() - 1])
    } else {
        None
    }
}
