//! Feature attribute values.
//!
//! Datasets hand back loosely typed columns: booleans stored as `0`/`1`
//! integers, categorical tags stored as nullable text, numeric codes stored
//! as floats.  `AttrValue` keeps the loaded type and exposes the two views the
//! engine needs: truthiness for predicates and `merge_any` for collapsing
//! duplicate edge records.

use std::collections::BTreeMap;
use std::fmt;

/// Attribute map of one feature, keyed by column name.
///
/// A `BTreeMap` so that iteration order (and therefore output) is stable;
/// the source column order is kept separately as a layer schema.
pub type Attributes = BTreeMap<String, AttrValue>;

/// One attribute value.
#[derive(Clone, Debug, PartialEq, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(untagged)
)]
pub enum AttrValue {
    /// Missing value (SQL `NULL`, JSON `null`, absent property).
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl AttrValue {
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, AttrValue::Null)
    }

    /// Truthiness used by [`Predicate::Truthy`](crate::Predicate::Truthy).
    ///
    /// | Value      | Truthy when                  |
    /// |------------|------------------------------|
    /// | `Null`     | never                        |
    /// | `Bool(b)`  | `b`                          |
    /// | `Int(i)`   | `i != 0`                     |
    /// | `Float(f)` | `f != 0` and not NaN         |
    /// | `Text(s)`  | `s` is non-empty             |
    pub fn is_truthy(&self) -> bool {
        match self {
            AttrValue::Null => false,
            AttrValue::Bool(b) => *b,
            AttrValue::Int(i) => *i != 0,
            AttrValue::Float(f) => *f != 0.0 && !f.is_nan(),
            AttrValue::Text(s) => !s.is_empty(),
        }
    }

    /// Numeric view.  Booleans map to `0.0`/`1.0`; text and null have none.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttrValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            AttrValue::Int(i) => Some(*i as f64),
            AttrValue::Float(f) => Some(*f),
            AttrValue::Null | AttrValue::Text(_) => None,
        }
    }

    /// Equality as a dataset column comparison sees it.
    ///
    /// Numbers (and booleans) compare by value across types, so a column of
    /// `1`/`0` integers matches `true` and `1.0`.  Text compares exactly.
    /// `Null` equals nothing, not even another `Null`.
    pub fn loosely_equals(&self, other: &AttrValue) -> bool {
        match (self, other) {
            (AttrValue::Null, _) | (_, AttrValue::Null) => false,
            (AttrValue::Text(a), AttrValue::Text(b)) => a == b,
            (a, b) => match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => x == y,
                _ => false,
            },
        }
    }

    /// Combine the values of two records describing the same logical edge.
    ///
    /// The result answers "does any record carry this attribute":
    ///
    /// - `Null` takes the other side.
    /// - `Bool` ∨ `Bool` is logical OR.
    /// - `Int`/`Float` pairs (0/1 flags in practice) take the maximum.
    /// - Anything else keeps `self` (the first record wins).
    pub fn merge_any(self, other: &AttrValue) -> AttrValue {
        match (self, other) {
            (AttrValue::Null, o) => o.clone(),
            (s, AttrValue::Null) => s,
            (AttrValue::Bool(a), AttrValue::Bool(b)) => AttrValue::Bool(a || *b),
            (AttrValue::Int(a), AttrValue::Int(b)) => AttrValue::Int(a.max(*b)),
            (AttrValue::Float(a), AttrValue::Float(b)) => AttrValue::Float(a.max(*b)),
            (AttrValue::Int(a), AttrValue::Float(b)) => AttrValue::Float((a as f64).max(*b)),
            (AttrValue::Float(a), AttrValue::Int(b)) => AttrValue::Float(a.max(*b as f64)),
            (s, _) => s,
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Null => f.write_str("null"),
            AttrValue::Bool(b) => write!(f, "{b}"),
            AttrValue::Int(i) => write!(f, "{i}"),
            AttrValue::Float(x) => write!(f, "{x}"),
            AttrValue::Text(s) => write!(f, "{s:?}"),
        }
    }
}

impl From<bool> for AttrValue {
    fn from(v: bool) -> Self {
        AttrValue::Bool(v)
    }
}

impl From<i64> for AttrValue {
    fn from(v: i64) -> Self {
        AttrValue::Int(v)
    }
}

impl From<i32> for AttrValue {
    fn from(v: i32) -> Self {
        AttrValue::Int(v as i64)
    }
}

impl From<f64> for AttrValue {
    fn from(v: f64) -> Self {
        AttrValue::Float(v)
    }
}

impl From<&str> for AttrValue {
    fn from(v: &str) -> Self {
        AttrValue::Text(v.to_owned())
    }
}

impl From<String> for AttrValue {
    fn from(v: String) -> Self {
        AttrValue::Text(v)
    }
}

impl<T: Into<AttrValue>> From<Option<T>> for AttrValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(AttrValue::Null, Into::into)
    }
}
