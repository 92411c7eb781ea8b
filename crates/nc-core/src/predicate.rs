//! Boolean predicates over segment attributes.
//!
//! A coverage metric counts the length of the segments for which its
//! predicate holds.  The variants cover the tests a network layer needs in
//! practice: "column is set" (`NotNull`, for categorical tags like
//! `cycleway=track`), "flag is on" (`Truthy`), "column equals value"
//! (`Equals`, e.g. `is_cycle == 1`) and their boolean combinations.
//!
//! With the `serde` feature a predicate is written externally tagged, which
//! reads naturally in TOML:
//!
//! ```toml
//! predicate = { not_null = "cycleway" }
//! predicate = { equals = { attr = "is_cycle", value = 1 } }
//! predicate = { any = [{ truthy = "lane" }, { truthy = "track" }] }
//! ```

use std::fmt;

use crate::{AttrValue, Attributes};

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "snake_case")
)]
pub enum Predicate {
    /// Holds for every segment.
    Always,
    /// Attribute is present and truthy (see [`AttrValue::is_truthy`]).
    Truthy(String),
    /// Attribute is present and not null.
    NotNull(String),
    /// Attribute is absent or null.
    IsNull(String),
    /// Attribute loosely equals `value` (see [`AttrValue::loosely_equals`]).
    Equals { attr: String, value: AttrValue },
    Not(Box<Predicate>),
    /// Every inner predicate holds (vacuously true when empty).
    All(Vec<Predicate>),
    /// At least one inner predicate holds (false when empty).
    Any(Vec<Predicate>),
}

static NULL: AttrValue = AttrValue::Null;

impl Predicate {
    pub fn truthy(attr: impl Into<String>) -> Self {
        Predicate::Truthy(attr.into())
    }

    pub fn not_null(attr: impl Into<String>) -> Self {
        Predicate::NotNull(attr.into())
    }

    pub fn equals(attr: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        Predicate::Equals { attr: attr.into(), value: value.into() }
    }

    pub fn negate(self) -> Self {
        Predicate::Not(Box::new(self))
    }

    /// Evaluate against one feature's attributes.  A missing column reads as
    /// `Null`.
    pub fn evaluate(&self, attrs: &Attributes) -> bool {
        let get = |name: &str| attrs.get(name).unwrap_or(&NULL);
        match self {
            Predicate::Always => true,
            Predicate::Truthy(a) => get(a).is_truthy(),
            Predicate::NotNull(a) => !get(a).is_null(),
            Predicate::IsNull(a) => get(a).is_null(),
            Predicate::Equals { attr, value } => get(attr).loosely_equals(value),
            Predicate::Not(p) => !p.evaluate(attrs),
            Predicate::All(ps) => ps.iter().all(|p| p.evaluate(attrs)),
            Predicate::Any(ps) => ps.iter().any(|p| p.evaluate(attrs)),
        }
    }

    /// Every attribute name the predicate reads.
    pub fn attributes(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_attributes(&mut out);
        out.sort_unstable();
        out.dedup();
        out
    }

    fn collect_attributes<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Predicate::Always => {}
            Predicate::Truthy(a) | Predicate::NotNull(a) | Predicate::IsNull(a) => out.push(a),
            Predicate::Equals { attr, .. } => out.push(attr),
            Predicate::Not(p) => p.collect_attributes(out),
            Predicate::All(ps) | Predicate::Any(ps) => {
                for p in ps {
                    p.collect_attributes(out);
                }
            }
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Always => f.write_str("true"),
            Predicate::Truthy(a) => write!(f, "{a}"),
            Predicate::NotNull(a) => write!(f, "{a} is not null"),
            Predicate::IsNull(a) => write!(f, "{a} is null"),
            Predicate::Equals { attr, value } => write!(f, "{attr} == {value}"),
            Predicate::Not(p) => write!(f, "not {p}"),
            Predicate::All(ps) => write_joined(f, ps, "and"),
            Predicate::Any(ps) => write_joined(f, ps, "or"),
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, ps: &[Predicate], op: &str) -> fmt::Result {
    f.write_str("(")?;
    for (i, p) in ps.iter().enumerate() {
        if i > 0 {
            write!(f, " {op} ")?;
        }
        write!(f, "{p}")?;
    }
    f.write_str(")")
}
