//! What to measure: named predicates and ratios between them.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use nc_core::Predicate;

/// One coverage metric: the share of network length satisfying `predicate`.
///
/// Adds the columns `<name>_length` and `<name>_coverage`.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
pub struct MetricSpec {
    pub name:      String,
    pub predicate: Predicate,
}

impl MetricSpec {
    pub fn new(name: impl Into<String>, predicate: Predicate) -> Self {
        Self { name: name.into(), predicate }
    }

    pub fn length_column(&self) -> String {
        format!("{}_length", self.name)
    }

    pub fn coverage_column(&self) -> String {
        format!("{}_coverage", self.name)
    }
}

/// Quotient of two metrics' coverages, written to the column `name`.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
pub struct RatioSpec {
    pub name:        String,
    pub numerator:   String,
    pub denominator: String,
}

impl RatioSpec {
    pub fn new(
        name:        impl Into<String>,
        numerator:   impl Into<String>,
        denominator: impl Into<String>,
    ) -> Self {
        Self { name: name.into(), numerator: numerator.into(), denominator: denominator.into() }
    }
}

/// `cycleway` (a cycleway tag is present) and `bikeable` (`is_cycle == 1`).
pub fn default_metrics() -> Vec<MetricSpec> {
    vec![
        MetricSpec::new("cycleway", Predicate::not_null("cycleway")),
        MetricSpec::new("bikeable", Predicate::equals("is_cycle", 1i64)),
    ]
}

/// `cycleway_to_bikeable = cycleway_coverage / bikeable_coverage`.
pub fn default_ratios() -> Vec<RatioSpec> {
    vec![RatioSpec::new("cycleway_to_bikeable", "cycleway", "bikeable")]
}
