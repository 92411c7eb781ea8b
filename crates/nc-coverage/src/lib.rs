//! `nc-coverage`: the aggregation half of the coverage engine.
//!
//! Split segments are grouped by region key and summed twice per metric: once
//! over every segment (the region's total network length, computed once per
//! table) and once over the segments satisfying the metric's predicate.  The
//! ratio of the two is the region's coverage for that metric.
//!
//! # Crate layout
//!
//! | Module       | Contents                                                 |
//! |--------------|----------------------------------------------------------|
//! | [`metric`]   | `MetricSpec`, `RatioSpec`, default metric set            |
//! | [`table`]    | `CoverageTable`: regions plus computed columns           |
//! | [`finalize`] | `ResultFinalizer`, `FinalTable`, `CoverageRecord`        |
//! | [`error`]    | `CoverageError`, `JoinCardinalityError`                  |
//!
//! # Output columns
//!
//! ```text
//! links_length | <metric>_length | <metric>_coverage | … | <ratio> | …
//! ```
//!
//! # Feature flags
//!
//! | Flag       | Effect                                                   |
//! |------------|----------------------------------------------------------|
//! | `parallel` | Sums each region's segments on Rayon's thread pool.      |
//! | `serde`    | Derives `Serialize`/`Deserialize` on metric specs.       |

pub mod error;
pub mod finalize;
pub mod metric;
pub mod table;


pub use error::{CoverageError, CoverageResult, JoinCardinalityError};
pub use finalize::{CoverageRecord, FinalTable, ResultFinalizer};
pub use metric::{default_metrics, default_ratios, MetricSpec, RatioSpec};
pub use table::{Column, ColumnKind, CoverageTable, TOTAL_COLUMN};
