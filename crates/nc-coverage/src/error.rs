//! Coverage error types.

use thiserror::Error;

use nc_core::RegionKey;

/// The region-key join between segments and regions is not 1:1.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum JoinCardinalityError {
    #[error("region key {0} appears more than once in the region set")]
    DuplicateKey(RegionKey),

    #[error("a split segment references region key {0}, which is not in the region set")]
    UnknownKey(RegionKey),
}

#[derive(Debug, Error)]
pub enum CoverageError {
    #[error("region join is not 1:1: {0}")]
    Join(#[from] JoinCardinalityError),

    #[error("metric name must not be empty")]
    EmptyName,

    #[error("metric {0:?} is defined more than once")]
    DuplicateMetric(String),

    #[error("ratio {ratio:?} refers to unknown metric {metric:?}")]
    UnknownMetric { ratio: String, metric: String },

    #[error("column {0:?} already exists in the region table")]
    ColumnClash(String),
}

pub type CoverageResult<T> = Result<T, CoverageError>;
