//! Core error type.
//!
//! Sub-crates define their own error enums and wrap `CoreError` as one
//! variant via `#[from]`.

use thiserror::Error;

/// Errors raised while building core values from raw data.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("region key is empty")]
    EmptyRegionKey,

    #[error("attribute value {0} cannot be used as a region key")]
    InvalidKeyValue(String),

    #[error("more than {max} {what}; ids would overflow", max = u32::MAX)]
    TooManyFeatures { what: &'static str },

    #[error("{what} contains a non-finite coordinate")]
    NonFiniteCoordinate { what: String },
}

/// Shorthand result type for `nc-core`.
pub type CoreResult<T> = Result<T, CoreError>;
