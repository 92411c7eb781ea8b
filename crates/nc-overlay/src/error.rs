//! Overlay error type.

use thiserror::Error;

use nc_core::CoreError;

/// Errors produced by `nc-overlay`.
#[derive(Debug, Error)]
pub enum OverlayError {
    #[error("clip extent has no area")]
    EmptyExtent,

    #[error("pre-aggregation separator must not be empty")]
    EmptySeparator,

    #[error(transparent)]
    Core(#[from] CoreError),
}

pub type OverlayResult<T> = Result<T, OverlayError>;
