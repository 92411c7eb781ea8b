use thiserror::Error;

use nc_core::CoreError;
use nc_coverage::CoverageError;
use nc_io::GeoIoError;
use nc_overlay::OverlayError;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("run configuration error: {0}")]
    Config(String),

    #[error("at least one coverage metric is required")]
    NoMetrics,

    #[error("{0} requires a boundary layer")]
    MissingBoundary(&'static str),

    #[error(transparent)]
    GeoIo(#[from] GeoIoError),

    #[error("overlay error: {0}")]
    Overlay(#[from] OverlayError),

    #[error("coverage error: {0}")]
    Coverage(#[from] CoverageError),

    #[error(transparent)]
    Core(#[from] CoreError),
}

pub type PipelineResult<T> = Result<T, PipelineError>;
