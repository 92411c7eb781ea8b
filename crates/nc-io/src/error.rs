//! Error types for nc-io.

use std::path::PathBuf;

use thiserror::Error;

use nc_core::CoreError;

/// Errors produced while loading or writing geometry layers.
#[derive(Debug, Error)]
pub enum GeoIoError {
    /// The layer exists but is not spatial.  Fatal: nothing can be measured.
    #[error("{}: layer {layer:?} has no geometry column", .path.display())]
    NoGeometry { path: PathBuf, layer: String },

    #[error("{}: layer {layer:?} not found", .path.display())]
    LayerNotFound { path: PathBuf, layer: String },

    #[error("{}: source contains no layers", .0.display())]
    EmptySource(PathBuf),

    #[error("{}: no such file", .0.display())]
    SourceNotFound(PathBuf),

    #[error("{}: unsupported data format", .0.display())]
    UnsupportedFormat(PathBuf),

    #[error("{}: shapefile has no .{part} component", .path.display())]
    MissingPart { path: PathBuf, part: &'static str },

    /// The destination (or the layer inside it) already exists and the run
    /// did not ask to replace it.
    #[error(
        "output {}{} already exists; set overwrite to replace it",
        .path.display(),
        .layer.as_deref().map(|l| format!(" (layer {l:?})")).unwrap_or_default()
    )]
    OutputExists { path: PathBuf, layer: Option<String> },

    #[error("layer {layer:?} has no {expected} features")]
    WrongGeometry { layer: String, expected: &'static str },

    #[error("layer {layer:?} has no attribute {field:?}")]
    MissingField { layer: String, field: String },

    #[error("feature {index} of layer {layer:?} has no usable value for {field:?}: {source}")]
    MissingKey {
        layer:  String,
        field:  String,
        index:  usize,
        source: CoreError,
    },

    #[error("unrecognised CRS {0:?}")]
    UnknownCrs(String),

    #[error("malformed geometry blob: {0}")]
    Wkb(String),

    #[error("projection error: {0}")]
    Projection(#[from] proj4rs::errors::Error),

    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("shapefile error: {0}")]
    Shapefile(#[from] shapefile::Error),

    #[error("zip archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("CSV write error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Alias for `Result<T, GeoIoError>`.
pub type GeoIoResult<T> = Result<T, GeoIoError>;
