//! Where a layer comes from, and what format the file extension implies.

use std::path::{Path, PathBuf};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{GeoIoError, GeoIoResult};

// ── LayerSource ───────────────────────────────────────────────────────────────

/// A path plus an optional layer name inside it.
///
/// An absent or blank layer name selects the first layer of a multi-layer
/// container, or the only layer of a single-layer file.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
pub struct LayerSource {
    pub path:  PathBuf,
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub layer: Option<String>,
}

impl LayerSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), layer: None }
    }

    pub fn with_layer(mut self, layer: impl Into<String>) -> Self {
        self.layer = Some(layer.into());
        self
    }

    /// The requested layer name, with blank names treated as absent.
    pub fn layer_name(&self) -> Option<&str> {
        self.layer.as_deref().map(str::trim).filter(|l| !l.is_empty())
    }

    pub fn format(&self) -> GeoIoResult<DataFormat> {
        DataFormat::from_path(&self.path)
    }
}

// ── DataFormat ────────────────────────────────────────────────────────────────

/// File formats the engine reads and/or writes, keyed by extension.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum DataFormat {
    /// `.geojson`, `.json`: one layer per file, named after the file stem.
    GeoJson,
    /// `.gpkg`, `.sqlite`, `.db`: many layers per file.  Reads GeoPackage
    /// and the OGR-SQLite/SpatiaLite layouts; writes GeoPackage.
    GeoPackage,
    /// `.shp`, or a `.zip` of shapefiles: read-only.
    Shapefile,
    /// `.csv`: write-only, attributes without geometry.
    Csv,
}

impl DataFormat {
    pub fn from_path(path: &Path) -> GeoIoResult<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match ext.as_str() {
            "geojson" | "json"       => Ok(DataFormat::GeoJson),
            "gpkg" | "sqlite" | "db" => Ok(DataFormat::GeoPackage),
            "shp" | "zip"            => Ok(DataFormat::Shapefile),
            "csv"                    => Ok(DataFormat::Csv),
            _ => Err(GeoIoError::UnsupportedFormat(path.to_path_buf())),
        }
    }

    /// `true` if a file of this format can hold more than one layer.
    pub fn is_multi_layer(self) -> bool {
        matches!(self, DataFormat::GeoPackage)
    }

    /// `true` if results can be written in this format.
    pub fn is_writable(self) -> bool {
        !matches!(self, DataFormat::Shapefile)
    }
}

/// Layer name implied by a single-layer file: its stem.
pub(crate) fn stem_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}
