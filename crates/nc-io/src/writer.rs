//! The `LayerWriter` trait, output targets and the destination policy.
//!
//! No sink ever replaces data the run was not told to replace.  The policy:
//!
//! | Destination state                          | Allowed when            | Mode           |
//! |--------------------------------------------|-------------------------|----------------|
//! | file missing                               | always                  | `Create`       |
//! | file has the target layer                  | `overwrite`             | `ReplaceLayer` |
//! | multi-layer file without the target layer  | `overwrite` or `append` | `AddLayer`     |
//!
//! Single-layer formats (GeoJSON, CSV) treat the file itself as the layer.

use std::path::PathBuf;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use log::info;

use crate::csv::CsvWriter;
use crate::geojson::GeoJsonWriter;
use crate::gpkg::{self, GpkgWriter};
use crate::source::stem_name;
use crate::{DataFormat, FeatureLayer, GeoIoError, GeoIoResult};

/// Trait implemented by the GeoPackage, GeoJSON and CSV sinks.
pub trait LayerWriter {
    /// Write `layer` under `name`, replacing any layer of that name.
    fn write_layer(&mut self, name: &str, layer: &FeatureLayer) -> GeoIoResult<()>;

    /// Flush and close underlying handles.  Idempotent.
    fn finish(&mut self) -> GeoIoResult<()>;
}

// ── OutputTarget ──────────────────────────────────────────────────────────────

/// Where the result layer goes and what may be replaced to put it there.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
pub struct OutputTarget {
    pub path:      PathBuf,
    /// Layer name; defaults to the file stem.
    #[cfg_attr(feature = "serde", serde(default))]
    pub layer:     Option<String>,
    /// Replace an existing layer (or single-layer file).
    #[cfg_attr(feature = "serde", serde(default))]
    pub overwrite: bool,
    /// Add a new layer to an existing multi-layer file.
    #[cfg_attr(feature = "serde", serde(default))]
    pub append:    bool,
}

impl OutputTarget {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), layer: None, overwrite: false, append: false }
    }

    pub fn with_layer(mut self, layer: impl Into<String>) -> Self {
        self.layer = Some(layer.into());
        self
    }

    pub fn overwrite(mut self, yes: bool) -> Self {
        self.overwrite = yes;
        self
    }

    pub fn append(mut self, yes: bool) -> Self {
        self.append = yes;
        self
    }

    /// The effective layer name: the configured one, or the file stem.
    pub fn layer_name(&self) -> String {
        self.layer
            .as_deref()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| stem_name(&self.path))
    }

    /// Output format, rejecting read-only formats.
    pub fn format(&self) -> GeoIoResult<DataFormat> {
        let format = DataFormat::from_path(&self.path)?;
        if !format.is_writable() {
            return Err(GeoIoError::UnsupportedFormat(self.path.clone()));
        }
        Ok(format)
    }
}

/// How a write will affect the destination.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum WriteMode {
    /// The file does not exist yet.
    Create,
    /// An existing layer (or single-layer file) is replaced.
    ReplaceLayer,
    /// A new layer is added to an existing multi-layer file.
    AddLayer,
}

// ── Destination policy ────────────────────────────────────────────────────────

/// `true` if `layer` already exists at `path`.  For single-layer formats this
/// is plain file existence.
pub fn layer_exists(path: &std::path::Path, layer: &str) -> GeoIoResult<bool> {
    match DataFormat::from_path(path)? {
        DataFormat::GeoPackage => gpkg::layer_exists(path, layer),
        DataFormat::GeoJson | DataFormat::Csv | DataFormat::Shapefile => Ok(path.exists()),
    }
}

/// Decide whether writing to `target` is allowed, and how.
pub fn check_destination(target: &OutputTarget) -> GeoIoResult<WriteMode> {
    let format = target.format()?;
    if !target.path.exists() {
        return Ok(WriteMode::Create);
    }
    let layer = target.layer_name();
    let exists_err = |layer: Option<String>| GeoIoError::OutputExists {
        path: target.path.clone(),
        layer,
    };

    if !format.is_multi_layer() {
        return if target.overwrite {
            Ok(WriteMode::ReplaceLayer)
        } else {
            Err(exists_err(None))
        };
    }

    if gpkg::layer_exists(&target.path, &layer)? {
        if target.overwrite {
            Ok(WriteMode::ReplaceLayer)
        } else {
            Err(exists_err(Some(layer)))
        }
    } else if target.overwrite || target.append {
        Ok(WriteMode::AddLayer)
    } else {
        Err(exists_err(None))
    }
}

/// Check the destination again and write `layer` to it.
pub fn write_output(target: &OutputTarget, layer: &FeatureLayer) -> GeoIoResult<WriteMode> {
    let mode = check_destination(target)?;
    let name = target.layer_name();
    let mut writer: Box<dyn LayerWriter> = match target.format()? {
        DataFormat::GeoPackage => Box::new(GpkgWriter::open(&target.path)?),
        DataFormat::GeoJson    => Box::new(GeoJsonWriter::new(&target.path)),
        DataFormat::Csv        => Box::new(CsvWriter::new(&target.path)),
        DataFormat::Shapefile  => return Err(GeoIoError::UnsupportedFormat(target.path.clone())),
    };
    writer.write_layer(&name, layer)?;
    writer.finish()?;
    info!(
        "wrote {} features to {} (layer {name:?}, {mode:?})",
        layer.len(),
        target.path.display()
    );
    Ok(mode)
}
