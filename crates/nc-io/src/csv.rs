//! CSV output backend: the attribute table of a layer, without geometry.

use std::fs::File;
use std::path::{Path, PathBuf};

use csv::Writer;

use nc_core::AttrValue;

use crate::writer::LayerWriter;
use crate::{FeatureLayer, GeoIoResult};

/// Writes one layer's attributes to a CSV file, replacing the file.
pub struct CsvWriter {
    path:     PathBuf,
    writer:   Option<Writer<File>>,
    finished: bool,
}

impl CsvWriter {
    pub fn new(path: &Path) -> Self {
        Self { path: path.to_path_buf(), writer: None, finished: false }
    }
}

impl LayerWriter for CsvWriter {
    fn write_layer(&mut self, _name: &str, layer: &FeatureLayer) -> GeoIoResult<()> {
        let mut writer = Writer::from_path(&self.path)?;
        writer.write_record(&layer.schema)?;
        for feature in &layer.features {
            writer.write_record(layer.schema.iter().map(|c| cell(feature.attrs.get(c))))?;
        }
        self.writer = Some(writer);
        Ok(())
    }

    fn finish(&mut self) -> GeoIoResult<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;
        if let Some(writer) = self.writer.as_mut() {
            writer.flush()?;
        }
        Ok(())
    }
}

/// Missing and non-finite values become empty cells.
fn cell(value: Option<&AttrValue>) -> String {
    match value {
        None | Some(AttrValue::Null)                 => String::new(),
        Some(AttrValue::Float(f)) if !f.is_finite()  => String::new(),
        Some(AttrValue::Text(s))                     => s.clone(),
        Some(other)                                  => other.to_string(),
    }
}
