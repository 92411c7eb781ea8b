//! GeoJSON reader and writer.
//!
//! A GeoJSON file is a single layer named after its stem.  The legacy
//! top-level `crs` member is honoured on read and emitted on write for any
//! CRS other than WGS 84, so a projected result can be read back unchanged.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use geo::Geometry;
use geojson::{feature::Id, FeatureCollection, GeoJson, JsonObject, JsonValue};
use log::debug;

use nc_core::{AttrValue, Attributes};

use crate::crs::WGS84;
use crate::layer::note_column;
use crate::source::stem_name;
use crate::writer::LayerWriter;
use crate::{Crs, Feature, FeatureLayer, GeoIoError, GeoIoResult};

// ── Reading ───────────────────────────────────────────────────────────────────

/// Read the single layer of a GeoJSON file.
///
/// A named `layer` must match the file stem.
pub fn read_layer(path: &Path, layer: Option<&str>) -> GeoIoResult<FeatureLayer> {
    if !path.exists() {
        return Err(GeoIoError::SourceNotFound(path.to_path_buf()));
    }
    let name = stem_name(path);
    if let Some(requested) = layer {
        if requested != name {
            return Err(GeoIoError::LayerNotFound {
                path:  path.to_path_buf(),
                layer: requested.to_string(),
            });
        }
    }

    let text = std::fs::read_to_string(path)?;
    let no_geometry = || GeoIoError::NoGeometry { path: path.to_path_buf(), layer: name.clone() };

    let (features, foreign) = match text.parse::<GeoJson>()? {
        GeoJson::FeatureCollection(fc) => (fc.features, fc.foreign_members),
        GeoJson::Feature(f)            => (vec![f], None),
        GeoJson::Geometry(_)           => return Err(no_geometry()),
    };
    if !features.is_empty() && features.iter().all(|f| f.geometry.is_none()) {
        return Err(no_geometry());
    }

    let crs = match foreign.as_ref().and_then(declared_crs) {
        Some(text) => Crs::parse(&text)?,
        None       => Crs::Epsg(WGS84),
    };

    let mut out = FeatureLayer::new(name, Some(crs), Vec::new());
    for feature in features {
        let geometry = feature
            .geometry
            .as_ref()
            .map(|g| Geometry::<f64>::try_from(&g.value))
            .transpose()?;
        let mut attrs = Attributes::new();
        for (key, value) in feature.properties.into_iter().flatten() {
            note_column(&mut out.schema, &key);
            attrs.insert(key, attr_from_json(value));
        }
        let fid = match feature.id {
            Some(Id::Number(n)) => n.as_i64(),
            _                   => None,
        };
        out.push(Feature { fid, geometry, attrs });
    }
    debug!("{}: read {} features", path.display(), out.len());
    Ok(out)
}

/// Name inside a legacy `"crs": {"type": "name", "properties": {"name": …}}`.
fn declared_crs(foreign: &JsonObject) -> Option<String> {
    foreign
        .get("crs")?
        .get("properties")?
        .get("name")?
        .as_str()
        .map(str::to_string)
}

fn attr_from_json(value: JsonValue) -> AttrValue {
    match value {
        JsonValue::Null      => AttrValue::Null,
        JsonValue::Bool(b)   => AttrValue::Bool(b),
        JsonValue::Number(n) => match n.as_i64() {
            Some(i) => AttrValue::Int(i),
            None    => n.as_f64().map_or(AttrValue::Null, AttrValue::Float),
        },
        JsonValue::String(s) => AttrValue::Text(s),
        other                => AttrValue::Text(other.to_string()),
    }
}

fn attr_to_json(value: Option<&AttrValue>) -> JsonValue {
    match value {
        None | Some(AttrValue::Null) => JsonValue::Null,
        Some(AttrValue::Bool(b))     => JsonValue::Bool(*b),
        Some(AttrValue::Int(i))      => JsonValue::from(*i),
        Some(AttrValue::Float(f))    => {
            serde_json::Number::from_f64(*f).map_or(JsonValue::Null, JsonValue::Number)
        }
        Some(AttrValue::Text(s))     => JsonValue::String(s.clone()),
    }
}

// ── Writing ───────────────────────────────────────────────────────────────────

/// Writes one layer as a GeoJSON `FeatureCollection`, replacing the file.
pub struct GeoJsonWriter {
    path: PathBuf,
}

impl GeoJsonWriter {
    pub fn new(path: &Path) -> Self {
        Self { path: path.to_path_buf() }
    }
}

impl LayerWriter for GeoJsonWriter {
    fn write_layer(&mut self, _name: &str, layer: &FeatureLayer) -> GeoIoResult<()> {
        let features = layer
            .features
            .iter()
            .map(|f| {
                let properties: JsonObject = layer
                    .schema
                    .iter()
                    .map(|c| (c.clone(), attr_to_json(f.attrs.get(c))))
                    .collect();
                geojson::Feature {
                    bbox:            None,
                    geometry:        f.geometry.as_ref().map(|g| geojson::Geometry::new(g.into())),
                    id:              f.fid.map(|i| Id::Number(i.into())),
                    properties:      Some(properties),
                    foreign_members: None,
                }
            })
            .collect();

        let foreign_members = match layer.crs.as_ref().and_then(Crs::epsg) {
            Some(code) if code != WGS84 => {
                let mut crs = JsonObject::new();
                crs.insert(
                    "crs".into(),
                    serde_json::json!({
                        "type": "name",
                        "properties": { "name": format!("urn:ogc:def:crs:EPSG::{code}") }
                    }),
                );
                Some(crs)
            }
            _ => None,
        };

        let collection = FeatureCollection { bbox: None, features, foreign_members };
        let mut writer = BufWriter::new(File::create(&self.path)?);
        serde_json::to_writer(&mut writer, &GeoJson::FeatureCollection(collection))?;
        writer.flush()?;
        Ok(())
    }

    fn finish(&mut self) -> GeoIoResult<()> {
        Ok(())
    }
}
