//! Turning loaded layers into core features.

use geo::{unary_union, Geometry, LineString, MultiLineString, MultiPolygon, Polygon};
use log::warn;

use nc_core::geom::ensure_finite;
use nc_core::{AttrValue, CoreError, EdgeId, NetworkEdge, RegionKey, RegionPolygon};

use crate::{FeatureLayer, GeoIoError, GeoIoResult};

/// Build network edges from the linear features of `layer`.
///
/// The source id is the `edge_id` attribute when given and non-null, the
/// feature id otherwise, and the feature ordinal as a last resort.
/// Non-linear features are skipped with a warning.
pub fn network_edges(layer: FeatureLayer, edge_id: Option<&str>) -> GeoIoResult<Vec<NetworkEdge>> {
    if let Some(field) = edge_id {
        require_field(&layer, field)?;
    }
    let total = layer.len();
    let mut edges = Vec::with_capacity(total);
    for (ordinal, feature) in layer.features.into_iter().enumerate() {
        let Some(geometry) = feature.geometry.and_then(into_lines) else {
            continue;
        };
        let source_id = edge_id
            .and_then(|f| feature.attrs.get(f))
            .filter(|v| !v.is_null())
            .map(id_text)
            .unwrap_or_else(|| feature.fid.unwrap_or(ordinal as i64).to_string());
        ensure_finite(&geometry, || format!("edge {source_id:?}"))?;
        let id = EdgeId::try_from(edges.len())
            .map_err(|_| CoreError::TooManyFeatures { what: "network edges" })?;
        edges.push(NetworkEdge::new(id, source_id, geometry, feature.attrs));
    }
    report_skipped(&layer.name, total, edges.len(), "linear")?;
    Ok(edges)
}

/// Build region polygons from the polygonal features of `layer`, keyed by
/// the `key` attribute.
pub fn region_polygons(layer: FeatureLayer, key: &str) -> GeoIoResult<Vec<RegionPolygon>> {
    require_field(&layer, key)?;
    let total = layer.len();
    let mut regions = Vec::with_capacity(total);
    for (index, feature) in layer.features.into_iter().enumerate() {
        let Some(geometry) = feature.geometry.and_then(into_polygons) else {
            continue;
        };
        let region_key = RegionKey::from_attr(feature.attrs.get(key).unwrap_or(&AttrValue::Null))
            .map_err(|source| GeoIoError::MissingKey {
                layer: layer.name.clone(),
                field: key.to_string(),
                index,
                source,
            })?;
        ensure_finite(&geometry, || format!("region {region_key}"))?;
        regions.push(RegionPolygon::new(region_key, geometry, feature.attrs));
    }
    report_skipped(&layer.name, total, regions.len(), "polygonal")?;
    Ok(regions)
}

/// Union of every polygonal feature of `layer`.
pub fn boundary_polygon(layer: FeatureLayer) -> GeoIoResult<MultiPolygon<f64>> {
    let parts: Vec<Polygon<f64>> = layer
        .features
        .into_iter()
        .filter_map(|f| f.geometry.and_then(into_polygons))
        .flat_map(|mp| mp.0)
        .collect();
    if parts.is_empty() {
        return Err(GeoIoError::WrongGeometry { layer: layer.name, expected: "polygonal" });
    }
    for part in &parts {
        ensure_finite(part, || format!("boundary {:?}", layer.name))?;
    }
    Ok(unary_union(parts.iter()))
}

fn require_field(layer: &FeatureLayer, field: &str) -> GeoIoResult<()> {
    if layer.is_empty() || layer.has_field(field) {
        Ok(())
    } else {
        Err(GeoIoError::MissingField { layer: layer.name.clone(), field: field.to_string() })
    }
}

/// Warn about skipped features; a non-empty layer with nothing usable is an
/// error.
fn report_skipped(layer: &str, total: usize, kept: usize, expected: &'static str) -> GeoIoResult<()> {
    if total > 0 && kept == 0 {
        return Err(GeoIoError::WrongGeometry { layer: layer.to_string(), expected });
    }
    if kept < total {
        warn!("{layer}: skipped {} features without {expected} geometry", total - kept);
    }
    Ok(())
}

fn into_lines(geometry: Geometry<f64>) -> Option<MultiLineString<f64>> {
    let lines: Vec<LineString<f64>> = match geometry {
        Geometry::Line(l)             => vec![LineString::from(vec![l.start, l.end])],
        Geometry::LineString(ls)      => vec![ls],
        Geometry::MultiLineString(ml) => ml.0,
        Geometry::GeometryCollection(gc) => {
            let mut lines = Vec::new();
            for member in gc.0 {
                lines.extend(into_lines(member)?.0);
            }
            lines
        }
        _ => return None,
    };
    (!lines.is_empty()).then(|| MultiLineString::new(lines))
}

fn into_polygons(geometry: Geometry<f64>) -> Option<MultiPolygon<f64>> {
    let polygons: Vec<Polygon<f64>> = match geometry {
        Geometry::Polygon(p)       => vec![p],
        Geometry::MultiPolygon(mp) => mp.0,
        Geometry::Rect(r)          => vec![r.to_polygon()],
        Geometry::Triangle(t)      => vec![t.to_polygon()],
        Geometry::GeometryCollection(gc) => {
            let mut polygons = Vec::new();
            for member in gc.0 {
                polygons.extend(into_polygons(member)?.0);
            }
            polygons
        }
        _ => return None,
    };
    (!polygons.is_empty()).then(|| MultiPolygon::new(polygons))
}

/// Identifier text: integral floats print without a fraction.
fn id_text(value: &AttrValue) -> String {
    match value {
        AttrValue::Text(s)                         => s.clone(),
        AttrValue::Float(f) if f.fract() == 0.0    => format!("{}", *f as i64),
        other                                      => other.to_string(),
    }
}
