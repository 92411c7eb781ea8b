//! ESRI Shapefile reader (`shapefile`), from a `.shp` path or a `.zip`
//! archive holding one or more shapefiles.
//!
//! The layer name is the `.shp` stem.  The `.dbf` table is required; the
//! CRS comes from the `.prj` WKT when it names one we recognise.

use std::fs::{self, File};
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};

use geo::{Coord, Geometry, LineString, MultiLineString, MultiPoint, MultiPolygon, Point, Polygon};
use log::debug;
use shapefile::dbase::{self, FieldValue};
use shapefile::{PolygonRing, Shape, ShapeReader};
use zip::ZipArchive;

use nc_core::{AttrValue, Attributes};

use crate::source::stem_name;
use crate::{Crs, Feature, FeatureLayer, GeoIoError, GeoIoResult};

/// Pseudo-column `dbase` reports for the record deletion flag.
const DELETION_FLAG: &str = "DeletionFlag";

/// Root element names of `.prj` files written without an authority code.
const KNOWN_PRJ_NAMES: &[(&str, u16)] = &[
    ("GCS_GDA2020", 7844),
    ("GDA2020", 7844),
    ("GCS_GDA_1994", 4283),
    ("GDA94", 4283),
    ("GCS_WGS_1984", 4326),
    ("WGS 84", 4326),
    ("GDA2020_Vicgrid", 7899),
    ("GDA2020 / Vicgrid", 7899),
    ("GDA_1994_VICGRID94", 3111),
    ("GDA94 / Vicgrid", 3111),
];

/// The files making up one shapefile, read into memory.
struct Parts {
    name: String,
    shp:  Vec<u8>,
    dbf:  Vec<u8>,
    prj:  Option<String>,
}

/// Read one shapefile layer.  For an archive, `None` selects the first
/// `.shp` entry.
pub fn read_layer(path: &Path, layer: Option<&str>) -> GeoIoResult<FeatureLayer> {
    if !path.exists() {
        return Err(GeoIoError::SourceNotFound(path.to_path_buf()));
    }
    let zipped = path
        .extension()
        .is_some_and(|e| e.eq_ignore_ascii_case("zip"));
    let parts = if zipped { zipped_parts(path, layer)? } else { plain_parts(path, layer)? };
    decode(path, parts)
}

fn plain_parts(path: &Path, layer: Option<&str>) -> GeoIoResult<Parts> {
    let name = stem_name(path);
    if let Some(requested) = layer {
        if requested != name {
            return Err(GeoIoError::LayerNotFound { path: path.to_path_buf(), layer: requested.to_string() });
        }
    }
    let dbf = sibling(path, "dbf")
        .ok_or_else(|| GeoIoError::MissingPart { path: path.to_path_buf(), part: "dbf" })?;
    Ok(Parts {
        name,
        shp: fs::read(path)?,
        dbf: fs::read(dbf)?,
        prj: sibling(path, "prj").map(fs::read_to_string).transpose()?,
    })
}

/// `path` with extension `ext` in either case, if such a file exists.
fn sibling(path: &Path, ext: &str) -> Option<PathBuf> {
    [ext.to_ascii_lowercase(), ext.to_ascii_uppercase()]
        .into_iter()
        .map(|e| path.with_extension(e))
        .find(|p| p.exists())
}

fn zipped_parts(path: &Path, layer: Option<&str>) -> GeoIoResult<Parts> {
    let mut archive = ZipArchive::new(File::open(path)?)?;
    let entries: Vec<String> = archive.file_names().map(str::to_string).collect();
    let mut shps = entries.iter().filter(|n| has_extension(n, "shp"));

    let shp = match layer {
        Some(requested) => shps
            .find(|n| entry_stem(n) == requested)
            .ok_or_else(|| GeoIoError::LayerNotFound {
                path:  path.to_path_buf(),
                layer: requested.to_string(),
            })?,
        None => shps.next().ok_or_else(|| GeoIoError::EmptySource(path.to_path_buf()))?,
    };
    let base = &shp[..shp.len() - 4];
    let companion = |ext: &str| {
        entries
            .iter()
            .find(|n| n.len() == shp.len() && n.starts_with(base) && has_extension(n, ext))
            .cloned()
    };
    let dbf = companion("dbf")
        .ok_or_else(|| GeoIoError::MissingPart { path: path.to_path_buf(), part: "dbf" })?;
    let prj = match companion("prj") {
        Some(entry) => Some(String::from_utf8_lossy(&read_entry(&mut archive, &entry)?).into_owned()),
        None => None,
    };
    debug!("{}: reading {shp} from archive", path.display());
    Ok(Parts {
        name: entry_stem(shp),
        shp:  read_entry(&mut archive, shp)?,
        dbf:  read_entry(&mut archive, &dbf)?,
        prj,
    })
}

fn read_entry(archive: &mut ZipArchive<File>, name: &str) -> GeoIoResult<Vec<u8>> {
    let mut entry = archive.by_name(name)?;
    let mut buf = Vec::with_capacity(entry.size() as usize);
    entry.read_to_end(&mut buf)?;
    Ok(buf)
}

fn has_extension(name: &str, ext: &str) -> bool {
    Path::new(name)
        .extension()
        .is_some_and(|e| e.eq_ignore_ascii_case(ext))
}

fn entry_stem(name: &str) -> String {
    stem_name(Path::new(name))
}

// ── Decoding ──────────────────────────────────────────────────────────────────

fn decode(path: &Path, parts: Parts) -> GeoIoResult<FeatureLayer> {
    let table = dbase::Reader::new(Cursor::new(parts.dbf)).map_err(shapefile::Error::DbaseError)?;
    let schema: Vec<String> = table
        .fields()
        .iter()
        .map(|f| f.name().to_string())
        .filter(|n| n != DELETION_FLAG)
        .collect();
    let shapes = ShapeReader::new(Cursor::new(parts.shp))?;
    let mut reader = shapefile::Reader::new(shapes, table);

    let crs = parts.prj.as_deref().and_then(prj_crs);
    let mut out = FeatureLayer::new(parts.name, crs, schema);
    for item in reader.iter_shapes_and_records() {
        let (shape, record) = item?;
        let attrs: Attributes = out
            .schema
            .iter()
            .map(|column| (column.clone(), record.get(column).map_or(AttrValue::Null, attr_from_dbf)))
            .collect();
        out.push(Feature::new(shape_geometry(&shape), attrs));
    }
    if !out.is_empty() && out.features.iter().all(|f| f.geometry.is_none()) {
        return Err(GeoIoError::NoGeometry { path: path.to_path_buf(), layer: out.name });
    }
    Ok(out)
}

fn attr_from_dbf(value: &FieldValue) -> AttrValue {
    match value {
        FieldValue::Character(Some(s)) => AttrValue::Text(s.trim_end().to_string()),
        FieldValue::Memo(s) => AttrValue::Text(s.clone()),
        FieldValue::Numeric(Some(n)) => AttrValue::Float(*n),
        FieldValue::Float(Some(f)) => AttrValue::Float(f64::from(*f)),
        FieldValue::Integer(i) => AttrValue::Int(i64::from(*i)),
        FieldValue::Double(d) | FieldValue::Currency(d) => AttrValue::Float(*d),
        FieldValue::Logical(Some(b)) => AttrValue::Bool(*b),
        _ => AttrValue::Null,
    }
}

/// Coordinates of one part; Z and M are dropped.
macro_rules! part {
    ($points:expr) => {
        LineString::new($points.iter().map(|p| Coord { x: p.x, y: p.y }).collect())
    };
}

macro_rules! polyline {
    ($line:expr) => {
        Geometry::MultiLineString(MultiLineString::new($line.parts().iter().map(|p| part!(p)).collect()))
    };
}

macro_rules! polygon {
    ($polygon:expr) => {
        Geometry::MultiPolygon(assemble(
            $polygon
                .rings()
                .iter()
                .map(|ring| (matches!(ring, PolygonRing::Outer(_)), part!(ring.points())))
                .collect(),
        ))
    };
}

macro_rules! multipoint {
    ($points:expr) => {
        Geometry::MultiPoint(MultiPoint::new(
            $points.points().iter().map(|p| Point::new(p.x, p.y)).collect(),
        ))
    };
}

fn shape_geometry(shape: &Shape) -> Option<Geometry<f64>> {
    Some(match shape {
        Shape::Point(p)        => Geometry::Point(Point::new(p.x, p.y)),
        Shape::PointM(p)       => Geometry::Point(Point::new(p.x, p.y)),
        Shape::PointZ(p)       => Geometry::Point(Point::new(p.x, p.y)),
        Shape::Polyline(l)     => polyline!(l),
        Shape::PolylineM(l)    => polyline!(l),
        Shape::PolylineZ(l)    => polyline!(l),
        Shape::Polygon(p)      => polygon!(p),
        Shape::PolygonM(p)     => polygon!(p),
        Shape::PolygonZ(p)     => polygon!(p),
        Shape::Multipoint(m)   => multipoint!(m),
        Shape::MultipointM(m)  => multipoint!(m),
        Shape::MultipointZ(m)  => multipoint!(m),
        Shape::NullShape | Shape::Multipatch(_) => return None,
    })
}

/// Group rings into polygons: each outer ring starts a polygon and the
/// inner rings after it are its holes.
fn assemble(rings: Vec<(bool, LineString<f64>)>) -> MultiPolygon<f64> {
    let mut polygons = Vec::new();
    let mut current: Option<(LineString<f64>, Vec<LineString<f64>>)> = None;
    for (outer, ring) in rings {
        if !outer {
            if let Some((_, holes)) = current.as_mut() {
                holes.push(ring);
                continue;
            }
        }
        if let Some((exterior, holes)) = current.replace((ring, Vec::new())) {
            polygons.push(Polygon::new(exterior, holes));
        }
    }
    if let Some((exterior, holes)) = current {
        polygons.push(Polygon::new(exterior, holes));
    }
    MultiPolygon::new(polygons)
}

// ── .prj ──────────────────────────────────────────────────────────────────────

/// CRS named by a `.prj` WKT: the `EPSG` authority (WKT1) or id (WKT2) of
/// the root element, else a known root name.
pub fn prj_crs(wkt: &str) -> Option<Crs> {
    let wkt = wkt.trim();
    if let Some(code) = root_epsg(wkt) {
        return Some(Crs::Epsg(code));
    }
    let root = wkt.split_once("[\"")?.1.split('"').next()?;
    KNOWN_PRJ_NAMES
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(root))
        .map(|&(_, code)| Crs::Epsg(code))
}

/// The EPSG code closing the WKT, i.e. the one attached to the root element.
fn root_epsg(wkt: &str) -> Option<u16> {
    let start = ["AUTHORITY[\"EPSG\",", "ID[\"EPSG\","]
        .iter()
        .filter_map(|tag| wkt.rfind(tag).map(|i| i + tag.len()))
        .max()?;
    let rest = wkt[start..].trim_start_matches(|c: char| c == '"' || c.is_whitespace());
    let end = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
    let tail: String = rest[end..].chars().filter(|c| *c != '"' && !c.is_whitespace()).collect();
    if tail != "]]" {
        return None;
    }
    rest[..end].parse().ok()
}
