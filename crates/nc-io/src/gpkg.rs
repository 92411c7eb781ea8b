//! GeoPackage reader and writer (`rusqlite`).
//!
//! A GeoPackage is an SQLite file whose spatial tables are registered in
//! `gpkg_contents` and `gpkg_geometry_columns`.  Geometry cells hold a small
//! `GP` header followed by WKB.  Reading accepts any header variant; writing
//! emits little-endian blobs without an envelope.
//!
//! Reading also covers the older SQLite layouts written by OGR's SQLite
//! driver and by SpatiaLite: spatial tables registered in `geometry_columns`
//! (`f_table_name`, `f_geometry_column`, `srid`), CRS codes in
//! `spatial_ref_sys`, and cells holding plain WKB or SpatiaLite blobs.

use std::path::{Path, PathBuf};

use geo::Geometry;
use log::{debug, warn};
use rusqlite::types::{Value, ValueRef};
use rusqlite::{Connection, OpenFlags, OptionalExtension, Transaction};

use nc_core::AttrValue;

use crate::spatialite;
use crate::wkb::{read_wkb, write_wkb};
use crate::writer::LayerWriter;
use crate::{Crs, Feature, FeatureLayer, GeoIoError, GeoIoResult};

/// `PRAGMA application_id` value spelling "GPKG".
const GPKG_APPLICATION_ID: i64 = 0x4750_4B47;
/// `PRAGMA user_version` for GeoPackage 1.2.
const GPKG_USER_VERSION:   i64 = 10200;

const FLAG_LITTLE_ENDIAN: u8 = 0b0000_0001;
const FLAG_EMPTY:         u8 = 0b0001_0000;

// ── Blob codec ────────────────────────────────────────────────────────────────

/// Decode a GeoPackage geometry blob.  Empty geometries decode to `None`.
pub fn decode_blob(blob: &[u8]) -> GeoIoResult<Option<Geometry<f64>>> {
    if blob.len() < 8 || &blob[..2] != b"GP" {
        return Err(GeoIoError::Wkb("missing GeoPackage blob header".into()));
    }
    let flags = blob[3];
    let envelope_len = match (flags >> 1) & 0b111 {
        0     => 0,
        1     => 32,
        2 | 3 => 48,
        4     => 64,
        e => return Err(GeoIoError::Wkb(format!("invalid envelope indicator {e}"))),
    };
    if flags & FLAG_EMPTY != 0 {
        return Ok(None);
    }
    let body = blob
        .get(8 + envelope_len..)
        .ok_or_else(|| GeoIoError::Wkb("blob shorter than its envelope".into()))?;
    read_wkb(body).map(Some)
}

/// Decode a geometry cell of any SQLite layout: GeoPackage blob, SpatiaLite
/// blob or plain WKB.
pub fn decode_geometry(blob: &[u8]) -> GeoIoResult<Option<Geometry<f64>>> {
    if blob.starts_with(b"GP") {
        return decode_blob(blob);
    }
    if spatialite::is_spatialite_blob(blob) {
        // Big-endian WKB starts with the same byte; fall back if the markers lied.
        if let Ok(geometry) = spatialite::decode_blob(blob) {
            return Ok(Some(geometry));
        }
    }
    read_wkb(blob).map(Some)
}

/// Encode `geometry` as a GeoPackage blob tagged with `srs_id`.
pub fn encode_blob(geometry: &Geometry<f64>, srs_id: i32) -> Vec<u8> {
    let mut out = Vec::with_capacity(64);
    out.extend_from_slice(b"GP");
    out.push(0);
    out.push(FLAG_LITTLE_ENDIAN);
    out.extend_from_slice(&srs_id.to_le_bytes());
    write_wkb(geometry, &mut out);
    out
}

// ── Reading ───────────────────────────────────────────────────────────────────

/// Layer names in registration order.
pub fn list_layers(path: &Path) -> GeoIoResult<Vec<String>> {
    layer_names(&open_read_only(path)?)
}

/// `true` if `path` exists and contains a table called `layer`.
pub fn layer_exists(path: &Path, layer: &str) -> GeoIoResult<bool> {
    if !path.exists() {
        return Ok(false);
    }
    has_table(&open_read_only(path)?, layer)
}

/// Read one layer.  `None` selects the first registered layer.
pub fn read_layer(path: &Path, layer: Option<&str>) -> GeoIoResult<FeatureLayer> {
    let conn = open_read_only(path)?;
    let name = resolve_layer(&conn, path, layer)?;

    let Some((geom_column, crs)) = geometry_column(&conn, &name)? else {
        return Err(GeoIoError::NoGeometry { path: path.to_path_buf(), layer: name });
    };

    let columns = table_columns(&conn, &name, &geom_column)?;
    let select = columns.iter().map(|c| quote_ident(&c.name)).collect::<Vec<_>>().join(", ");
    let schema = columns
        .iter()
        .filter(|c| matches!(c.role, ColumnRole::Attribute { .. }))
        .map(|c| c.name.clone())
        .collect();

    let mut out = FeatureLayer::new(name.clone(), crs, schema);
    let mut stmt = conn.prepare(&format!("SELECT {select} FROM {}", quote_ident(&name)))?;
    let mut rows = stmt.query([])?;
    let mut skipped_blobs = 0usize;
    while let Some(row) = rows.next()? {
        let mut feature = Feature::default();
        for (i, column) in columns.iter().enumerate() {
            let cell = row.get_ref(i)?;
            match column.role {
                ColumnRole::Fid => {
                    if let ValueRef::Integer(v) = cell {
                        feature.fid = Some(v);
                    }
                }
                ColumnRole::Geometry => {
                    feature.geometry = match cell {
                        ValueRef::Blob(b) => decode_geometry(b)?,
                        ValueRef::Null    => None,
                        _ => {
                            return Err(GeoIoError::Wkb(format!(
                                "column {:?} of {name:?} holds a non-blob value",
                                column.name
                            )))
                        }
                    };
                }
                ColumnRole::Attribute { boolean } => {
                    if matches!(cell, ValueRef::Blob(_)) {
                        skipped_blobs += 1;
                    }
                    feature.attrs.insert(column.name.clone(), attr_from_sql(cell, boolean));
                }
            }
        }
        out.push(feature);
    }
    if skipped_blobs > 0 {
        debug!("{name}: {skipped_blobs} binary attribute values read as null");
    }
    Ok(out)
}

fn open_read_only(path: &Path) -> GeoIoResult<Connection> {
    if !path.exists() {
        return Err(GeoIoError::SourceNotFound(path.to_path_buf()));
    }
    Ok(Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)?)
}

fn has_table(conn: &Connection, name: &str) -> GeoIoResult<bool> {
    let n: i64 = conn.query_row(
        "SELECT count(*) FROM sqlite_master WHERE type IN ('table', 'view') AND name = ?1",
        [name],
        |r| r.get(0),
    )?;
    Ok(n > 0)
}

/// Metadata tables of the OGR-SQLite and SpatiaLite layouts, lower-cased.
const SQLITE_METADATA: &[&str] = &[
    "geometry_columns",
    "geometry_columns_auth",
    "geometry_columns_field_infos",
    "geometry_columns_statistics",
    "geometry_columns_time",
    "spatial_ref_sys",
    "spatial_ref_sys_aux",
    "spatialite_history",
    "sql_statements_log",
    "views_geometry_columns",
    "views_geometry_columns_auth",
    "views_geometry_columns_field_infos",
    "views_geometry_columns_statistics",
    "virts_geometry_columns",
    "virts_geometry_columns_auth",
    "virts_geometry_columns_field_infos",
    "virts_geometry_columns_statistics",
    "elementarygeometries",
    "spatialindex",
    "knn",
    "knn2",
    "data_licenses",
];

fn is_metadata_table(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    SQLITE_METADATA.contains(&lower.as_str()) || lower.starts_with("idx_")
}

fn query_names(conn: &Connection, sql: &str) -> GeoIoResult<Vec<String>> {
    let mut stmt = conn.prepare(sql)?;
    let names = stmt
        .query_map([], |r| r.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(names)
}

/// GeoPackage layers come from `gpkg_contents`.  Otherwise spatial tables
/// from `geometry_columns` come first, then the remaining user tables.
fn layer_names(conn: &Connection) -> GeoIoResult<Vec<String>> {
    if has_table(conn, "gpkg_contents")? {
        return query_names(conn, "SELECT table_name FROM gpkg_contents ORDER BY rowid");
    }
    let mut names = if has_table(conn, "geometry_columns")? {
        query_names(conn, "SELECT f_table_name FROM geometry_columns ORDER BY rowid")?
    } else {
        Vec::new()
    };
    let tables = query_names(
        conn,
        "SELECT name FROM sqlite_master \
         WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY rowid",
    )?;
    for table in tables {
        let listed = names.iter().any(|n| n.eq_ignore_ascii_case(&table));
        if !listed && !is_metadata_table(&table) {
            names.push(table);
        }
    }
    Ok(names)
}

fn resolve_layer(conn: &Connection, path: &Path, layer: Option<&str>) -> GeoIoResult<String> {
    match layer {
        Some(name) => {
            if has_table(conn, name)? {
                Ok(name.to_string())
            } else {
                Err(GeoIoError::LayerNotFound {
                    path:  path.to_path_buf(),
                    layer: name.to_string(),
                })
            }
        }
        None => layer_names(conn)?
            .into_iter()
            .next()
            .ok_or_else(|| GeoIoError::EmptySource(path.to_path_buf())),
    }
}

/// Geometry column and CRS of `table`, from whichever registry the file has.
fn geometry_column(conn: &Connection, table: &str) -> GeoIoResult<Option<(String, Option<Crs>)>> {
    if has_table(conn, "gpkg_geometry_columns")? {
        let row = conn
            .query_row(
                "SELECT column_name, srs_id FROM gpkg_geometry_columns WHERE table_name = ?1",
                [table],
                |r| Ok((r.get::<_, String>(0)?, r.get::<_, i64>(1)?)),
            )
            .optional()?;
        if let Some((column, srs_id)) = row {
            let crs = srs_crs(
                conn,
                srs_id,
                "SELECT organization, organization_coordsys_id FROM gpkg_spatial_ref_sys \
                 WHERE srs_id = ?1",
                "gpkg_spatial_ref_sys",
            )?;
            return Ok(Some((column, crs)));
        }
    }
    if has_table(conn, "geometry_columns")? {
        let row = conn
            .query_row(
                "SELECT f_geometry_column, srid FROM geometry_columns \
                 WHERE lower(f_table_name) = lower(?1)",
                [table],
                |r| Ok((r.get::<_, String>(0)?, r.get::<_, Option<i64>>(1)?)),
            )
            .optional()?;
        if let Some((column, srid)) = row {
            let crs = srs_crs(
                conn,
                srid.unwrap_or(-1),
                "SELECT auth_name, auth_srid FROM spatial_ref_sys WHERE srid = ?1",
                "spatial_ref_sys",
            )?;
            return Ok(Some((column, crs)));
        }
    }
    Ok(None)
}

/// Resolve a registry SRS id through its reference table.  An id with no
/// row is taken as an EPSG code.
fn srs_crs(conn: &Connection, srs_id: i64, sql: &str, ref_table: &str) -> GeoIoResult<Option<Crs>> {
    if srs_id <= 0 {
        return Ok(None);
    }
    let row = if has_table(conn, ref_table)? {
        conn.query_row(sql, [srs_id], |r| {
            Ok((r.get::<_, Option<String>>(0)?, srs_code(r.get_ref(1)?)))
        })
        .optional()?
    } else {
        None
    };
    Ok(match row {
        Some((Some(org), Some(code))) if org.eq_ignore_ascii_case("EPSG") => {
            u16::try_from(code).ok().map(Crs::Epsg)
        }
        Some((org, code)) => {
            warn!(
                "unsupported spatial reference {}:{}; coordinates used as-is",
                org.as_deref().unwrap_or("?"),
                code.map_or_else(|| "?".to_string(), |c| c.to_string())
            );
            None
        }
        None => u16::try_from(srs_id).ok().map(Crs::Epsg),
    })
}

/// Authority code stored as INTEGER or, as OGR writes it, TEXT.
fn srs_code(value: ValueRef<'_>) -> Option<i64> {
    match value {
        ValueRef::Integer(code) => Some(code),
        ValueRef::Text(text) => std::str::from_utf8(text).ok()?.trim().parse().ok(),
        _ => None,
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum ColumnRole {
    Fid,
    Geometry,
    Attribute { boolean: bool },
}

struct Column {
    name: String,
    role: ColumnRole,
}

fn table_columns(conn: &Connection, table: &str, geom_column: &str) -> GeoIoResult<Vec<Column>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", quote_ident(table)))?;
    let rows = stmt.query_map([], |r| {
        Ok((r.get::<_, String>(1)?, r.get::<_, String>(2)?, r.get::<_, i64>(5)?))
    })?;
    let mut columns = Vec::new();
    for row in rows {
        let (name, decl, pk) = row?;
        let decl = decl.to_ascii_uppercase();
        let role = if name.eq_ignore_ascii_case(geom_column) {
            ColumnRole::Geometry
        } else if pk > 0 && decl == "INTEGER" {
            ColumnRole::Fid
        } else {
            ColumnRole::Attribute { boolean: decl == "BOOLEAN" }
        };
        columns.push(Column { name, role });
    }
    Ok(columns)
}

fn attr_from_sql(cell: ValueRef<'_>, boolean: bool) -> AttrValue {
    match cell {
        ValueRef::Null                 => AttrValue::Null,
        ValueRef::Integer(v) if boolean => AttrValue::Bool(v != 0),
        ValueRef::Integer(v)           => AttrValue::Int(v),
        ValueRef::Real(v)              => AttrValue::Float(v),
        ValueRef::Text(t)              => AttrValue::Text(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(_)              => AttrValue::Null,
    }
}

pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

// ── Writing ───────────────────────────────────────────────────────────────────

/// Writes feature layers into a (new or existing) GeoPackage.
pub struct GpkgWriter {
    conn: Connection,
    path: PathBuf,
}

impl GpkgWriter {
    /// Open `path`, creating the file and the GeoPackage metadata tables as
    /// needed.  Existing layers are left untouched.
    pub fn open(path: &Path) -> GeoIoResult<Self> {
        let fresh = !path.exists();
        let conn = Connection::open(path)?;
        if fresh {
            conn.execute_batch(&format!(
                "PRAGMA application_id = {GPKG_APPLICATION_ID};
                 PRAGMA user_version   = {GPKG_USER_VERSION};"
            ))?;
        }
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS gpkg_spatial_ref_sys (
                 srs_name                 TEXT    NOT NULL,
                 srs_id                   INTEGER PRIMARY KEY,
                 organization             TEXT    NOT NULL,
                 organization_coordsys_id INTEGER NOT NULL,
                 definition               TEXT    NOT NULL,
                 description              TEXT
             );
             INSERT OR IGNORE INTO gpkg_spatial_ref_sys VALUES
                 ('Undefined cartesian SRS', -1, 'NONE', -1, 'undefined', NULL),
                 ('Undefined geographic SRS', 0, 'NONE',  0, 'undefined', NULL),
                 ('WGS 84 geodetic', 4326, 'EPSG', 4326,
                  'GEOGCS[\"WGS 84\",DATUM[\"WGS_1984\",SPHEROID[\"WGS 84\",6378137,298.257223563]],PRIMEM[\"Greenwich\",0],UNIT[\"degree\",0.0174532925199433]]',
                  NULL);
             CREATE TABLE IF NOT EXISTS gpkg_contents (
                 table_name  TEXT     NOT NULL PRIMARY KEY,
                 data_type   TEXT     NOT NULL,
                 identifier  TEXT     UNIQUE,
                 description TEXT     DEFAULT '',
                 last_change DATETIME NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                 min_x       DOUBLE,
                 min_y       DOUBLE,
                 max_x       DOUBLE,
                 max_y       DOUBLE,
                 srs_id      INTEGER
             );
             CREATE TABLE IF NOT EXISTS gpkg_geometry_columns (
                 table_name         TEXT    NOT NULL,
                 column_name        TEXT    NOT NULL,
                 geometry_type_name TEXT    NOT NULL,
                 srs_id             INTEGER NOT NULL,
                 z                  TINYINT NOT NULL,
                 m                  TINYINT NOT NULL,
                 CONSTRAINT pk_geom_cols PRIMARY KEY (table_name, column_name)
             );",
        )?;
        Ok(Self { conn, path: path.to_path_buf() })
    }
}

impl LayerWriter for GpkgWriter {
    fn write_layer(&mut self, name: &str, layer: &FeatureLayer) -> GeoIoResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        drop_layer(&tx, name)?;
        let srs_id = ensure_srs(&tx, layer.crs.as_ref())?;

        let attr_columns: Vec<&String> = layer
            .schema
            .iter()
            .filter(|c| {
                let reserved = c.eq_ignore_ascii_case("fid") || c.eq_ignore_ascii_case("geom");
                if reserved {
                    warn!("{name}: attribute {c:?} collides with a reserved column and is not written");
                }
                !reserved
            })
            .collect();

        let table = quote_ident(name);
        let mut ddl = format!(
            "CREATE TABLE {table} (fid INTEGER PRIMARY KEY AUTOINCREMENT, geom {}",
            geometry_type_name(layer)
        );
        for column in &attr_columns {
            ddl.push_str(&format!(", {} {}", quote_ident(column), column_type(layer, column)));
        }
        ddl.push(')');
        tx.execute_batch(&ddl)?;

        {
            let mut columns = vec!["geom".to_string()];
            columns.extend(attr_columns.iter().map(|c| quote_ident(c)));
            let placeholders = (1..=columns.len()).map(|i| format!("?{i}")).collect::<Vec<_>>();
            let mut stmt = tx.prepare(&format!(
                "INSERT INTO {table} ({}) VALUES ({})",
                columns.join(", "),
                placeholders.join(", ")
            ))?;
            for feature in &layer.features {
                let mut values = Vec::with_capacity(columns.len());
                values.push(match &feature.geometry {
                    Some(g) => Value::Blob(encode_blob(g, srs_id)),
                    None    => Value::Null,
                });
                values.extend(attr_columns.iter().map(|c| sql_value(feature.attrs.get(c.as_str()))));
                stmt.execute(rusqlite::params_from_iter(values.iter()))?;
            }
        }

        let bounds = layer.bounds();
        tx.execute(
            "INSERT INTO gpkg_contents \
             (table_name, data_type, identifier, min_x, min_y, max_x, max_y, srs_id) \
             VALUES (?1, 'features', ?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![
                name,
                bounds.map(|b| b.min().x),
                bounds.map(|b| b.min().y),
                bounds.map(|b| b.max().x),
                bounds.map(|b| b.max().y),
                srs_id,
            ],
        )?;
        tx.execute(
            "INSERT INTO gpkg_geometry_columns \
             (table_name, column_name, geometry_type_name, srs_id, z, m) \
             VALUES (?1, 'geom', ?2, ?3, 0, 0)",
            rusqlite::params![name, geometry_type_name(layer), srs_id],
        )?;
        tx.commit()?;
        debug!("{}: wrote layer {name:?} ({} features)", self.path.display(), layer.len());
        Ok(())
    }

    fn finish(&mut self) -> GeoIoResult<()> {
        self.conn.execute_batch("PRAGMA optimize;")?;
        Ok(())
    }
}

/// Remove `name` and its registrations, if present.
fn drop_layer(tx: &Transaction<'_>, name: &str) -> GeoIoResult<()> {
    tx.execute("DELETE FROM gpkg_geometry_columns WHERE table_name = ?1", [name])?;
    tx.execute("DELETE FROM gpkg_contents WHERE table_name = ?1", [name])?;
    tx.execute_batch(&format!("DROP TABLE IF EXISTS {}", quote_ident(name)))?;
    Ok(())
}

/// Register the layer's CRS and return its `srs_id`.  Layers without an
/// EPSG code are tagged as undefined cartesian.
fn ensure_srs(tx: &Transaction<'_>, crs: Option<&Crs>) -> GeoIoResult<i32> {
    let Some(code) = crs.and_then(Crs::epsg) else {
        return Ok(-1);
    };
    tx.execute(
        "INSERT OR IGNORE INTO gpkg_spatial_ref_sys \
         (srs_name, srs_id, organization, organization_coordsys_id, definition) \
         VALUES (?1, ?2, 'EPSG', ?2, 'undefined')",
        rusqlite::params![format!("EPSG:{code}"), code],
    )?;
    Ok(i32::from(code))
}

fn geometry_type_name(layer: &FeatureLayer) -> &'static str {
    let mut kinds = layer.features.iter().filter_map(|f| f.geometry.as_ref()).map(|g| match g {
        Geometry::Point(_)                  => "POINT",
        Geometry::Line(_) | Geometry::LineString(_) => "LINESTRING",
        Geometry::Polygon(_) | Geometry::Rect(_) | Geometry::Triangle(_) => "POLYGON",
        Geometry::MultiPoint(_)             => "MULTIPOINT",
        Geometry::MultiLineString(_)        => "MULTILINESTRING",
        Geometry::MultiPolygon(_)           => "MULTIPOLYGON",
        Geometry::GeometryCollection(_)     => "GEOMETRYCOLLECTION",
    });
    match kinds.next() {
        Some(first) if kinds.all(|k| k == first) => first,
        _ => "GEOMETRY",
    }
}

/// Declared SQL type for an attribute column, widened over every value.
fn column_type(layer: &FeatureLayer, column: &str) -> &'static str {
    let mut declared: Option<&'static str> = None;
    for feature in &layer.features {
        let kind = match feature.attrs.get(column) {
            None | Some(AttrValue::Null) => continue,
            Some(AttrValue::Bool(_))     => "BOOLEAN",
            Some(AttrValue::Int(_))      => "INTEGER",
            Some(AttrValue::Float(_))    => "REAL",
            Some(AttrValue::Text(_))     => "TEXT",
        };
        declared = Some(match (declared, kind) {
            (None, k)                                    => k,
            (Some(a), b) if a == b                       => a,
            (Some("INTEGER" | "REAL"), "INTEGER" | "REAL") => "REAL",
            (Some("BOOLEAN" | "INTEGER"), "BOOLEAN" | "INTEGER") => "INTEGER",
            _                                            => "TEXT",
        });
    }
    declared.unwrap_or("TEXT")
}

fn sql_value(value: Option<&AttrValue>) -> Value {
    match value {
        None | Some(AttrValue::Null)      => Value::Null,
        Some(AttrValue::Bool(b))          => Value::Integer(i64::from(*b)),
        Some(AttrValue::Int(i))           => Value::Integer(*i),
        Some(AttrValue::Float(f)) if f.is_finite() => Value::Real(*f),
        Some(AttrValue::Float(_))         => Value::Null,
        Some(AttrValue::Text(s))          => Value::Text(s.clone()),
    }
}
