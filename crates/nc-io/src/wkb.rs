//! Well-Known Binary geometry codec.
//!
//! Reads both byte orders, ISO (`1000`/`2000`/`3000` offsets) and EWKB
//! (high-bit flags) dimension markers, and discards Z and M ordinates.
//! Writes 2-D little-endian ISO WKB.

use geo::{
    Coord, Geometry, GeometryCollection, LineString, MultiLineString, MultiPoint, MultiPolygon,
    Point, Polygon,
};

use crate::{GeoIoError, GeoIoResult};

const WKB_POINT:              u32 = 1;
const WKB_LINESTRING:         u32 = 2;
const WKB_POLYGON:            u32 = 3;
const WKB_MULTIPOINT:         u32 = 4;
const WKB_MULTILINESTRING:    u32 = 5;
const WKB_MULTIPOLYGON:       u32 = 6;
const WKB_GEOMETRYCOLLECTION: u32 = 7;

const EWKB_Z:    u32 = 0x8000_0000;
const EWKB_M:    u32 = 0x4000_0000;
const EWKB_SRID: u32 = 0x2000_0000;

/// Nesting bound for geometry collections; deeper input is treated as corrupt.
const MAX_DEPTH: usize = 32;

// ── Reading ───────────────────────────────────────────────────────────────────

/// Decode one WKB geometry.  Trailing bytes are an error.
pub fn read_wkb(bytes: &[u8]) -> GeoIoResult<Geometry<f64>> {
    let mut reader = WkbReader { buf: bytes, pos: 0 };
    let geometry = reader.geometry(0)?;
    if reader.pos != bytes.len() {
        return Err(wkb_error(format!(
            "{} trailing bytes after geometry",
            bytes.len() - reader.pos
        )));
    }
    Ok(geometry)
}

struct WkbReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

/// Byte order and coordinate width of one geometry header.
#[derive(Copy, Clone)]
struct Header {
    le:   bool,
    dims: usize,
}

impl<'a> WkbReader<'a> {
    fn take(&mut self, n: usize) -> GeoIoResult<&'a [u8]> {
        let end = self.pos.checked_add(n).filter(|&e| e <= self.buf.len());
        match end {
            Some(end) => {
                let slice = &self.buf[self.pos..end];
                self.pos = end;
                Ok(slice)
            }
            None => Err(wkb_error(format!("unexpected end of data at byte {}", self.pos))),
        }
    }

    fn u32(&mut self, le: bool) -> GeoIoResult<u32> {
        let mut raw = [0u8; 4];
        raw.copy_from_slice(self.take(4)?);
        Ok(if le { u32::from_le_bytes(raw) } else { u32::from_be_bytes(raw) })
    }

    fn f64(&mut self, le: bool) -> GeoIoResult<f64> {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(self.take(8)?);
        Ok(if le { f64::from_le_bytes(raw) } else { f64::from_be_bytes(raw) })
    }

    /// Element count, checked against the bytes that remain so corrupt
    /// counts fail fast instead of allocating.
    fn count(&mut self, le: bool, min_item_size: usize) -> GeoIoResult<usize> {
        let n = self.u32(le)? as usize;
        let remaining = self.buf.len() - self.pos;
        if n.saturating_mul(min_item_size) > remaining {
            return Err(wkb_error(format!("element count {n} exceeds remaining data")));
        }
        Ok(n)
    }

    fn header(&mut self) -> GeoIoResult<(Header, u32)> {
        let le = match self.take(1)?[0] {
            0 => false,
            1 => true,
            b => return Err(wkb_error(format!("invalid byte order marker {b}"))),
        };
        let raw = self.u32(le)?;
        let mut dims = 2;
        if raw & EWKB_Z != 0 {
            dims += 1;
        }
        if raw & EWKB_M != 0 {
            dims += 1;
        }
        if raw & EWKB_SRID != 0 {
            self.u32(le)?;
        }
        let code = raw & 0x0FFF_FFFF;
        dims += match code / 1000 {
            0     => 0,
            1 | 2 => 1,
            3     => 2,
            _ => return Err(wkb_error(format!("unknown geometry type code {raw}"))),
        };
        Ok((Header { le, dims }, code % 1000))
    }

    fn coord(&mut self, h: Header) -> GeoIoResult<Coord<f64>> {
        let x = self.f64(h.le)?;
        let y = self.f64(h.le)?;
        for _ in 2..h.dims {
            self.f64(h.le)?;
        }
        Ok(Coord { x, y })
    }

    fn line_string(&mut self, h: Header) -> GeoIoResult<LineString<f64>> {
        let n = self.count(h.le, 8 * h.dims)?;
        let coords = (0..n).map(|_| self.coord(h)).collect::<GeoIoResult<Vec<_>>>()?;
        Ok(LineString::new(coords))
    }

    fn polygon(&mut self, h: Header) -> GeoIoResult<Polygon<f64>> {
        let n = self.count(h.le, 4)?;
        let mut rings = (0..n)
            .map(|_| self.line_string(h))
            .collect::<GeoIoResult<Vec<_>>>()?
            .into_iter();
        let exterior = rings.next().unwrap_or_else(|| LineString::new(Vec::new()));
        Ok(Polygon::new(exterior, rings.collect()))
    }

    fn geometry(&mut self, depth: usize) -> GeoIoResult<Geometry<f64>> {
        if depth > MAX_DEPTH {
            return Err(wkb_error("geometry collections nested too deeply".into()));
        }
        let (h, kind) = self.header()?;
        let geometry = match kind {
            WKB_POINT          => Geometry::Point(Point(self.coord(h)?)),
            WKB_LINESTRING     => Geometry::LineString(self.line_string(h)?),
            WKB_POLYGON        => Geometry::Polygon(self.polygon(h)?),
            WKB_MULTIPOINT => {
                let n = self.count(h.le, 5)?;
                let mut points = Vec::with_capacity(n);
                for _ in 0..n {
                    match self.geometry(depth + 1)? {
                        Geometry::Point(p) => points.push(p),
                        _ => return Err(wkb_error("multipoint member is not a point".into())),
                    }
                }
                Geometry::MultiPoint(MultiPoint::new(points))
            }
            WKB_MULTILINESTRING => {
                let n = self.count(h.le, 5)?;
                let mut lines = Vec::with_capacity(n);
                for _ in 0..n {
                    match self.geometry(depth + 1)? {
                        Geometry::LineString(l) => lines.push(l),
                        _ => return Err(wkb_error("multilinestring member is not a linestring".into())),
                    }
                }
                Geometry::MultiLineString(MultiLineString::new(lines))
            }
            WKB_MULTIPOLYGON => {
                let n = self.count(h.le, 5)?;
                let mut polygons = Vec::with_capacity(n);
                for _ in 0..n {
                    match self.geometry(depth + 1)? {
                        Geometry::Polygon(p) => polygons.push(p),
                        _ => return Err(wkb_error("multipolygon member is not a polygon".into())),
                    }
                }
                Geometry::MultiPolygon(MultiPolygon::new(polygons))
            }
            WKB_GEOMETRYCOLLECTION => {
                let n = self.count(h.le, 5)?;
                let members = (0..n)
                    .map(|_| self.geometry(depth + 1))
                    .collect::<GeoIoResult<Vec<_>>>()?;
                Geometry::GeometryCollection(GeometryCollection(members))
            }
            other => return Err(wkb_error(format!("unsupported geometry type {other}"))),
        };
        Ok(geometry)
    }
}

fn wkb_error(msg: String) -> GeoIoError {
    GeoIoError::Wkb(msg)
}

// ── Writing ───────────────────────────────────────────────────────────────────

/// Encode `geometry` as 2-D little-endian WKB, appending to `out`.
///
/// `Line`, `Rect` and `Triangle` are written as their linestring or polygon
/// equivalents.
pub fn write_wkb(geometry: &Geometry<f64>, out: &mut Vec<u8>) {
    match geometry {
        Geometry::Point(p) => {
            put_header(out, WKB_POINT);
            put_coord(out, p.0);
        }
        Geometry::Line(l) => {
            put_header(out, WKB_LINESTRING);
            put_u32(out, 2);
            put_coord(out, l.start);
            put_coord(out, l.end);
        }
        Geometry::LineString(ls) => {
            put_header(out, WKB_LINESTRING);
            put_coords(out, ls);
        }
        Geometry::Polygon(p) => {
            put_header(out, WKB_POLYGON);
            put_rings(out, p);
        }
        Geometry::MultiPoint(mp) => {
            put_header(out, WKB_MULTIPOINT);
            put_u32(out, mp.0.len() as u32);
            for p in &mp.0 {
                write_wkb(&Geometry::Point(*p), out);
            }
        }
        Geometry::MultiLineString(mls) => {
            put_header(out, WKB_MULTILINESTRING);
            put_u32(out, mls.0.len() as u32);
            for ls in &mls.0 {
                put_header(out, WKB_LINESTRING);
                put_coords(out, ls);
            }
        }
        Geometry::MultiPolygon(mp) => {
            put_header(out, WKB_MULTIPOLYGON);
            put_u32(out, mp.0.len() as u32);
            for p in &mp.0 {
                put_header(out, WKB_POLYGON);
                put_rings(out, p);
            }
        }
        Geometry::GeometryCollection(gc) => {
            put_header(out, WKB_GEOMETRYCOLLECTION);
            put_u32(out, gc.0.len() as u32);
            for g in &gc.0 {
                write_wkb(g, out);
            }
        }
        Geometry::Rect(r)     => write_wkb(&Geometry::Polygon(r.to_polygon()), out),
        Geometry::Triangle(t) => write_wkb(&Geometry::Polygon(t.to_polygon()), out),
    }
}

fn put_header(out: &mut Vec<u8>, kind: u32) {
    out.push(1);
    put_u32(out, kind);
}

fn put_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn put_coord(out: &mut Vec<u8>, c: Coord<f64>) {
    out.extend_from_slice(&c.x.to_le_bytes());
    out.extend_from_slice(&c.y.to_le_bytes());
}

fn put_coords(out: &mut Vec<u8>, ls: &LineString<f64>) {
    put_u32(out, ls.0.len() as u32);
    for c in &ls.0 {
        put_coord(out, *c);
    }
}

fn put_rings(out: &mut Vec<u8>, p: &Polygon<f64>) {
    if p.exterior().0.is_empty() {
        put_u32(out, 0);
        return;
    }
    put_u32(out, 1 + p.interiors().len() as u32);
    put_coords(out, p.exterior());
    for ring in p.interiors() {
        put_coords(out, ring);
    }
}
