//! SpatiaLite geometry blob decoder.
//!
//! ```text
//! 0x00 | endian | srid:i32 | mbr:4×f64 | 0x7C | class:i32 | body | 0xFE
//! ```
//!
//! The body is WKB-like without per-geometry byte order markers; members of
//! collections are prefixed with `0x69` and their own class.  Classes above
//! one million are the compressed variants: interior vertices of lines and
//! rings are stored as `f32` offsets from the previous vertex.  Z and M
//! ordinates are read and discarded.

use geo::{
    Coord, Geometry, GeometryCollection, LineString, MultiLineString, MultiPoint, MultiPolygon,
    Point, Polygon,
};

use crate::{GeoIoError, GeoIoResult};

const BLOB_START:   u8 = 0x00;
const MBR_END:      u8 = 0x7C;
const ENTITY_MARK:  u8 = 0x69;
const BLOB_END:     u8 = 0xFE;
const HEADER_LEN:   usize = 39;
const COMPRESSED:   u32 = 1_000_000;
const MAX_DEPTH:    usize = 32;

/// `true` if `blob` carries the SpatiaLite start, MBR-end and end markers.
pub fn is_spatialite_blob(blob: &[u8]) -> bool {
    blob.len() > HEADER_LEN + 4
        && blob[0] == BLOB_START
        && matches!(blob[1], 0 | 1)
        && blob[HEADER_LEN - 1] == MBR_END
        && blob[blob.len() - 1] == BLOB_END
}

/// Decode one SpatiaLite blob.
pub fn decode_blob(blob: &[u8]) -> GeoIoResult<Geometry<f64>> {
    if !is_spatialite_blob(blob) {
        return Err(blob_error("missing SpatiaLite blob markers".into()));
    }
    let mut reader = BlobReader {
        buf: &blob[..blob.len() - 1],
        pos: HEADER_LEN,
        le:  blob[1] == 1,
    };
    let class = reader.u32()?;
    let geometry = reader.geometry(class, 0)?;
    if reader.pos != reader.buf.len() {
        return Err(blob_error(format!(
            "{} trailing bytes after geometry",
            reader.buf.len() - reader.pos
        )));
    }
    Ok(geometry)
}

/// Ordinate layout of one class code.
#[derive(Copy, Clone)]
struct Layout {
    z:          bool,
    m:          bool,
    compressed: bool,
}

impl Layout {
    fn of(class: u32) -> GeoIoResult<(Layout, u32)> {
        let compressed = class >= COMPRESSED;
        let base = class % COMPRESSED;
        let (z, m) = match base / 1000 {
            0 => (false, false),
            1 => (true, false),
            2 => (false, true),
            3 => (true, true),
            _ => return Err(blob_error(format!("unknown geometry class {class}"))),
        };
        Ok((Layout { z, m, compressed }, base % 1000))
    }

    fn full_width(self) -> usize {
        8 * (2 + self.z as usize + self.m as usize)
    }

    fn min_vertex_width(self) -> usize {
        if self.compressed {
            4 * (2 + self.z as usize) + 8 * self.m as usize
        } else {
            self.full_width()
        }
    }
}

struct BlobReader<'a> {
    buf: &'a [u8],
    pos: usize,
    le:  bool,
}

impl<'a> BlobReader<'a> {
    fn take<const N: usize>(&mut self) -> GeoIoResult<[u8; N]> {
        let end = self.pos + N;
        let Some(slice) = self.buf.get(self.pos..end) else {
            return Err(blob_error(format!("unexpected end of data at byte {}", self.pos)));
        };
        self.pos = end;
        let mut raw = [0u8; N];
        raw.copy_from_slice(slice);
        Ok(raw)
    }

    fn u8(&mut self) -> GeoIoResult<u8> {
        Ok(self.take::<1>()?[0])
    }

    fn u32(&mut self) -> GeoIoResult<u32> {
        let raw = self.take::<4>()?;
        Ok(if self.le { u32::from_le_bytes(raw) } else { u32::from_be_bytes(raw) })
    }

    fn f32(&mut self) -> GeoIoResult<f64> {
        let raw = self.take::<4>()?;
        Ok(f64::from(if self.le { f32::from_le_bytes(raw) } else { f32::from_be_bytes(raw) }))
    }

    fn f64(&mut self) -> GeoIoResult<f64> {
        let raw = self.take::<8>()?;
        Ok(if self.le { f64::from_le_bytes(raw) } else { f64::from_be_bytes(raw) })
    }

    fn count(&mut self, min_item_size: usize) -> GeoIoResult<usize> {
        let n = self.u32()? as usize;
        if n.saturating_mul(min_item_size) > self.buf.len() - self.pos {
            return Err(blob_error(format!("element count {n} exceeds remaining data")));
        }
        Ok(n)
    }

    fn full_coord(&mut self, l: Layout) -> GeoIoResult<Coord<f64>> {
        let x = self.f64()?;
        let y = self.f64()?;
        if l.z {
            self.f64()?;
        }
        if l.m {
            self.f64()?;
        }
        Ok(Coord { x, y })
    }

    fn line_string(&mut self, l: Layout) -> GeoIoResult<LineString<f64>> {
        let n = self.count(l.min_vertex_width())?;
        let mut coords: Vec<Coord<f64>> = Vec::with_capacity(n);
        for i in 0..n {
            let coord = match coords.last() {
                Some(&prev) if l.compressed && i + 1 < n => {
                    let dx = self.f32()?;
                    let dy = self.f32()?;
                    if l.z {
                        self.f32()?;
                    }
                    if l.m {
                        self.f64()?;
                    }
                    Coord { x: prev.x + dx, y: prev.y + dy }
                }
                _ => self.full_coord(l)?,
            };
            coords.push(coord);
        }
        Ok(LineString::new(coords))
    }

    fn polygon(&mut self, l: Layout) -> GeoIoResult<Polygon<f64>> {
        let n = self.count(4)?;
        let mut rings = (0..n)
            .map(|_| self.line_string(l))
            .collect::<GeoIoResult<Vec<_>>>()?
            .into_iter();
        let exterior = rings.next().unwrap_or_else(|| LineString::new(Vec::new()));
        Ok(Polygon::new(exterior, rings.collect()))
    }

    /// Members of a collection, each behind an entity marker.
    fn members(&mut self, depth: usize) -> GeoIoResult<Vec<Geometry<f64>>> {
        let n = self.count(5)?;
        let mut out = Vec::with_capacity(n);
        for _ in 0..n {
            let mark = self.u8()?;
            if mark != ENTITY_MARK {
                return Err(blob_error(format!("expected entity marker, found {mark:#04x}")));
            }
            let class = self.u32()?;
            out.push(self.geometry(class, depth + 1)?);
        }
        Ok(out)
    }

    fn geometry(&mut self, class: u32, depth: usize) -> GeoIoResult<Geometry<f64>> {
        if depth > MAX_DEPTH {
            return Err(blob_error("geometry collections nested too deeply".into()));
        }
        let (layout, kind) = Layout::of(class)?;
        Ok(match kind {
            1 => Geometry::Point(Point(self.full_coord(layout)?)),
            2 => Geometry::LineString(self.line_string(layout)?),
            3 => Geometry::Polygon(self.polygon(layout)?),
            4 => Geometry::MultiPoint(MultiPoint::new(
                self.members(depth)?.into_iter().map(member::<Point<f64>>).collect::<GeoIoResult<_>>()?,
            )),
            5 => Geometry::MultiLineString(MultiLineString::new(
                self.members(depth)?
                    .into_iter()
                    .map(member::<LineString<f64>>)
                    .collect::<GeoIoResult<_>>()?,
            )),
            6 => Geometry::MultiPolygon(MultiPolygon::new(
                self.members(depth)?.into_iter().map(member::<Polygon<f64>>).collect::<GeoIoResult<_>>()?,
            )),
            7 => Geometry::GeometryCollection(GeometryCollection(self.members(depth)?)),
            other => return Err(blob_error(format!("unknown geometry class {other}"))),
        })
    }
}

fn member<T>(g: Geometry<f64>) -> GeoIoResult<T>
where
    T: TryFrom<Geometry<f64>>,
{
    T::try_from(g).map_err(|_| blob_error("collection member of the wrong type".into()))
}

fn blob_error(msg: String) -> GeoIoError {
    GeoIoError::Wkb(format!("SpatiaLite: {msg}"))
}
