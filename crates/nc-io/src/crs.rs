//! Coordinate reference systems and reprojection (`proj4rs`).
//!
//! Lengths are only meaningful in a projected CRS, so every layer is moved
//! into the run's target CRS before any geometry work happens.

use std::fmt;
use std::str::FromStr;

use geo::{Coord, Geometry, MapCoords};
use proj4rs::Proj;
use proj4rs::adaptors::transform_xy;

use crate::{GeoIoError, GeoIoResult};

/// EPSG code assumed for GeoJSON without a `crs` member (RFC 7946).
pub const WGS84: u16 = 4326;

// ── Crs ───────────────────────────────────────────────────────────────────────

/// A CRS identified either by EPSG code or by a PROJ.4 definition string.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Crs {
    Epsg(u16),
    Proj4(String),
}

impl Crs {
    /// Parse `"EPSG:7899"`, `"epsg:7899"`, `"urn:ogc:def:crs:EPSG::7899"`,
    /// a bare code, or a `+proj=…` string.
    pub fn parse(text: &str) -> GeoIoResult<Self> {
        let text = text.trim();
        if text.starts_with('+') {
            return Ok(Crs::Proj4(text.to_string()));
        }
        if text.eq_ignore_ascii_case("urn:ogc:def:crs:OGC:1.3:CRS84") {
            return Ok(Crs::Epsg(WGS84));
        }
        let upper = text.to_ascii_uppercase();
        let code = if upper.starts_with("EPSG:") || upper.contains(":EPSG:") {
            upper.rsplit(':').next()
        } else if !upper.contains(':') {
            Some(upper.as_str())
        } else {
            None
        };
        code.and_then(|c| c.parse::<u16>().ok())
            .map(Crs::Epsg)
            .ok_or_else(|| GeoIoError::UnknownCrs(text.to_string()))
    }

    pub fn epsg(&self) -> Option<u16> {
        match self {
            Crs::Epsg(code) => Some(*code),
            Crs::Proj4(_)   => None,
        }
    }

    fn to_proj(&self) -> GeoIoResult<Proj> {
        let proj = match self {
            Crs::Epsg(code) => Proj::from_epsg_code(*code),
            Crs::Proj4(def) => Proj::from_proj_string(def),
        };
        proj.map_err(|_| GeoIoError::UnknownCrs(self.to_string()))
    }
}

impl FromStr for Crs {
    type Err = GeoIoError;

    fn from_str(s: &str) -> GeoIoResult<Self> {
        Crs::parse(s)
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Crs::Epsg(code) => write!(f, "EPSG:{code}"),
            Crs::Proj4(def) => f.write_str(def),
        }
    }
}

// ── Reprojector ───────────────────────────────────────────────────────────────

/// Transforms geometries from one CRS to another.
///
/// Geographic CRSs take and return degrees; the radian conversion `proj4rs`
/// expects happens here.
pub struct Reprojector {
    inner: Option<(Proj, Proj)>,
}

impl Reprojector {
    /// Build a transform from `source` to `target`.  Equal CRSs produce an
    /// identity transform that never touches coordinates.
    pub fn new(source: &Crs, target: &Crs) -> GeoIoResult<Self> {
        if source == target {
            return Ok(Self::identity());
        }
        Ok(Self { inner: Some((source.to_proj()?, target.to_proj()?)) })
    }

    pub fn identity() -> Self {
        Self { inner: None }
    }

    pub fn is_identity(&self) -> bool {
        self.inner.is_none()
    }

    pub fn apply(&self, geometry: &Geometry<f64>) -> GeoIoResult<Geometry<f64>> {
        match &self.inner {
            None => Ok(geometry.clone()),
            Some((from, to)) => geometry
                .try_map_coords(|c| transform_coord(from, to, c))
                .map_err(GeoIoError::from),
        }
    }
}

fn transform_coord(
    from: &Proj,
    to:   &Proj,
    c:    Coord<f64>,
) -> Result<Coord<f64>, proj4rs::errors::Error> {
    let (x, y) = if from.is_latlong() {
        (c.x.to_radians(), c.y.to_radians())
    } else {
        (c.x, c.y)
    };
    let (x, y) = transform_xy(from, to, x, y)?;
    Ok(if to.is_latlong() {
        Coord { x: x.to_degrees(), y: y.to_degrees() }
    } else {
        Coord { x, y }
    })
}
