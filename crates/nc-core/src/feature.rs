//! The three feature kinds the engine moves between stages.
//!
//! ```text
//! NetworkEdge ──(overlay against RegionPolygon)──▶ SplitSegment ──▶ per-region sums
//! ```

use geo::{Euclidean, Length, MultiLineString, MultiPolygon};

use crate::{AttrValue, Attributes, EdgeId, RegionKey};

static NULL: AttrValue = AttrValue::Null;

// ── NetworkEdge ───────────────────────────────────────────────────────────────

/// One transport-network feature, in the run's projected CRS.
#[derive(Clone, Debug, PartialEq)]
pub struct NetworkEdge {
    pub id:        EdgeId,
    /// Identifier from the source dataset.  Not necessarily unique: networks
    /// with per-direction sub-records repeat the base id with a suffix.
    pub source_id: String,
    pub geometry:  MultiLineString<f64>,
    pub attrs:     Attributes,
}

impl NetworkEdge {
    pub fn new(
        id:        EdgeId,
        source_id: impl Into<String>,
        geometry:  MultiLineString<f64>,
        attrs:     Attributes,
    ) -> Self {
        Self { id, source_id: source_id.into(), geometry, attrs }
    }

    /// Planar length in CRS units.
    pub fn length(&self) -> f64 {
        Euclidean.length(&self.geometry)
    }

    /// Attribute value, `Null` when the column is absent.
    pub fn attr(&self, name: &str) -> &AttrValue {
        self.attrs.get(name).unwrap_or(&NULL)
    }
}

// ── RegionPolygon ─────────────────────────────────────────────────────────────

/// One administrative area.
#[derive(Clone, Debug, PartialEq)]
pub struct RegionPolygon {
    pub key:      RegionKey,
    pub geometry: MultiPolygon<f64>,
    /// Source attributes, carried through to the output unchanged.
    pub attrs:    Attributes,
}

impl RegionPolygon {
    pub fn new(key: RegionKey, geometry: MultiPolygon<f64>, attrs: Attributes) -> Self {
        Self { key, geometry, attrs }
    }
}

// ── SplitSegment ──────────────────────────────────────────────────────────────

/// The part of one edge lying inside one region.
///
/// `length` is measured on the split geometry in projected units.  It is only
/// meaningful relative to other lengths from the same run: it is neither the
/// source edge's recorded length nor a geodesic distance.
#[derive(Clone, Debug, PartialEq)]
pub struct SplitSegment {
    /// Parent edge.
    pub edge:     EdgeId,
    /// Key of the region this fragment lies in.
    pub region:   RegionKey,
    pub geometry: MultiLineString<f64>,
    pub length:   f64,
    /// Copied unchanged from the parent edge.
    pub attrs:    Attributes,
}

impl SplitSegment {
    pub fn attr(&self, name: &str) -> &AttrValue {
        self.attrs.get(name).unwrap_or(&NULL)
    }
}
