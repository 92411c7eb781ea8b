//! Restricting geometries to a fixed extent.
//!
//! One extent serves two stages: clipping network edges before the overlay
//! (which changes the totals) and clipping the finished region table for
//! display (which only changes which regions are reported).

use geo::{Area, BooleanOps, Euclidean, Length, MultiLineString, MultiPolygon, Rect};

use nc_core::geom::{ensure_finite, line_envelope, polygon_envelope, rects_overlap};
use nc_core::NetworkEdge;

use crate::{OverlayError, OverlayResult};

/// A polygonal extent plus its bounding box for cheap rejection.
#[derive(Clone, Debug)]
pub struct ExtentClipper {
    extent: MultiPolygon<f64>,
    bounds: Rect<f64>,
}

impl ExtentClipper {
    /// # Errors
    ///
    /// [`OverlayError::EmptyExtent`] for an extent without area, or a core
    /// error for non-finite coordinates.
    pub fn new(extent: MultiPolygon<f64>) -> OverlayResult<Self> {
        ensure_finite(&extent, || "clip extent".to_string())?;
        if extent.unsigned_area() <= 0.0 {
            return Err(OverlayError::EmptyExtent);
        }
        let bounds = polygon_envelope(&extent).ok_or(OverlayError::EmptyExtent)?;
        Ok(Self { extent, bounds })
    }

    pub fn extent(&self) -> &MultiPolygon<f64> {
        &self.extent
    }

    /// The part of `lines` inside the extent; `None` if nothing of positive
    /// length remains.
    pub fn clip_lines(&self, lines: &MultiLineString<f64>) -> Option<MultiLineString<f64>> {
        let rect = line_envelope(lines)?;
        if !rects_overlap(&rect, &self.bounds) {
            return None;
        }
        let parts: Vec<_> = self
            .extent
            .clip(lines, false)
            .0
            .into_iter()
            .filter(|ls| Euclidean.length(ls) > 0.0)
            .collect();
        (!parts.is_empty()).then(|| MultiLineString::new(parts))
    }

    /// Clip every edge, dropping edges wholly outside.  Surviving edges keep
    /// their ids and attributes.
    pub fn clip_edges(&self, edges: Vec<NetworkEdge>) -> Vec<NetworkEdge> {
        edges
            .into_iter()
            .filter_map(|mut edge| {
                edge.geometry = self.clip_lines(&edge.geometry)?;
                Some(edge)
            })
            .collect()
    }

    /// The part of `polygon` inside the extent; `None` when the overlap has
    /// no area.
    pub fn clip_polygon(&self, polygon: &MultiPolygon<f64>) -> Option<MultiPolygon<f64>> {
        let rect = polygon_envelope(polygon)?;
        if !rects_overlap(&rect, &self.bounds) {
            return None;
        }
        let clipped = self.extent.intersection(polygon);
        (clipped.unsigned_area() > 0.0).then_some(clipped)
    }
}
