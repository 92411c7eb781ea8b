//! Small geometry helpers shared by the loader and the overlay.

use geo::{BoundingRect, CoordsIter, MultiLineString, MultiPolygon, Rect};

use crate::{CoreError, CoreResult};

/// `true` if every coordinate of `geom` is finite.
///
/// Boolean overlay on NaN or infinite coordinates has no meaningful result,
/// so geometries are checked once on the way in.
pub fn all_finite<G: CoordsIter<Scalar = f64>>(geom: &G) -> bool {
    geom.coords_iter().all(|c| c.x.is_finite() && c.y.is_finite())
}

/// Fail with [`CoreError::NonFiniteCoordinate`] naming `what`.
pub fn ensure_finite<G: CoordsIter<Scalar = f64>>(geom: &G, what: impl FnOnce() -> String) -> CoreResult<()> {
    if all_finite(geom) {
        Ok(())
    } else {
        Err(CoreError::NonFiniteCoordinate { what: what() })
    }
}

/// Bounding box of a line geometry; `None` when it has no coordinates.
#[inline]
pub fn line_envelope(geom: &MultiLineString<f64>) -> Option<Rect<f64>> {
    geom.bounding_rect()
}

/// Bounding box of a polygon geometry; `None` when it has no coordinates.
#[inline]
pub fn polygon_envelope(geom: &MultiPolygon<f64>) -> Option<Rect<f64>> {
    geom.bounding_rect()
}

/// Closed-interval overlap test between two boxes.
#[inline]
pub fn rects_overlap(a: &Rect<f64>, b: &Rect<f64>) -> bool {
    a.min().x <= b.max().x
        && b.min().x <= a.max().x
        && a.min().y <= b.max().y
        && b.min().y <= a.max().y
}
